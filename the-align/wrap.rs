//! Wrapped-line coordinate mapper.
//!
//! When soft wrap is on, one alignment row can occupy several display
//! lines. [`WrapMap`] owns the flat table of display lines for one
//! source view and converts between logical row indices and wrapped
//! display indices. Before the first recompute (and whenever wrapping
//! is off) both conversions are the identity.

use std::sync::{
  Arc,
  atomic::{
    AtomicBool,
    Ordering,
  },
};

use parking_lot::Mutex;
use ropey::RopeSlice;
use smallvec::SmallVec;
use unicode_width::UnicodeWidthChar;

use crate::{
  Alignment,
  Source,
  Sources,
};

mod worker;

/// One display line of one alignment row: a char range into the row's
/// source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapSegment {
  pub text_offset: u32,
  pub text_len:    u32,
}

/// One entry of the flat wrapped-display table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapEntry {
  /// Alignment row index this display line belongs to.
  pub line:        u32,
  pub text_offset: u32,
  pub text_len:    u32,
}

/// Text shaping is the presentation layer's business; the mapper only
/// needs the resulting segmentation. Implementations must be callable
/// from the recompute workers.
pub trait LineShaper: Sync {
  /// Splits `text` into display lines of at most `width` columns.
  /// Must return at least one segment, even for an empty line.
  fn shape(&self, text: RopeSlice<'_>, width: u16) -> SmallVec<[WrapSegment; 2]>;
}

/// Greedy word wrap over monospace column widths.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceShaper {
  pub tab_width: u8,
}

impl Default for MonospaceShaper {
  fn default() -> MonospaceShaper {
    MonospaceShaper { tab_width: 8 }
  }
}

impl MonospaceShaper {
  fn char_width(&self, c: char, column: u32) -> u32 {
    if c == '\t' {
      let tab = self.tab_width.max(1) as u32;
      tab - column % tab
    } else {
      c.width().unwrap_or(0) as u32
    }
  }
}

impl LineShaper for MonospaceShaper {
  fn shape(&self, text: RopeSlice<'_>, width: u16) -> SmallVec<[WrapSegment; 2]> {
    let width = width.max(1) as u32;
    let len = text.len_chars() as u32;
    let mut segments: SmallVec<[WrapSegment; 2]> = SmallVec::new();

    let mut start = 0u32;
    let mut column = 0u32;
    let mut last_break: Option<u32> = None;
    let mut pos = 0u32;

    for c in text.chars() {
      let w = self.char_width(c, column);
      if column + w > width && pos > start {
        // Prefer the last breakable position inside the window.
        let cut = match last_break {
          Some(b) if b > start => b,
          _ => pos,
        };
        segments.push(WrapSegment {
          text_offset: start,
          text_len:    cut - start,
        });
        start = cut;
        column = text
          .chars_at(cut as usize)
          .take((pos - cut) as usize)
          .fold(0, |acc, c| acc + self.char_width(c, acc));
        last_break = None;
      }
      if c == ' ' || c == '\t' {
        last_break = Some(pos + 1);
      }
      column += self.char_width(c, column);
      pos += 1;
    }

    segments.push(WrapSegment {
      text_offset: start,
      text_len:    len - start,
    });
    segments
  }
}

/// Cooperative cancellation for a running recompute. Cloned into every
/// chunk worker; checked between lines.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> CancelToken {
    CancelToken::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::Acquire)
  }
}

type RecomputedHook = Box<dyn Fn() + Send + Sync>;

/// Wrapped-display table for one source view.
pub struct WrapMap {
  src:          Source,
  alignment:    Arc<Alignment>,
  sources:      Arc<Sources>,
  wrap_enabled: bool,
  entries:      Vec<WrapEntry>,
  on_recompute: Mutex<Option<RecomputedHook>>,
}

impl WrapMap {
  pub fn new(src: Source, alignment: Arc<Alignment>, sources: Arc<Sources>) -> WrapMap {
    WrapMap {
      src,
      alignment,
      sources,
      wrap_enabled: false,
      entries: Vec::new(),
      on_recompute: Mutex::new(None),
    }
  }

  pub fn is_wrap_enabled(&self) -> bool {
    self.wrap_enabled
  }

  /// Registers the single recompute-finished notification.
  pub fn on_recomputed(&self, hook: impl Fn() + Send + Sync + 'static) {
    *self.on_recompute.lock() = Some(Box::new(hook));
  }

  /// Turns wrapping off and restores the identity mapping.
  pub fn disable(&mut self) {
    self.wrap_enabled = false;
    self.entries.clear();
    self.alignment.recalc_display_offsets(true);
  }

  /// Rebuilds the whole table for the given display width. Returns
  /// `false` when cancelled; the previous table stays installed and
  /// remains structurally valid (it just reflects the old width).
  pub fn recompute(&mut self, shaper: &dyn LineShaper, width: u16, cancel: &CancelToken) -> bool {
    let Some(rows) =
      worker::shape_chunks(&self.alignment, &self.sources, self.src, shaper, width, cancel)
    else {
      log::debug!("wrap recompute cancelled, keeping previous table");
      return false;
    };

    // Another view of the same alignment may already have raised a
    // row's height; only ever grow it here.
    for (row, segments) in self.alignment.iter().zip(&rows) {
      row.grow_display_height(segments.len() as u32);
    }
    let total = self.alignment.recalc_display_offsets(false);

    let mut entries = Vec::with_capacity(total as usize);
    for (idx, segments) in rows.iter().enumerate() {
      let row = self.alignment.line(idx as u32);
      for seg in segments {
        entries.push(WrapEntry {
          line:        idx as u32,
          text_offset: seg.text_offset,
          text_len:    seg.text_len,
        });
      }
      // Pad up to the shared height with empty display lines.
      for _ in segments.len() as u32..row.display_height() {
        entries.push(WrapEntry {
          line:        idx as u32,
          text_offset: 0,
          text_len:    0,
        });
      }
    }

    self.entries = entries;
    self.wrap_enabled = true;
    if let Some(hook) = self.on_recompute.lock().as_ref() {
      hook();
    }
    true
  }

  /// First display line of alignment row `idx`.
  pub fn logical_to_wrapped(&self, idx: u32) -> u32 {
    if !self.wrap_enabled || self.alignment.is_empty() {
      return idx;
    }
    let idx = idx.min(self.alignment.len() - 1);
    self.alignment.line(idx).display_offset()
  }

  /// Alignment row owning display line `wrapped` (clamped).
  pub fn wrapped_to_logical(&self, wrapped: u32) -> u32 {
    if !self.wrap_enabled || self.entries.is_empty() {
      return wrapped;
    }
    let wrapped = (wrapped as usize).min(self.entries.len() - 1);
    self.entries[wrapped].line
  }

  pub fn entry(&self, wrapped: u32) -> Option<&WrapEntry> {
    self.entries.get(wrapped as usize)
  }

  pub fn entries(&self) -> &[WrapEntry] {
    &self.entries
  }

  /// Total display height of the view.
  pub fn visible_lines(&self) -> u32 {
    if self.wrap_enabled {
      self.entries.len() as u32
    } else {
      self.alignment.len()
    }
  }
}

#[cfg(test)]
mod tests {
  use ropey::Rope;

  use super::*;
  use crate::{
    AlignedLine,
    SourceText,
  };

  fn shape_str(text: &str, width: u16) -> Vec<(u32, u32)> {
    let rope = Rope::from_str(text);
    MonospaceShaper::default()
      .shape(rope.slice(..), width)
      .iter()
      .map(|s| (s.text_offset, s.text_len))
      .collect()
  }

  fn setup(a: &str, b: &str, rows: Vec<AlignedLine>) -> WrapMap {
    let sources = Arc::new(Sources::two(
      SourceText::from_str(a),
      SourceText::from_str(b),
    ));
    WrapMap::new(Source::A, Arc::new(Alignment::new(rows)), sources)
  }

  #[test]
  fn empty_line_shapes_to_one_segment() {
    assert_eq!(shape_str("", 10), vec![(0, 0)]);
  }

  #[test]
  fn wrap_prefers_word_boundaries() {
    assert_eq!(shape_str("hello world", 8), vec![(0, 6), (6, 5)]);
  }

  #[test]
  fn long_words_break_hard() {
    assert_eq!(shape_str("abcdefghij", 4), vec![(0, 4), (4, 4), (8, 2)]);
  }

  #[test]
  fn identity_before_first_recompute() {
    let map = setup("a\nb\n", "a\nb\n", vec![
      AlignedLine::new().with_a(0).with_b(0),
      AlignedLine::new().with_a(1).with_b(1),
    ]);
    assert_eq!(map.logical_to_wrapped(1), 1);
    assert_eq!(map.wrapped_to_logical(7), 7);
    assert_eq!(map.visible_lines(), 2);
  }

  #[test]
  fn roundtrip_after_recompute() {
    let mut map = setup("one two three four\nshort\n", "x\ny\n", vec![
      AlignedLine::new().with_a(0).with_b(0),
      AlignedLine::new().with_a(1).with_b(1),
    ]);
    assert!(map.recompute(&MonospaceShaper::default(), 8, &CancelToken::new()));

    assert_eq!(map.logical_to_wrapped(0), 0);
    assert!(map.logical_to_wrapped(1) > 1);
    for idx in 0..2 {
      assert_eq!(map.wrapped_to_logical(map.logical_to_wrapped(idx)), idx);
    }
    assert_eq!(map.visible_lines() as usize, map.entries().len());
  }

  #[test]
  fn cancelled_recompute_keeps_previous_table() {
    let mut map = setup("one two three four\n", "x\n", vec![AlignedLine::new()
      .with_a(0)
      .with_b(0)]);
    assert!(map.recompute(&MonospaceShaper::default(), 6, &CancelToken::new()));
    let before: Vec<WrapEntry> = map.entries().to_vec();

    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(!map.recompute(&MonospaceShaper::default(), 80, &cancel));
    assert_eq!(map.entries(), before.as_slice());
    assert!(map.is_wrap_enabled());
  }

  /// Cancels the shared token from inside the first `shape` call, so
  /// the workers hit the between-lines check while already running.
  struct CancellingShaper {
    inner:  MonospaceShaper,
    cancel: CancelToken,
  }

  impl LineShaper for CancellingShaper {
    fn shape(&self, text: RopeSlice<'_>, width: u16) -> SmallVec<[WrapSegment; 2]> {
      self.cancel.cancel();
      self.inner.shape(text, width)
    }
  }

  #[test]
  fn cancellation_during_shaping_keeps_previous_table() {
    let mut map = setup("one two three four\nfive six seven\n", "x\ny\n", vec![
      AlignedLine::new().with_a(0).with_b(0),
      AlignedLine::new().with_a(1).with_b(1),
    ]);
    assert!(map.recompute(&MonospaceShaper::default(), 6, &CancelToken::new()));
    let before: Vec<WrapEntry> = map.entries().to_vec();

    let cancel = CancelToken::new();
    let shaper = CancellingShaper {
      inner:  MonospaceShaper::default(),
      cancel: cancel.clone(),
    };
    assert!(!map.recompute(&shaper, 80, &cancel));
    assert_eq!(map.entries(), before.as_slice());
    assert!(map.is_wrap_enabled());
    assert!(cancel.is_cancelled());
  }

  #[test]
  fn disable_restores_identity() {
    let mut map = setup("one two three\n", "x\n", vec![
      AlignedLine::new().with_a(0).with_b(0),
    ]);
    assert!(map.recompute(&MonospaceShaper::default(), 4, &CancelToken::new()));
    assert!(map.visible_lines() > 1);
    map.disable();
    assert_eq!(map.visible_lines(), 1);
    assert_eq!(map.logical_to_wrapped(0), 0);
  }

  #[test]
  fn recompute_fires_the_hook_once() {
    use std::sync::atomic::AtomicU32;

    let mut map = setup("a\n", "b\n", vec![AlignedLine::new().with_a(0).with_b(0)]);
    let fired = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&fired);
    map.on_recomputed(move || {
      counted.fetch_add(1, Ordering::SeqCst);
    });
    assert!(map.recompute(&MonospaceShaper::default(), 10, &CancelToken::new()));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }
}
