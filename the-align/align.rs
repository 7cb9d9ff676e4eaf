use std::sync::atomic::{
  AtomicU32,
  Ordering,
};

use smallvec::SmallVec;

use crate::{
  AlignError,
  Source,
  Sources,
};

/// One differing region between a pair of aligned lines, as char
/// ranges into the left and right line respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FineSpan {
  pub left:  std::ops::Range<u32>,
  pub right: std::ops::Range<u32>,
}

/// Ordered, non-overlapping differing spans of one line pair. Present
/// on an [`AlignedLine`] only where the pair actually differs.
pub type FineDiff = SmallVec<[FineSpan; 2]>;

/// One row of the alignment: up to three source line references plus
/// the comparison hints the diff stage computed for them.
///
/// `display_height` and `display_offset` are the only fields mutated
/// after construction; they are atomics so the wrap mapper can update
/// them through a shared `Arc<Alignment>`.
#[derive(Debug)]
pub struct AlignedLine {
  line_a: Option<u32>,
  line_b: Option<u32>,
  line_c: Option<u32>,

  fine_ab: Option<FineDiff>,
  fine_bc: Option<FineDiff>,
  fine_ca: Option<FineDiff>,

  equal_ab: bool,
  equal_ac: bool,
  equal_bc: bool,

  blank_a: bool,
  blank_b: bool,
  blank_c: bool,

  display_height: AtomicU32,
  display_offset: AtomicU32,
}

impl Default for AlignedLine {
  fn default() -> AlignedLine {
    AlignedLine {
      line_a:         None,
      line_b:         None,
      line_c:         None,
      fine_ab:        None,
      fine_bc:        None,
      fine_ca:        None,
      equal_ab:       false,
      equal_ac:       false,
      equal_bc:       false,
      blank_a:        false,
      blank_b:        false,
      blank_c:        false,
      display_height: AtomicU32::new(1),
      display_offset: AtomicU32::new(0),
    }
  }
}

impl Clone for AlignedLine {
  fn clone(&self) -> AlignedLine {
    AlignedLine {
      line_a:         self.line_a,
      line_b:         self.line_b,
      line_c:         self.line_c,
      fine_ab:        self.fine_ab.clone(),
      fine_bc:        self.fine_bc.clone(),
      fine_ca:        self.fine_ca.clone(),
      equal_ab:       self.equal_ab,
      equal_ac:       self.equal_ac,
      equal_bc:       self.equal_bc,
      blank_a:        self.blank_a,
      blank_b:        self.blank_b,
      blank_c:        self.blank_c,
      display_height: AtomicU32::new(self.display_height.load(Ordering::Relaxed)),
      display_offset: AtomicU32::new(self.display_offset.load(Ordering::Relaxed)),
    }
  }
}

impl AlignedLine {
  pub fn new() -> AlignedLine {
    AlignedLine::default()
  }

  pub fn with_a(mut self, line: u32) -> AlignedLine {
    self.line_a = Some(line);
    self
  }

  pub fn with_b(mut self, line: u32) -> AlignedLine {
    self.line_b = Some(line);
    self
  }

  pub fn with_c(mut self, line: u32) -> AlignedLine {
    self.line_c = Some(line);
    self
  }

  pub fn with_equal(mut self, ab: bool, ac: bool, bc: bool) -> AlignedLine {
    self.equal_ab = ab;
    self.equal_ac = ac;
    self.equal_bc = bc;
    self
  }

  pub fn with_fine_ab(mut self, spans: FineDiff) -> AlignedLine {
    self.fine_ab = Some(spans);
    self
  }

  pub fn with_fine_bc(mut self, spans: FineDiff) -> AlignedLine {
    self.fine_bc = Some(spans);
    self
  }

  pub fn with_fine_ca(mut self, spans: FineDiff) -> AlignedLine {
    self.fine_ca = Some(spans);
    self
  }

  pub fn line_in(&self, src: Source) -> Option<u32> {
    match src {
      Source::A => self.line_a,
      Source::B => self.line_b,
      Source::C => self.line_c,
    }
  }

  pub fn has_line(&self, src: Source) -> bool {
    self.line_in(src).is_some()
  }

  pub fn equal_ab(&self) -> bool {
    self.equal_ab
  }

  pub fn equal_ac(&self) -> bool {
    self.equal_ac
  }

  pub fn equal_bc(&self) -> bool {
    self.equal_bc
  }

  pub fn fine_ab(&self) -> Option<&FineDiff> {
    self.fine_ab.as_ref()
  }

  pub fn fine_bc(&self) -> Option<&FineDiff> {
    self.fine_bc.as_ref()
  }

  pub fn fine_ca(&self) -> Option<&FineDiff> {
    self.fine_ca.as_ref()
  }

  /// True when the referenced line is missing or whitespace only.
  pub fn is_blank(&self, src: Source) -> bool {
    match src {
      Source::A => self.line_a.is_none() || self.blank_a,
      Source::B => self.line_b.is_none() || self.blank_b,
      Source::C => self.line_c.is_none() || self.blank_c,
    }
  }

  pub fn display_height(&self) -> u32 {
    self.display_height.load(Ordering::Acquire)
  }

  pub fn set_display_height(&self, height: u32) {
    self.display_height.store(height, Ordering::Release);
  }

  /// Raises the display height if `height` exceeds the current value.
  pub fn grow_display_height(&self, height: u32) {
    self.display_height.fetch_max(height, Ordering::AcqRel);
  }

  pub fn display_offset(&self) -> u32 {
    self.display_offset.load(Ordering::Acquire)
  }
}

/// The whole alignment: a stable arena of rows. Everything downstream
/// refers to rows by index into this vector.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
  lines: Vec<AlignedLine>,
}

impl Alignment {
  pub fn new(lines: Vec<AlignedLine>) -> Alignment {
    Alignment { lines }
  }

  pub fn len(&self) -> u32 {
    self.lines.len() as u32
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn get(&self, idx: u32) -> Option<&AlignedLine> {
    self.lines.get(idx as usize)
  }

  /// Row accessor for indices already known to be in range.
  pub fn line(&self, idx: u32) -> &AlignedLine {
    &self.lines[idx as usize]
  }

  pub fn iter(&self) -> impl Iterator<Item = &AlignedLine> {
    self.lines.iter()
  }

  /// The text the given source contributes to the given row, if any.
  pub fn text_for(&self, sources: &Sources, src: Source, idx: u32) -> Option<String> {
    let row = self.get(idx)?;
    let line = row.line_in(src)?;
    Some(sources.get(src)?.line_to_string(line))
  }

  /// Fills the per-source blank hints from the actual texts.
  pub fn annotate_blank_lines(&mut self, sources: &Sources) {
    let blank = |src: Source, line: Option<u32>| {
      line.is_some_and(|l| sources.get(src).is_some_and(|t| t.is_blank(l)))
    };
    for row in &mut self.lines {
      row.blank_a = blank(Source::A, row.line_a);
      row.blank_b = blank(Source::B, row.line_b);
      row.blank_c = blank(Source::C, row.line_c);
    }
  }

  /// Serial prefix sum over the display heights. With `reset` every
  /// height collapses back to one first (wrapping turned off). Returns
  /// the total number of wrapped display lines.
  pub fn recalc_display_offsets(&self, reset: bool) -> u32 {
    let mut offset = 0u32;
    for row in &self.lines {
      if reset {
        row.set_display_height(1);
      }
      row.display_offset.store(offset, Ordering::Release);
      offset += row.display_height();
    }
    offset
  }

  /// Checks that every source line is referenced exactly once and in
  /// ascending order. The diff stage guarantees this; a violation
  /// means the alignment handed to us is unusable.
  pub fn validate(&self, sources: &Sources) -> Result<(), AlignError> {
    for src in Source::ALL {
      let Some(text) = sources.get(src) else { continue };
      let mut next = 0u32;
      for row in &self.lines {
        if let Some(line) = row.line_in(src) {
          if line != next {
            return Err(AlignError::BrokenAlignment {
              src,
              line,
              count: if line < next { 2 } else { 0 },
            });
          }
          next += 1;
        }
      }
      if next != text.line_count() {
        return Err(AlignError::BrokenAlignment {
          src,
          line: next,
          count: 0,
        });
      }
    }
    Ok(())
  }
}
