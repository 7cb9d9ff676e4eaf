use std::sync::Arc;

use parking_lot::RwLock;
use the_align::{
  Alignment,
  Source,
  Sources,
};

use crate::block::{
  EditLine,
  MergeBlock,
  MergeDetails,
  classify,
};

/// What changed, for the change-notification hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  Rebuilt,
  Choice,
  Split,
  Join,
  HistoryMerge,
  RegexMerge,
}

/// Navigation targets for `go_next` / `go_prev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
  Delta,
  Conflict,
  UnsolvedConflict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConflictCounts {
  /// Blocks whose first edit line is still a conflict placeholder.
  pub unsolved:   usize,
  /// Delta blocks that have been resolved.
  pub solved:     usize,
  /// Unsolved blocks that only differ in whitespace.
  pub whitespace: usize,
}

impl ConflictCounts {
  pub fn non_whitespace(&self) -> usize {
    self.unsolved.saturating_sub(self.whitespace)
  }
}

type ChangeHook = Box<dyn Fn(ChangeKind) + Send + Sync>;

/// The merge result under construction: the block list over one
/// alignment, a current-block cursor, and the conflict bookkeeping.
pub struct MergeDoc {
  pub(crate) sources:   Arc<Sources>,
  pub(crate) alignment: Arc<Alignment>,
  pub(crate) blocks:    Vec<MergeBlock>,
  pub(crate) current:   usize,
  counts:               ConflictCounts,
  /// When set, delta/conflict navigation skips whitespace-only
  /// conflicts.
  skip_whitespace:      bool,
  hooks:                RwLock<Vec<ChangeHook>>,
}

impl MergeDoc {
  pub fn new(sources: Arc<Sources>, alignment: Arc<Alignment>) -> MergeDoc {
    let mut doc = MergeDoc {
      sources,
      alignment,
      blocks: Vec::new(),
      current: 0,
      counts: ConflictCounts::default(),
      skip_whitespace: false,
      hooks: RwLock::new(Vec::new()),
    };
    doc.rebuild();
    doc
  }

  pub fn sources(&self) -> &Sources {
    &self.sources
  }

  pub fn alignment(&self) -> &Alignment {
    &self.alignment
  }

  pub fn blocks(&self) -> &[MergeBlock] {
    &self.blocks
  }

  pub fn counts(&self) -> ConflictCounts {
    self.counts
  }

  pub fn set_skip_whitespace(&mut self, skip: bool) {
    self.skip_whitespace = skip;
  }

  pub fn on_change(&self, hook: impl Fn(ChangeKind) + Send + Sync + 'static) {
    self.hooks.write().push(Box::new(hook));
  }

  pub(crate) fn emit(&self, kind: ChangeKind) {
    log::trace!("merge document changed: {kind:?}");
    for hook in self.hooks.read().iter() {
      hook(kind);
    }
  }

  /// Throws away all decisions and rebuilds the block list from the
  /// alignment.
  pub fn rebuild(&mut self) {
    self.blocks.clear();
    self.build_blocks();
    for i in 0..self.blocks.len() {
      self.compact_block(i);
    }
    self.recount();
    self.go_top();
    self.emit(ChangeKind::Rebuilt);
  }

  fn build_blocks(&mut self) {
    let two_way = !self.sources.is_triple();

    for idx in 0..self.alignment.len() {
      let row = self.alignment.line(idx);
      let lm = classify(row, two_way);

      // Conflicts where the sources only differ in whitespace can be
      // solved automatically; mark them for the whitespace pass.
      let all_blank = row.is_blank(Source::A)
        && row.is_blank(Source::B)
        && (two_way || row.is_blank(Source::C));
      let ws_conflict = lm.conflict
        && if two_way {
          row.equal_ab() || all_blank
        } else {
          (row.equal_ab() && row.equal_ac()) || all_blank
        };

      let delta = lm.src != Some(Source::A);

      let same = self.blocks.last().is_some_and(|back| {
        let back_row = self.alignment.line(back.start);
        if lm.conflict && back.conflict {
          // A whitespace-only conflict never coalesces with a real
          // one.
          back_row.equal_ac() == row.equal_ac() && back_row.equal_ab() == row.equal_ab()
        } else {
          (!lm.conflict
            && !back.conflict
            && delta
            && back.delta
            && lm.src == back.src
            && (lm.details == back.details
              || (lm.details != MergeDetails::BCAddedAndEqual
                && back.details != MergeDetails::BCAddedAndEqual)))
            || (!delta && !back.delta)
        }
      });

      if same && let Some(back) = self.blocks.last_mut() {
        back.len += 1;
        if back.ws_conflict && !ws_conflict {
          back.ws_conflict = false;
        }
      } else {
        self.blocks.push(MergeBlock {
          start: idx,
          len: 1,
          details: lm.details,
          conflict: lm.conflict,
          ws_conflict,
          delta,
          src: lm.src,
          edits: Vec::new(),
        });
      }

      let Some(back) = self.blocks.last_mut() else {
        continue;
      };
      if !lm.conflict {
        let src = lm.src.unwrap_or(Source::A);
        back.edits.push(if lm.removed {
          EditLine::removed(idx, src)
        } else {
          EditLine::bound(idx, src)
        });
      } else if !same {
        // One conflict placeholder per conflict block.
        back.edits.push(EditLine::conflict(Some(idx)));
      }
    }
  }

  /// Removes trailing empty lines inside one block: a line whose
  /// source contributes nothing is dropped when the previous line was
  /// equally empty and came from the same source. The first line of a
  /// block is always kept.
  fn compact_block(&mut self, block_idx: usize) {
    let alignment = Arc::clone(&self.alignment);
    let block = &mut self.blocks[block_idx];

    let mut old_line: Option<u32> = None;
    let mut old_src: Option<Option<Source>> = None;
    block.edits.retain(|mel| {
      let src_line = mel.src_line(&alignment);
      let drop = src_line.is_none() && old_line.is_none() && old_src == Some(mel.src());
      old_line = src_line;
      old_src = Some(mel.src());
      !drop
    });
  }

  /// Applies one selector to every gated delta block. An undecided
  /// selector re-emits a conflict placeholder instead. Every block is
  /// compacted afterwards.
  pub fn apply_default(
    &mut self,
    selector: Option<Source>,
    conflicts_only: bool,
    whitespace_only: bool,
  ) {
    log::debug!(
      "apply_default selector={selector:?} conflicts_only={conflicts_only} \
       whitespace_only={whitespace_only}"
    );
    for block in &mut self.blocks {
      let unsolved = block.is_unsolved();
      if !(block.delta
        && (!conflicts_only || unsolved)
        && (!whitespace_only || block.ws_conflict))
      {
        continue;
      }

      block.edits.clear();
      match selector {
        None => {
          block.edits.push(EditLine::conflict(Some(block.start)));
          block.conflict = true;
        }
        Some(sel) => {
          for row in block.start..block.end() {
            if self.alignment.line(row).line_in(sel).is_some() {
              block.edits.push(EditLine::bound(row, sel));
            }
          }
          if block.edits.is_empty() {
            // Keep one line nevertheless, marking the removal.
            block.edits.push(EditLine::removed(block.start, sel));
          }
          block.refresh_conflict();
        }
      }
    }

    for i in 0..self.blocks.len() {
      self.compact_block(i);
    }
    self.recount();
    self.emit(ChangeKind::Choice);
  }

  /// Chooses one source for the current block. Selecting an already
  /// active source strips its lines instead (toggling); when every
  /// line disappears, a conflict or removal placeholder keeps the
  /// block non-empty.
  pub fn choose(&mut self, selector: Source) {
    let alignment = Arc::clone(&self.alignment);
    let Some(block) = self.blocks.get_mut(self.current) else {
      return;
    };

    let mut active = false;
    block.edits.retain(|mel| {
      if mel.src() == Some(selector) {
        active = true;
      }
      !(mel.src() == Some(selector) || !mel.is_editable_text() || mel.is_modified())
    });

    if !active {
      for row in block.start..block.end() {
        block.edits.push(EditLine::bound(row, selector));
      }
    }

    // Remove lines whose source has nothing at their row.
    block
      .edits
      .retain(|mel| mel.src_line(&alignment).is_some());

    if block.edits.is_empty() {
      if active {
        // All source entries deleted: back to a conflict.
        block.edits.push(EditLine::conflict(Some(block.start)));
      } else {
        block.edits.push(EditLine::removed(block.start, selector));
      }
    }
    block.refresh_conflict();

    self.recount();
    self.emit(ChangeKind::Choice);
  }

  /// Splits the block list so that a block starts at alignment row
  /// `idx`, returning that block's index. Past-the-end indices return
  /// the block count without splitting anything.
  pub fn split_at(&mut self, idx: u32) -> usize {
    let pos = self.split_at_inner(idx);
    self.emit(ChangeKind::Split);
    pos
  }

  pub(crate) fn split_at_inner(&mut self, idx: u32) -> usize {
    if idx >= self.alignment.len() || self.blocks.is_empty() {
      return self.blocks.len();
    }
    let mut pos = self.blocks.len();
    for (i, block) in self.blocks.iter().enumerate() {
      if block.start == idx {
        return i;
      }
      if block.start > idx {
        pos = i;
        break;
      }
    }
    // idx falls strictly inside the previous block.
    if let Ok(second) = self.blocks[pos - 1].split_off(idx) {
      self.blocks.insert(pos, second);
    }
    pos
  }

  /// Joins every block covering rows `first_idx..=last_idx` into one
  /// conflict block.
  pub fn join_range(&mut self, first_idx: u32, last_idx: u32) {
    let Some(start) = self.blocks.iter().position(|b| b.contains(first_idx)) else {
      return;
    };
    let end = self
      .blocks
      .iter()
      .position(|b| b.contains(last_idx))
      .map_or(self.blocks.len(), |i| i + 1);

    for _ in 0..end.saturating_sub(start + 1) {
      if start + 1 >= self.blocks.len() {
        break;
      }
      let next = self.blocks.remove(start + 1);
      self.blocks[start].join(next);
    }

    self.current = start;
    self.recount();
    self.emit(ChangeKind::Join);
  }

  pub(crate) fn recount(&mut self) {
    let mut counts = ConflictCounts::default();
    for block in &self.blocks {
      if block.is_unsolved() {
        counts.unsolved += 1;
        if block.ws_conflict {
          counts.whitespace += 1;
        }
      } else if block.delta {
        counts.solved += 1;
      }
    }
    self.counts = counts;
  }

  fn skipped(&self, block: &MergeBlock) -> bool {
    self.skip_whitespace && block.ws_conflict
  }

  fn matches(&self, idx: usize, target: Target) -> bool {
    let block = &self.blocks[idx];
    match target {
      Target::Delta => block.delta && !self.skipped(block),
      Target::Conflict => block.conflict && !self.skipped(block),
      Target::UnsolvedConflict => block.is_unsolved(),
    }
  }

  /// Moves the cursor to the first delta block (or the first block).
  pub fn go_top(&mut self) {
    let mut i = 0;
    while i + 1 < self.blocks.len() && !self.blocks[i].delta {
      i += 1;
    }
    self.current = i;
  }

  pub fn go_bottom(&mut self) {
    if self.blocks.is_empty() {
      self.current = 0;
      return;
    }
    let mut i = self.blocks.len() - 1;
    while i > 0 && !self.blocks[i].delta {
      i -= 1;
    }
    self.current = i;
  }

  /// Moves down to the next matching block; without one the cursor
  /// lands on the last block.
  pub fn go_next(&mut self, target: Target) {
    let mut i = self.current;
    while i + 1 < self.blocks.len() {
      i += 1;
      if self.matches(i, target) {
        break;
      }
    }
    self.current = i;
  }

  pub fn go_prev(&mut self, target: Target) {
    let mut i = self.current;
    while i > 0 {
      i -= 1;
      if self.matches(i, target) {
        break;
      }
    }
    self.current = i;
  }

  pub fn current_index(&self) -> usize {
    self.current
  }

  pub fn current_block(&self) -> Option<&MergeBlock> {
    self.blocks.get(self.current)
  }

  pub fn set_current(&mut self, idx: usize) -> bool {
    if idx < self.blocks.len() {
      self.current = idx;
      true
    } else {
      false
    }
  }

  /// Selects the block covering alignment row `idx`.
  pub fn set_current_from_line(&mut self, idx: u32) -> bool {
    if let Some(i) = self.blocks.iter().position(|b| b.contains(idx)) {
      self.current = i;
      true
    } else {
      false
    }
  }

  pub fn delta_above(&self) -> bool {
    self.blocks[..self.current]
      .iter()
      .any(|b| b.delta && !self.skipped(b))
  }

  pub fn delta_below(&self) -> bool {
    self
      .blocks
      .iter()
      .skip(self.current + 1)
      .any(|b| b.delta && !self.skipped(b))
  }

  pub fn conflict_above(&self) -> bool {
    self.blocks[..self.current]
      .iter()
      .any(|b| b.conflict && !self.skipped(b))
  }

  pub fn conflict_below(&self) -> bool {
    self
      .blocks
      .iter()
      .skip(self.current + 1)
      .any(|b| b.conflict && !self.skipped(b))
  }

  pub fn unsolved_at(&self) -> bool {
    self.current_block().is_some_and(MergeBlock::is_unsolved)
  }

  pub fn unsolved_above(&self) -> bool {
    self.blocks[..self.current].iter().any(MergeBlock::is_unsolved)
  }

  pub fn unsolved_below(&self) -> bool {
    self
      .blocks
      .iter()
      .skip(self.current + 1)
      .any(MergeBlock::is_unsolved)
  }

  /// All edit lines of the result, in order.
  pub fn result_lines(&self) -> impl Iterator<Item = &EditLine> {
    self.blocks.iter().flat_map(|b| b.edits().iter())
  }

  /// Half-open result-line range occupied by one block.
  pub fn result_line_range(&self, block_idx: usize) -> Option<(u32, u32)> {
    let mut offset = 0u32;
    for (i, block) in self.blocks.iter().enumerate() {
      let len = block.edits().len() as u32;
      if i == block_idx {
        return Some((offset, offset + len));
      }
      offset += len;
    }
    None
  }

  /// The block and edit line at one result line index.
  pub fn edit_line_at(&self, line: u32) -> Option<(&MergeBlock, &EditLine)> {
    let mut offset = 0u32;
    for block in &self.blocks {
      let len = block.edits().len() as u32;
      if line < offset + len {
        return Some((block, &block.edits()[(line - offset) as usize]));
      }
      offset += len;
    }
    None
  }
}
