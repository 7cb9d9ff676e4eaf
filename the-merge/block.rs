use the_align::{
  AlignedLine,
  Alignment,
  Source,
  Sources,
};

use crate::MergeError;

/// How one aligned line relates to the base. `A` is the base; in a
/// two-way merge only the first three variants occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDetails {
  NoChange,
  BChanged,
  BDeleted,
  CChanged,
  CDeleted,
  BCChanged,
  BCChangedAndEqual,
  BChangedCDeleted,
  CChangedBDeleted,
  BAdded,
  CAdded,
  BCAdded,
  BCAddedAndEqual,
  BCDeleted,
}

/// Classification result for a single aligned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMerge {
  pub details:  MergeDetails,
  pub conflict: bool,
  pub removed:  bool,
  pub src:      Option<Source>,
}

/// Decides what happened to one aligned line relative to the base.
/// Pure over the line's source presence and fine-diff hints.
pub fn classify(line: &AlignedLine, two_way: bool) -> LineMerge {
  let a = line.has_line(Source::A);
  let b = line.has_line(Source::B);
  let c = line.has_line(Source::C);
  let ab = line.fine_ab().is_some();
  let bc = line.fine_bc().is_some();
  let ca = line.fine_ca().is_some();

  let solved = |details, src| LineMerge {
    details,
    conflict: false,
    removed: false,
    src: Some(src),
  };
  let removed = |details, src| LineMerge {
    details,
    conflict: false,
    removed: true,
    src: Some(src),
  };
  let conflict = |details| LineMerge {
    details,
    conflict: true,
    removed: false,
    src: None,
  };

  if two_way {
    return if a && b {
      if !ab {
        solved(MergeDetails::NoChange, Source::A)
      } else {
        conflict(MergeDetails::BChanged)
      }
    } else {
      conflict(MergeDetails::BDeleted)
    };
  }

  match (a, b, c) {
    (true, true, true) => match (ab, bc, ca) {
      (false, false, false) => solved(MergeDetails::NoChange, Source::A),
      (false, true, true) => solved(MergeDetails::CChanged, Source::C),
      (true, true, false) => solved(MergeDetails::BChanged, Source::B),
      (true, false, true) => solved(MergeDetails::BCChangedAndEqual, Source::C),
      (true, true, true) => conflict(MergeDetails::BCChanged),
      // Inconsistent fine-diff hints cannot describe a valid
      // pairwise comparison; treat them as a full conflict.
      _ => conflict(MergeDetails::BCChanged),
    },
    (true, true, false) => {
      if ab {
        conflict(MergeDetails::BChangedCDeleted)
      } else {
        removed(MergeDetails::CDeleted, Source::C)
      }
    }
    (true, false, true) => {
      if ca {
        conflict(MergeDetails::CChangedBDeleted)
      } else {
        removed(MergeDetails::BDeleted, Source::B)
      }
    }
    (false, true, true) => {
      if bc {
        conflict(MergeDetails::BCAdded)
      } else {
        solved(MergeDetails::BCAddedAndEqual, Source::C)
      }
    }
    (false, false, true) => solved(MergeDetails::CAdded, Source::C),
    (false, true, false) => solved(MergeDetails::BAdded, Source::B),
    (true, false, false) => removed(MergeDetails::BCDeleted, Source::C),
    // A row with no source line at all cannot come out of the
    // alignment stage; classify it as an unchanged empty row.
    (false, false, false) => solved(MergeDetails::NoChange, Source::A),
  }
}

/// One line of the merge result. A line is either a conflict
/// placeholder, bound to a source line of one aligned row, a removed
/// line, or literal text (history lead lines, user edits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditLine {
  line:    Option<u32>,
  src:     Option<Source>,
  removed: bool,
  text:    Option<Box<str>>,
}

impl EditLine {
  pub fn conflict(line: Option<u32>) -> EditLine {
    EditLine {
      line,
      src: None,
      removed: false,
      text: None,
    }
  }

  pub fn bound(line: u32, src: Source) -> EditLine {
    EditLine {
      line: Some(line),
      src: Some(src),
      removed: false,
      text: None,
    }
  }

  pub fn removed(line: u32, src: Source) -> EditLine {
    EditLine {
      line: Some(line),
      src: Some(src),
      removed: true,
      text: None,
    }
  }

  pub fn literal(text: impl Into<Box<str>>) -> EditLine {
    EditLine {
      line: None,
      src: None,
      removed: false,
      text: Some(text.into()),
    }
  }

  /// Alignment row this line refers to, if any.
  pub fn line(&self) -> Option<u32> {
    self.line
  }

  pub fn src(&self) -> Option<Source> {
    self.src
  }

  pub fn is_conflict(&self) -> bool {
    self.src.is_none() && !self.removed && self.text.is_none()
  }

  pub fn is_removed(&self) -> bool {
    self.removed
  }

  pub fn is_editable_text(&self) -> bool {
    !self.is_conflict() && !self.removed
  }

  pub fn is_modified(&self) -> bool {
    self.text.is_some() || (self.removed && self.src.is_none())
  }

  pub fn set_conflict(&mut self) {
    self.src = None;
    self.removed = false;
    self.text = None;
  }

  pub fn set_source(&mut self, src: Option<Source>, removed: bool) {
    self.src = src;
    self.removed = removed;
  }

  pub fn set_removed(&mut self, src: Option<Source>) {
    self.src = src;
    self.removed = true;
    self.text = None;
  }

  pub fn set_text(&mut self, text: impl Into<Box<str>>) {
    self.text = Some(text.into());
    self.removed = false;
    self.src = None;
  }

  /// The text this line contributes to the result. `None` for
  /// conflict placeholders and removed lines; a bound line whose
  /// source has no text at its row yields an empty string.
  pub fn content(&self, sources: &Sources, alignment: &Alignment) -> Option<String> {
    if self.is_conflict() || self.removed {
      return None;
    }
    if let Some(text) = &self.text {
      return Some(text.to_string());
    }
    let resolved = self
      .src
      .zip(self.line)
      .and_then(|(src, line)| alignment.text_for(sources, src, line));
    Some(resolved.unwrap_or_default())
  }

  /// The source line this edit resolves to, for compaction.
  pub(crate) fn src_line(&self, alignment: &Alignment) -> Option<u32> {
    if self.removed {
      return None;
    }
    let (src, line) = self.src.zip(self.line)?;
    alignment.get(line)?.line_in(src)
  }
}

/// A run of aligned rows with the same merge kind, plus the edit lines
/// currently chosen for it.
#[derive(Debug, Clone)]
pub struct MergeBlock {
  pub(crate) start:       u32,
  pub(crate) len:         u32,
  pub(crate) details:     MergeDetails,
  pub(crate) conflict:    bool,
  pub(crate) ws_conflict: bool,
  pub(crate) delta:       bool,
  pub(crate) src:         Option<Source>,
  pub(crate) edits:       Vec<EditLine>,
}

impl MergeBlock {
  /// First alignment row of the block.
  pub fn start(&self) -> u32 {
    self.start
  }

  /// Number of aligned rows the block covers.
  pub fn range_len(&self) -> u32 {
    self.len
  }

  pub fn end(&self) -> u32 {
    self.start + self.len
  }

  pub fn contains(&self, idx: u32) -> bool {
    idx >= self.start && idx < self.end()
  }

  pub fn details(&self) -> MergeDetails {
    self.details
  }

  pub fn is_conflict(&self) -> bool {
    self.conflict
  }

  pub fn is_whitespace_conflict(&self) -> bool {
    self.ws_conflict
  }

  pub fn is_delta(&self) -> bool {
    self.delta
  }

  pub fn chosen_source(&self) -> Option<Source> {
    self.src
  }

  pub fn edits(&self) -> &[EditLine] {
    &self.edits
  }

  /// A block counts as unsolved while its first edit line is still a
  /// conflict placeholder.
  pub fn is_unsolved(&self) -> bool {
    self.edits.first().is_none_or(EditLine::is_conflict)
  }

  /// Re-derives the conflict flag from the first edit line.
  pub(crate) fn refresh_conflict(&mut self) {
    self.conflict = self.is_unsolved();
  }

  /// Splits the block before row `at`; `self` keeps the rows below the
  /// split, the returned block gets the rest. Edit lines move to the
  /// second block from the first one that refers to a row at or past
  /// the split point; when none does, the second block starts out as a
  /// fresh conflict.
  pub fn split_off(&mut self, at: u32) -> Result<MergeBlock, MergeError> {
    if at <= self.start || at >= self.end() {
      return Err(MergeError::OutOfRange {
        index: at,
        start: self.start,
        end:   self.end(),
      });
    }

    let cut = self
      .edits
      .iter()
      .position(|mel| mel.line().is_some_and(|l| l >= at));
    let moved = match cut {
      Some(cut) => self.edits.split_off(cut),
      None => vec![EditLine::conflict(Some(at))],
    };

    let second = MergeBlock {
      start:       at,
      len:         self.end() - at,
      details:     self.details,
      conflict:    self.conflict,
      ws_conflict: self.ws_conflict,
      delta:       self.delta,
      src:         self.src,
      edits:       moved,
    };
    self.len = at - self.start;
    Ok(second)
  }

  /// Joins `other` (the block immediately after `self`) into `self`,
  /// collapsing the edits to a single conflict placeholder.
  pub fn join(&mut self, other: MergeBlock) {
    self.len += other.len;
    self.edits.clear();
    self.edits.push(EditLine::conflict(Some(self.start)));
    if other.conflict {
      self.conflict = true;
    }
    if !other.ws_conflict {
      self.ws_conflict = false;
    }
    if other.delta {
      self.delta = true;
    }
  }
}
