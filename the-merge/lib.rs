//! `the-merge` is the editable merge core: it consumes the line
//! alignment from `the-align` and exposes merge decision blocks with
//! manual and automatic resolution, range split/join, history and
//! keyword auto-merge passes, and result serialization.

use thiserror::Error;

mod automerge;
mod block;
mod doc;
mod history;
mod output;
mod selection;
#[cfg(test)]
mod testutil;

pub use automerge::AutoMergeOptions;
pub use block::{
  EditLine,
  LineMerge,
  MergeBlock,
  MergeDetails,
  classify,
};
pub use doc::{
  ChangeKind,
  ConflictCounts,
  MergeDoc,
  Target,
};
pub use history::HistoryOptions;
pub use output::{
  LineEnding,
  write_result,
};
pub use selection::Selection;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
  #[error("index {index} is not strictly inside the block range {start}..{end}")]
  OutOfRange { index: u32, start: u32, end: u32 },

  #[error("{0} conflicts are still unsolved")]
  UnsolvedConflicts(usize),

  #[error("the line ending convention is still undecided")]
  EolUndecided,

  #[error(transparent)]
  BrokenAlignment(#[from] the_align::AlignError),
}
