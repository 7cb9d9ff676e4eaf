//! `the-align` holds the data model shared by the merge engine and the
//! presentation layer: the immutable source texts, the alignment arena
//! produced by the diff stage, and the wrapped-line coordinate mapper.
//!
//! The alignment itself is computed elsewhere; this crate only consumes
//! its output representation.

use ropey::{
  Rope,
  RopeSlice,
};
use thiserror::Error;

mod align;
pub mod wrap;

pub use align::{
  AlignedLine,
  Alignment,
  FineDiff,
  FineSpan,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignError {
  #[error("source {src:?} line {line} is referenced {count} times by the alignment")]
  BrokenAlignment {
    src:   Source,
    line:  u32,
    count: u32,
  },
}

/// One of the merge inputs. `A` is always the base in a three-way
/// merge. Absence of a source is expressed as `Option<Source>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
  A,
  B,
  C,
}

impl Source {
  pub const ALL: [Source; 3] = [Source::A, Source::B, Source::C];
}

/// One input file, immutable for the whole merge session.
#[derive(Debug, Clone)]
pub struct SourceText {
  text:       Rope,
  line_count: u32,
}

impl SourceText {
  pub fn new(text: Rope) -> SourceText {
    // A trailing newline produces an empty final fragment in ropey;
    // that fragment is not an addressable line.
    let mut line_count = text.len_lines() as u32;
    if line_count > 0 && text.line(line_count as usize - 1).len_chars() == 0 {
      line_count -= 1;
    }
    SourceText { text, line_count }
  }

  pub fn from_str(text: &str) -> SourceText {
    SourceText::new(Rope::from_str(text))
  }

  pub fn line_count(&self) -> u32 {
    self.line_count
  }

  /// The line's text without its line ending.
  pub fn line(&self, idx: u32) -> RopeSlice<'_> {
    strip_line_ending(self.text.line(idx as usize))
  }

  pub fn line_to_string(&self, idx: u32) -> String {
    self.line(idx).to_string()
  }

  /// True when the line is empty or whitespace only.
  pub fn is_blank(&self, idx: u32) -> bool {
    self.line(idx).chars().all(char::is_whitespace)
  }
}

fn strip_line_ending(line: RopeSlice<'_>) -> RopeSlice<'_> {
  let mut end = line.len_chars();
  while end > 0 {
    match line.char(end - 1) {
      '\n' | '\r' => end -= 1,
      _ => break,
    }
  }
  line.slice(..end)
}

/// The two or three inputs of a merge session.
#[derive(Debug, Clone)]
pub struct Sources {
  a: SourceText,
  b: SourceText,
  c: Option<SourceText>,
}

impl Sources {
  pub fn two(a: SourceText, b: SourceText) -> Sources {
    Sources { a, b, c: None }
  }

  pub fn three(a: SourceText, b: SourceText, c: SourceText) -> Sources {
    Sources { a, b, c: Some(c) }
  }

  pub fn get(&self, src: Source) -> Option<&SourceText> {
    match src {
      Source::A => Some(&self.a),
      Source::B => Some(&self.b),
      Source::C => self.c.as_ref(),
    }
  }

  pub fn is_triple(&self) -> bool {
    self.c.is_some()
  }

  /// The last input: `C` in a three-way merge, otherwise `B`.
  pub fn last(&self) -> Source {
    if self.is_triple() { Source::C } else { Source::B }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trailing_newline_is_not_a_line() {
    let text = SourceText::from_str("a\nb\n");
    assert_eq!(text.line_count(), 2);
    assert_eq!(text.line_to_string(1), "b");
  }

  #[test]
  fn empty_text_has_no_lines() {
    assert_eq!(SourceText::from_str("").line_count(), 0);
  }

  #[test]
  fn line_strips_crlf() {
    let text = SourceText::from_str("a\r\nb");
    assert_eq!(text.line_to_string(0), "a");
    assert_eq!(text.line_count(), 2);
  }

  #[test]
  fn blank_line_detection() {
    let text = SourceText::from_str("  \t\nx\n");
    assert!(text.is_blank(0));
    assert!(!text.is_blank(1));
  }

  #[test]
  fn sources_expose_last_input() {
    let two = Sources::two(SourceText::from_str("a"), SourceText::from_str("b"));
    assert_eq!(two.last(), Source::B);
    assert!(two.get(Source::C).is_none());

    let three = Sources::three(
      SourceText::from_str("a"),
      SourceText::from_str("b"),
      SourceText::from_str("c"),
    );
    assert_eq!(three.last(), Source::C);
    assert!(three.is_triple());
  }
}
