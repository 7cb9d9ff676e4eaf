use crate::{
  MergeError,
  doc::MergeDoc,
};

/// Line ending convention of the merge result. `None` upstream means
/// the inputs disagreed and the caller still has to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
  Unix,
  Dos,
}

/// Renders the final edit-line sequence. Fails while conflicts remain
/// or while the line ending convention is undecided. The separator is
/// prepended from the second line on, so the result carries no
/// trailing newline.
pub fn write_result(doc: &MergeDoc, eol: Option<LineEnding>) -> Result<String, MergeError> {
  let unsolved = doc.blocks().iter().filter(|b| b.is_unsolved()).count();
  if unsolved > 0 {
    return Err(MergeError::UnsolvedConflicts(unsolved));
  }
  let Some(eol) = eol else {
    return Err(MergeError::EolUndecided);
  };
  let sep = match eol {
    LineEnding::Unix => "\n",
    LineEnding::Dos => "\r\n",
  };

  let mut out = String::new();
  let mut line = 0usize;
  for mel in doc.result_lines() {
    if !mel.is_editable_text() {
      continue;
    }
    let text = mel
      .content(doc.sources(), doc.alignment())
      .unwrap_or_default();
    if line > 0 {
      out.push_str(sep);
    }
    out.push_str(&text);
    line += 1;
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use the_align::Source;

  use super::*;
  use crate::testutil::doc2;

  #[test]
  fn unsolved_conflicts_refuse_to_serialize() {
    let doc = doc2("a\nb\n", "a\nx\n");
    assert_eq!(
      write_result(&doc, Some(LineEnding::Unix)),
      Err(MergeError::UnsolvedConflicts(1))
    );
  }

  #[test]
  fn undecided_line_ending_refuses_to_serialize() {
    let mut doc = doc2("a\nb\n", "a\nx\n");
    doc.choose(Source::B);
    assert_eq!(write_result(&doc, None), Err(MergeError::EolUndecided));
  }

  #[test]
  fn lf_and_crlf_shapes() {
    let mut doc = doc2("a\nb\n", "a\nx\n");
    doc.choose(Source::B);
    assert_eq!(write_result(&doc, Some(LineEnding::Unix)).as_deref(), Ok("a\nx"));
    assert_eq!(
      write_result(&doc, Some(LineEnding::Dos)).as_deref(),
      Ok("a\r\nx")
    );
  }

  #[test]
  fn removed_lines_do_not_reach_the_output() {
    let mut doc = doc2("a\nb\n", "a\n");
    doc.choose(Source::B);
    assert_eq!(write_result(&doc, Some(LineEnding::Unix)).as_deref(), Ok("a"));
  }

  #[test]
  fn empty_result_is_an_empty_string() {
    let mut doc = doc2("a\n", "");
    doc.set_current(0);
    doc.choose(Source::B);
    assert_eq!(write_result(&doc, Some(LineEnding::Unix)).as_deref(), Ok(""));
  }
}
