//! Keyword auto-merge: conflicts where every source's line fully
//! matches a version-control keyword pattern ("$Id$", "$Author$", ...)
//! are resolved to the last source automatically.

use regex::Regex;
use serde::Deserialize;
use the_align::Source;

use crate::doc::{
  ChangeKind,
  MergeDoc,
};

/// Whole-line match, like the original full-match semantics.
pub(crate) fn exact(pattern: &str) -> Result<Regex, regex::Error> {
  Regex::new(&format!("^(?:{pattern})$"))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AutoMergeOptions {
  /// Full-line pattern; empty disables the pass.
  pub pattern: String,
}

impl MergeDoc {
  /// Resolves single-line keyword conflicts to the last source. An
  /// empty or invalid pattern makes this a no-op.
  pub fn regex_auto_merge(&mut self, opts: &AutoMergeOptions) {
    if opts.pattern.is_empty() {
      return;
    }
    let re = match exact(&opts.pattern) {
      Ok(re) => re,
      Err(err) => {
        log::debug!("invalid auto-merge pattern, skipping: {err}");
        return;
      }
    };

    let triple = self.sources.is_triple();
    let last = self.sources.last();
    let mut solved = 0usize;

    let mut i = 0;
    while i < self.blocks.len() {
      if self.blocks[i].conflict {
        let start = self.blocks[i].start;
        let text = |src| {
          self
            .alignment
            .text_for(&self.sources, src, start)
            .unwrap_or_default()
        };
        if re.is_match(&text(Source::A))
          && re.is_match(&text(Source::B))
          && (!triple || re.is_match(&text(Source::C)))
        {
          if let Some(mel) = self.blocks[i].edits.first_mut() {
            mel.set_source(Some(last), false);
          }
          // Only the matching first row is solved; the rest of the
          // block splits off and stays a conflict.
          self.split_at_inner(start + 1);
          self.blocks[i].refresh_conflict();
          solved += 1;
        }
      }
      i += 1;
    }

    log::debug!("keyword auto-merge solved {solved} conflicts");
    self.recount();
    self.emit(ChangeKind::RegexMerge);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::{
    doc2,
    doc3,
    render,
  };

  fn id_opts() -> AutoMergeOptions {
    AutoMergeOptions {
      pattern: r".*\$Id[^\$]*\$.*".to_string(),
    }
  }

  #[test]
  fn keyword_conflict_resolves_to_the_last_source() {
    let mut doc = doc3(
      "// $Id: f.c 1 $\nx\n",
      "// $Id: f.c 2 $\nx\n",
      "// $Id: f.c 3 $\nx\n",
    );
    assert_eq!(doc.counts().unsolved, 1);

    doc.regex_auto_merge(&id_opts());
    assert_eq!(doc.counts().unsolved, 0);
    let block = &doc.blocks()[0];
    assert!(!block.is_unsolved());
    assert_eq!(block.edits()[0].src(), Some(the_align::Source::C));
    assert_eq!(render(&doc), vec!["// $Id: f.c 3 $", "x"]);
  }

  #[test]
  fn two_way_resolves_to_b() {
    let mut doc = doc2("// $Id: a $\n", "// $Id: b $\n");
    doc.regex_auto_merge(&id_opts());
    assert_eq!(render(&doc), vec!["// $Id: b $"]);
  }

  #[test]
  fn only_the_keyword_row_splits_off_the_conflict() {
    let mut doc = doc2("// $Id: a $\nleft\n", "// $Id: b $\nright\n");
    // Both rows conflict and coalesce into one block.
    assert_eq!(doc.blocks().len(), 1);

    doc.regex_auto_merge(&id_opts());
    assert_eq!(doc.blocks().len(), 2);
    assert!(!doc.blocks()[0].is_unsolved());
    assert!(doc.blocks()[1].is_unsolved());
    assert_eq!(doc.counts().unsolved, 1);
  }

  #[test]
  fn non_matching_conflicts_are_untouched() {
    let mut doc = doc2("a\n", "b\n");
    doc.regex_auto_merge(&id_opts());
    assert_eq!(doc.counts().unsolved, 1);
  }

  #[test]
  fn empty_and_invalid_patterns_are_no_ops() {
    let mut doc = doc2("// $Id: a $\n", "// $Id: b $\n");
    let before = render(&doc);

    doc.regex_auto_merge(&AutoMergeOptions::default());
    assert_eq!(render(&doc), before);

    doc.regex_auto_merge(&AutoMergeOptions {
      pattern: "(".to_string(),
    });
    assert_eq!(render(&doc), before);
  }
}
