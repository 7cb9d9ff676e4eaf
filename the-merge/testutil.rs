//! Shared builders for the merge tests. The positional aligner pairs
//! line `i` of every input with line `i`, which is exactly what the
//! scenarios here need; real alignments come from the diff stage.

use std::sync::Arc;

use smallvec::smallvec;
use the_align::{
  AlignedLine,
  Alignment,
  FineSpan,
  Source,
  SourceText,
  Sources,
};

use crate::MergeDoc;

fn full_span(left: &str, right: &str) -> the_align::FineDiff {
  smallvec![FineSpan {
    left:  0..left.chars().count() as u32,
    right: 0..right.chars().count() as u32,
  }]
}

fn line_at(text: &SourceText, idx: u32) -> Option<String> {
  (idx < text.line_count()).then(|| text.line_to_string(idx))
}

pub(crate) fn align(sources: &Sources) -> Alignment {
  let a = sources.get(Source::A);
  let b = sources.get(Source::B);
  let c = sources.get(Source::C);
  let count = |t: Option<&SourceText>| t.map_or(0, SourceText::line_count);
  let rows = count(a).max(count(b)).max(count(c));

  let mut lines = Vec::with_capacity(rows as usize);
  for i in 0..rows {
    let ta = a.and_then(|t| line_at(t, i));
    let tb = b.and_then(|t| line_at(t, i));
    let tc = c.and_then(|t| line_at(t, i));

    let mut row = AlignedLine::new();
    if ta.is_some() {
      row = row.with_a(i);
    }
    if tb.is_some() {
      row = row.with_b(i);
    }
    if tc.is_some() {
      row = row.with_c(i);
    }
    row = row.with_equal(
      ta.is_some() && ta == tb,
      ta.is_some() && ta == tc,
      tb.is_some() && tb == tc,
    );
    if let (Some(ta), Some(tb)) = (&ta, &tb)
      && ta != tb
    {
      row = row.with_fine_ab(full_span(ta, tb));
    }
    if let (Some(tb), Some(tc)) = (&tb, &tc)
      && tb != tc
    {
      row = row.with_fine_bc(full_span(tb, tc));
    }
    if let (Some(tc), Some(ta)) = (&tc, &ta)
      && tc != ta
    {
      row = row.with_fine_ca(full_span(tc, ta));
    }
    lines.push(row);
  }

  let mut alignment = Alignment::new(lines);
  alignment.annotate_blank_lines(sources);
  alignment
}

pub(crate) fn doc2(a: &str, b: &str) -> MergeDoc {
  let sources = Arc::new(Sources::two(
    SourceText::from_str(a),
    SourceText::from_str(b),
  ));
  let alignment = Arc::new(align(&sources));
  MergeDoc::new(sources, alignment)
}

pub(crate) fn doc3(a: &str, b: &str, c: &str) -> MergeDoc {
  let sources = Arc::new(Sources::three(
    SourceText::from_str(a),
    SourceText::from_str(b),
    SourceText::from_str(c),
  ));
  let alignment = Arc::new(align(&sources));
  MergeDoc::new(sources, alignment)
}

/// The rendered result lines, conflict placeholders shown as a marker.
pub(crate) fn render(doc: &MergeDoc) -> Vec<String> {
  doc
    .result_lines()
    .map(|mel| {
      mel
        .content(doc.sources(), doc.alignment())
        .unwrap_or_else(|| "<conflict>".to_string())
    })
    .collect()
}
