//! Version-control history ("$Log$") auto-merge.
//!
//! A history region is a comment block every source starts with the
//! same keyword line. Entries from all sources are collected per key,
//! deduplicated, optionally sorted by a configurable key, and spliced
//! back as a single resolved block.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;
use the_align::{
  Alignment,
  Source,
  Sources,
};

use crate::{
  automerge::exact,
  block::EditLine,
  doc::{
    ChangeKind,
    MergeDoc,
  },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryOptions {
  /// Full-line pattern marking the start of the history region.
  pub start_pattern:       String,
  /// Full-line pattern (after the lead is stripped) starting one
  /// entry. Empty means "a non-blank line after a blank one".
  pub entry_start_pattern: String,
  /// Comma-separated capture-group order for the sort key.
  pub sort_key_order:      String,
  /// Keep at most this many entries. `None` keeps all and preserves
  /// the leading entries that are already in the right place.
  pub max_entries:         Option<usize>,
  pub sort:                bool,
}

impl Default for HistoryOptions {
  fn default() -> HistoryOptions {
    HistoryOptions {
      start_pattern:       r".*\$Log.*\$.*".to_string(),
      entry_start_pattern: String::new(),
      sort_key_order:      String::new(),
      max_entries:         None,
      sort:                false,
    }
  }
}

/// The start of the line up to the first whitespace after the first
/// non-whitespace char. This prefix is shared by every line of a
/// well-formed history comment.
pub(crate) fn history_lead(s: &str) -> String {
  let Some(start) = s.find(|c: char| !c.is_whitespace()) else {
    return String::new();
  };
  match s[start..].find(char::is_whitespace) {
    Some(i) => s[..start + i].to_string(),
    None => s.to_string(),
  }
}

fn strip_lead(line: &str, lead: &str) -> String {
  line.chars().skip(lead.chars().count()).collect()
}

fn text_at(sources: &Sources, alignment: &Alignment, src: Source, idx: u32) -> String {
  alignment.text_for(sources, src, idx).unwrap_or_default()
}

/// Rows of the history region, begin inclusive to end exclusive. The
/// first row is the keyword marker itself.
pub(crate) fn find_history_range(
  alignment: &Alignment,
  sources: &Sources,
  start_re: &Regex,
) -> Option<(u32, u32)> {
  let triple = sources.is_triple();
  let begin = (0..alignment.len()).find(|&idx| {
    start_re.is_match(&text_at(sources, alignment, Source::A, idx))
      && start_re.is_match(&text_at(sources, alignment, Source::B, idx))
      && (!triple || start_re.is_match(&text_at(sources, alignment, Source::C, idx)))
  })?;

  let lead = history_lead(&text_at(sources, alignment, Source::A, begin));
  let mut end = begin;
  while end < alignment.len() {
    let same_lead = |src| {
      let s = text_at(sources, alignment, src, end);
      s.is_empty() || lead == history_lead(&s)
    };
    if !(same_lead(Source::A)
      && same_lead(Source::B)
      && (!triple || same_lead(Source::C)))
    {
      break;
    }
    end += 1;
  }
  Some((begin, end))
}

/// Top-level parentheses groups of a pattern, in closing order.
/// `None` when the parentheses don't balance.
pub(crate) fn parentheses_groups(pattern: &str) -> Option<Vec<String>> {
  let chars: Vec<char> = pattern.chars().collect();
  let mut groups = Vec::new();
  let mut stack: Vec<usize> = Vec::new();
  let mut i = 0;
  while i < chars.len() {
    if chars[i] == '\\' && i + 1 < chars.len() && matches!(chars[i + 1], '\\' | '(' | ')') {
      i += 2;
      continue;
    }
    if chars[i] == '(' {
      stack.push(i);
    } else if chars[i] == ')' {
      let start = stack.pop()?;
      groups.push(chars[start + 1..i].iter().collect());
    }
    i += 1;
  }
  stack.is_empty().then_some(groups)
}

/// Builds the sort key for one matched entry-start line. Numeric
/// groups are zero-padded to four digits so they sort correctly as
/// text; pure-alternation groups ("Jan|Feb|...") contribute their
/// two-digit alternative index.
pub(crate) fn history_sort_key(
  key_order: &str,
  caps: &regex::Captures<'_>,
  groups: &[String],
) -> String {
  let mut key = String::new();
  for part in key_order.split(',') {
    if part.is_empty() {
      continue;
    }
    let Ok(group_idx) = part.parse::<usize>() else {
      continue;
    };
    if group_idx > groups.len() {
      continue;
    }
    let s = caps.get(group_idx).map_or("", |m| m.as_str());
    if group_idx == 0 {
      key.push_str(s);
      key.push(' ');
      continue;
    }

    let group = &groups[group_idx - 1];
    if !group.contains('|') || group.contains('(') {
      match s.parse::<u32>() {
        Ok(n) if n < 10000 => key.push_str(&format!("{n:04}")),
        _ => key.push_str(s),
      }
      key.push(' ');
    } else if let Some(pos) = group.split('|').position(|alt| alt == s) {
      key.push_str(&format!("{:02} ", pos + 1));
    }
  }
  key
}

#[derive(Debug, Default)]
struct HistoryEntry {
  a: Vec<EditLine>,
  b: Vec<EditLine>,
  c: Vec<EditLine>,
}

fn first_row(list: &[EditLine]) -> Option<u32> {
  list.first().and_then(EditLine::line)
}

fn last_row(list: &[EditLine]) -> Option<u32> {
  list.last().and_then(EditLine::line)
}

impl HistoryEntry {
  fn list_mut(&mut self, src: Source) -> &mut Vec<EditLine> {
    match src {
      Source::A => &mut self.a,
      Source::B => &mut self.b,
      Source::C => &mut self.c,
    }
  }

  /// Which source's lines to keep for this entry.
  fn choice(&self, triple: bool) -> &[EditLine] {
    if !triple {
      if self.a.is_empty() { &self.b } else { &self.a }
    } else if self.a.is_empty() {
      // A doesn't have it, prefer the later source.
      if self.c.is_empty() { &self.b } else { &self.c }
    } else if !self.b.is_empty() && !self.c.is_empty() {
      self.a.as_slice()
    } else if self.b.is_empty() {
      &self.b
    } else {
      &self.c
    }
  }

  /// True when every source agrees on this entry's rows and it ends
  /// exactly at the current region end; the region shrinks past it.
  fn stays_in_place(&self, triple: bool, end: &mut u32) -> bool {
    if *end == 0 {
      return false;
    }
    let last = *end - 1;
    let aligned = first_row(&self.a).is_some()
      && first_row(&self.a) == first_row(&self.b)
      && (!triple || first_row(&self.a) == first_row(&self.c))
      && last_row(&self.a) == Some(last)
      && last_row(&self.b) == Some(last)
      && (!triple || last_row(&self.c) == Some(last));
    if aligned && let Some(row) = first_row(&self.a) {
      *end = row;
      return true;
    }
    false
  }
}

struct HistoryPatterns<'a> {
  start_re:       Regex,
  entry_re:       Option<Regex>,
  sort_key_order: &'a str,
  groups:         Vec<String>,
}

#[allow(clippy::too_many_arguments)]
fn collect_history(
  sources: &Sources,
  alignment: &Alignment,
  src: Source,
  begin: u32,
  end: u32,
  patterns: &HistoryPatterns<'_>,
  map: &mut BTreeMap<String, HistoryEntry>,
  hit_order: &mut Vec<String>,
) {
  let mut new_keys: Vec<String> = Vec::new();
  let mut flush = |key: &str, list: &mut Vec<EditLine>, map: &mut BTreeMap<String, HistoryEntry>| {
    let is_new = !map.contains_key(key);
    let entry = map.entry(key.to_string()).or_default();
    *entry.list_mut(src) = std::mem::take(list);
    if is_new {
      new_keys.push(key.to_string());
    }
  };

  let mut lead = history_lead(&text_at(sources, alignment, src, begin));
  if begin == end {
    return;
  }

  let mut key = String::new();
  let mut list: Vec<EditLine> = Vec::new();
  let mut prev_line_empty = true;

  // Skip the marker line itself.
  for idx in begin + 1..end {
    if alignment.line(idx).line_in(src).is_none() {
      continue;
    }
    let ori = text_at(sources, alignment, src, idx);
    if lead.is_empty() {
      lead = history_lead(&ori);
    }
    let s_line = strip_lead(&ori, &lead);

    let entry_start = match &patterns.entry_re {
      None => !s_line.trim().is_empty() && prev_line_empty,
      Some(re) => re.is_match(&s_line),
    };
    if entry_start {
      if !key.is_empty() && !list.is_empty() {
        flush(&key, &mut list, map);
      }
      key = match &patterns.entry_re {
        None => s_line.clone(),
        Some(re) => re
          .captures(&s_line)
          .map(|caps| history_sort_key(patterns.sort_key_order, &caps, &patterns.groups))
          .unwrap_or_default(),
      };
      list = vec![EditLine::bound(idx, src)];
    } else if !patterns.start_re.is_match(&ori) {
      list.push(EditLine::bound(idx, src));
    }

    prev_line_empty = s_line.trim().is_empty();
  }
  if !key.is_empty() {
    flush(&key, &mut list, map);
  }

  // Keys first seen in this pass go in front of everything collected
  // by earlier passes.
  hit_order.splice(0..0, new_keys);
}

impl MergeDoc {
  /// Runs the history auto-merge. Absent or malformed markers and an
  /// invalid entry pattern make this a no-op.
  pub fn merge_history(&mut self, opts: &HistoryOptions) {
    let Ok(start_re) = exact(&opts.start_pattern) else {
      log::debug!("invalid history start pattern, skipping history merge");
      return;
    };
    let entry_re = if opts.entry_start_pattern.is_empty() {
      None
    } else {
      match exact(&opts.entry_start_pattern) {
        Ok(re) => Some(re),
        Err(err) => {
          log::debug!("invalid history entry pattern, skipping history merge: {err}");
          return;
        }
      }
    };
    let patterns = HistoryPatterns {
      start_re,
      entry_re,
      sort_key_order: &opts.sort_key_order,
      groups: parentheses_groups(&opts.entry_start_pattern).unwrap_or_default(),
    };

    let triple = self.sources.is_triple();
    let Some((begin, mut end)) =
      find_history_range(&self.alignment, &self.sources, &patterns.start_re)
    else {
      log::debug!("no history region found");
      return;
    };
    log::debug!("history region covers rows {begin}..{end}");

    let mut map: BTreeMap<String, HistoryEntry> = BTreeMap::new();
    let mut hit_order: Vec<String> = Vec::new();
    collect_history(&self.sources, &self.alignment, Source::A, begin, end, &patterns, &mut map, &mut hit_order);
    collect_history(&self.sources, &self.alignment, Source::B, begin, end, &patterns, &mut map, &mut hit_order);
    if triple {
      collect_history(&self.sources, &self.alignment, Source::C, begin, end, &patterns, &mut map, &mut hit_order);
    }

    let sorting =
      opts.sort && !opts.sort_key_order.is_empty() && !opts.entry_start_pattern.is_empty();

    if opts.max_entries.is_none() {
      // Entries already in their final position need no rewrite; the
      // region shrinks past them from the bottom up.
      if sorting {
        while let Some((key, entry)) = map.first_key_value() {
          if entry.stays_in_place(triple, &mut end) {
            let key = key.clone();
            map.remove(&key);
          } else {
            break;
          }
        }
      } else {
        while let Some(key) = hit_order.last() {
          match map.get(key) {
            Some(entry) if entry.stays_in_place(triple, &mut end) => {
              hit_order.pop();
            }
            _ => break,
          }
        }
      }
    }

    // Collapse the whole region into one block.
    let start_block = self.split_at_inner(begin);
    let end_block = self.split_at_inner(end);
    for _ in 0..end_block.saturating_sub(start_block + 1) {
      if start_block + 1 >= self.blocks.len() {
        break;
      }
      let next = self.blocks.remove(start_block + 1);
      self.blocks[start_block].join(next);
    }
    if start_block >= self.blocks.len() {
      return;
    }

    let lead = history_lead(&text_at(&self.sources, &self.alignment, Source::A, begin));
    let cap = opts.max_entries.unwrap_or(usize::MAX);
    {
      let block = &mut self.blocks[start_block];
      block.edits.clear();
      // The keyword line itself, frozen to the last source, followed
      // by a bare lead line as spacer.
      block
        .edits
        .push(EditLine::bound(begin, if triple { Source::C } else { Source::B }));
      block.edits.push(EditLine::literal(lead.clone()));

      let mut count = 0usize;
      if sorting {
        // Descending key order puts the newest entry first.
        for entry in map.values().rev() {
          if count == cap {
            break;
          }
          count += 1;
          let chosen = entry.choice(triple);
          block.edits.extend_from_slice(chosen);
        }
      } else {
        for key in &hit_order {
          if count == cap {
            break;
          }
          let Some(entry) = map.get(key) else { continue };
          count += 1;
          let chosen = entry.choice(triple);
          if !chosen.is_empty() {
            block.edits.extend_from_slice(chosen);
          }
        }
      }
      block.refresh_conflict();
    }

    if !sorting {
      // When the spliced history ends blank and the following block
      // starts blank too, drop the duplicate spacer.
      let trailing_blank = |mel: &EditLine| {
        let s = mel
          .content(&self.sources, &self.alignment)
          .unwrap_or_default();
        strip_lead(&s, &lead).trim().is_empty()
      };
      let start_ends_blank = self.blocks[start_block].edits.last().is_some_and(trailing_blank);
      let end_starts_blank = self
        .blocks
        .get(start_block + 1)
        .and_then(|b| b.edits.first())
        .is_some_and(trailing_blank);
      if start_ends_blank && end_starts_blank {
        self.blocks[start_block].edits.pop();
      }
    }

    self.current = start_block;
    self.recount();
    self.emit(ChangeKind::HistoryMerge);
  }
}
