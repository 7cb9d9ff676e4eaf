//! Chunked parallel shaping for the wrap table recompute.

use smallvec::{
  SmallVec,
  smallvec,
};

use super::{
  CancelToken,
  LineShaper,
  WrapSegment,
};
use crate::{
  Alignment,
  Source,
  Sources,
};

pub(super) const LINES_PER_CHUNK: usize = 512;

/// Shapes every alignment row of one source view, one scoped worker
/// per chunk. Returns `None` when the token was cancelled; partial
/// results are discarded.
pub(super) fn shape_chunks(
  alignment: &Alignment,
  sources: &Sources,
  src: Source,
  shaper: &dyn LineShaper,
  width: u16,
  cancel: &CancelToken,
) -> Option<Vec<SmallVec<[WrapSegment; 2]>>> {
  let len = alignment.len() as usize;
  let mut out: Vec<SmallVec<[WrapSegment; 2]>> = vec![SmallVec::new(); len];
  let text = sources.get(src);

  std::thread::scope(|scope| {
    for (chunk_idx, chunk) in out.chunks_mut(LINES_PER_CHUNK).enumerate() {
      let base = chunk_idx * LINES_PER_CHUNK;
      scope.spawn(move || {
        for (i, slot) in chunk.iter_mut().enumerate() {
          if cancel.is_cancelled() {
            return;
          }
          let row = alignment.line((base + i) as u32);
          *slot = match (text, row.line_in(src)) {
            (Some(text), Some(line)) => shaper.shape(text.line(line), width),
            // A row without a line in this view still occupies one
            // empty display line.
            _ => smallvec![WrapSegment { text_offset: 0, text_len: 0 }],
          };
        }
      });
    }
  });

  if cancel.is_cancelled() {
    return None;
  }
  log::trace!(
    "shaped {len} rows in {} chunks at width {width}",
    len.div_ceil(LINES_PER_CHUNK).max(1)
  );
  Some(out)
}
