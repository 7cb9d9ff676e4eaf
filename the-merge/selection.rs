/// Anchor/cursor text selection over the result view. The anchor and
/// cursor may be given in either order; all queries normalize first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
  first_line: Option<u32>,
  last_line:  Option<u32>,
  first_pos:  u32,
  last_pos:   u32,

  old_first_line: Option<u32>,
  old_last_line:  Option<u32>,

  contains_data: bool,
}

impl Selection {
  pub fn new() -> Selection {
    Selection::default()
  }

  pub fn reset(&mut self) {
    self.old_last_line = self.last_line;
    self.old_first_line = self.first_line;
    self.first_line = None;
    self.last_line = None;
    self.contains_data = false;
  }

  pub fn start(&mut self, line: u32, pos: u32) {
    self.first_line = Some(line);
    self.first_pos = pos;
  }

  /// Moves the selection cursor.
  pub fn extend(&mut self, line: u32, pos: u32) {
    if self.old_last_line.is_none() {
      self.old_last_line = self.last_line;
    }
    self.last_line = Some(line);
    self.last_pos = pos;
  }

  pub fn clear_old(&mut self) {
    self.old_first_line = None;
    self.old_last_line = None;
  }

  pub fn old_range(&self) -> (Option<u32>, Option<u32>) {
    (self.old_first_line, self.old_last_line)
  }

  pub fn set_contains_data(&mut self, contains: bool) {
    self.contains_data = contains;
  }

  pub fn contains_data(&self) -> bool {
    self.contains_data
  }

  pub fn is_empty(&self) -> bool {
    self.first_line.is_none()
      || (self.first_line == self.last_line && self.first_pos == self.last_pos)
      || !self.contains_data
  }

  /// Anchor and cursor ordered top-to-bottom.
  fn normalized(&self) -> Option<(u32, u32, u32, u32)> {
    let l1 = self.first_line?;
    let l2 = self.last_line?;
    let (l1, l2, p1, p2) = if l1 > l2 {
      (l2, l1, self.last_pos, self.first_pos)
    } else {
      (l1, l2, self.first_pos, self.last_pos)
    };
    if l1 == l2 && p1 > p2 {
      Some((l1, l2, p2, p1))
    } else {
      Some((l1, l2, p1, p2))
    }
  }

  pub fn within(&self, line: u32, pos: u32) -> bool {
    let Some((l1, l2, p1, p2)) = self.normalized() else {
      return false;
    };
    if line < l1 || line > l2 {
      return false;
    }
    if l1 == l2 {
      return pos >= p1 && pos < p2;
    }
    if line == l1 {
      return pos >= p1;
    }
    if line == l2 {
      return pos < p2;
    }
    true
  }

  pub fn line_within(&self, line: u32) -> bool {
    let (Some(l1), Some(l2)) = (self.first_line, self.last_line) else {
      return false;
    };
    line >= l1.min(l2) && line <= l1.max(l2)
  }

  /// First selected column in `line`; 0 when the selection starts
  /// above it.
  pub fn first_pos_in_line(&self, line: u32) -> u32 {
    match self.normalized() {
      Some((l1, _, p1, _)) if line == l1 => p1,
      _ => 0,
    }
  }

  /// One past the last selected column in `line`; unbounded when the
  /// selection continues below it.
  pub fn last_pos_in_line(&self, line: u32) -> u32 {
    match self.normalized() {
      Some((_, l2, _, p2)) if line == l2 => p2,
      _ => u32::MAX,
    }
  }

  pub fn begin_line(&self) -> Option<u32> {
    if self.first_line.is_none() && self.last_line.is_none() {
      return None;
    }
    Some(
      self
        .first_line
        .unwrap_or(0)
        .min(self.last_line.unwrap_or(0)),
    )
  }

  pub fn end_line(&self) -> Option<u32> {
    if self.first_line.is_none() && self.last_line.is_none() {
      return None;
    }
    Some(
      self
        .first_line
        .unwrap_or(0)
        .max(self.last_line.unwrap_or(0)),
    )
  }
}
