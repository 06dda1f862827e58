//! Line-level position mapping between a raw document and its compiled form.
//!
//! Both texts are aligned with a longest-common-subsequence over whole lines.
//! A line that survived compilation unchanged maps to its partner; any other
//! line maps to the partner of the nearest matched line above it, or to line 0
//! when nothing above it matched.
//!
//! Line translation leaves columns alone. [`align_range`] additionally pairs
//! unmatched lines positionally and moves columns across the shared prefix
//! and suffix of the two lines, for edits that must land exactly.

use crate::text::split_lines;
use crate::types::{Position, Range};

/// Above this many DP cells the middle section is left unmatched. Keeps the
/// table around 4 MiB, since it is rebuilt on every mirrored keystroke.
const MAX_LCS_CELLS: usize = 1 << 20;

/// Matched `(from_line, to_line)` pairs between two texts.
///
/// Computed per translation and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCorrespondence {
    pairs: Vec<(usize, usize)>,
    from_lines: usize,
    to_lines: usize,
}

impl LineCorrespondence {
    pub fn compute(from: &str, to: &str) -> Self {
        let a: Vec<&str> = split_lines(from).collect();
        let b: Vec<&str> = split_lines(to).collect();

        let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
        let suffix = a[prefix..]
            .iter()
            .rev()
            .zip(b[prefix..].iter().rev())
            .take_while(|(x, y)| x == y)
            .count();

        let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|i| (i, i)).collect();
        let a_mid = &a[prefix..a.len() - suffix];
        let b_mid = &b[prefix..b.len() - suffix];
        pairs.extend(
            lcs_pairs(a_mid, b_mid)
                .into_iter()
                .map(|(i, j)| (i + prefix, j + prefix)),
        );
        let a_tail = a.len() - suffix;
        let b_tail = b.len() - suffix;
        pairs.extend((0..suffix).map(|k| (a_tail + k, b_tail + k)));

        Self {
            pairs,
            from_lines: a.len(),
            to_lines: b.len(),
        }
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Maps a line of the `from` text, clamping it to the last line first.
    pub fn map_line(&self, line: usize) -> usize {
        let line = line.min(self.from_lines.saturating_sub(1));
        let idx = self.pairs.partition_point(|(from, _)| *from <= line);
        match idx {
            0 => 0,
            _ => self.pairs[idx - 1].1,
        }
    }

    /// The line of `to` that holds the same content as `line`.
    ///
    /// Matched lines map to their partner. An unmatched line sitting in a gap
    /// of equal length on both sides pairs with the line at the same offset
    /// in the other gap. Returns `None` otherwise.
    pub fn counterpart(&self, line: usize) -> Option<usize> {
        if line >= self.from_lines {
            return None;
        }
        let idx = self.pairs.partition_point(|(from, _)| *from < line);
        if let Some(&(from, to)) = self.pairs.get(idx) {
            if from == line {
                return Some(to);
            }
        }
        let (gap_from, gap_to) = match idx {
            0 => (0, 0),
            _ => (self.pairs[idx - 1].0 + 1, self.pairs[idx - 1].1 + 1),
        };
        let (next_from, next_to) = self
            .pairs
            .get(idx)
            .copied()
            .unwrap_or((self.from_lines, self.to_lines));
        (next_from - gap_from == next_to - gap_to).then(|| gap_to + (line - gap_from))
    }
}

fn lcs_pairs(a: &[&str], b: &[&str]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 || n.saturating_mul(m) > MAX_LCS_CELLS {
        return Vec::new();
    }

    // dp[i][j] = LCS length of a[i..] and b[j..]
    let width = m + 1;
    let mut dp = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i * width + j] = if a[i] == b[j] {
                dp[(i + 1) * width + j + 1] + 1
            } else {
                dp[(i + 1) * width + j].max(dp[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(dp[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if dp[(i + 1) * width + j] >= dp[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Translates a line of `from` into the best matching line of `to`.
pub fn translate_line(from: &str, to: &str, line: u32) -> u32 {
    if from.is_empty() || to.is_empty() {
        return 0;
    }
    LineCorrespondence::compute(from, to).map_line(line as usize) as u32
}

/// Translates both ends of a range independently.
///
/// The result may be inverted; callers normalise it with
/// [`Range::collapse_if_inverted`].
pub fn translate_range(from: &str, to: &str, range: Range) -> Range {
    if from.is_empty() || to.is_empty() {
        return Range::new(
            Position::new(0, range.start.character),
            Position::new(0, range.end.character),
        );
    }
    let correspondence = LineCorrespondence::compute(from, to);
    Range::new(
        Position::new(
            correspondence.map_line(range.start.line as usize) as u32,
            range.start.character,
        ),
        Position::new(
            correspondence.map_line(range.end.line as usize) as u32,
            range.end.character,
        ),
    )
}

pub fn translate_position(from: &str, to: &str, position: Position) -> Position {
    Position::new(
        translate_line(from, to, position.line),
        position.character,
    )
}

/// Moves a column from `from_line` onto `to_line`.
///
/// Columns inside the common prefix stay put; columns inside the common
/// suffix shift by the difference in line length. A column in the part
/// where the lines disagree has no counterpart.
pub fn align_column(from_line: &str, to_line: &str, character: u32) -> Option<u32> {
    if from_line == to_line {
        return Some(character);
    }
    let a: Vec<char> = from_line.chars().collect();
    let b: Vec<char> = to_line.chars().collect();
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let column = character as usize;
    if column <= prefix {
        Some(character)
    } else if column >= a.len() - suffix {
        u32::try_from(column + b.len() - a.len()).ok()
    } else {
        None
    }
}

fn align_with(
    correspondence: &LineCorrespondence,
    from_lines: &[&str],
    to_lines: &[&str],
    position: Position,
) -> Option<Position> {
    let line = correspondence.counterpart(position.line as usize)?;
    let from_line = from_lines.get(position.line as usize)?;
    let character = align_column(from_line, to_lines.get(line)?, position.character)?;
    Some(Position::new(u32::try_from(line).ok()?, character))
}

/// Places `position` exactly in `to`, or returns `None` when its line or
/// column has no counterpart there.
pub fn align_position(from: &str, to: &str, position: Position) -> Option<Position> {
    let from_lines: Vec<&str> = split_lines(from).collect();
    let to_lines: Vec<&str> = split_lines(to).collect();
    let correspondence = LineCorrespondence::compute(from, to);
    align_with(&correspondence, &from_lines, &to_lines, position)
}

/// Like [`align_position`] for both ends of a range.
pub fn align_range(from: &str, to: &str, range: Range) -> Option<Range> {
    let from_lines: Vec<&str> = split_lines(from).collect();
    let to_lines: Vec<&str> = split_lines(to).collect();
    let correspondence = LineCorrespondence::compute(from, to);
    Some(Range::new(
        align_with(&correspondence, &from_lines, &to_lines, range.start)?,
        align_with(&correspondence, &from_lines, &to_lines, range.end)?,
    ))
}

/// Best-effort cursor translation: exact when the position can be aligned,
/// line-mapped with the column unchanged otherwise.
pub fn locate_position(from: &str, to: &str, position: Position) -> Position {
    align_position(from, to, position).unwrap_or_else(|| translate_position(from, to, position))
}
