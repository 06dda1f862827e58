//! Word ranges on a single raw line.

use crate::text::{line_count, line_text};
use crate::types::{Position, Range};

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Clamps `position` to the text and returns it with the characters of its
/// line.
fn clamp(text: &str, position: Position) -> (Position, Vec<char>) {
    let last_line = line_count(text).saturating_sub(1) as u32;
    let line = position.line.min(last_line);
    let chars: Vec<char> = line_text(text, line).unwrap_or_default().chars().collect();
    let character = (position.character as usize).min(chars.len());
    (Position::new(line, character as u32), chars)
}

/// The identifier at `position`.
///
/// Back-tick quoted names are taken whole, including the back-ticks. A
/// position on any other non-word character gives a zero-width range.
pub fn identifier_range(text: &str, position: Position) -> Range {
    let (position, chars) = clamp(text, position);
    let line = position.line;
    let at = position.character as usize;

    let ticks_before = chars[..at].iter().filter(|c| **c == '`').count();
    if ticks_before % 2 == 1 {
        let start = chars[..at].iter().rposition(|c| *c == '`').unwrap_or(0);
        let end = closing_tick(&chars, at);
        return Range::on_line(line, start as u32, end as u32);
    }
    if chars.get(at) == Some(&'`') {
        let end = closing_tick(&chars, at + 1);
        return Range::on_line(line, at as u32, end as u32);
    }

    if !chars.get(at).copied().is_some_and(is_word_char) {
        return Range::point(position);
    }
    let start = chars[..at]
        .iter()
        .rposition(|c| !is_word_char(*c))
        .map_or(0, |idx| idx + 1);
    let end = chars[at..]
        .iter()
        .position(|c| !is_word_char(*c))
        .map_or(chars.len(), |idx| at + idx);
    Range::on_line(line, start as u32, end as u32)
}

/// Exclusive end of the quoted region whose closing back-tick is at or
/// after `from`; the line end when it is unterminated.
fn closing_tick(chars: &[char], from: usize) -> usize {
    chars
        .get(from..)
        .and_then(|rest| rest.iter().position(|c| *c == '`'))
        .map_or(chars.len(), |idx| from + idx + 1)
}

/// The word characters immediately before `position`, used as a completion
/// prefix.
pub fn prefix_range(text: &str, position: Position) -> Range {
    let (position, chars) = clamp(text, position);
    let at = position.character as usize;
    let start = chars[..at]
        .iter()
        .rposition(|c| !is_word_char(*c))
        .map_or(0, |idx| idx + 1);
    Range::on_line(position.line, start as u32, at as u32)
}

/// The function name before the innermost open bracket left of
/// `position`.
///
/// Empty when there is no `(` before the cursor or the last one is already
/// closed.
pub fn text_before_bracket(text: &str, position: Position) -> Range {
    let (position, chars) = clamp(text, position);
    let at = position.character as usize;
    let Some(open) = chars[..at].iter().rposition(|c| *c == '(') else {
        return Range::point(position);
    };
    if chars[open + 1..at].contains(&')') {
        return Range::point(position);
    }
    let start = chars[..open]
        .iter()
        .rposition(|c| *c == ' ')
        .map_or(0, |idx| idx + 1);
    Range::on_line(position.line, start as u32, open as u32)
}

/// Text covered by a single-line range.
pub fn range_text(text: &str, range: Range) -> String {
    let line = line_text(text, range.start.line).unwrap_or_default();
    line.chars()
        .skip(range.start.character as usize)
        .take(range.end.character.saturating_sub(range.start.character) as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SQL: &str = "SELECT id, user_name\nFROM `acme`.`analytics`.`users` u\nWHERE u.id > 0";

    #[rstest]
    #[case::middle_of_word(Position::new(0, 13), Range::on_line(0, 11, 20))]
    #[case::start_of_word(Position::new(0, 7), Range::on_line(0, 7, 9))]
    #[case::on_space(Position::new(0, 6), Range::on_line(0, 6, 6))]
    #[case::on_comma(Position::new(0, 9), Range::on_line(0, 9, 9))]
    #[case::inside_quotes(Position::new(1, 15), Range::on_line(1, 12, 23))]
    #[case::on_opening_tick(Position::new(1, 5), Range::on_line(1, 5, 11))]
    #[case::qualified(Position::new(2, 8), Range::on_line(2, 8, 10))]
    #[case::clamped_line(Position::new(9, 1), Range::on_line(2, 0, 5))]
    #[case::clamped_character(Position::new(0, 99), Range::on_line(0, 20, 20))]
    fn identifier_ranges(#[case] position: Position, #[case] expected: Range) {
        assert_eq!(identifier_range(SQL, position), expected);
    }

    #[test]
    fn identifier_text() {
        let range = identifier_range(SQL, Position::new(1, 15));
        assert_eq!(range_text(SQL, range), "`analytics`");
    }

    #[rstest]
    #[case("SELECT DATE_DIFF(a, ", 20, Range::on_line(0, 7, 16))]
    #[case("SELECT x FROM t WHERE f(", 24, Range::on_line(0, 22, 23))]
    #[case("SELECT f(x) + ", 14, Range::on_line(0, 14, 14))]
    #[case("SELECT x", 8, Range::on_line(0, 8, 8))]
    #[case("COALESCE(", 9, Range::on_line(0, 0, 8))]
    fn bracket_ranges(#[case] line: &str, #[case] character: u32, #[case] expected: Range) {
        assert_eq!(text_before_bracket(line, Position::new(0, character)), expected);
    }

    #[test]
    fn prefix_stops_at_dot() {
        let text = "SELECT u.na";
        let range = prefix_range(text, Position::new(0, 11));
        assert_eq!(range_text(text, range), "na");
    }
}
