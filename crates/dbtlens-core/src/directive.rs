//! Detection of template directive spans in raw text.
//!
//! Recognised pairs are `{{ … }}`, `{% … %}` and `{# … #}`. An unterminated
//! directive runs to the end of the text.

use crate::types::Span;
use regex::Regex;
use std::sync::OnceLock;

/// Byte range of one directive, delimiters included.
pub type DirectiveSpan = Span;

/// Lazy iterator over the directive spans of a text.
#[derive(Debug, Clone)]
pub struct DirectiveSpans<'a> {
    text: &'a str,
    offset: usize,
}

impl<'a> DirectiveSpans<'a> {
    /// Restarts scanning at byte `offset`.
    pub fn resume(text: &'a str, offset: usize) -> Self {
        Self {
            text,
            offset: offset.min(text.len()),
        }
    }
}

impl Iterator for DirectiveSpans<'_> {
    type Item = DirectiveSpan;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        let mut i = self.offset;
        while i + 1 < bytes.len() {
            if bytes[i] == b'{' {
                if let Some(close) = closing_delimiter(bytes[i + 1]) {
                    let start = i;
                    let end = find_close(bytes, i + 2, close).unwrap_or(bytes.len());
                    self.offset = end;
                    return Some(Span::new(start, end));
                }
            }
            i += 1;
        }
        self.offset = bytes.len();
        None
    }
}

fn closing_delimiter(opener: u8) -> Option<[u8; 2]> {
    match opener {
        b'{' => Some(*b"}}"),
        b'%' => Some(*b"%}"),
        b'#' => Some(*b"#}"),
        _ => None,
    }
}

/// Offset just past the closing delimiter.
fn find_close(bytes: &[u8], from: usize, close: [u8; 2]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(2)
        .position(|w| w == close)
        .map(|pos| from + pos + 2)
}

pub fn find_spans(text: &str) -> DirectiveSpans<'_> {
    DirectiveSpans::resume(text, 0)
}

/// True if `edit` overlaps or abuts any span.
pub fn touches_any_span(spans: impl IntoIterator<Item = DirectiveSpan>, edit: Span) -> bool {
    spans
        .into_iter()
        .take_while(|span| span.start <= edit.end)
        .any(|span| edit.start <= span.end && edit.end >= span.start)
}

/// Fast check for any directive delimiter.
pub fn contains_directive_syntax(text: &str) -> bool {
    static DELIMITER: OnceLock<Regex> = OnceLock::new();
    let re = DELIMITER
        .get_or_init(|| Regex::new(r"\{[{%#]|[}%#]\}").expect("Invalid regex pattern"));
    re.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn finds_each_directive_kind() {
        let text = "{{ a }} x {% if b %} y {# c #}";
        let spans: Vec<_> = find_spans(text).collect();
        assert_eq!(
            spans,
            vec![Span::new(0, 7), Span::new(10, 20), Span::new(23, 30)]
        );
    }

    #[test]
    fn unterminated_directive_runs_to_end() {
        let text = "SELECT {{ ref('a'";
        let spans: Vec<_> = find_spans(text).collect();
        assert_eq!(spans, vec![Span::new(7, text.len())]);
    }

    #[test]
    fn closing_delimiter_must_match_opener() {
        let text = "{% set x = {'k': 1} %} tail";
        let spans: Vec<_> = find_spans(text).collect();
        assert_eq!(spans, vec![Span::new(0, 22)]);
    }

    #[test]
    fn resume_skips_earlier_spans() {
        let text = "{{ a }} {{ b }}";
        let spans: Vec<_> = DirectiveSpans::resume(text, 3).collect();
        assert_eq!(spans, vec![Span::new(8, 15)]);
    }

    #[test]
    fn plain_braces_are_not_directives() {
        assert_eq!(find_spans("SELECT STRUCT({a: 1})").count(), 0);
    }

    #[rstest]
    #[case(Span::new(0, 2), false)]
    #[case(Span::new(7, 7), true)]
    #[case(Span::new(21, 21), true)]
    #[case(Span::new(22, 23), false)]
    #[case(Span::new(10, 12), true)]
    #[case(Span::new(3, 25), true)]
    fn edit_touching_span(#[case] edit: Span, #[case] expected: bool) {
        let text = "SELECT {{ ref('a') }} AS x";
        assert_eq!(find_spans(text).collect::<Vec<_>>(), vec![Span::new(7, 21)]);
        assert_eq!(touches_any_span(find_spans(text), edit), expected);
    }

    #[rstest]
    #[case("{{", true)]
    #[case("x }}", true)]
    #[case("{%- if", true)]
    #[case("#}", true)]
    #[case("%}", true)]
    #[case("{ a }", false)]
    #[case("SELECT 1", false)]
    fn directive_syntax_precheck(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(contains_directive_syntax(text), expected);
    }
}
