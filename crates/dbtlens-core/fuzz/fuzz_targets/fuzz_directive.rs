//! Fuzz target for the directive scanner.

#![no_main]

use dbtlens_core::{contains_directive_syntax, find_spans};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    let mut previous_end = 0;
    for span in find_spans(text) {
        assert!(span.start >= previous_end);
        assert!(span.start < span.end && span.end <= text.len());
        assert!(text.is_char_boundary(span.start));
        previous_end = span.end;
    }
    if find_spans(text).next().is_some() {
        assert!(contains_directive_syntax(text));
    }
});
