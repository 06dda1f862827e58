//! Fuzz target for raw/compiled line translation.
//!
//! Translated lines must always land inside the target text.

#![no_main]

use arbitrary::Arbitrary;
use dbtlens_core::{translate_line, translate_range, Position, Range};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    from: String,
    to: String,
    line: u16,
    character: u16,
}

fuzz_target!(|input: FuzzInput| {
    let lines = input.to.split('\n').count() as u32;
    let mapped = translate_line(&input.from, &input.to, u32::from(input.line));
    assert!(mapped < lines.max(1));

    let position = Position::new(u32::from(input.line), u32::from(input.character));
    let range = translate_range(&input.from, &input.to, Range::point(position));
    assert_eq!(range.start, range.end);
    assert_eq!(range.start.character, position.character);
});
