//! Immutable document snapshots and position arithmetic.

use crate::types::{Position, TextEdit};
use std::sync::Arc;

/// One version of a document's text.
///
/// Snapshots are never mutated; an accepted edit produces a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    pub uri: String,
    pub version: i32,
    pub content: String,
    pub language_id: String,
}

impl TextSnapshot {
    pub fn new(
        uri: impl Into<String>,
        version: i32,
        content: impl Into<String>,
        language_id: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            uri: uri.into(),
            version,
            content: content.into(),
            language_id: language_id.into(),
        })
    }

    /// The snapshot produced by applying `edits` in order.
    pub fn with_edits(&self, version: i32, edits: &[TextEdit]) -> Arc<Self> {
        self.with_content(version, apply_edits(&self.content, edits))
    }

    pub fn with_content(&self, version: i32, content: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            uri: self.uri.clone(),
            version,
            content: content.into(),
            language_id: self.language_id.clone(),
        })
    }

    pub fn offset_at(&self, position: Position) -> usize {
        offset_at(&self.content, position)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        position_at(&self.content, offset)
    }

    pub fn line(&self, line: u32) -> Option<&str> {
        line_text(&self.content, line)
    }
}

/// Splits text into lines without their terminators.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
}

pub fn line_count(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count() + 1
}

pub fn line_text(text: &str, line: u32) -> Option<&str> {
    split_lines(text).nth(line as usize)
}

/// Byte offset of `position`, clamped to the text.
///
/// A line past the end maps to the end of the text; a character past the end
/// of its line maps to the end of that line.
pub fn offset_at(text: &str, position: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..position.line {
        match text[line_start..].find('\n') {
            Some(idx) => line_start += idx + 1,
            None => return text.len(),
        }
    }

    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |idx| line_start + idx);
    let line = &text[line_start..line_end];
    let line = line.strip_suffix('\r').unwrap_or(line);

    let within = line
        .char_indices()
        .nth(position.character as usize)
        .map_or(line.len(), |(idx, _)| idx);
    line_start + within
}

/// Position of a byte offset, clamped to the text and floored to a char
/// boundary.
pub fn position_at(text: &str, offset: usize) -> Position {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }

    let before = &text[..offset];
    let line = before.bytes().filter(|b| *b == b'\n').count();
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let character = text[line_start..offset].chars().count();
    Position::new(line as u32, character as u32)
}

/// Applies one edit. A rangeless edit replaces everything.
pub fn apply_edit(text: &str, edit: &TextEdit) -> String {
    let Some(range) = edit.range else {
        return edit.text.clone();
    };
    let range = range.collapse_if_inverted();
    let start = offset_at(text, range.start);
    let end = offset_at(text, range.end).max(start);

    let mut out = String::with_capacity(text.len() - (end - start) + edit.text.len());
    out.push_str(&text[..start]);
    out.push_str(&edit.text);
    out.push_str(&text[end..]);
    out
}

/// Applies edits in order, each against the result of the previous one.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let mut current = text.to_string();
    for edit in edits {
        current = apply_edit(&current, edit);
    }
    current
}
