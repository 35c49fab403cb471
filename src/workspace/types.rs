//! Core types for workspace data structures.
//!
//! This module contains fundamental types used throughout the index:
//! - `MyRange`: A wrapper around LSP Range with additional utilities
//! - `IndexLocation`: A (document, range) pair stored in the global indexes
//! - `Rangeable`: containment checks for anything carrying a range

use std::ops::{Deref, Range};
use std::path::{Path, PathBuf};

use ropey::Rope;
use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Location, Position, Url};

/// A wrapper around `tower_lsp::lsp_types::Range` with additional utilities.
///
/// Provides conversion from byte offsets to LSP positions using rope-based
/// character counting.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct MyRange(pub tower_lsp::lsp_types::Range);

impl MyRange {
    /// Creates a `MyRange` from a byte offset range using rope for position calculation.
    pub fn from_range(rope: &Rope, range: Range<usize>) -> MyRange {
        // convert from byte offset to char offset
        let char_start = rope.byte_to_char(range.start);
        let char_end = rope.byte_to_char(range.end);

        let start_line = rope.char_to_line(char_start);
        let start_offset = char_start - rope.line_to_char(start_line);

        let end_line = rope.char_to_line(char_end);
        let end_offset = char_end - rope.line_to_char(end_line);

        tower_lsp::lsp_types::Range {
            start: Position {
                line: start_line as u32,
                character: start_offset as u32,
            },
            end: Position {
                line: end_line as u32,
                character: end_offset as u32,
            },
        }
        .into()
    }

    /// A range on a single line, in character columns.
    pub fn on_line(line: usize, start: usize, end: usize) -> MyRange {
        tower_lsp::lsp_types::Range {
            start: Position {
                line: line as u32,
                character: start as u32,
            },
            end: Position {
                line: line as u32,
                character: end as u32,
            },
        }
        .into()
    }

    /// Sort key; `lsp_types::Range` itself is not `Ord`.
    pub fn sort_key(&self) -> (u32, u32, u32, u32) {
        (
            self.start.line,
            self.start.character,
            self.end.line,
            self.end.character,
        )
    }
}

impl std::hash::Hash for MyRange {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.start.line.hash(state);
        self.0.start.character.hash(state);
        self.0.end.line.hash(state);
        self.0.end.character.hash(state);
    }
}

impl Deref for MyRange {
    type Target = tower_lsp::lsp_types::Range;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<tower_lsp::lsp_types::Range> for MyRange {
    fn from(range: tower_lsp::lsp_types::Range) -> Self {
        MyRange(range)
    }
}

/// One entry of a global index: the document that contributed it and where.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct IndexLocation {
    pub path: PathBuf,
    pub range: MyRange,
}

impl IndexLocation {
    pub fn new(path: &Path, range: MyRange) -> IndexLocation {
        IndexLocation {
            path: path.to_path_buf(),
            range,
        }
    }

    pub fn to_lsp_location(&self) -> Option<Location> {
        Some(Location {
            uri: Url::from_file_path(&self.path).ok()?,
            range: *self.range,
        })
    }
}

/// Trait for types that have a range (position span in the document).
pub trait Rangeable {
    fn range(&self) -> &MyRange;
    fn includes(&self, other: &impl Rangeable) -> bool {
        let self_range = self.range();
        let other_range = other.range();

        (self_range.start.line < other_range.start.line
            || (self_range.start.line == other_range.start.line
                && self_range.start.character <= other_range.start.character))
            && (self_range.end.line > other_range.end.line
                || (self_range.end.line == other_range.end.line
                    && self_range.end.character >= other_range.end.character))
    }

    fn includes_position(&self, position: Position) -> bool {
        let range = self.range();
        (range.start.line < position.line
            || (range.start.line == position.line && range.start.character <= position.character))
            && (range.end.line > position.line
                || (range.end.line == position.line && range.end.character >= position.character))
    }
}

impl Rangeable for MyRange {
    fn range(&self) -> &MyRange {
        self
    }
}

impl Rangeable for IndexLocation {
    fn range(&self) -> &MyRange {
        &self.range
    }
}
