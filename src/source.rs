//! Source buffers, byte ranges and line/column positions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A half-open byte range `[start, end)` into a source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width range at `offset`
    pub fn empty(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check that `start <= end`
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    /// Check if `other` lies entirely inside this range
    pub fn contains_range(&self, other: TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<Range<usize>> for TextRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Line/column position (both 1-based, column counted in characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

/// Start and end position of a node or diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Bytes per entry of the char-count index
const CHAR_BLOCK: usize = 64;

/// Immutable source buffer for one pass.
///
/// Cloning is cheap: the text and its line index are shared. A pass that
/// applies fixes produces a new `SourceText` rather than editing this one.
#[derive(Clone)]
pub struct SourceText {
    text: Arc<str>,
    line_starts: Arc<[usize]>,
    /// Chars before each `CHAR_BLOCK` boundary
    char_blocks: Arc<[usize]>,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        let line_starts = compute_line_starts(&text);
        let char_blocks = compute_char_blocks(&text);
        Self {
            text: Arc::from(text),
            line_starts: Arc::from(line_starts),
            char_blocks: Arc::from(char_blocks),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Slice the buffer, returning `None` for out-of-bounds or non-boundary ranges
    pub fn slice(&self, range: TextRange) -> Option<&str> {
        if !range.is_ordered() {
            return None;
        }
        self.text.get(range.start..range.end)
    }

    /// Check that `range` is ordered, in bounds and on char boundaries
    pub fn is_valid_range(&self, range: TextRange) -> bool {
        self.slice(range).is_some()
    }

    /// Convert a byte offset into a line/column position.
    ///
    /// Offsets past the end clamp to the end of the buffer; offsets inside a
    /// multi-byte character resolve to that character's column.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx];
        let mut boundary = offset;
        while !self.text.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let column = self.chars_before(boundary) - self.chars_before(line_start);
        Position::new(line_idx + 1, column + 1)
    }

    /// Number of chars in `text[..offset]`; `offset` must be a char boundary
    fn chars_before(&self, offset: usize) -> usize {
        let block = offset / CHAR_BLOCK;
        let tail = &self.text.as_bytes()[block * CHAR_BLOCK..offset];
        self.char_blocks[block] + tail.iter().filter(|&&b| !is_continuation(b)).count()
    }

    pub fn span(&self, range: TextRange) -> Span {
        Span {
            start: self.position(range.start),
            end: self.position(range.end),
        }
    }

    /// Get source line by number (1-based), without its terminator
    pub fn line(&self, line: usize) -> Option<&str> {
        if line == 0 || line > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }
}

impl fmt::Debug for SourceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceText")
            .field("len", &self.text.len())
            .field("lines", &self.line_starts.len())
            .finish()
    }
}

impl fmt::Display for SourceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for SourceText {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for SourceText {}

impl From<&str> for SourceText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SourceText {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Byte offsets where each line begins. `\r\n`, `\n` and a lone `\r` end a line.
fn compute_line_starts(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut starts = vec![0];
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => starts.push(i + 1),
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                starts.push(i + 1);
            }
            _ => {}
        }
        i += 1;
    }
    starts
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Running char count at every `CHAR_BLOCK` byte offset, including `len`
fn compute_char_blocks(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::with_capacity(bytes.len() / CHAR_BLOCK + 1);
    let mut count = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i % CHAR_BLOCK == 0 {
            blocks.push(count);
        }
        if !is_continuation(byte) {
            count += 1;
        }
    }
    if bytes.len() % CHAR_BLOCK == 0 {
        blocks.push(count);
    }
    blocks
}
