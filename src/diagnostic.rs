//! Diagnostic and fix types produced by rule handlers

use crate::source::{SourceText, Span, TextRange};
use crate::tree::{Node, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity level for diagnostics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Invalid edit range inside a [`Fix`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FixRangeError {
    #[error("edit range {0} is inverted")]
    Inverted(TextRange),

    #[error("edit range {range} is outside the source (length {len})")]
    OutOfBounds { range: TextRange, len: usize },

    #[error("edit range {0} does not fall on character boundaries")]
    NotCharBoundary(TextRange),

    #[error("edits {first} and {second} overlap")]
    Overlap { first: TextRange, second: TextRange },
}

/// Replace the bytes in `range` with `replacement`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: TextRange,
    pub replacement: String,
}

impl TextEdit {
    pub fn new(range: TextRange, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn replace(target: impl Into<TextRange>, text: impl Into<String>) -> Self {
        Self::new(target.into(), text)
    }

    pub fn insert_before(target: impl Into<TextRange>, text: impl Into<String>) -> Self {
        Self::new(TextRange::empty(target.into().start), text)
    }

    pub fn insert_after(target: impl Into<TextRange>, text: impl Into<String>) -> Self {
        Self::new(TextRange::empty(target.into().end), text)
    }

    pub fn remove(target: impl Into<TextRange>) -> Self {
        Self::new(target.into(), String::new())
    }

    /// Check if this edit only inserts text
    pub fn is_insertion(&self) -> bool {
        self.range.is_empty()
    }
}

impl From<Node<'_>> for TextRange {
    fn from(node: Node<'_>) -> Self {
        node.range()
    }
}

impl From<&Node<'_>> for TextRange {
    fn from(node: &Node<'_>) -> Self {
        node.range()
    }
}

/// An ordered set of non-overlapping edits applied atomically
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fix {
    edits: Vec<TextEdit>,
}

impl Fix {
    /// Build a fix from edits given in any order.
    ///
    /// Edits are sorted by `(start, end)`; an insertion at the start of a
    /// replaced range sorts before it and does not overlap it.
    pub fn new(edits: impl IntoIterator<Item = TextEdit>) -> Result<Self, FixRangeError> {
        let mut edits: Vec<TextEdit> = edits.into_iter().collect();
        if let Some(bad) = edits.iter().find(|e| !e.range.is_ordered()) {
            return Err(FixRangeError::Inverted(bad.range));
        }
        edits.sort_by_key(|e| (e.range.start, e.range.end));
        for pair in edits.windows(2) {
            if pair[1].range.start < pair[0].range.end {
                return Err(FixRangeError::Overlap {
                    first: pair[0].range,
                    second: pair[1].range,
                });
            }
        }
        Ok(Self { edits })
    }

    /// Build a fix holding one edit
    pub fn single(edit: TextEdit) -> Result<Self, FixRangeError> {
        Self::new([edit])
    }

    /// Check every edit against the buffer it will be applied to
    pub fn validate(&self, source: &SourceText) -> Result<(), FixRangeError> {
        for edit in &self.edits {
            if edit.range.end > source.len() {
                return Err(FixRangeError::OutOfBounds {
                    range: edit.range,
                    len: source.len(),
                });
            }
            if !source.is_valid_range(edit.range) {
                return Err(FixRangeError::NotCharBoundary(edit.range));
            }
        }
        Ok(())
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Smallest range covering every edit
    pub fn range(&self) -> Option<TextRange> {
        let first = self.edits.first()?;
        let end = self.edits.iter().map(|e| e.range.end).max()?;
        Some(TextRange::new(first.range.start, end))
    }
}

/// A lint diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Rule ID that triggered this diagnostic
    pub rule_id: String,
    /// Severity level
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Byte range the diagnostic points at
    pub range: TextRange,
    /// Line/column span of `range`
    pub span: Span,
    /// Node the diagnostic was reported on, if any
    pub node: Option<NodeId>,
    /// Suggested fix
    pub fix: Option<Fix>,
    /// Set once the fix has been applied to the source
    pub fix_applied: bool,
}

impl Diagnostic {
    /// Create a diagnostic for an explicit range
    pub fn new(
        rule_id: &str,
        severity: Severity,
        message: &str,
        range: TextRange,
        source: &SourceText,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.to_string(),
            range,
            span: source.span(range),
            node: None,
            fix: None,
            fix_applied: false,
        }
    }

    /// Create a diagnostic covering `node`
    pub fn at_node(rule_id: &str, severity: Severity, message: &str, node: Node<'_>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.to_string(),
            range: node.range(),
            span: node.span(),
            node: Some(node.id()),
            fix: None,
            fix_applied: false,
        }
    }

    /// Attach a fix
    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Check if this diagnostic has a fix
    pub fn has_fix(&self) -> bool {
        self.fix.is_some()
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Start line (1-based)
    pub fn line(&self) -> usize {
        self.span.start.line
    }

    /// Start column (1-based)
    pub fn column(&self) -> usize {
        self.span.start.column
    }
}
