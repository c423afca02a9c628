//! Contract with the external source parser

use crate::tree::{Tree, TreeError};
use crate::visitor_keys::KeyTable;
use thiserror::Error;

/// Error reported by the external parser; surfaced verbatim
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("invalid tree: {0}")]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ParseError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Wrap any parser-specific error
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ParseError::Other(err.into())
    }
}

/// A parsed tree plus the visitor key extensions the parser needs
#[derive(Debug, Clone)]
pub struct Parsed {
    pub tree: Tree,
    /// Entries replacing the default keys for node types this parser emits
    pub visitor_keys: KeyTable,
}

impl Parsed {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            visitor_keys: KeyTable::new(),
        }
    }

    pub fn with_visitor_keys(mut self, visitor_keys: KeyTable) -> Self {
        self.visitor_keys = visitor_keys;
        self
    }
}

impl From<Tree> for Parsed {
    fn from(tree: Tree) -> Self {
        Self::new(tree)
    }
}

/// Turns source text into a [`Tree`].
///
/// Must be deterministic, and node ranges must be UTF-8 byte offsets into
/// the text it was given.
pub trait Parser {
    fn parse(&self, text: &str) -> Result<Parsed, ParseError>;
}

impl<F> Parser for F
where
    F: Fn(&str) -> Result<Parsed, ParseError>,
{
    fn parse(&self, text: &str) -> Result<Parsed, ParseError> {
        self(text)
    }
}
