//! Thaw - selector-driven AST traversal and autofix engine
//!
//! Thaw walks a syntax tree produced by an external parser, dispatches each
//! node to the lint rules whose selectors match it, collects diagnostics and
//! text fixes, and applies non-overlapping fixes in repeated passes until the
//! source stops changing.
//!
//! # Architecture
//!
//! ```text
//! text -> Parser -> Tree -> Traversal(VisitorKeys, HandlerSet) -> Diagnostics
//!   ^                                                                  |
//!   +------------------------- apply_fixes <---------------------------+
//! ```
//!
//! Child order comes from the [`VisitorKeys`] registry, so new node types
//! need a table entry, not traversal code. Rules are registered as
//! [`RuleHandler`]s: a selector such as `ClassBody > MethodDefinition[kind='get']`
//! plus enter and exit callbacks that report through a [`RuleContext`].
//!
//! # Configuration
//!
//! An [`Engine`] is built from a [`Config`], usually loaded from
//! `.thawrc.yaml`:
//!
//! ```yaml
//! engine:
//!   max_passes: 10
//!   timing: true
//!
//! rules:
//!   disabled: ["no-var"]
//!   severity:
//!     no-array-constructor: error
//!
//! visitor_keys:
//!   JSXElement: [openingElement, children, closingElement]
//! ```

pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod estree;
pub mod fixer;
pub mod output;
pub mod parser;
pub mod rule;
pub mod selector;
pub mod source;
pub mod traverse;
pub mod tree;
pub mod visitor_keys;

// Re-export main types
pub use config::{Config, ConfigError, EngineConfig, RulesConfig};
pub use diagnostic::{Diagnostic, Fix, FixRangeError, Severity, TextEdit};
pub use engine::{fix, Engine, FixReport};
pub use error::{Error, Result};
pub use estree::{from_json, OffsetEncoding};
pub use fixer::{apply_fixes, FixConflict, FixOutcome};
pub use output::{DiagnosticRecord, JsonFormatter, Summary};
pub use parser::{ParseError, Parsed, Parser};
pub use rule::{HandlerSet, RuleContext, RuleHandler, Visit, FIX_RANGE_ERROR};
pub use selector::{Selector, SelectorError};
pub use source::{Position, SourceText, Span, TextRange};
pub use traverse::{lint, LintResult, RuleTiming, Traversal};
pub use tree::{Node, NodeId, Tree, TreeBuilder, TreeError, Value};
pub use visitor_keys::{KeyTable, RegistryError, VisitorKeys};
