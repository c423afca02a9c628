//! Node selectors
//!
//! A selector describes which nodes a rule handler wants to observe:
//!
//! ```text
//! NewExpression                          type test
//! TSInterfaceBody, TSTypeLiteral         alternation
//! ClassBody > MethodDefinition           immediate-parent combinator
//! MethodDefinition[key.name='new']       attribute predicate
//! CallExpression[arguments.length>2]     numeric comparison on a sequence length
//! Identifier[name=/^_/]                  regex match
//! ```
//!
//! Selectors are compiled once, at rule registration, into a [`Matcher`]
//! tree. Matching is pure: it reads the node and the ancestor stack and
//! never mutates either.

mod parser;

use crate::tree::{Node, NodeId, Value};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Category of selector syntax error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorErrorKind {
    /// `[` without `]`, or a stray `]`
    UnbalancedBracket,
    /// Attribute operator outside `= != > < >= <=`
    UnknownOperator,
    /// Empty selector, or an empty side of `,` or `>`
    EmptyAlternative,
    /// Malformed literal, regex or path
    InvalidValue,
    /// Any other unexpected character
    Unexpected,
}

/// Malformed selector text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid selector `{selector}` at offset {offset}: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub offset: usize,
    pub kind: SelectorErrorKind,
    pub message: String,
}

/// Comparison operator in an attribute predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        };
        f.write_str(op)
    }
}

/// Literal on the right-hand side of an attribute predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

/// What an attribute predicate checks once its path resolves
#[derive(Debug, Clone)]
pub enum AttributeTest {
    /// `[path]`: the path resolves to a non-null value
    Exists,
    /// `[path op literal]`
    Compare(CompareOp, Literal),
    /// `[path=/re/]` or `[path!=/re/]`
    Regex { negated: bool, regex: Regex },
}

/// Dotted field path plus a test, e.g. `key.name='new'`
#[derive(Debug, Clone)]
pub struct AttributePredicate {
    pub path: Vec<String>,
    pub test: AttributeTest,
}

/// Compiled selector tree
#[derive(Debug, Clone)]
pub enum Matcher {
    /// `*`
    Any,
    /// Node type is one of the listed types
    Type(BTreeSet<String>),
    Attribute(AttributePredicate),
    /// Every part matches the same node (`Type[a][b]`)
    Compound(Vec<Matcher>),
    /// `parent > child`
    Child {
        parent: Box<Matcher>,
        child: Box<Matcher>,
    },
    /// `a, b`: any alternative matches
    Alternation(Vec<Matcher>),
}

/// A compiled, immutable selector
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    matcher: Matcher,
}

impl Selector {
    /// Compile selector text
    pub fn compile(text: &str) -> Result<Self, SelectorError> {
        let matcher = parser::parse(text)?;
        Ok(Self {
            source: text.to_string(),
            matcher,
        })
    }

    /// Selector text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Match `node` given its ancestors (outermost first, nearest last)
    pub fn matches(&self, node: Node<'_>, ancestors: &[NodeId]) -> bool {
        self.matcher.matches(node, ancestors)
    }

    /// Node types this selector can possibly match, or `None` if unrestricted
    pub fn node_types(&self) -> Option<BTreeSet<&str>> {
        self.matcher.node_types()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl Matcher {
    pub fn matches(&self, node: Node<'_>, ancestors: &[NodeId]) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Type(types) => types.contains(node.kind()),
            Matcher::Attribute(predicate) => predicate.matches(node),
            Matcher::Compound(parts) => parts.iter().all(|m| m.matches(node, ancestors)),
            Matcher::Child { parent, child } => {
                if !child.matches(node, ancestors) {
                    return false;
                }
                match ancestors.split_last() {
                    Some((nearest, rest)) => parent.matches(node.tree().node(*nearest), rest),
                    None => false,
                }
            }
            Matcher::Alternation(alts) => alts.iter().any(|m| m.matches(node, ancestors)),
        }
    }

    /// Types of the rightmost node this matcher can accept
    pub fn node_types(&self) -> Option<BTreeSet<&str>> {
        match self {
            Matcher::Any | Matcher::Attribute(_) => None,
            Matcher::Type(types) => Some(types.iter().map(String::as_str).collect()),
            Matcher::Compound(parts) => parts
                .iter()
                .filter_map(Matcher::node_types)
                .reduce(|a, b| a.intersection(&b).copied().collect()),
            Matcher::Child { child, .. } => child.node_types(),
            Matcher::Alternation(alts) => {
                let mut all = BTreeSet::new();
                for alt in alts {
                    all.extend(alt.node_types()?);
                }
                Some(all)
            }
        }
    }
}

/// Result of walking a dotted path from a node
enum Resolved<'t> {
    Node(Node<'t>),
    Value(&'t Value),
    Str(&'t str),
    Length(usize),
}

impl AttributePredicate {
    pub fn matches(&self, node: Node<'_>) -> bool {
        let Some(resolved) = resolve(node, &self.path) else {
            return false;
        };

        match &self.test {
            AttributeTest::Exists => !matches!(resolved, Resolved::Value(Value::Null)),
            AttributeTest::Regex { negated, regex } => match as_str(&resolved) {
                Some(s) => regex.is_match(s) != *negated,
                None => false,
            },
            AttributeTest::Compare(op, literal) => compare(&resolved, *op, literal),
        }
    }
}

/// Walk `path` from `node`. A missing intermediate field yields `None`.
fn resolve<'t>(node: Node<'t>, path: &[String]) -> Option<Resolved<'t>> {
    let mut current = Resolved::Node(node);

    for segment in path {
        current = match current {
            Resolved::Node(n) => match n.field(segment) {
                Some(Value::Node(id)) => Resolved::Node(n.tree().node(*id)),
                Some(value) => Resolved::Value(value),
                None if segment == "type" => Resolved::Str(n.kind()),
                None => return None,
            },
            Resolved::Value(Value::List(items)) => {
                if segment == "length" {
                    Resolved::Length(items.len())
                } else {
                    let idx: usize = segment.parse().ok()?;
                    match items.get(idx)? {
                        Value::Node(id) => Resolved::Node(node.tree().node(*id)),
                        value => Resolved::Value(value),
                    }
                }
            }
            Resolved::Value(Value::String(s)) if segment == "length" => {
                Resolved::Length(s.chars().count())
            }
            Resolved::Str(s) if segment == "length" => Resolved::Length(s.chars().count()),
            _ => return None,
        };
    }

    Some(current)
}

fn as_str<'a>(resolved: &'a Resolved<'_>) -> Option<&'a str> {
    match resolved {
        Resolved::Value(Value::String(s)) => Some(s.as_str()),
        Resolved::Str(s) => Some(*s),
        _ => None,
    }
}

fn as_number(resolved: &Resolved<'_>) -> Option<f64> {
    match resolved {
        Resolved::Value(Value::Number(n)) => Some(*n),
        Resolved::Length(len) => Some(*len as f64),
        _ => None,
    }
}

fn equals(resolved: &Resolved<'_>, literal: &Literal) -> bool {
    match literal {
        Literal::String(expected) => as_str(resolved) == Some(expected.as_str()),
        Literal::Number(expected) => as_number(resolved) == Some(*expected),
        Literal::Bool(expected) => matches!(resolved, Resolved::Value(Value::Bool(b)) if b == expected),
        Literal::Null => matches!(resolved, Resolved::Value(Value::Null)),
    }
}

fn compare(resolved: &Resolved<'_>, op: CompareOp, literal: &Literal) -> bool {
    match op {
        CompareOp::Eq => equals(resolved, literal),
        CompareOp::Ne => !equals(resolved, literal),
        CompareOp::Gt | CompareOp::Lt | CompareOp::Ge | CompareOp::Le => {
            let (Some(value), Literal::Number(expected)) = (as_number(resolved), literal) else {
                return false;
            };
            match op {
                CompareOp::Gt => value > *expected,
                CompareOp::Lt => value < *expected,
                CompareOp::Ge => value >= *expected,
                _ => value <= *expected,
            }
        }
    }
}
