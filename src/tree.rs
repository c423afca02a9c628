//! Node arena for parsed syntax trees
//!
//! A [`Tree`] owns every node of one parse plus the [`SourceText`] it was
//! parsed from. Nodes are addressed by [`NodeId`]; a node's parent link is an
//! id lookup into the same arena, never an owning pointer. Rule handlers see
//! nodes through the borrowed [`Node`] view.

use crate::source::{SourceText, Span, TextRange};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error raised when a parser hands over an inconsistent tree
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("{kind} node has inverted range {range}")]
    InvertedRange { kind: String, range: TextRange },

    #[error("{kind} node range {range} exceeds source length {len}")]
    OutOfBounds {
        kind: String,
        range: TextRange,
        len: usize,
    },

    #[error("child {child_kind} {child} is not contained in parent {parent_kind} {parent}")]
    ChildOutsideParent {
        parent_kind: String,
        parent: TextRange,
        child_kind: String,
        child: TextRange,
    },

    #[error("node {0} is attached to more than one parent")]
    AlreadyAttached(NodeId),

    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("invalid tree: {0}")]
    Invalid(String),
}

/// Index of a node inside its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value held in a node field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Node(NodeId),
    List(Vec<Value>),
}

impl Value {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Node ids held directly by this value (one for `Node`, each node item for `List`)
    pub fn node_ids(&self) -> Vec<NodeId> {
        match self {
            Value::Node(id) => vec![*id],
            Value::List(items) => items.iter().filter_map(Value::as_node).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: String,
    range: TextRange,
    span: Span,
    fields: HashMap<String, Value>,
    parent: Option<NodeId>,
}

/// A parsed syntax tree and the source it was parsed from
#[derive(Debug, Clone)]
pub struct Tree {
    source: SourceText,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Tree {
    pub fn source(&self) -> &SourceText {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.node(self.root)
    }

    /// Look up a node by id.
    ///
    /// Ids are only handed out by the builder that produced this tree, so an
    /// id from a different tree is a caller bug; use [`Tree::get`] to probe.
    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    pub fn get(&self, id: NodeId) -> Option<Node<'_>> {
        (id.index() < self.nodes.len()).then(|| self.node(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate all nodes in arena order
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        (0..self.nodes.len()).map(move |i| self.node(NodeId(i as u32)))
    }

    /// Iterate all nodes of a given type
    pub fn nodes_of_kind<'t>(&'t self, kind: &'t str) -> impl Iterator<Item = Node<'t>> + 't {
        self.nodes().filter(move |n| n.kind() == kind)
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

/// Borrowed view of one node
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl<'t> Node<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t Tree {
        self.tree
    }

    /// Node type (e.g. `"NewExpression"`)
    pub fn kind(&self) -> &'t str {
        &self.tree.data(self.id).kind
    }

    pub fn range(&self) -> TextRange {
        self.tree.data(self.id).range
    }

    pub fn span(&self) -> Span {
        self.tree.data(self.id).span
    }

    pub fn parent(&self) -> Option<Node<'t>> {
        self.tree.data(self.id).parent.map(|id| self.tree.node(id))
    }

    /// Raw field value
    pub fn field(&self, name: &str) -> Option<&'t Value> {
        self.tree.data(self.id).fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.tree.data(self.id).fields.contains_key(name)
    }

    /// Field names in sorted order
    pub fn field_names(&self) -> Vec<&'t str> {
        let mut names: Vec<&str> = self
            .tree
            .data(self.id)
            .fields
            .keys()
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Single child node held in `name`
    pub fn child(&self, name: &str) -> Option<Node<'t>> {
        self.field(name)
            .and_then(Value::as_node)
            .map(|id| self.tree.node(id))
    }

    /// Child nodes held in `name` (zero, one or many)
    pub fn children(&self, name: &str) -> Vec<Node<'t>> {
        self.field(name)
            .map(|v| v.node_ids().into_iter().map(|id| self.tree.node(id)).collect())
            .unwrap_or_default()
    }

    /// String attribute held in `name`
    pub fn str_field(&self, name: &str) -> Option<&'t str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Source text covered by this node
    pub fn text(&self) -> &'t str {
        self.tree.source.slice(self.range()).unwrap_or("")
    }

    /// Ancestors from the parent outwards
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'t>> {
        std::iter::successors(self.parent(), |n| n.parent())
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.kind(), self.id, self.range())
    }
}

/// Incremental tree construction for parser collaborators
pub struct TreeBuilder {
    source: SourceText,
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub fn new(source: impl Into<SourceText>) -> Self {
        Self {
            source: source.into(),
            nodes: Vec::new(),
        }
    }

    pub fn source(&self) -> &SourceText {
        &self.source
    }

    /// Allocate a node; its line/column span is derived from the source
    pub fn node(&mut self, kind: &str, range: impl Into<TextRange>) -> NodeId {
        let range = range.into();
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind: kind.to_string(),
            range,
            span: self.source.span(range),
            fields: HashMap::new(),
            parent: None,
        });
        id
    }

    /// Set a scalar (or pre-built) field value.
    ///
    /// Node ids inside `value` are attached to `id` as their parent.
    pub fn set(&mut self, id: NodeId, name: &str, value: impl Into<Value>) -> Result<(), TreeError> {
        let value = value.into();
        self.check(id)?;
        for child in value.node_ids() {
            self.attach(id, child)?;
        }
        self.nodes[id.index()].fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Set a field holding a single child node
    pub fn set_child(&mut self, id: NodeId, name: &str, child: NodeId) -> Result<(), TreeError> {
        self.set(id, name, Value::Node(child))
    }

    /// Append a child to a sequence field, creating the sequence if needed
    pub fn push_child(&mut self, id: NodeId, name: &str, child: NodeId) -> Result<(), TreeError> {
        self.check(id)?;
        self.attach(id, child)?;
        let fields = &mut self.nodes[id.index()].fields;
        match fields.get_mut(name) {
            Some(Value::List(items)) => items.push(Value::Node(child)),
            _ => {
                fields.insert(name.to_string(), Value::List(vec![Value::Node(child)]));
            }
        }
        Ok(())
    }

    /// Ensure a sequence field exists, even if empty
    pub fn set_list(&mut self, id: NodeId, name: &str) -> Result<(), TreeError> {
        self.check(id)?;
        self.nodes[id.index()]
            .fields
            .entry(name.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        Ok(())
    }

    /// Validate ranges and seal the tree
    pub fn finish(self, root: NodeId) -> Result<Tree, TreeError> {
        self.check(root)?;
        let len = self.source.len();

        for data in &self.nodes {
            if !data.range.is_ordered() {
                return Err(TreeError::InvertedRange {
                    kind: data.kind.clone(),
                    range: data.range,
                });
            }
            if data.range.end > len {
                return Err(TreeError::OutOfBounds {
                    kind: data.kind.clone(),
                    range: data.range,
                    len,
                });
            }
            if let Some(parent) = data.parent {
                let parent = &self.nodes[parent.index()];
                if !parent.range.contains_range(data.range) {
                    return Err(TreeError::ChildOutsideParent {
                        parent_kind: parent.kind.clone(),
                        parent: parent.range,
                        child_kind: data.kind.clone(),
                        child: data.range,
                    });
                }
            }
        }

        if self.nodes[root.index()].parent.is_some() {
            return Err(TreeError::Invalid(format!("root {} has a parent", root)));
        }
        if let Some(orphan) = (0..self.nodes.len())
            .map(|i| NodeId(i as u32))
            .find(|&id| id != root && self.nodes[id.index()].parent.is_none())
        {
            return Err(TreeError::Invalid(format!(
                "{} node {} is not attached to the tree",
                self.nodes[orphan.index()].kind,
                orphan
            )));
        }
        let reachable = self.count_reachable(root);
        if reachable != self.nodes.len() {
            return Err(TreeError::Invalid(format!(
                "{} of {} nodes are not reachable from root {}",
                self.nodes.len() - reachable,
                self.nodes.len(),
                root
            )));
        }

        Ok(Tree {
            source: self.source,
            nodes: self.nodes,
            root,
        })
    }

    /// Nodes reachable from `root` through child slots
    fn count_reachable(&self, root: NodeId) -> usize {
        let mut stack = vec![root];
        let mut count = 0;
        while let Some(id) = stack.pop() {
            count += 1;
            for value in self.nodes[id.index()].fields.values() {
                stack.extend(value.node_ids());
            }
        }
        count
    }

    fn check(&self, id: NodeId) -> Result<(), TreeError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(id))
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check(child)?;
        if child == parent {
            return Err(TreeError::Invalid(format!("node {} cannot contain itself", child)));
        }
        let slot = &mut self.nodes[child.index()].parent;
        if slot.is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }
        *slot = Some(parent);
        Ok(())
    }
}
