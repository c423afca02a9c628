//! Rule handlers, the handler set and the per-callback rule context

use crate::config::RulesConfig;
use crate::diagnostic::{Diagnostic, Fix, Severity, TextEdit};
use crate::selector::{Selector, SelectorError};
use crate::source::{SourceText, TextRange};
use crate::tree::{Node, NodeId, Tree};
use std::collections::HashMap;
use std::fmt;

/// Rule id used for warnings about fixes dropped at report time
pub const FIX_RANGE_ERROR: &str = "fix-range-error";

/// What the traversal should do after an enter callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visit {
    #[default]
    Continue,
    /// Do not descend into this node's children. The node's exit callbacks
    /// still run.
    SkipSubtree,
}

impl From<()> for Visit {
    fn from(_: ()) -> Self {
        Visit::Continue
    }
}

type EnterFn = dyn Fn(Node<'_>, &mut RuleContext<'_>) -> Visit + Send + Sync;
type ExitFn = dyn Fn(Node<'_>, &mut RuleContext<'_>) + Send + Sync;

fn boxed_enter<F>(f: F) -> Box<EnterFn>
where
    F: Fn(Node<'_>, &mut RuleContext<'_>) -> Visit + Send + Sync + 'static,
{
    Box::new(f)
}

/// A compiled selector paired with enter/exit callbacks
pub struct RuleHandler {
    rule_id: String,
    selector: Selector,
    severity: Severity,
    on_enter: Option<Box<EnterFn>>,
    on_exit: Option<Box<ExitFn>>,
}

impl RuleHandler {
    /// Create a handler; the selector is compiled here so syntax errors
    /// surface at registration time
    pub fn new(rule_id: &str, selector: &str) -> Result<Self, SelectorError> {
        Ok(Self {
            rule_id: rule_id.to_string(),
            selector: Selector::compile(selector)?,
            severity: Severity::default(),
            on_enter: None,
            on_exit: None,
        })
    }

    /// Set the enter callback. It may return `()` or a [`Visit`].
    pub fn on_enter<F, R>(mut self, f: F) -> Self
    where
        F: Fn(Node<'_>, &mut RuleContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Visit>,
    {
        self.on_enter = Some(boxed_enter(move |node, ctx| f(node, ctx).into()));
        self
    }

    /// Set the exit callback
    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(Node<'_>, &mut RuleContext<'_>) + Send + Sync + 'static,
    {
        self.on_exit = Some(Box::new(f));
        self
    }

    /// Default severity of diagnostics reported through this handler
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn has_enter(&self) -> bool {
        self.on_enter.is_some()
    }

    pub fn has_exit(&self) -> bool {
        self.on_exit.is_some()
    }

    pub(crate) fn enter(&self, node: Node<'_>, ctx: &mut RuleContext<'_>) -> Visit {
        match &self.on_enter {
            Some(f) => f(node, ctx),
            None => Visit::Continue,
        }
    }

    pub(crate) fn exit(&self, node: Node<'_>, ctx: &mut RuleContext<'_>) {
        if let Some(f) = &self.on_exit {
            f(node, ctx);
        }
    }
}

impl fmt::Debug for RuleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleHandler")
            .field("rule_id", &self.rule_id)
            .field("selector", &self.selector.as_str())
            .field("severity", &self.severity)
            .field("enter", &self.on_enter.is_some())
            .field("exit", &self.on_exit.is_some())
            .finish()
    }
}

/// Registered handlers in registration order, indexed by node type
#[derive(Debug, Default)]
pub struct HandlerSet {
    handlers: Vec<RuleHandler>,
    by_type: HashMap<String, Vec<usize>>,
    wildcard: Vec<usize>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; returns its dispatch position
    pub fn register(&mut self, handler: RuleHandler) -> usize {
        let index = self.handlers.len();
        self.index_handler(index, &handler);
        self.handlers.push(handler);
        index
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, handler: RuleHandler) -> Self {
        self.register(handler);
        self
    }

    /// Compile `selector` and register an enter-only handler
    pub fn add<F, R>(
        &mut self,
        rule_id: &str,
        selector: &str,
        on_enter: F,
    ) -> Result<usize, SelectorError>
    where
        F: Fn(Node<'_>, &mut RuleContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Visit>,
    {
        let handler = RuleHandler::new(rule_id, selector)?.on_enter(on_enter);
        Ok(self.register(handler))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RuleHandler> {
        self.handlers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleHandler> {
        self.handlers.iter()
    }

    /// Distinct rule ids in registration order
    pub fn rule_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for handler in &self.handlers {
            if !ids.contains(&handler.rule_id()) {
                ids.push(handler.rule_id());
            }
        }
        ids
    }

    /// Fill `out` with the handlers that may match a node of `kind`, in
    /// registration order
    pub fn candidates(&self, kind: &str, out: &mut Vec<usize>) {
        out.clear();
        let typed = self.by_type.get(kind).map(Vec::as_slice).unwrap_or(&[]);
        let (mut i, mut j) = (0, 0);
        while i < typed.len() || j < self.wildcard.len() {
            let next = match (typed.get(i), self.wildcard.get(j)) {
                (Some(&a), Some(&b)) if a < b => {
                    i += 1;
                    a
                }
                (Some(_), Some(&b)) => {
                    j += 1;
                    b
                }
                (Some(&a), None) => {
                    i += 1;
                    a
                }
                (None, Some(&b)) => {
                    j += 1;
                    b
                }
                (None, None) => break,
            };
            out.push(next);
        }
    }

    /// Drop disabled rules and apply severity overrides
    pub fn configure(&mut self, rules: &RulesConfig) {
        let before = self.handlers.len();
        let handlers = std::mem::take(&mut self.handlers);
        self.by_type.clear();
        self.wildcard.clear();

        for mut handler in handlers {
            if !rules.is_rule_enabled(handler.rule_id()) {
                continue;
            }
            if let Some(severity) = rules.get_severity_override(handler.rule_id()) {
                handler.severity = severity;
            }
            self.register(handler);
        }

        log::debug!(
            "configured {} of {} handlers ({} type buckets, {} wildcard)",
            self.handlers.len(),
            before,
            self.by_type.len(),
            self.wildcard.len()
        );
    }

    fn index_handler(&mut self, index: usize, handler: &RuleHandler) {
        match handler.selector().node_types() {
            Some(types) => {
                for kind in types {
                    self.by_type.entry(kind.to_string()).or_default().push(index);
                }
            }
            None => self.wildcard.push(index),
        }
    }
}

/// What a callback sees while handling one node
pub struct RuleContext<'a> {
    tree: &'a Tree,
    ancestors: &'a [NodeId],
    rule_id: &'a str,
    severity: Severity,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(
        tree: &'a Tree,
        ancestors: &'a [NodeId],
        handler: &'a RuleHandler,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            tree,
            ancestors,
            rule_id: handler.rule_id(),
            severity: handler.severity(),
            diagnostics,
        }
    }

    pub fn source(&self) -> &'a SourceText {
        self.tree.source()
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    pub fn rule_id(&self) -> &str {
        self.rule_id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Ancestors of the current node, outermost first
    pub fn ancestors(&self) -> impl DoubleEndedIterator<Item = Node<'a>> + 'a {
        let (tree, ancestors) = (self.tree, self.ancestors);
        ancestors.iter().map(move |id| tree.node(*id))
    }

    /// Immediate parent of the current node
    pub fn parent(&self) -> Option<Node<'a>> {
        self.ancestors.last().map(|id| self.tree.node(*id))
    }

    /// Report a diagnostic on `node`
    pub fn report(&mut self, node: Node<'_>, message: &str) {
        let diag = Diagnostic::at_node(self.rule_id, self.severity, message, node);
        self.diagnostics.push(diag);
    }

    /// Report a diagnostic on an explicit range
    pub fn report_range(&mut self, range: impl Into<TextRange>, message: &str) {
        let diag = Diagnostic::new(
            self.rule_id,
            self.severity,
            message,
            range.into(),
            self.tree.source(),
        );
        self.diagnostics.push(diag);
    }

    /// Report a diagnostic on `node` carrying a fix built from `edits`
    pub fn report_with_fix(
        &mut self,
        node: Node<'_>,
        message: &str,
        edits: impl IntoIterator<Item = TextEdit>,
    ) {
        let diag = Diagnostic::at_node(self.rule_id, self.severity, message, node);
        match Fix::new(edits) {
            Ok(fix) => self.emit(diag.with_fix(fix)),
            Err(err) => self.push_with_fix_error(diag, &err.to_string()),
        }
    }

    /// Push a prepared diagnostic.
    ///
    /// A fix that does not fit this pass's source is removed and a
    /// `fix-range-error` warning is pushed after the diagnostic.
    pub fn emit(&mut self, mut diag: Diagnostic) {
        let invalid = diag
            .fix
            .as_ref()
            .and_then(|fix| fix.validate(self.tree.source()).err());
        match invalid {
            Some(err) => {
                diag.fix = None;
                self.push_with_fix_error(diag, &err.to_string());
            }
            None => self.diagnostics.push(diag),
        }
    }

    fn push_with_fix_error(&mut self, diag: Diagnostic, reason: &str) {
        log::warn!("dropping fix from {}: {}", self.rule_id, reason);
        let warning = Diagnostic {
            rule_id: FIX_RANGE_ERROR.to_string(),
            severity: Severity::Warning,
            message: format!("fix from `{}` dropped: {}", self.rule_id, reason),
            fix: None,
            fix_applied: false,
            ..diag.clone()
        };
        self.diagnostics.push(diag);
        self.diagnostics.push(warning);
    }
}
