//! Depth-first traversal and rule dispatch

use crate::diagnostic::{Diagnostic, Severity};
use crate::rule::{HandlerSet, RuleContext, Visit};
use crate::tree::{NodeId, Tree};
use crate::visitor_keys::VisitorKeys;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-rule timing statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTiming {
    /// Rule ID
    pub rule_id: String,
    /// Total time spent matching and running this rule's callbacks
    pub total_time: Duration,
    /// Number of times the rule's selector was evaluated
    pub evaluation_count: usize,
    /// Number of nodes the selector matched
    pub match_count: usize,
}

impl RuleTiming {
    /// Create a new timing entry
    pub fn new(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            ..Default::default()
        }
    }

    /// Average time per evaluation
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Result of one traversal
#[derive(Debug, Default)]
pub struct LintResult {
    /// Diagnostics in dispatch order
    pub diagnostics: Vec<Diagnostic>,

    /// Nodes entered
    pub nodes_visited: usize,

    /// Per-rule timing statistics (rule_id -> timing); empty unless enabled
    pub rule_timings: HashMap<String, RuleTiming>,
}

impl LintResult {
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Check if result is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0 && self.warning_count() == 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: LintResult) {
        self.diagnostics.extend(other.diagnostics);
        self.nodes_visited += other.nodes_visited;

        for (rule_id, timing) in other.rule_timings {
            let entry = self
                .rule_timings
                .entry(rule_id)
                .or_insert_with(|| RuleTiming::new(&timing.rule_id));
            entry.total_time += timing.total_time;
            entry.evaluation_count += timing.evaluation_count;
            entry.match_count += timing.match_count;
        }
    }

    /// Get rule timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rule_timings.values().collect();
        timings.sort_by(|a, b| {
            b.total_time
                .cmp(&a.total_time)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        timings
    }

    /// Format timing statistics as a string
    pub fn format_timings(&self) -> String {
        let timings = self.sorted_timings();
        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::new();
        output.push_str("Rule Timing Statistics:\n");
        output.push_str(&format!(
            "{:<40} {:>12} {:>12} {:>10} {:>12}\n",
            "Rule ID", "Total", "Avg", "Evals", "Matches"
        ));
        output.push_str(&"-".repeat(90));
        output.push('\n');

        for timing in timings {
            let total_ms = timing.total_time.as_secs_f64() * 1000.0;
            let avg_us = timing.avg_time().as_secs_f64() * 1_000_000.0;
            output.push_str(&format!(
                "{:<40} {:>10.2}ms {:>10.2}µs {:>10} {:>12}\n",
                timing.rule_id, total_ms, avg_us, timing.evaluation_count, timing.match_count
            ));
        }

        output
    }
}

enum Step {
    Enter(NodeId),
    /// Exit callbacks to run for a node, already filtered to matching handlers
    Exit(NodeId, Vec<usize>),
}

/// Walks a tree in the order given by a [`VisitorKeys`] registry and
/// dispatches matching handlers
pub struct Traversal<'a> {
    keys: &'a VisitorKeys,
    handlers: &'a HandlerSet,
    timing: bool,
}

impl<'a> Traversal<'a> {
    pub fn new(keys: &'a VisitorKeys, handlers: &'a HandlerSet) -> Self {
        Self {
            keys,
            handlers,
            timing: false,
        }
    }

    /// Record per-rule timing
    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    /// Visit every node reachable from the root once on enter and once on exit
    pub fn run(&self, tree: &Tree) -> LintResult {
        let mut result = LintResult::default();
        let mut ancestors: Vec<NodeId> = Vec::new();
        let mut stack = vec![Step::Enter(tree.root().id())];
        let mut candidates = Vec::new();
        let mut children = Vec::new();

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    let node = tree.node(id);
                    result.nodes_visited += 1;
                    self.handlers.candidates(node.kind(), &mut candidates);

                    let mut skip = false;
                    let mut exits = Vec::new();
                    for &index in &candidates {
                        let Some(handler) = self.handlers.get(index) else {
                            continue;
                        };
                        let start = self.timing.then(Instant::now);
                        let matched = handler.selector().matches(node, &ancestors);
                        if matched {
                            log::trace!("{} matched {:?}", handler.rule_id(), node);
                            let mut ctx =
                                RuleContext::new(tree, &ancestors, handler, &mut result.diagnostics);
                            if handler.enter(node, &mut ctx) == Visit::SkipSubtree {
                                skip = true;
                            }
                            if handler.has_exit() {
                                exits.push(index);
                            }
                        }
                        if let Some(start) = start {
                            let timing = result
                                .rule_timings
                                .entry(handler.rule_id().to_string())
                                .or_insert_with(|| RuleTiming::new(handler.rule_id()));
                            timing.total_time += start.elapsed();
                            timing.evaluation_count += 1;
                            timing.match_count += usize::from(matched);
                        }
                    }

                    stack.push(Step::Exit(id, exits));
                    ancestors.push(id);
                    if skip {
                        continue;
                    }

                    children.clear();
                    for field in self.keys.child_fields(node.kind()) {
                        if let Some(value) = node.field(field) {
                            children.extend(value.node_ids());
                        }
                    }
                    stack.extend(children.drain(..).rev().map(Step::Enter));
                }
                Step::Exit(id, exits) => {
                    ancestors.pop();
                    let node = tree.node(id);
                    for index in exits {
                        let Some(handler) = self.handlers.get(index) else {
                            continue;
                        };
                        let start = self.timing.then(Instant::now);
                        let mut ctx =
                            RuleContext::new(tree, &ancestors, handler, &mut result.diagnostics);
                        handler.exit(node, &mut ctx);
                        if let Some(start) = start {
                            if let Some(timing) = result.rule_timings.get_mut(handler.rule_id()) {
                                timing.total_time += start.elapsed();
                            }
                        }
                    }
                }
            }
        }

        log::debug!(
            "visited {} nodes, {} diagnostics",
            result.nodes_visited,
            result.diagnostics.len()
        );
        result
    }
}

/// Lint a tree without fixing; diagnostics come back in dispatch order
pub fn lint(tree: &Tree, keys: &VisitorKeys, handlers: &HandlerSet) -> Vec<Diagnostic> {
    Traversal::new(keys, handlers).run(tree).diagnostics
}
