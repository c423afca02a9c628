//! Multi-pass fix driver and the configured engine
//!
//! Every pass reparses the current text, rebuilds the visitor key registry,
//! traverses, and applies one merged set of fixes. The loop ends when a pass
//! produces nothing to apply or the pass limit is reached.

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::error::Result;
use crate::fixer::{apply_fixes, FixConflict};
use crate::parser::{Parsed, Parser};
use crate::rule::HandlerSet;
use crate::source::SourceText;
use crate::traverse::{LintResult, RuleTiming, Traversal};
use crate::tree::{Tree, TreeError};
use crate::visitor_keys::{KeyTable, VisitorKeys};
use rayon::prelude::*;
use std::collections::HashMap;

/// Outcome of the multi-pass fix loop
#[derive(Debug, Default)]
pub struct FixReport {
    /// Text after the last applied pass
    pub text: String,
    /// Diagnostics of the final pass; they describe `text`
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics whose fixes were applied in earlier passes. Positions
    /// refer to the text of the pass that produced them.
    pub fixed: Vec<Diagnostic>,
    /// Number of passes whose fixes were applied
    pub passes_used: usize,
    /// The pass limit stopped the loop while fixes were still pending
    pub max_passes_exceeded: bool,
    /// Fixes dropped for overlapping, across all passes
    pub conflicts: Vec<FixConflict>,
    /// Per-rule timing across all passes; empty unless enabled
    pub rule_timings: HashMap<String, RuleTiming>,
}

impl FixReport {
    /// Number of fixes applied across all passes
    pub fn fix_count(&self) -> usize {
        self.fixed.len()
    }

    /// Check if the final diagnostics still carry fixes
    pub fn has_pending_fixes(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::has_fix)
    }
}

#[derive(Debug, Clone, Copy)]
struct PassOptions<'a> {
    max_passes: usize,
    config_keys: &'a KeyTable,
    timing: bool,
}

/// Fix `text` until no fixes remain or `max_passes` passes have been applied.
///
/// `max_passes == 0` lints once and applies nothing.
pub fn fix<P: Parser + ?Sized>(
    text: &str,
    parser: &P,
    keys: &VisitorKeys,
    handlers: &HandlerSet,
    max_passes: usize,
) -> Result<FixReport> {
    let empty = KeyTable::new();
    let options = PassOptions {
        max_passes,
        config_keys: &empty,
        timing: false,
    };
    run_passes(text, parser, keys, handlers, options)
}

fn run_passes<P: Parser + ?Sized>(
    initial: &str,
    parser: &P,
    keys: &VisitorKeys,
    handlers: &HandlerSet,
    options: PassOptions<'_>,
) -> Result<FixReport> {
    let mut report = FixReport {
        text: initial.to_string(),
        ..Default::default()
    };

    loop {
        let parsed = parser.parse(&report.text)?;
        check_source(&parsed.tree, &report.text)?;
        let result = lint_tree(
            &parsed.tree,
            &parsed.visitor_keys,
            keys,
            options.config_keys,
            handlers,
            options.timing,
        )?;
        merge_timings(&mut report.rule_timings, result.rule_timings);
        let source = parsed.tree.source();

        log::debug!(
            "pass {}: {} diagnostics",
            report.passes_used + 1,
            result.diagnostics.len()
        );

        if options.max_passes == 0 {
            report.diagnostics = result.diagnostics;
            return Ok(report);
        }

        if report.passes_used == options.max_passes {
            report.max_passes_exceeded = has_applicable_fix(&result.diagnostics, source);
            if report.max_passes_exceeded {
                log::warn!(
                    "stopped after {} passes with fixes still pending",
                    report.passes_used
                );
            }
            report.diagnostics = result.diagnostics;
            return Ok(report);
        }

        let outcome = apply_fixes(result.diagnostics, source);
        let changed = outcome.changed();
        report.conflicts.extend(outcome.conflicts);
        if !changed {
            report.diagnostics = outcome.diagnostics;
            return Ok(report);
        }

        report.passes_used += 1;
        report
            .fixed
            .extend(outcome.diagnostics.into_iter().filter(|d| d.fix_applied));
        report.text = outcome.source.as_str().to_string();
    }
}

/// A fix the merge step would accept: non-empty and inside the source
fn has_applicable_fix(diagnostics: &[Diagnostic], source: &SourceText) -> bool {
    diagnostics.iter().any(|d| {
        d.fix
            .as_ref()
            .is_some_and(|f| !f.is_empty() && f.validate(source).is_ok())
    })
}

fn check_source(tree: &Tree, text: &str) -> Result<()> {
    if tree.source().as_str() != text {
        let message = "parser returned a tree for different text".to_string();
        return Err(TreeError::Invalid(message).into());
    }
    Ok(())
}

fn lint_tree(
    tree: &Tree,
    parser_keys: &KeyTable,
    keys: &VisitorKeys,
    config_keys: &KeyTable,
    handlers: &HandlerSet,
    timing: bool,
) -> Result<LintResult> {
    let registry = if config_keys.is_empty() {
        VisitorKeys::build(keys, parser_keys, tree)?
    } else {
        // Configured entries win over the parser's own
        let mut extensions = parser_keys.clone();
        extensions.extend(config_keys.clone());
        VisitorKeys::build(keys, &extensions, tree)?
    };
    Ok(Traversal::new(&registry, handlers)
        .with_timing(timing)
        .run(tree))
}

fn merge_timings(into: &mut HashMap<String, RuleTiming>, from: HashMap<String, RuleTiming>) {
    for (rule_id, timing) in from {
        let entry = into
            .entry(rule_id)
            .or_insert_with(|| RuleTiming::new(&timing.rule_id));
        entry.total_time += timing.total_time;
        entry.evaluation_count += timing.evaluation_count;
        entry.match_count += timing.match_count;
    }
}

/// Handlers, default visitor keys and configuration bundled together
#[derive(Debug)]
pub struct Engine {
    config: Config,
    keys: VisitorKeys,
    handlers: HandlerSet,
}

impl Engine {
    /// Create an engine; disabled rules are dropped and severity overrides
    /// applied here
    pub fn new(config: Config, keys: VisitorKeys, mut handlers: HandlerSet) -> Self {
        handlers.configure(&config.rules);
        Self {
            config,
            keys,
            handlers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn keys(&self) -> &VisitorKeys {
        &self.keys
    }

    pub fn handlers(&self) -> &HandlerSet {
        &self.handlers
    }

    /// Lint an already parsed tree
    pub fn lint(&self, tree: &Tree) -> Result<LintResult> {
        self.lint_with_keys(tree, &KeyTable::new())
    }

    /// Lint a parser result, honouring its visitor key extensions
    pub fn lint_parsed(&self, parsed: &Parsed) -> Result<LintResult> {
        self.lint_with_keys(&parsed.tree, &parsed.visitor_keys)
    }

    fn lint_with_keys(&self, tree: &Tree, parser_keys: &KeyTable) -> Result<LintResult> {
        lint_tree(
            tree,
            parser_keys,
            &self.keys,
            &self.config.visitor_keys,
            &self.handlers,
            self.config.engine.timing,
        )
    }

    /// Run the fix loop with the configured pass limit
    pub fn fix<P: Parser + ?Sized>(&self, text: &str, parser: &P) -> Result<FixReport> {
        let options = PassOptions {
            max_passes: self.config.engine.max_passes,
            config_keys: &self.config.visitor_keys,
            timing: self.config.engine.timing,
        };
        run_passes(text, parser, &self.keys, &self.handlers, options)
    }

    /// Fix independent sources; results keep the input order
    pub fn fix_batch<S, P>(&self, texts: &[S], parser: &P) -> Vec<Result<FixReport>>
    where
        S: AsRef<str> + Sync,
        P: Parser + Sync + ?Sized,
    {
        if !self.config.engine.parallel || texts.len() < 2 {
            return texts.iter().map(|t| self.fix(t.as_ref(), parser)).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.engine.worker_count())
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                texts
                    .par_iter()
                    .map(|t| self.fix(t.as_ref(), parser))
                    .collect()
            }),
            Err(err) => {
                log::warn!("could not start worker pool ({}), fixing sequentially", err);
                texts.iter().map(|t| self.fix(t.as_ref(), parser)).collect()
            }
        }
    }
}
