mod support;

use pretty_assertions::assert_eq;
use std::fs;
use support::{init_logger, no_array_constructor, parse_js, rename};
use thaw::{
    apply_fixes, fix, lint, Config, Engine, Error, HandlerSet, ParseError, RuleHandler, Severity,
    TextEdit, TextRange, VisitorKeys, FIX_RANGE_ERROR,
};

/// `f([])` -> `f()`
fn no_empty_array_argument() -> RuleHandler {
    RuleHandler::new(
        "no-empty-array-argument",
        "CallExpression > ArrayExpression[elements.length=0]",
    )
    .unwrap()
    .on_enter(|node, ctx| {
        ctx.report_with_fix(node, "Drop the empty array argument", [TextEdit::remove(node)]);
    })
}

/// Proposes a fixed edit while `needle` is still present in the source
fn replace_while(
    rule_id: &str,
    needle: &'static str,
    range: TextRange,
    with: &'static str,
) -> RuleHandler {
    RuleHandler::new(rule_id, "Program")
        .unwrap()
        .on_enter(move |node, ctx| {
            if ctx.source().as_str().contains(needle) {
                ctx.report_with_fix(node, "rewrite", [TextEdit::replace(range, with)]);
            }
        })
}

#[test]
fn test_new_array_is_fixed_in_one_pass() {
    init_logger();
    let handlers = HandlerSet::new().with(no_array_constructor());
    let keys = VisitorKeys::estree();

    let report = fix("new Array()", &parse_js, &keys, &handlers, 10).unwrap();
    assert_eq!(report.text, "[]");
    assert_eq!(report.passes_used, 1);
    assert_eq!(report.fix_count(), 1);
    assert_eq!(report.fixed[0].rule_id, "no-array-constructor");
    assert!(report.diagnostics.is_empty());
    assert!(!report.max_passes_exceeded);

    let rerun = fix("[]", &parse_js, &keys, &handlers, 10).unwrap();
    assert_eq!(rerun.text, "[]");
    assert_eq!(rerun.passes_used, 0);
    assert!(rerun.diagnostics.is_empty());
}

#[test]
fn test_arguments_are_kept() {
    let handlers = HandlerSet::new().with(no_array_constructor());
    let report = fix(
        "const xs = new Array(1, 'two', ys);",
        &parse_js,
        &VisitorKeys::estree(),
        &handlers,
        10,
    )
    .unwrap();
    assert_eq!(report.text, "const xs = [1, 'two', ys];");
}

#[test]
fn test_dependent_fixes_take_several_passes() {
    let handlers = HandlerSet::new()
        .with(no_array_constructor())
        .with(no_empty_array_argument());

    let report = fix("f(new Array());", &parse_js, &VisitorKeys::estree(), &handlers, 10).unwrap();
    assert_eq!(report.text, "f();");
    assert_eq!(report.passes_used, 2);
    let rules: Vec<&str> = report.fixed.iter().map(|d| d.rule_id.as_str()).collect();
    assert_eq!(rules, ["no-array-constructor", "no-empty-array-argument"]);
}

#[test]
fn test_fix_output_is_deterministic() {
    let handlers = HandlerSet::new()
        .with(no_array_constructor())
        .with(rename("rename-array", "Array", "List"))
        .with(no_empty_array_argument());
    let text = "const a = new Array(1, 2), b = g(new Array());\nlet c = Array;\nh([]);";
    let keys = VisitorKeys::estree();

    let first = fix(text, &parse_js, &keys, &handlers, 10).unwrap();
    let second = fix(text, &parse_js, &keys, &handlers, 10).unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(first.passes_used, second.passes_used);
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.fixed, second.fixed);
    assert_eq!(first.conflicts, second.conflicts);

    assert_eq!(first.text, "const a = [1, 2], b = g();\nlet c = List;\nh();");
}

#[test]
fn test_accepted_edits_do_not_overlap() {
    let handlers = HandlerSet::new()
        .with(no_array_constructor())
        .with(rename("rename-array", "Array", "List"))
        .with(rename("rename-a", "a", "alpha"));
    let text = "const a = new Array(1, 2), b = new Array();\nlet c = Array, d = a;";
    let parsed = parse_js(text).unwrap();
    let diagnostics = lint(&parsed.tree, &VisitorKeys::estree(), &handlers);
    assert_eq!(diagnostics.len(), 7);

    let outcome = apply_fixes(diagnostics, parsed.tree.source());
    let mut edits: Vec<&TextEdit> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.fix_applied)
        .filter_map(|d| d.fix.as_ref())
        .flat_map(|f| f.edits())
        .collect();
    edits.sort_by_key(|e| (e.range.start, e.range.end));

    for pair in edits.windows(2) {
        assert!(
            pair[0].range.end <= pair[1].range.start,
            "{} overlaps {}",
            pair[0].range,
            pair[1].range
        );
    }

    let removed: usize = edits.iter().map(|e| e.range.len()).sum();
    let inserted: usize = edits.iter().map(|e| e.replacement.len()).sum();
    assert_eq!(outcome.source.len(), text.len() - removed + inserted);

    // The inner `Array` renames lose to the enclosing constructor fixes
    assert_eq!(outcome.applied, 5);
    assert_eq!(outcome.conflicts.len(), 2);
    assert!(outcome.conflicts.iter().all(|c| c.rule_id == "rename-array"));
    assert_eq!(
        outcome.source.as_str(),
        "const alpha = [1, 2], b = [];\nlet c = List, d = alpha;"
    );
}

#[test]
fn test_earlier_edit_wins_whatever_the_registration_order() {
    let a = || replace_while("a", "abcde", TextRange::new(0, 5), "x");
    let b = || replace_while("b", "defgh", TextRange::new(3, 8), "y");
    let keys = VisitorKeys::estree();

    let a_first = HandlerSet::new().with(a()).with(b());
    let b_first = HandlerSet::new().with(b()).with(a());

    for handlers in [&a_first, &b_first] {
        let report = fix("abcdefghij", &parse_js, &keys, handlers, 1).unwrap();
        assert_eq!(report.text, "xfghij");
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].rule_id, "b");
        assert_eq!(report.conflicts[0].range, TextRange::new(3, 8));
        assert_eq!(report.conflicts[0].accepted_range, TextRange::new(0, 5));
        // The reparsed text no longer triggers `b`
        assert!(!report.max_passes_exceeded);
        assert!(report.diagnostics.is_empty());
    }
}

#[test]
fn test_deferred_fix_applies_after_reparse() {
    // `b` rewrites "fgh" plus up to two characters before it
    let b = RuleHandler::new("b", "Program")
        .unwrap()
        .on_enter(|node, ctx| {
            if let Some(pos) = ctx.source().as_str().find("fgh") {
                let start = pos.saturating_sub(2);
                ctx.report_with_fix(node, "rewrite", [TextEdit::replace(start..pos + 3, "y")]);
            }
        });
    let handlers = HandlerSet::new()
        .with(replace_while("a", "abcde", TextRange::new(0, 5), "x"))
        .with(b);

    // Pass 1 rejects `b`; the reparsed text gives it a range that applies
    let report = fix("abcdefghij", &parse_js, &VisitorKeys::estree(), &handlers, 10).unwrap();
    assert_eq!(report.passes_used, 2);
    assert_eq!(report.text, "yij");
    assert_eq!(report.conflicts.len(), 1);
    let rules: Vec<&str> = report.fixed.iter().map(|d| d.rule_id.as_str()).collect();
    assert_eq!(rules, ["a", "b"]);
}

#[test]
fn test_ping_pong_rules_stop_at_pass_limit() {
    let handlers = HandlerSet::new()
        .with(rename("a-to-b", "a", "b"))
        .with(rename("b-to-a", "b", "a"));

    let report = fix("a;", &parse_js, &VisitorKeys::estree(), &handlers, 5).unwrap();
    assert_eq!(report.passes_used, 5);
    assert!(report.max_passes_exceeded);
    assert_eq!(report.text, "b;");
    assert!(report.has_pending_fixes());
    assert_eq!(report.fix_count(), 5);

    let report = fix("a;", &parse_js, &VisitorKeys::estree(), &handlers, 0).unwrap();
    assert_eq!(report.passes_used, 0);
    assert!(!report.max_passes_exceeded);
    assert_eq!(report.text, "a;");
    assert_eq!(report.diagnostics.len(), 1);
}

#[test]
fn test_out_of_range_fix_becomes_warning() {
    let handlers = HandlerSet::new().with(
        RuleHandler::new("too-far", "Identifier")
            .unwrap()
            .on_enter(|node, ctx| {
                ctx.report_with_fix(node, "bad fix", [TextEdit::replace(100..200, "x")]);
            }),
    );

    let report = fix("x;", &parse_js, &VisitorKeys::estree(), &handlers, 10).unwrap();
    assert_eq!(report.passes_used, 0);
    assert_eq!(report.text, "x;");
    let rules: Vec<&str> = report.diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
    assert_eq!(rules, ["too-far", FIX_RANGE_ERROR]);
    assert!(!report.diagnostics[0].has_fix());
    assert_eq!(report.diagnostics[1].severity, Severity::Warning);
}

#[test]
fn test_parse_errors_are_surfaced() {
    let handlers = HandlerSet::new().with(no_array_constructor());
    let err = fix("new Array(", &parse_js, &VisitorKeys::estree(), &handlers, 10).unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::Syntax { offset: 10, .. })));
    assert_eq!(err.to_string(), "syntax error at offset 10: expected an expression");
}

#[test]
fn test_engine_uses_config_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".thawrc.yaml"),
        "engine:\n  max_passes: 1\n  jobs: 2\nrules:\n  disabled: [a-to-b]\n  severity:\n    no-array-constructor: error\n",
    )
    .unwrap();
    let config = Config::load_default(dir.path()).unwrap();
    assert_eq!(config.engine.max_passes, 1);

    let handlers = HandlerSet::new()
        .with(no_array_constructor())
        .with(no_empty_array_argument())
        .with(rename("a-to-b", "a", "b"));
    let engine = Engine::new(config, VisitorKeys::estree(), handlers);
    assert_eq!(
        engine.handlers().rule_ids(),
        ["no-array-constructor", "no-empty-array-argument"]
    );

    let report = engine.fix("f(new Array(a));", &parse_js).unwrap();
    assert_eq!(report.text, "f([a]);");
    assert_eq!(report.fixed[0].severity, Severity::Error);
    assert!(!report.max_passes_exceeded);

    let report = engine.fix("f(new Array());", &parse_js).unwrap();
    assert_eq!(report.text, "f([]);");
    assert_eq!(report.passes_used, 1);
    assert!(report.max_passes_exceeded);
    assert_eq!(report.diagnostics[0].rule_id, "no-empty-array-argument");
}

#[test]
fn test_batch_keeps_input_order() {
    let engine = Engine::new(
        Config::new(),
        VisitorKeys::estree(),
        HandlerSet::new().with(no_array_constructor()),
    );
    let inputs = ["new Array()", "x;", "new Array(", "new Array(1)"];
    let results = engine.fix_batch(&inputs, &parse_js);

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().text, "[]");
    assert_eq!(results[1].as_ref().unwrap().text, "x;");
    assert!(matches!(results[2], Err(Error::Parse(_))));
    assert_eq!(results[3].as_ref().unwrap().text, "[1]");
}

#[test]
fn test_timing_accumulates_across_passes() {
    let mut config = Config::new();
    config.engine.timing = true;
    let engine = Engine::new(
        config,
        VisitorKeys::estree(),
        HandlerSet::new()
            .with(no_array_constructor())
            .with(no_empty_array_argument()),
    );

    let report = engine.fix("f(new Array());", &parse_js).unwrap();
    assert_eq!(report.passes_used, 2);
    let timing = &report.rule_timings["no-array-constructor"];
    // One NewExpression candidate in pass 1, none afterwards
    assert_eq!(timing.evaluation_count, 1);
    assert_eq!(timing.match_count, 1);
    assert_eq!(report.rule_timings["no-empty-array-argument"].match_count, 1);

    let parsed = parse_js("new Array(); new Array(1);").unwrap();
    let result = engine.lint_parsed(&parsed).unwrap();
    assert_eq!(result.warning_count(), 2);
    assert!(result.format_timings().contains("no-array-constructor"));
}
