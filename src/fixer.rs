//! Fix merging and application for one pass
//!
//! Every edit of every fix is ordered by `(start, dispatch index, position
//! within its fix)`. Fixes are then taken in the order of their first edit
//! and accepted only if none of their edits conflicts with an edit that was
//! already accepted. A rejected fix is dropped whole and recorded as a
//! [`FixConflict`]. Accepted edits are applied in one left-to-right sweep.

use crate::diagnostic::Diagnostic;
use crate::source::{SourceText, TextRange};
use std::collections::BTreeMap;

/// A fix rejected because it overlaps an accepted one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixConflict {
    /// Index of the rejected diagnostic
    pub diagnostic: usize,
    /// Rule that proposed the rejected fix
    pub rule_id: String,
    /// The rejected edit that overlapped
    pub range: TextRange,
    /// Index of the diagnostic whose accepted edit won
    pub accepted: usize,
    /// The accepted edit's range
    pub accepted_range: TextRange,
}

/// Result of applying one pass's fixes
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// Source after applying accepted fixes (unchanged if none)
    pub source: SourceText,
    /// All diagnostics, with `fix_applied` set on accepted ones
    pub diagnostics: Vec<Diagnostic>,
    /// Number of fixes applied
    pub applied: usize,
    /// Fixes rejected for overlapping
    pub conflicts: Vec<FixConflict>,
    /// Fixes skipped because they do not fit the source
    pub invalid: usize,
}

impl FixOutcome {
    /// Check if the source changed
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Ordering key for an edit: (start, dispatch index, position within fix)
type EditKey = (usize, usize, usize);

struct Accepted {
    end: usize,
    diagnostic: usize,
}

/// Select a maximal non-overlapping set of fixes and apply it to `source`
pub fn apply_fixes(mut diagnostics: Vec<Diagnostic>, source: &SourceText) -> FixOutcome {
    let mut order: Vec<usize> = Vec::new();
    let mut invalid = 0;
    for (index, diag) in diagnostics.iter().enumerate() {
        let Some(fix) = &diag.fix else { continue };
        if fix.is_empty() {
            continue;
        }
        if let Err(err) = fix.validate(source) {
            log::warn!("skipping fix from {}: {}", diag.rule_id, err);
            invalid += 1;
            continue;
        }
        order.push(index);
    }
    // Fix edits are sorted, so the first edit carries the fix's key
    order.sort_by_key(|&index| {
        let start = diagnostics[index]
            .fix
            .as_ref()
            .and_then(|f| f.edits().first())
            .map_or(0, |e| e.range.start);
        (start, index)
    });

    let mut accepted: BTreeMap<EditKey, Accepted> = BTreeMap::new();
    let mut conflicts = Vec::new();
    let mut applied = Vec::new();

    for index in order {
        let Some(fix) = &diagnostics[index].fix else {
            continue;
        };

        let conflict = fix.edits().iter().enumerate().find_map(|(pos, edit)| {
            let key = (edit.range.start, index, pos);
            let before = accepted.range(..key).next_back();
            if let Some((k, a)) = before {
                if edit.range.start < a.end {
                    return Some((edit.range, a.diagnostic, TextRange::new(k.0, a.end)));
                }
            }
            let after = accepted.range(key..).next();
            if let Some((k, a)) = after {
                if k.0 < edit.range.end {
                    return Some((edit.range, a.diagnostic, TextRange::new(k.0, a.end)));
                }
            }
            None
        });

        match conflict {
            Some((range, winner, accepted_range)) => {
                log::warn!(
                    "fix from {} at {} conflicts with {} at {}",
                    diagnostics[index].rule_id,
                    range,
                    diagnostics[winner].rule_id,
                    accepted_range
                );
                conflicts.push(FixConflict {
                    diagnostic: index,
                    rule_id: diagnostics[index].rule_id.clone(),
                    range,
                    accepted: winner,
                    accepted_range,
                });
            }
            None => {
                for (pos, edit) in fix.edits().iter().enumerate() {
                    accepted.insert(
                        (edit.range.start, index, pos),
                        Accepted {
                            end: edit.range.end,
                            diagnostic: index,
                        },
                    );
                }
                applied.push(index);
            }
        }
    }

    if applied.is_empty() {
        return FixOutcome {
            source: source.clone(),
            diagnostics,
            applied: 0,
            conflicts,
            invalid,
        };
    }

    let text = source.as_str();
    let inserted: usize = accepted
        .keys()
        .filter_map(|&(_, index, pos)| diagnostics[index].fix.as_ref()?.edits().get(pos))
        .map(|e| e.replacement.len())
        .sum();
    let mut output = String::with_capacity(text.len() + inserted);
    let mut cursor = 0;
    for (&(start, index, pos), a) in &accepted {
        let Some(edit) = diagnostics[index]
            .fix
            .as_ref()
            .and_then(|f| f.edits().get(pos))
        else {
            continue;
        };
        output.push_str(&text[cursor..start]);
        output.push_str(&edit.replacement);
        cursor = a.end;
    }
    output.push_str(&text[cursor..]);

    for &index in &applied {
        diagnostics[index].fix_applied = true;
    }

    log::debug!(
        "applied {} fixes ({} edits), {} conflicts",
        applied.len(),
        accepted.len(),
        conflicts.len()
    );

    FixOutcome {
        source: SourceText::new(output),
        diagnostics,
        applied: applied.len(),
        conflicts,
        invalid,
    }
}
