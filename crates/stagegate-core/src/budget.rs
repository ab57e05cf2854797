//! Domain budget evaluator — decides whether a unit's planned iteration
//! count fits its declared complexity and action count.
//!
//! Evaluates a [`ComplexityDecl`] into a [`BudgetVerdict`] the driver
//! reads before letting a structural checkpoint pass. Warnings never
//! block; the overall verdict passes iff the blocker list is empty.

use serde::{Deserialize, Serialize};

use crate::domain::complexity::{ComplexityDecl, DomainKind, IssueLevel, IterationBudget};

/// Default per-iteration action cap under Complicated.
pub const DEFAULT_MAX_PER_ITER: u32 = 4;

/// Default per-iteration action cap under Complex.
pub const COMPLEX_DEFAULT_CAP: u32 = 3;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// One budget finding, tagged with the rule that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetIssue {
    /// Rule id (`complicated-split-required`, `complex-iteration-shortfall`,
    /// `review-flagged`, ...).
    pub rule: String,

    /// Human-readable explanation.
    pub message: String,

    #[serde(default)]
    pub suggestions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_target: Option<String>,
}

/// The outcome of evaluating one unit's declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetVerdict {
    /// Findings that block the checkpoint (empty when passed).
    pub blockers: Vec<BudgetIssue>,

    /// Findings surfaced but never blocking.
    pub warnings: Vec<BudgetIssue>,
}

impl BudgetVerdict {
    /// Whether the checkpoint may pass: no blockers. Warnings never block.
    pub fn passed(&self) -> bool {
        self.blockers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Resolved budget parameters
// ---------------------------------------------------------------------------

/// Budget fields with defaults applied, as one domain arm sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBudget {
    pub action_count: u32,
    pub max_per_iter: u32,
    pub suggested_iters: u32,
    pub current_iters: u32,
}

/// Resolve declared fields against a cap default.
///
/// A supplied `suggested_iters` is trusted as-is, even when it is smaller
/// than `ceil(action_count / max_per_iter)`. When `recompute_suggested`
/// is set (the Complex arm), the suggested count is always derived from
/// the cap instead.
fn resolve(budget: &IterationBudget, default_cap: u32, recompute_suggested: bool) -> ResolvedBudget {
    let max_per_iter = budget.max_per_iter.unwrap_or(default_cap).max(1);
    let derived = budget.action_count.div_ceil(max_per_iter).max(1);
    let suggested_iters = if recompute_suggested {
        derived
    } else {
        budget.suggested_iters.unwrap_or(derived)
    };
    ResolvedBudget {
        action_count: budget.action_count,
        max_per_iter,
        suggested_iters,
        current_iters: budget.current_iters.unwrap_or(1),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluate a unit's complexity declaration into a budget verdict.
///
/// Clear units and units with no declared budget produce no findings, so
/// unclassified units keep flowing. Pre-classified reviewer issues merge
/// verbatim into the same verdict.
pub fn evaluate_budget(decl: &ComplexityDecl) -> BudgetVerdict {
    let mut verdict = BudgetVerdict::default();

    if let Some(budget) = &decl.iter_budget {
        match decl.domain {
            DomainKind::Clear => {}
            DomainKind::Complicated => {
                let resolved = resolve(budget, DEFAULT_MAX_PER_ITER, false);
                if decl.three_questions.q3_costly {
                    if resolved.action_count > resolved.max_per_iter
                        && resolved.current_iters < resolved.suggested_iters
                    {
                        verdict.blockers.push(split_issue(
                            "complicated-split-required",
                            &decl.name,
                            resolved,
                        ));
                    }
                } else if resolved.current_iters < resolved.suggested_iters {
                    verdict.warnings.push(split_issue(
                        "complicated-split-suggested",
                        &decl.name,
                        resolved,
                    ));
                }
            }
            DomainKind::Complex => {
                let resolved = resolve(budget, COMPLEX_DEFAULT_CAP, true);
                if resolved.current_iters < resolved.suggested_iters {
                    verdict.blockers.push(split_issue(
                        "complex-iteration-shortfall",
                        &decl.name,
                        resolved,
                    ));
                }
            }
        }
    }

    for issue in &decl.issues {
        let merged = BudgetIssue {
            rule: "review-flagged".to_string(),
            message: issue.description.clone(),
            suggestions: issue.suggestions.clone(),
            fix_target: issue.fix_target.clone(),
        };
        match issue.level {
            IssueLevel::Blocker => verdict.blockers.push(merged),
            IssueLevel::Warning => verdict.warnings.push(merged),
        }
    }

    verdict
}

fn split_issue(rule: &str, unit: &str, resolved: ResolvedBudget) -> BudgetIssue {
    BudgetIssue {
        rule: rule.to_string(),
        message: format!(
            "unit '{unit}': {} actions at {} per iteration need {} iteration(s), {} planned",
            resolved.action_count,
            resolved.max_per_iter,
            resolved.suggested_iters,
            resolved.current_iters,
        ),
        suggestions: vec![
            format!("plan {} iterations for this unit", resolved.suggested_iters),
            "reduce the action count before the checkpoint".to_string(),
        ],
        fix_target: Some(unit.to_string()),
    }
}
