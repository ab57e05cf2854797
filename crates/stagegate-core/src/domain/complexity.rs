//! Per-unit complexity declarations consumed from `complexity.json`.
//!
//! Declarations are written by an upstream reviewer; every optional field
//! has a documented default so a partial declaration still evaluates
//! rather than failing.

use serde::{Deserialize, Serialize};

/// Situational classification of a unit. Sets only the per-iteration
/// work-budget cap; nothing else keys off it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Clear,
    Complicated,
    Complex,
}

/// Reviewer answers to the classification questionnaire. Only the third
/// question (is rework costly?) feeds the budget rules, and only under
/// `Complicated`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreeQuestions {
    #[serde(default)]
    pub q3_costly: bool,
}

/// Declared work budget for one unit's iteration planning.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IterationBudget {
    /// Planned actions for the unit.
    pub action_count: u32,

    /// Cap on actions per iteration. Defaults by domain when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_iter: Option<u32>,

    /// Reviewer-supplied iteration count. Trusted as-is when present,
    /// even below `ceil(action_count / max_per_iter)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_iters: Option<u32>,

    /// Iterations currently planned. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_iters: Option<u32>,
}

/// Severity tag on a pre-classified reviewer issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Blocker,
    Warning,
}

/// An issue already classified by the upstream reviewer, merged verbatim
/// into the budget verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIssue {
    pub level: IssueLevel,
    pub description: String,

    #[serde(default)]
    pub suggestions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_target: Option<String>,
}

/// Complete per-unit complexity declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityDecl {
    pub name: String,
    pub domain: DomainKind,

    #[serde(default)]
    pub three_questions: ThreeQuestions,

    /// Absent budget means the evaluator no-ops for this unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iter_budget: Option<IterationBudget>,

    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
}
