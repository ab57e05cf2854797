//! Snapshot assembler — a priority-ordered decision table over folded
//! state.
//!
//! The table is an explicit ordered slice of `(rule id, predicate)`
//! pairs: the first rule that matches produces the answer and later
//! rules are never evaluated. Tests enumerate [`DECISION_TABLE`] and
//! assert the order directly; new rules are inserted by position.

use crate::domain::event::{Outcome, PhaseNum, ScopeKey, StructuralGate};
use crate::domain::status::{
    Badge, FlowVariant, GateStatus, PhaseStatus, PipelineSnapshot, UnitRecord,
};
use crate::reducer::FoldState;

/// Result of a matched decision rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub label: Option<String>,
    pub badge: Badge,
    pub status: GateStatus,
}

type RuleFn = fn(&FoldState) -> Option<RuleHit>;

/// One `(predicate, result)` entry in the decision table.
pub struct DecisionRule {
    pub id: &'static str,
    matches: RuleFn,
}

impl DecisionRule {
    /// Evaluate this rule alone (used by tests to pin first-match order).
    pub fn evaluate(&self, fold: &FoldState) -> Option<RuleHit> {
        (self.matches)(fold)
    }
}

/// Rule id of the completion rule; the only rule that pins progress to 100.
pub const RULE_COMPLETE: &str = "pipeline-complete";

/// Rule id reported when nothing matched.
pub const RULE_NOT_STARTED: &str = "not-started";

/// The decision table, highest priority first.
pub const DECISION_TABLE: &[DecisionRule] = &[
    DecisionRule {
        id: RULE_COMPLETE,
        matches: rule_complete,
    },
    DecisionRule {
        id: "verify-blocked",
        matches: rule_verify_blocked,
    },
    DecisionRule {
        id: "post-shrink",
        matches: rule_post_shrink,
    },
    DecisionRule {
        id: "unit-blocked",
        matches: rule_unit_blocked,
    },
    DecisionRule {
        id: "unit-attention",
        matches: rule_unit_attention,
    },
    DecisionRule {
        id: "units-progress",
        matches: rule_units_progress,
    },
    DecisionRule {
        id: "legacy-build",
        matches: rule_legacy_build,
    },
    DecisionRule {
        id: "plan-blocked",
        matches: rule_plan_blocked,
    },
    DecisionRule {
        id: "plan-complete",
        matches: rule_plan_complete,
    },
    DecisionRule {
        id: "poc-blocked",
        matches: rule_poc_blocked,
    },
    DecisionRule {
        id: "poc-complete",
        matches: rule_poc_complete,
    },
    DecisionRule {
        id: "ready-for-build",
        matches: rule_ready_for_build,
    },
    DecisionRule {
        id: "classification-blocked",
        matches: rule_classification_blocked,
    },
    DecisionRule {
        id: "awaiting-classification",
        matches: rule_awaiting_classification,
    },
    DecisionRule {
        id: "ready-for-plan",
        matches: rule_ready_for_plan,
    },
    DecisionRule {
        id: "check-blocked",
        matches: rule_check_blocked,
    },
];

// ---------------------------------------------------------------------------
// Rule predicates
// ---------------------------------------------------------------------------

fn rule_complete(fold: &FoldState) -> Option<RuleHit> {
    let scan_done = fold.scan == Some(Outcome::Pass);
    let verify_done = fold.gate(StructuralGate::Verify) == Some(Outcome::Pass);
    (scan_done || verify_done).then(|| RuleHit {
        label: Some("DONE".to_string()),
        badge: Badge::Pass,
        status: GateStatus::Done,
    })
}

fn rule_verify_blocked(fold: &FoldState) -> Option<RuleHit> {
    (fold.gate(StructuralGate::Verify) == Some(Outcome::Error)).then(|| RuleHit {
        label: Some("verify gate".to_string()),
        badge: Badge::Blocker,
        status: GateStatus::Blocked,
    })
}

fn rule_post_shrink(fold: &FoldState) -> Option<RuleHit> {
    (fold.gate(StructuralGate::Shrink) == Some(Outcome::Pass)).then(|| RuleHit {
        label: Some("post-shrink".to_string()),
        badge: Badge::Pass,
        status: GateStatus::Idle,
    })
}

fn first_unit_with(fold: &FoldState, outcome: Outcome) -> Option<(&String, PhaseNum)> {
    fold.units
        .iter()
        .find(|(_, u)| u.aggregated_outcome() == outcome)
        .and_then(|(id, u)| u.highest_phase().map(|p| (id, p)))
}

fn rule_unit_blocked(fold: &FoldState) -> Option<RuleHit> {
    let (id, phase) = first_unit_with(fold, Outcome::Error)?;
    Some(RuleHit {
        label: Some(format!("unit {id}: build phase {phase}")),
        badge: Badge::Blocker,
        status: GateStatus::Blocked,
    })
}

fn rule_unit_attention(fold: &FoldState) -> Option<RuleHit> {
    let (id, phase) = first_unit_with(fold, Outcome::Info)?;
    Some(RuleHit {
        label: Some(format!("unit {id}: build phase {phase}")),
        badge: Badge::Warning,
        status: GateStatus::InProgress,
    })
}

fn rule_units_progress(fold: &FoldState) -> Option<RuleHit> {
    if fold.units.is_empty() {
        return None;
    }
    let phase = fold.highest_passed_build_phase()?;
    Some(RuleHit {
        label: Some(format!("build phase {phase}")),
        badge: Badge::Pass,
        status: GateStatus::InProgress,
    })
}

fn rule_legacy_build(fold: &FoldState) -> Option<RuleHit> {
    let (phase, slot) = fold.legacy_phases.iter().next_back()?;
    Some(RuleHit {
        label: Some(format!("build phase {phase}")),
        badge: Badge::from(slot.outcome),
        status: if slot.outcome == Outcome::Error {
            GateStatus::Blocked
        } else {
            GateStatus::InProgress
        },
    })
}

fn highest_step_with(
    steps: &std::collections::BTreeMap<ScopeKey, Outcome>,
    outcome: Outcome,
) -> Option<PhaseNum> {
    steps
        .iter()
        .filter(|(_, o)| **o == outcome)
        .map(|(k, _)| k.step)
        .max()
}

fn rule_plan_blocked(fold: &FoldState) -> Option<RuleHit> {
    let step = highest_step_with(&fold.plan_steps, Outcome::Error)?;
    Some(RuleHit {
        label: Some(format!("plan step {step}")),
        badge: Badge::Blocker,
        status: GateStatus::Blocked,
    })
}

fn rule_plan_complete(fold: &FoldState) -> Option<RuleHit> {
    let step = highest_step_with(&fold.plan_steps, Outcome::Pass)?;
    Some(RuleHit {
        label: Some(format!("plan step {step}")),
        badge: Badge::Pass,
        status: GateStatus::InProgress,
    })
}

fn rule_poc_blocked(fold: &FoldState) -> Option<RuleHit> {
    let step = highest_step_with(&fold.poc_steps, Outcome::Error)?;
    Some(RuleHit {
        label: Some(format!("poc step {step}")),
        badge: Badge::Blocker,
        status: GateStatus::Blocked,
    })
}

fn rule_poc_complete(fold: &FoldState) -> Option<RuleHit> {
    let step = highest_step_with(&fold.poc_steps, Outcome::Pass)?;
    Some(RuleHit {
        label: Some(format!("poc step {step}")),
        badge: Badge::Pass,
        status: GateStatus::InProgress,
    })
}

fn rule_ready_for_build(fold: &FoldState) -> Option<RuleHit> {
    (fold.gate(StructuralGate::Plan) == Some(Outcome::Pass)).then(|| RuleHit {
        label: Some("ready for build".to_string()),
        badge: Badge::Pass,
        status: GateStatus::Idle,
    })
}

fn rule_classification_blocked(fold: &FoldState) -> Option<RuleHit> {
    (fold.gate(StructuralGate::Check) == Some(Outcome::Pass)
        && fold.classification == Some(Outcome::Error))
    .then(|| RuleHit {
        label: Some("classification check".to_string()),
        badge: Badge::Blocker,
        status: GateStatus::Blocked,
    })
}

fn rule_awaiting_classification(fold: &FoldState) -> Option<RuleHit> {
    (fold.gate(StructuralGate::Check) == Some(Outcome::Pass) && fold.classification.is_none())
        .then(|| RuleHit {
            label: Some("awaiting classification".to_string()),
            badge: Badge::Pass,
            status: GateStatus::Idle,
        })
}

fn rule_ready_for_plan(fold: &FoldState) -> Option<RuleHit> {
    (fold.gate(StructuralGate::Check) == Some(Outcome::Pass)).then(|| RuleHit {
        label: Some("ready for plan".to_string()),
        badge: Badge::Pass,
        status: GateStatus::Idle,
    })
}

fn rule_check_blocked(fold: &FoldState) -> Option<RuleHit> {
    (fold.gate(StructuralGate::Check) == Some(Outcome::Error)).then(|| RuleHit {
        label: Some("check gate".to_string()),
        badge: Badge::Blocker,
        status: GateStatus::Blocked,
    })
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// One exploration term: completed/total scaled to `weight`, or the flat
/// gate credit when the track recorded no events at all.
fn exploration_term(
    steps: &std::collections::BTreeMap<ScopeKey, Outcome>,
    gate: Option<Outcome>,
    weight: u32,
) -> u32 {
    if steps.is_empty() {
        return if gate == Some(Outcome::Pass) { weight } else { 0 };
    }
    let done = steps.values().filter(|o| **o == Outcome::Pass).count();
    let total = steps.len();
    ((done as f64 / total as f64) * f64::from(weight)).round() as u32
}

/// Progress outside the completion rule: three independently rounded
/// terms, summed without re-clamping.
pub fn progress_percent(fold: &FoldState, declared_phase_total: usize) -> u8 {
    let poc = exploration_term(&fold.poc_steps, fold.gate(StructuralGate::Check), 10);
    let plan = exploration_term(&fold.plan_steps, fold.gate(StructuralGate::Plan), 20);

    let build = match (fold.highest_passed_build_phase(), declared_phase_total) {
        (Some(phase), total) if total > 0 => {
            ((phase.value() / total as f64) * 70.0).round() as u32
        }
        _ => 0,
    };

    (poc + plan + build).min(u32::from(u8::MAX)) as u8
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn unit_views(fold: &FoldState) -> Vec<UnitRecord> {
    fold.units
        .iter()
        .map(|(id, unit)| UnitRecord {
            unit_id: id.clone(),
            phases: unit
                .per_phase
                .iter()
                .map(|(phase, outcome)| PhaseStatus {
                    phase: *phase,
                    outcome: *outcome,
                    retries: unit.retry_counts.get(phase).copied().unwrap_or(0),
                })
                .collect(),
            highest_passed_phase: unit.highest_passed_phase(),
            aggregated: unit.aggregated_outcome(),
            badge: Badge::from(unit.aggregated_outcome()),
        })
        .collect()
}

/// Assemble folded state into the snapshot both consumers read.
///
/// `declared_phase_total` is the length of the resolved tier phase plan;
/// zero contributes nothing to the build progress term.
pub fn assemble(
    fold: &FoldState,
    flow: FlowVariant,
    declared_phase_total: usize,
) -> PipelineSnapshot {
    let (rule_id, hit) = DECISION_TABLE
        .iter()
        .find_map(|rule| rule.evaluate(fold).map(|hit| (rule.id, hit)))
        .unwrap_or((
            RULE_NOT_STARTED,
            RuleHit {
                label: None,
                badge: Badge::Pass,
                status: GateStatus::NotStarted,
            },
        ));

    let progress = if rule_id == RULE_COMPLETE {
        100
    } else {
        progress_percent(fold, declared_phase_total)
    };

    PipelineSnapshot {
        flow,
        rule_id: rule_id.to_string(),
        label: hit.label,
        badge: hit.badge,
        badge_class: hit.badge.css_class().to_string(),
        progress_percent: progress,
        units: unit_views(fold),
        gate_status: hit.status,
        fingerprint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventKind, EventLog, ExplorationTrack, PipelineEvent};
    use crate::reducer::fold;

    fn event(kind: EventKind, outcome: Outcome, ts: u64) -> PipelineEvent {
        PipelineEvent {
            kind,
            outcome,
            timestamp: ts.to_string(),
        }
    }

    fn fold_events(events: Vec<PipelineEvent>) -> FoldState {
        fold(&EventLog::from_ordered(events))
    }

    #[test]
    fn test_table_order_is_stable() {
        let ids: Vec<&str> = DECISION_TABLE.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                "pipeline-complete",
                "verify-blocked",
                "post-shrink",
                "unit-blocked",
                "unit-attention",
                "units-progress",
                "legacy-build",
                "plan-blocked",
                "plan-complete",
                "poc-blocked",
                "poc-complete",
                "ready-for-build",
                "classification-blocked",
                "awaiting-classification",
                "ready-for-plan",
                "check-blocked",
            ]
        );
    }

    #[test]
    fn test_empty_log_is_not_started() {
        let snapshot = assemble(&FoldState::default(), FlowVariant::StepDriven, 5);
        assert_eq!(snapshot.rule_id, RULE_NOT_STARTED);
        assert_eq!(snapshot.label, None);
        assert_eq!(snapshot.gate_status, GateStatus::NotStarted);
        assert_eq!(snapshot.progress_percent, 0);
    }

    #[test]
    fn test_scan_pass_wins_over_unit_blocker() {
        let state = fold_events(vec![
            event(
                EventKind::BuildStep {
                    phase: PhaseNum::new(2.0),
                    unit_id: Some("auth".to_string()),
                },
                Outcome::Error,
                1,
            ),
            event(EventKind::RepoScan, Outcome::Pass, 2),
        ]);
        let snapshot = assemble(&state, FlowVariant::Mixed, 5);
        assert_eq!(snapshot.rule_id, RULE_COMPLETE);
        assert_eq!(snapshot.label.as_deref(), Some("DONE"));
        assert_eq!(snapshot.progress_percent, 100);
    }

    #[test]
    fn test_verify_error_blocks() {
        let state = fold_events(vec![event(
            EventKind::StructuralGate {
                gate: StructuralGate::Verify,
            },
            Outcome::Error,
            1,
        )]);
        let snapshot = assemble(&state, FlowVariant::GateDriven, 5);
        assert_eq!(snapshot.rule_id, "verify-blocked");
        assert_eq!(snapshot.badge, Badge::Blocker);
        assert!(snapshot.is_blocked());
    }

    #[test]
    fn test_unit_blocker_labels_highest_observed_phase() {
        let state = fold_events(vec![
            event(
                EventKind::BuildStep {
                    phase: PhaseNum::new(1.0),
                    unit_id: Some("auth".to_string()),
                },
                Outcome::Pass,
                1,
            ),
            event(
                EventKind::BuildStep {
                    phase: PhaseNum::new(2.0),
                    unit_id: Some("auth".to_string()),
                },
                Outcome::Error,
                2,
            ),
        ]);
        let snapshot = assemble(&state, FlowVariant::Mixed, 5);
        assert_eq!(snapshot.rule_id, "unit-blocked");
        assert_eq!(snapshot.label.as_deref(), Some("unit auth: build phase 2"));
    }

    #[test]
    fn test_structural_cascade_ready_for_plan_requires_classification_pass() {
        let check_pass = event(
            EventKind::StructuralGate {
                gate: StructuralGate::Check,
            },
            Outcome::Pass,
            1,
        );

        let absent = fold_events(vec![check_pass.clone()]);
        let snapshot = assemble(&absent, FlowVariant::GateDriven, 5);
        assert_eq!(snapshot.rule_id, "awaiting-classification");

        let classified = fold_events(vec![
            check_pass,
            event(EventKind::ClassificationGate, Outcome::Pass, 2),
        ]);
        let snapshot = assemble(&classified, FlowVariant::GateDriven, 5);
        assert_eq!(snapshot.rule_id, "ready-for-plan");
        assert_eq!(snapshot.label.as_deref(), Some("ready for plan"));
    }

    #[test]
    fn test_progress_gate_credit_without_exploration_events() {
        let state = fold_events(vec![
            event(
                EventKind::StructuralGate {
                    gate: StructuralGate::Check,
                },
                Outcome::Pass,
                1,
            ),
            event(
                EventKind::StructuralGate {
                    gate: StructuralGate::Plan,
                },
                Outcome::Pass,
                2,
            ),
        ]);
        assert_eq!(progress_percent(&state, 5), 30);
    }

    #[test]
    fn test_progress_terms_round_independently() {
        // 1 of 3 poc steps done: round(10/3) = 3. Plan absent, no gate: 0.
        // Build phase 2 of 5 declared: round(28.0) = 28.
        let state = fold_events(vec![
            event(
                EventKind::ExplorationStep {
                    track: ExplorationTrack::Poc,
                    step: PhaseNum::new(1.0),
                    unit_id: None,
                },
                Outcome::Pass,
                1,
            ),
            event(
                EventKind::ExplorationStep {
                    track: ExplorationTrack::Poc,
                    step: PhaseNum::new(2.0),
                    unit_id: None,
                },
                Outcome::Info,
                2,
            ),
            event(
                EventKind::ExplorationStep {
                    track: ExplorationTrack::Poc,
                    step: PhaseNum::new(3.0),
                    unit_id: None,
                },
                Outcome::Info,
                3,
            ),
            event(
                EventKind::BuildStep {
                    phase: PhaseNum::new(2.0),
                    unit_id: None,
                },
                Outcome::Pass,
                4,
            ),
        ]);
        assert_eq!(progress_percent(&state, 5), 3 + 28);
    }

    #[test]
    fn test_zero_declared_phases_contribute_nothing() {
        let state = fold_events(vec![event(
            EventKind::BuildStep {
                phase: PhaseNum::new(3.0),
                unit_id: None,
            },
            Outcome::Pass,
            1,
        )]);
        assert_eq!(progress_percent(&state, 0), 0);
    }
}
