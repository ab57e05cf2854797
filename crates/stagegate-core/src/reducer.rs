//! Status reducer — folds an ordered event log into per-scope status.
//!
//! Two precedence regimes, selected by event family:
//!
//! - **Sticky** (exploration steps, build steps): once a scope folds to
//!   pass it stays pass; an error is never downgraded by a later info,
//!   but a later error does overwrite a plain info.
//! - **Overwrite** (structural gates, classification gate, repo scan):
//!   the latest event for a checkpoint always wins.
//!
//! The asymmetry is contract, not accident: a unit that regresses at an
//! already-passed phase number keeps displaying passed until a new phase
//! number appears. Folding is pure — the same log always produces the
//! same state, and re-folding is the only way a snapshot changes.

use std::collections::BTreeMap;

use crate::domain::event::{
    EventKind, EventLog, ExplorationTrack, Outcome, PhaseNum, ScopeKey, StructuralGate,
};

/// Folded status of one sticky scope, plus the observed-error tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSlot {
    pub outcome: Outcome,

    /// Every error event observed at this scope, including ones the
    /// sticky rule ignored. Display only; never gates.
    pub retries: u32,
}

/// Accumulated per-unit build status (fold-side shape; the assembler
/// derives the snapshot-facing [`crate::domain::UnitRecord`] from it).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitFold {
    pub per_phase: BTreeMap<PhaseNum, Outcome>,
    pub retry_counts: BTreeMap<PhaseNum, u32>,
}

impl UnitFold {
    /// Highest phase number folded to pass.
    pub fn highest_passed_phase(&self) -> Option<PhaseNum> {
        self.per_phase
            .iter()
            .filter(|(_, o)| **o == Outcome::Pass)
            .map(|(p, _)| *p)
            .next_back()
    }

    /// Highest phase number observed at all.
    pub fn highest_phase(&self) -> Option<PhaseNum> {
        self.per_phase.keys().next_back().copied()
    }

    /// Error if any phase is error; else info if any phase is info; else pass.
    pub fn aggregated_outcome(&self) -> Outcome {
        if self.per_phase.values().any(|o| *o == Outcome::Error) {
            Outcome::Error
        } else if self.per_phase.values().any(|o| *o == Outcome::Info) {
            Outcome::Info
        } else {
            Outcome::Pass
        }
    }
}

/// Complete folded state of one iteration's event log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldState {
    /// Structural gates, latest event wins.
    pub structural: BTreeMap<StructuralGate, Outcome>,

    /// Classification gate, latest event wins.
    pub classification: Option<Outcome>,

    /// Repository completion scan, latest event wins.
    pub scan: Option<Outcome>,

    /// Build status grouped by unit id.
    pub units: BTreeMap<String, UnitFold>,

    /// Build steps that named no unit (legacy layout).
    pub legacy_phases: BTreeMap<PhaseNum, ScopeSlot>,

    /// Exploration scopes on the poc track.
    pub poc_steps: BTreeMap<ScopeKey, Outcome>,

    /// Exploration scopes on the plan track.
    pub plan_steps: BTreeMap<ScopeKey, Outcome>,

    /// Events folded, for observability.
    pub event_count: usize,
}

impl FoldState {
    /// Structural gate outcome, if any event was folded for it.
    pub fn gate(&self, gate: StructuralGate) -> Option<Outcome> {
        self.structural.get(&gate).copied()
    }

    /// Highest build phase folded to pass across units and legacy phases.
    pub fn highest_passed_build_phase(&self) -> Option<PhaseNum> {
        let from_units = self
            .units
            .values()
            .filter_map(UnitFold::highest_passed_phase)
            .max();
        let from_legacy = self
            .legacy_phases
            .iter()
            .filter(|(_, s)| s.outcome == Outcome::Pass)
            .map(|(p, _)| *p)
            .next_back();
        from_units.into_iter().chain(from_legacy).max()
    }

    /// Whether any exploration-step event was folded.
    pub fn has_exploration_events(&self) -> bool {
        !self.poc_steps.is_empty() || !self.plan_steps.is_empty()
    }

    /// Whether any structural-gate event was folded.
    pub fn has_structural_events(&self) -> bool {
        !self.structural.is_empty()
    }
}

/// Sticky precedence: pass is terminal; error resists info; everything
/// else overwrites.
fn sticky_merge(existing: Option<Outcome>, incoming: Outcome) -> Outcome {
    match existing {
        Some(Outcome::Pass) => Outcome::Pass,
        Some(Outcome::Error) if incoming == Outcome::Info => Outcome::Error,
        _ => incoming,
    }
}

/// Fold an ordered event log into per-scope status.
///
/// Pure and idempotent: snapshots are always produced by re-folding,
/// never by patching a previous result.
pub fn fold(log: &EventLog) -> FoldState {
    let mut state = FoldState {
        event_count: log.len(),
        ..FoldState::default()
    };

    for event in log.events() {
        match &event.kind {
            EventKind::StructuralGate { gate } => {
                state.structural.insert(*gate, event.outcome);
            }
            EventKind::ClassificationGate => {
                state.classification = Some(event.outcome);
            }
            EventKind::RepoScan => {
                state.scan = Some(event.outcome);
            }
            EventKind::ExplorationStep {
                track,
                step,
                unit_id,
            } => {
                let key = ScopeKey {
                    step: *step,
                    unit_id: unit_id.clone(),
                };
                let map = match track {
                    ExplorationTrack::Poc => &mut state.poc_steps,
                    ExplorationTrack::Plan => &mut state.plan_steps,
                };
                let merged = sticky_merge(map.get(&key).copied(), event.outcome);
                map.insert(key, merged);
            }
            EventKind::BuildStep { phase, unit_id } => match unit_id {
                Some(id) => {
                    let unit = state.units.entry(id.clone()).or_default();
                    let merged = sticky_merge(unit.per_phase.get(phase).copied(), event.outcome);
                    unit.per_phase.insert(*phase, merged);
                    if event.outcome == Outcome::Error {
                        *unit.retry_counts.entry(*phase).or_insert(0) += 1;
                    }
                }
                None => {
                    let slot = state.legacy_phases.entry(*phase).or_insert(ScopeSlot {
                        outcome: event.outcome,
                        retries: 0,
                    });
                    slot.outcome = sticky_merge(Some(slot.outcome), event.outcome);
                    if event.outcome == Outcome::Error {
                        slot.retries += 1;
                    }
                }
            },
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::PipelineEvent;

    fn build(phase: f64, unit: Option<&str>, outcome: Outcome, ts: u64) -> PipelineEvent {
        PipelineEvent {
            kind: EventKind::BuildStep {
                phase: PhaseNum::new(phase),
                unit_id: unit.map(str::to_string),
            },
            outcome,
            timestamp: ts.to_string(),
        }
    }

    fn gate_event(gate: StructuralGate, outcome: Outcome, ts: u64) -> PipelineEvent {
        PipelineEvent {
            kind: EventKind::StructuralGate { gate },
            outcome,
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_sticky_pass_is_terminal() {
        let log = EventLog::from_ordered(vec![
            build(1.0, Some("auth"), Outcome::Pass, 1),
            build(1.0, Some("auth"), Outcome::Error, 2),
            build(1.0, Some("auth"), Outcome::Info, 3),
        ]);
        let state = fold(&log);
        assert_eq!(
            state.units["auth"].per_phase[&PhaseNum::new(1.0)],
            Outcome::Pass
        );
    }

    #[test]
    fn test_sticky_error_resists_info_but_not_pass() {
        let log = EventLog::from_ordered(vec![
            build(2.0, Some("auth"), Outcome::Error, 1),
            build(2.0, Some("auth"), Outcome::Info, 2),
        ]);
        let state = fold(&log);
        assert_eq!(
            state.units["auth"].per_phase[&PhaseNum::new(2.0)],
            Outcome::Error
        );

        let log = EventLog::from_ordered(vec![
            build(2.0, Some("auth"), Outcome::Error, 1),
            build(2.0, Some("auth"), Outcome::Pass, 2),
        ]);
        let state = fold(&log);
        assert_eq!(
            state.units["auth"].per_phase[&PhaseNum::new(2.0)],
            Outcome::Pass
        );
    }

    #[test]
    fn test_later_error_overwrites_info() {
        let log = EventLog::from_ordered(vec![
            build(3.0, Some("auth"), Outcome::Info, 1),
            build(3.0, Some("auth"), Outcome::Error, 2),
        ]);
        let state = fold(&log);
        assert_eq!(
            state.units["auth"].per_phase[&PhaseNum::new(3.0)],
            Outcome::Error
        );
    }

    #[test]
    fn test_overwrite_family_latest_wins() {
        let log = EventLog::from_ordered(vec![
            gate_event(StructuralGate::Check, Outcome::Pass, 1),
            gate_event(StructuralGate::Check, Outcome::Error, 2),
        ]);
        let state = fold(&log);
        assert_eq!(state.gate(StructuralGate::Check), Some(Outcome::Error));
    }

    #[test]
    fn test_retry_counts_include_ignored_errors() {
        let log = EventLog::from_ordered(vec![
            build(1.0, Some("auth"), Outcome::Pass, 1),
            build(1.0, Some("auth"), Outcome::Error, 2),
            build(1.0, Some("auth"), Outcome::Error, 3),
        ]);
        let state = fold(&log);
        let unit = &state.units["auth"];
        assert_eq!(unit.per_phase[&PhaseNum::new(1.0)], Outcome::Pass);
        assert_eq!(unit.retry_counts[&PhaseNum::new(1.0)], 2);
    }

    #[test]
    fn test_legacy_phases_fold_separately() {
        let log = EventLog::from_ordered(vec![
            build(1.0, None, Outcome::Pass, 1),
            build(2.0, None, Outcome::Error, 2),
            build(1.0, Some("auth"), Outcome::Pass, 3),
        ]);
        let state = fold(&log);
        assert_eq!(state.legacy_phases.len(), 2);
        assert_eq!(state.units.len(), 1);
        assert_eq!(
            state.legacy_phases[&PhaseNum::new(2.0)].outcome,
            Outcome::Error
        );
    }

    #[test]
    fn test_unit_aggregates() {
        let log = EventLog::from_ordered(vec![
            build(1.0, Some("auth"), Outcome::Pass, 1),
            build(2.0, Some("auth"), Outcome::Pass, 2),
            build(3.0, Some("auth"), Outcome::Info, 3),
        ]);
        let state = fold(&log);
        let unit = &state.units["auth"];
        assert_eq!(unit.highest_passed_phase(), Some(PhaseNum::new(2.0)));
        assert_eq!(unit.highest_phase(), Some(PhaseNum::new(3.0)));
        assert_eq!(unit.aggregated_outcome(), Outcome::Info);
    }

    #[test]
    fn test_fold_is_idempotent() {
        let log = EventLog::from_ordered(vec![
            gate_event(StructuralGate::Check, Outcome::Pass, 1),
            build(1.0, Some("auth"), Outcome::Error, 2),
            build(1.0, Some("auth"), Outcome::Info, 3),
        ]);
        assert_eq!(fold(&log), fold(&log));
    }

    #[test]
    fn test_highest_passed_build_phase_spans_units_and_legacy() {
        let log = EventLog::from_ordered(vec![
            build(2.0, Some("auth"), Outcome::Pass, 1),
            build(3.0, None, Outcome::Pass, 2),
        ]);
        let state = fold(&log);
        assert_eq!(
            state.highest_passed_build_phase(),
            Some(PhaseNum::new(3.0))
        );
    }
}
