//! Flow classifier — labels which pipeline variant produced an event log.
//!
//! The label selects reporting vocabulary only; no gating decision keys
//! off it.

use crate::domain::event::{EventKind, EventLog};
use crate::domain::status::FlowVariant;

/// Classify an event log, with the marker-file check supplied by the store.
///
/// Priority: both structural gates and exploration steps → mixed; only
/// gates → gate-driven; only steps → step-driven; neither but the
/// conventional marker exists → conventional; otherwise step-driven.
pub fn classify_flow(log: &EventLog, has_marker: bool) -> FlowVariant {
    let mut structural = false;
    let mut exploration = false;

    for event in log.events() {
        match event.kind {
            EventKind::StructuralGate { .. } => structural = true,
            EventKind::ExplorationStep { .. } => exploration = true,
            _ => {}
        }
    }

    match (structural, exploration) {
        (true, true) => FlowVariant::Mixed,
        (true, false) => FlowVariant::GateDriven,
        (false, true) => FlowVariant::StepDriven,
        (false, false) if has_marker => FlowVariant::Conventional,
        (false, false) => FlowVariant::StepDriven,
    }
}
