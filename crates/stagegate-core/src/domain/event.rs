//! Outcome records and the event log they form.
//!
//! Each pipeline stage leaves behind an immutable, filename-encoded record
//! of its outcome. The codec parses filenames into [`PipelineEvent`]s; the
//! reducer folds an ordered [`EventLog`] of them into current status.
//! Events are never edited in place and never deleted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical outcome of a single recorded stage attempt.
///
/// The three-severity model of the whole system: `Pass` is informational,
/// `Info` is surfaced but non-blocking, `Error` blocks progression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Error,
    Info,
}

impl Outcome {
    /// Whether this outcome blocks progression.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// One of the five named structural gates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StructuralGate {
    Check,
    Plan,
    Shrink,
    Expand,
    Verify,
}

impl StructuralGate {
    /// Gate name as it appears in event filenames.
    pub fn name(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Plan => "plan",
            Self::Shrink => "shrink",
            Self::Expand => "expand",
            Self::Verify => "verify",
        }
    }
}

/// Which exploration track a step belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationTrack {
    Poc,
    Plan,
}

/// A step or phase number. May be fractional (`3.5` slots a late insertion
/// between `3` and `4` without renumbering).
///
/// Ordering uses `f64::total_cmp` so the type can key a `BTreeMap`; the
/// grammar only ever produces non-negative finite values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PhaseNum(f64);

impl PhaseNum {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Parse a decimal step number (`"2"`, `"3.5"`).
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<f64>().ok().filter(|v| v.is_finite()).map(Self)
    }
}

impl Eq for PhaseNum {}

impl Ord for PhaseNum {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for PhaseNum {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for PhaseNum {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for PhaseNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for PhaseNum {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// The bucket an event is folded into within a sticky family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeKey {
    /// Step or phase number.
    pub step: PhaseNum,

    /// Owning unit, when the record names one.
    pub unit_id: Option<String>,
}

/// Classification and payload of a recorded outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum EventKind {
    /// A named structural gate evaluation (overwrite family).
    StructuralGate { gate: StructuralGate },

    /// The situational-classification check (overwrite family).
    ClassificationGate,

    /// The whole-repository completion scan (overwrite family).
    RepoScan,

    /// One exploration step on the poc or plan track (sticky family).
    ExplorationStep {
        track: ExplorationTrack,
        step: PhaseNum,
        unit_id: Option<String>,
    },

    /// One build phase, optionally scoped to a unit (sticky family).
    BuildStep {
        phase: PhaseNum,
        unit_id: Option<String>,
    },
}

/// A single outcome record, parsed from one filename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineEvent {
    /// Event classification and payload.
    pub kind: EventKind,

    /// Canonicalized outcome.
    pub outcome: Outcome,

    /// Sortable timestamp suffix, carried verbatim from the filename.
    pub timestamp: String,
}

/// Ordered, immutable event sequence for one iteration.
///
/// Fold order is ascending filename, which embeds the timestamp; the
/// store guarantees that order at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventLog {
    events: Vec<PipelineEvent>,
}

impl EventLog {
    /// Build a log from events already in ascending filename order.
    pub fn from_ordered(events: Vec<PipelineEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// A new log with one event appended. The log itself is never mutated;
    /// snapshots are produced by re-folding, never by patching.
    pub fn with_appended(&self, event: PipelineEvent) -> Self {
        let mut events = self.events.clone();
        events.push(event);
        Self { events }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_num_ordering() {
        let mut phases = vec![PhaseNum::new(3.5), PhaseNum::new(1.0), PhaseNum::new(2.0)];
        phases.sort();
        assert_eq!(phases[0], PhaseNum::new(1.0));
        assert_eq!(phases[2], PhaseNum::new(3.5));
    }

    #[test]
    fn test_phase_num_parse_fractional() {
        assert_eq!(PhaseNum::parse("2"), Some(PhaseNum::new(2.0)));
        assert_eq!(PhaseNum::parse("3.5"), Some(PhaseNum::new(3.5)));
        assert_eq!(PhaseNum::parse("x"), None);
    }

    #[test]
    fn test_phase_num_display_trims_integer() {
        assert_eq!(PhaseNum::new(2.0).to_string(), "2");
        assert_eq!(PhaseNum::new(3.5).to_string(), "3.5");
    }

    #[test]
    fn test_event_log_append_does_not_mutate() {
        let log = EventLog::from_ordered(vec![]);
        let event = PipelineEvent {
            kind: EventKind::RepoScan,
            outcome: Outcome::Pass,
            timestamp: "1700000000000".to_string(),
        };
        let appended = log.with_appended(event);
        assert!(log.is_empty());
        assert_eq!(appended.len(), 1);
    }

    #[test]
    fn test_event_kind_serde_tagged() {
        let kind = EventKind::BuildStep {
            phase: PhaseNum::new(2.0),
            unit_id: Some("auth".to_string()),
        };
        let json = serde_json::to_string(&kind).expect("serialize");
        assert!(json.contains("\"family\":\"build_step\""));
        let back: EventKind = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(kind, back);
    }

    #[test]
    fn test_outcome_blocking() {
        assert!(Outcome::Error.is_blocking());
        assert!(!Outcome::Pass.is_blocking());
        assert!(!Outcome::Info.is_blocking());
    }
}
