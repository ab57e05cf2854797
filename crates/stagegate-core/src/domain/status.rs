//! Snapshot-facing status types: badges, unit records, the assembled
//! [`PipelineSnapshot`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::{Outcome, PhaseNum};

/// Three-valued human-facing summary of a checkpoint's or unit's status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Pass,
    Warning,
    Blocker,
}

impl Badge {
    /// CSS class consumed by the dashboard.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Pass => "status-pass",
            Self::Warning => "status-warning",
            Self::Blocker => "status-blocker",
        }
    }
}

impl From<Outcome> for Badge {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Pass => Self::Pass,
            Outcome::Error => Self::Blocker,
            Outcome::Info => Self::Warning,
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Warning => "warning",
            Self::Blocker => "blocker",
        };
        write!(f, "{s}")
    }
}

/// Coarse progression state of the current checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// The iteration is complete.
    Done,
    /// Work is moving through a checkpoint.
    InProgress,
    /// A blocker holds progression.
    Blocked,
    /// Between checkpoints, waiting for the driver to start the next stage.
    Idle,
    /// No recognized events folded yet.
    NotStarted,
}

impl GateStatus {
    /// Whether the driver may run the next stage.
    pub fn allows_advance(self) -> bool {
        matches!(self, Self::Done | Self::InProgress | Self::Idle)
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Done => "done",
            Self::InProgress => "in-progress",
            Self::Blocked => "blocked",
            Self::Idle => "idle",
            Self::NotStarted => "not-started",
        };
        write!(f, "{s}")
    }
}

/// Which pipeline variant produced an event log. Selects vocabulary only;
/// no gating decision depends on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowVariant {
    /// Both structural gates and exploration steps present.
    Mixed,
    /// Structural gates only.
    GateDriven,
    /// Exploration steps only.
    StepDriven,
    /// No recognized events, but the conventional marker file exists.
    Conventional,
}

impl fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mixed => "mixed",
            Self::GateDriven => "gate-driven",
            Self::StepDriven => "step-driven",
            Self::Conventional => "conventional",
        };
        write!(f, "{s}")
    }
}

/// Status of one build phase within a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseStatus {
    /// Phase number.
    pub phase: PhaseNum,

    /// Folded outcome after precedence rules.
    pub outcome: Outcome,

    /// Error events observed at this phase. Display only; never gates.
    pub retries: u32,
}

/// One independently tracked piece of planned work within an iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitRecord {
    pub unit_id: String,

    /// Per-phase status in ascending phase order.
    pub phases: Vec<PhaseStatus>,

    /// Highest phase number folded to pass.
    pub highest_passed_phase: Option<PhaseNum>,

    /// Error if any phase is error; else info if any phase is info; else pass.
    pub aggregated: Outcome,

    pub badge: Badge,
}

/// The assembled answer both consumers read: where the pipeline stands and
/// whether work may advance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSnapshot {
    /// Pipeline variant, for vocabulary selection.
    pub flow: FlowVariant,

    /// Decision-table rule that produced this answer.
    pub rule_id: String,

    /// Current checkpoint label; `None` when the iteration has not started.
    pub label: Option<String>,

    pub badge: Badge,

    /// CSS class mirroring `badge`, for the dashboard.
    pub badge_class: String,

    /// 0..=100 under chronological folding of well-declared iterations.
    pub progress_percent: u8,

    /// Unit records in unit-id order.
    pub units: Vec<UnitRecord>,

    pub gate_status: GateStatus,

    /// Hex digest of the folded filename list, when folded from disk.
    pub fingerprint: Option<String>,
}

impl PipelineSnapshot {
    /// Whether the driver should stop and report instead of running the
    /// next stage.
    pub fn is_blocked(&self) -> bool {
        self.gate_status == GateStatus::Blocked
    }
}
