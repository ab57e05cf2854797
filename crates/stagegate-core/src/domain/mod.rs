//! Domain model: events, statuses, complexity declarations, errors.

pub mod complexity;
pub mod error;
pub mod event;
pub mod status;

pub use complexity::{
    ComplexityDecl, DomainKind, IssueLevel, IterationBudget, ReviewIssue, ThreeQuestions,
};
pub use error::{Result, StoreError};
pub use event::{
    EventKind, EventLog, ExplorationTrack, Outcome, PhaseNum, PipelineEvent, ScopeKey,
    StructuralGate,
};
pub use status::{
    Badge, FlowVariant, GateStatus, PhaseStatus, PipelineSnapshot, UnitRecord,
};
