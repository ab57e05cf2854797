//! Stagegate Core Library
//!
//! Deterministic status folding and gating rules for checkpoint-gated
//! pipelines. State is always derived on demand by re-folding an
//! append-only event log; nothing here owns a mutable record of
//! "current state".

pub mod assembler;
pub mod budget;
pub mod cache;
pub mod codec;
pub mod domain;
pub mod flow;
pub mod obs;
pub mod reducer;
pub mod store;
pub mod telemetry;
pub mod tier;

pub use domain::{
    Badge, ComplexityDecl, DomainKind, EventKind, EventLog, ExplorationTrack, FlowVariant,
    GateStatus, IssueLevel, IterationBudget, Outcome, PhaseNum, PhaseStatus, PipelineEvent,
    PipelineSnapshot, Result, ReviewIssue, ScopeKey, StoreError, StructuralGate, ThreeQuestions,
    UnitRecord,
};

pub use assembler::{
    assemble, progress_percent, DecisionRule, RuleHit, DECISION_TABLE, RULE_COMPLETE,
    RULE_NOT_STARTED,
};
pub use budget::{
    evaluate_budget, BudgetIssue, BudgetVerdict, COMPLEX_DEFAULT_CAP, DEFAULT_MAX_PER_ITER,
};
pub use cache::{Refresh, RefreshNotifier, SnapshotCache};
pub use codec::{canonical_outcome, parse_event};
pub use flow::classify_flow;
pub use reducer::{fold, FoldState, ScopeSlot, UnitFold};
pub use store::{
    fold_iteration, IterationStore, COMPLEXITY_FILE, CONVENTIONAL_MARKER, LEVEL_FILE,
    PHASE_OVERRIDES_FILE,
};
pub use telemetry::init_tracing;
pub use tier::{builtin_plan, LevelTier, PhasePlan, PhaseResolver, PhaseTable};

/// Stagegate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
