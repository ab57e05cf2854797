//! Level phase selector — maps a declared size tier to its ordered
//! build-checkpoint list.
//!
//! Resolution is per tier: a project-local override table wins, then the
//! shared registry, then the built-in fallback. Sources are never merged,
//! and the selector does not enforce the intended S ⊂ M ⊂ L shape — it
//! trusts whichever source answered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared size tier of an iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LevelTier {
    S,
    M,
    L,
}

impl LevelTier {
    pub fn name(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
        }
    }
}

/// Ordered checkpoint list plus the test-evidence flag for one tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhasePlan {
    /// Build checkpoints in execution order.
    pub checkpoints: Vec<String>,

    /// Whether test evidence must accompany the build phases.
    pub evidence_required: bool,
}

impl PhasePlan {
    fn new(checkpoints: &[&str], evidence_required: bool) -> Self {
        Self {
            checkpoints: checkpoints.iter().map(|s| s.to_string()).collect(),
            evidence_required,
        }
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, checkpoint: &str) -> bool {
        self.checkpoints.iter().any(|c| c == checkpoint)
    }

    /// The checkpoint after the given one, if any.
    pub fn next_after(&self, checkpoint: &str) -> Option<&str> {
        let idx = self.checkpoints.iter().position(|c| c == checkpoint)?;
        self.checkpoints.get(idx + 1).map(String::as_str)
    }

    /// Whether the given checkpoint is the last in the plan.
    pub fn is_last(&self, checkpoint: &str) -> bool {
        self.checkpoints.last().is_some_and(|c| c == checkpoint)
    }
}

/// A tier-to-plan table, as read from an override or registry file.
pub type PhaseTable = BTreeMap<LevelTier, PhasePlan>;

/// Built-in fallback plans. S skips test authoring and execution; M adds
/// them; L adds the stricter integration checkpoint.
pub fn builtin_plan(tier: LevelTier) -> PhasePlan {
    match tier {
        LevelTier::S => PhasePlan::new(&["scaffold", "implement", "self-review"], false),
        LevelTier::M => PhasePlan::new(
            &["scaffold", "implement", "test-author", "test-run", "self-review"],
            true,
        ),
        LevelTier::L => PhasePlan::new(
            &[
                "scaffold",
                "implement",
                "test-author",
                "test-run",
                "self-review",
                "integration-check",
            ],
            true,
        ),
    }
}

/// Resolves tier plans from prioritized sources.
#[derive(Debug, Clone, Default)]
pub struct PhaseResolver {
    /// Project-local override table, highest priority.
    pub project_overrides: Option<PhaseTable>,

    /// Shared declarative registry.
    pub registry: Option<PhaseTable>,
}

impl PhaseResolver {
    pub fn new(project_overrides: Option<PhaseTable>, registry: Option<PhaseTable>) -> Self {
        Self {
            project_overrides,
            registry,
        }
    }

    /// Resolve the plan for a tier: overrides, then registry, then the
    /// built-in fallback. First source holding the tier wins.
    pub fn resolve(&self, tier: LevelTier) -> PhasePlan {
        if let Some(plan) = self
            .project_overrides
            .as_ref()
            .and_then(|table| table.get(&tier))
        {
            return plan.clone();
        }
        if let Some(plan) = self.registry.as_ref().and_then(|table| table.get(&tier)) {
            return plan.clone();
        }
        builtin_plan(tier)
    }
}
