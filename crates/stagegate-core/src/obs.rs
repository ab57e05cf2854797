//! Structured observability hooks for fold and gate decisions.
//!
//! Events are emitted at `info!` level; configure verbosity via the
//! `RUST_LOG` env var (see [`crate::telemetry::init_tracing`]).

use tracing::info;

/// RAII guard that enters an iteration-scoped tracing span.
pub struct IterationSpan {
    _span: tracing::span::EnteredSpan,
}

impl IterationSpan {
    /// Create and enter a span tagged with the iteration path.
    pub fn enter(iteration: &str) -> Self {
        let span = tracing::info_span!("stagegate.iteration", iteration = %iteration);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: one fold-and-decide pass completed.
pub fn emit_fold_completed(iteration: &str, event_count: usize, rule_id: &str, progress: u8) {
    info!(
        event = "fold.completed",
        iteration = %iteration,
        events = event_count,
        rule = %rule_id,
        progress = progress,
    );
}

/// Emit event: a budget verdict was produced for a unit.
pub fn emit_budget_evaluated(unit: &str, blockers: usize, warnings: usize) {
    info!(
        event = "budget.evaluated",
        unit = %unit,
        blockers = blockers,
        warnings = warnings,
    );
}

/// Emit event: a refresh mark was broadcast to viewers.
pub fn emit_refresh_broadcast(delivered: usize) {
    info!(event = "refresh.broadcast", delivered = delivered);
}
