//! Stagegate - checkpoint-gated pipeline driver surface
//!
//! The `stagegate` command answers, from evidence on disk, where a
//! pipeline iteration currently stands and whether work may advance.
//!
//! ## Commands
//!
//! - `status`: Fold one iteration's event log into a snapshot
//! - `budget`: Evaluate per-unit work budgets against complexity
//! - `phases`: Show the build-checkpoint plan for a size tier
//! - `next`: Show the checkpoint after a given one
//! - `classify`: Label which pipeline variant produced an iteration
//!
//! Exit code 2 signals a blocker so driver scripts can gate on it.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

use stagegate_core::{
    classify_flow, evaluate_budget, fold_iteration, obs, IterationStore, LevelTier, PhaseResolver,
    PhaseTable, PipelineSnapshot,
};

/// Exit code for a blocker, distinguishable from usage errors.
const EXIT_BLOCKED: i32 = 2;

#[derive(Parser)]
#[command(name = "stagegate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Checkpoint-gated pipeline status engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold an iteration's event log into a status snapshot
    Status {
        /// Iteration directory containing outcome records
        iteration: PathBuf,

        /// Shared phase registry file (tier -> checkpoint table)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Emit the snapshot as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Exit non-zero when the snapshot is blocked
        #[arg(long)]
        check: bool,
    },

    /// Evaluate per-unit work budgets from the iteration's declarations
    Budget {
        /// Iteration directory containing complexity.json
        iteration: PathBuf,

        /// Evaluate a single unit by name
        #[arg(long)]
        unit: Option<String>,

        /// Emit verdicts as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the ordered checkpoint plan for a size tier
    Phases {
        /// Size tier: S, M or L
        tier: String,

        /// Iteration directory holding a project-local override table
        #[arg(long)]
        iteration: Option<PathBuf>,

        /// Shared phase registry file
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Show the checkpoint after the given one for a size tier
    Next {
        /// Size tier: S, M or L
        tier: String,

        /// Current checkpoint id
        after: String,

        /// Iteration directory holding a project-local override table
        #[arg(long)]
        iteration: Option<PathBuf>,

        /// Shared phase registry file
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Label which pipeline variant produced an iteration
    Classify {
        /// Iteration directory containing outcome records
        iteration: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    stagegate_core::init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Status {
            iteration,
            registry,
            json,
            check,
        } => cmd_status(&iteration, registry.as_deref(), json, check),
        Commands::Budget {
            iteration,
            unit,
            json,
        } => cmd_budget(&iteration, unit.as_deref(), json),
        Commands::Phases {
            tier,
            iteration,
            registry,
        } => cmd_phases(&tier, iteration.as_deref(), registry.as_deref()),
        Commands::Next {
            tier,
            after,
            iteration,
            registry,
        } => cmd_next(&tier, &after, iteration.as_deref(), registry.as_deref()),
        Commands::Classify { iteration } => cmd_classify(&iteration),
    }
}

fn parse_tier(tier: &str) -> Result<LevelTier> {
    match tier.to_ascii_uppercase().as_str() {
        "S" => Ok(LevelTier::S),
        "M" => Ok(LevelTier::M),
        "L" => Ok(LevelTier::L),
        other => bail!("unknown tier '{other}' (expected S, M or L)"),
    }
}

fn load_phase_table(path: Option<&Path>) -> Result<Option<PhaseTable>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read phase registry: {}", path.display()))?;
    let table =
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(Some(table))
}

fn resolver_for(iteration: Option<&Path>, registry: Option<&Path>) -> Result<PhaseResolver> {
    let overrides = match iteration {
        Some(dir) => IterationStore::new(dir).read_phase_overrides()?,
        None => None,
    };
    Ok(PhaseResolver::new(overrides, load_phase_table(registry)?))
}

fn cmd_status(iteration: &Path, registry: Option<&Path>, json: bool, check: bool) -> Result<()> {
    let snapshot = fold_iteration(iteration, load_phase_table(registry)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(iteration, &snapshot);
    }

    if check && snapshot.is_blocked() {
        std::process::exit(EXIT_BLOCKED);
    }
    Ok(())
}

fn print_snapshot(iteration: &Path, snapshot: &PipelineSnapshot) {
    println!("Iteration: {}", iteration.display());
    println!("Flow:      {}", snapshot.flow);
    println!(
        "Label:     {}",
        snapshot.label.as_deref().unwrap_or("(not started)")
    );
    println!("Badge:     {}", snapshot.badge);
    println!("Gate:      {}", snapshot.gate_status);
    println!("Progress:  {}%", snapshot.progress_percent);

    if !snapshot.units.is_empty() {
        println!();
        println!("Units:");
        for unit in &snapshot.units {
            let phase = unit
                .highest_passed_phase
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            let retries: u32 = unit.phases.iter().map(|p| p.retries).sum();
            println!(
                "  {:<16} passed-through {:<4} {:<8} (retries: {})",
                unit.unit_id,
                phase,
                unit.badge.to_string(),
                retries
            );
        }
    }
}

fn cmd_budget(iteration: &Path, unit: Option<&str>, json: bool) -> Result<()> {
    let store = IterationStore::new(iteration);
    let decls = store.read_complexity_decls()?;

    let selected: Vec<_> = decls
        .iter()
        .filter(|d| unit.map_or(true, |u| d.name == u))
        .collect();
    if selected.is_empty() {
        if let Some(u) = unit {
            bail!("no declaration found for unit '{u}'");
        }
        println!("No complexity declarations in {}", iteration.display());
        return Ok(());
    }

    let mut any_blocker = false;
    let mut report = Vec::new();
    for decl in selected {
        let verdict = evaluate_budget(decl);
        obs::emit_budget_evaluated(&decl.name, verdict.blockers.len(), verdict.warnings.len());
        any_blocker |= !verdict.passed();
        report.push((decl.name.clone(), verdict));
    }

    if json {
        let value: serde_json::Value = report
            .iter()
            .map(|(name, verdict)| {
                serde_json::json!({ "unit": name, "verdict": verdict })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for (name, verdict) in &report {
            let state = if verdict.passed() { "pass" } else { "blocked" };
            println!("{name}: {state}");
            for issue in &verdict.blockers {
                println!("  blocker [{}] {}", issue.rule, issue.message);
                for s in &issue.suggestions {
                    println!("    - {s}");
                }
            }
            for issue in &verdict.warnings {
                println!("  warning [{}] {}", issue.rule, issue.message);
            }
        }
    }

    if any_blocker {
        std::process::exit(EXIT_BLOCKED);
    }
    Ok(())
}

fn cmd_phases(tier: &str, iteration: Option<&Path>, registry: Option<&Path>) -> Result<()> {
    let tier = parse_tier(tier)?;
    let plan = resolver_for(iteration, registry)?.resolve(tier);

    println!(
        "Tier {} ({} checkpoints, evidence {})",
        tier.name(),
        plan.len(),
        if plan.evidence_required {
            "required"
        } else {
            "optional"
        }
    );
    for checkpoint in &plan.checkpoints {
        let marker = if plan.is_last(checkpoint) { "*" } else { " " };
        println!("  {marker} {checkpoint}");
    }
    Ok(())
}

fn cmd_next(
    tier: &str,
    after: &str,
    iteration: Option<&Path>,
    registry: Option<&Path>,
) -> Result<()> {
    let tier = parse_tier(tier)?;
    let plan = resolver_for(iteration, registry)?.resolve(tier);

    if !plan.contains(after) {
        bail!("checkpoint '{after}' is not in tier {}", tier.name());
    }
    match plan.next_after(after) {
        Some(next) => println!("{next}"),
        None => println!("(last checkpoint)"),
    }
    Ok(())
}

fn cmd_classify(iteration: &Path) -> Result<()> {
    let store = IterationStore::new(iteration);
    let log = store.read_event_log()?;
    let variant = classify_flow(&log, store.has_conventional_marker());
    println!("{variant}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier_accepts_lowercase() {
        assert_eq!(parse_tier("m").expect("tier"), LevelTier::M);
        assert_eq!(parse_tier("S").expect("tier"), LevelTier::S);
        assert!(parse_tier("XL").is_err());
    }

    #[test]
    fn test_load_phase_table_absent_is_none() {
        assert!(load_phase_table(None).expect("table").is_none());
    }
}
