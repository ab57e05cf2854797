//! Iteration store — the filesystem boundary of the core.
//!
//! An iteration is one directory: outcome-record files (named per the
//! codec grammar) plus declaration files alongside them. Declaration
//! files and anything else outside the grammar are silently skipped by
//! the codec, so producers colocate freely. Records are immutable and
//! uniquely named; concurrent appenders can at worst leave a fold one
//! event behind, never inconsistent.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assembler::assemble;
use crate::codec::parse_event;
use crate::domain::complexity::ComplexityDecl;
use crate::domain::error::{Result, StoreError};
use crate::domain::event::EventLog;
use crate::domain::status::PipelineSnapshot;
use crate::flow::classify_flow;
use crate::obs;
use crate::reducer::fold;
use crate::tier::{LevelTier, PhaseResolver, PhaseTable};

/// Marker file indicating a conventional scripted flow (variant C).
pub const CONVENTIONAL_MARKER: &str = "pipeline.marker";

/// Per-unit complexity declarations, one JSON array.
pub const COMPLEXITY_FILE: &str = "complexity.json";

/// Declared size tier.
pub const LEVEL_FILE: &str = "level.json";

/// Optional project-local tier override table.
pub const PHASE_OVERRIDES_FILE: &str = "phase-overrides.json";

#[derive(Debug, serde::Deserialize)]
struct LevelDecl {
    tier: LevelTier,
}

/// Read-only access to one iteration directory.
#[derive(Debug, Clone)]
pub struct IterationStore {
    root: PathBuf,
}

impl IterationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted record filenames (extension stripped happens at parse time).
    ///
    /// A missing directory reads as an empty iteration, not an error.
    fn record_names(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::DirUnreadable {
            path: self.root.display().to_string(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Parse the directory into an ordered event log.
    ///
    /// Fold order is ascending filename; names outside the grammar are
    /// dropped without a diagnostic.
    pub fn read_event_log(&self) -> Result<EventLog> {
        let events = self
            .record_names()?
            .iter()
            .filter_map(|name| parse_event(stem(name)))
            .collect();
        Ok(EventLog::from_ordered(events))
    }

    /// Whether the conventional-flow marker file exists.
    pub fn has_conventional_marker(&self) -> bool {
        self.root.join(CONVENTIONAL_MARKER).is_file()
    }

    /// Per-unit complexity declarations; missing file reads as none.
    pub fn read_complexity_decls(&self) -> Result<Vec<ComplexityDecl>> {
        match self.read_json(COMPLEXITY_FILE)? {
            Some(decls) => Ok(decls),
            None => Ok(Vec::new()),
        }
    }

    /// Declared size tier, if any.
    pub fn read_tier(&self) -> Result<Option<LevelTier>> {
        Ok(self
            .read_json::<LevelDecl>(LEVEL_FILE)?
            .map(|decl| decl.tier))
    }

    /// Project-local tier override table, if present.
    pub fn read_phase_overrides(&self) -> Result<Option<PhaseTable>> {
        self.read_json(PHASE_OVERRIDES_FILE)
    }

    /// Hex digest over the sorted record filename list.
    ///
    /// Cheap change detection for the cache: any appended record changes
    /// the digest, and records are never edited or deleted.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        for name in self.record_names()? {
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.root.join(file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let value =
            serde_json::from_str(&content).map_err(|source| StoreError::MalformedDeclaration {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Some(value))
    }
}

fn stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('-') => stem,
        _ => name,
    }
}

/// One complete fold-and-decide pass over an iteration directory.
///
/// Resolves the declared tier (override table → registry → built-in) for
/// the declared-phase total; an undeclared tier contributes no build
/// progress denominator beyond the observed phases.
pub fn fold_iteration(root: &Path, registry: Option<PhaseTable>) -> Result<PipelineSnapshot> {
    let _span = obs::IterationSpan::enter(&root.display().to_string());
    let store = IterationStore::new(root);
    let log = store.read_event_log()?;
    let flow = classify_flow(&log, store.has_conventional_marker());

    let resolver = PhaseResolver::new(store.read_phase_overrides()?, registry);
    let declared_phase_total = match store.read_tier()? {
        Some(tier) => resolver.resolve(tier).len(),
        None => observed_phase_total(&log),
    };

    let state = fold(&log);
    let mut snapshot = assemble(&state, flow, declared_phase_total);
    snapshot.fingerprint = Some(store.fingerprint()?);

    obs::emit_fold_completed(
        &root.display().to_string(),
        state.event_count,
        &snapshot.rule_id,
        snapshot.progress_percent,
    );

    Ok(snapshot)
}

/// Distinct build phases observed in the log — the declared-total
/// fallback for iterations with no tier declaration.
fn observed_phase_total(log: &EventLog) -> usize {
    use crate::domain::event::EventKind;
    use std::collections::BTreeSet;

    let mut phases = BTreeSet::new();
    for event in log.events() {
        if let EventKind::BuildStep { phase, .. } = &event.kind {
            phases.insert(*phase);
        }
    }
    phases.len()
}
