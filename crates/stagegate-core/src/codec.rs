//! Filename codec for outcome records.
//!
//! Each record is encoded entirely in its filename; the file body is never
//! read. One grammar per event family, timestamp as a digit-run suffix
//! (producers write fixed-width epoch millis, so lexicographic filename
//! order equals chronological order). A filename matching no grammar
//! yields `None` and is silently dropped — the reducer only ever sees
//! recognized events.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::event::{
    EventKind, ExplorationTrack, Outcome, PhaseNum, PipelineEvent, StructuralGate,
};

/// Outcome words accepted as pass besides the literal `pass`.
const PASS_SYNONYMS: &[&str] = &["passed", "smoke-test", "ok", "done", "complete"];

/// Canonicalize a free-text outcome word.
///
/// Contains `error`/`fail` → error; `pass` or an accepted synonym → pass;
/// anything else → info.
pub fn canonical_outcome(word: &str) -> Outcome {
    let w = word.to_ascii_lowercase();
    if w.contains("error") || w.contains("fail") {
        Outcome::Error
    } else if w == "pass" || PASS_SYNONYMS.contains(&w.as_str()) {
        Outcome::Pass
    } else {
        Outcome::Info
    }
}

fn structural_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^gate-(check|plan|shrink|expand|verify)-(pass|error|fail)-(\d+)$")
            .expect("structural gate grammar")
    })
}

fn classification_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^cynefin-check-(pass|fail)-(\d+)$").expect("classification grammar"))
}

fn scan_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^scan-scan-(pass|error|fail|info)-(\d+)$").expect("scan grammar"))
}

fn exploration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unit ids are word characters only, so the free-text outcome word may
    // itself contain dashes (`smoke-test`).
    RE.get_or_init(|| {
        Regex::new(r"^(poc|plan)-step-(\d+(?:\.\d+)?)(?:-unit-(\w+))?-(.+?)-(\d+)$")
            .expect("exploration step grammar")
    })
}

fn build_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^build-phase-(\d+(?:\.\d+)?)(?:-unit-(\w+))?-(.+?)-(\d+)$")
            .expect("build step grammar")
    })
}

/// Parse one record filename (extension already stripped) into an event.
///
/// Returns `None` for anything outside the five grammars.
pub fn parse_event(name: &str) -> Option<PipelineEvent> {
    if let Some(caps) = structural_re().captures(name) {
        let gate = match &caps[1] {
            "check" => StructuralGate::Check,
            "plan" => StructuralGate::Plan,
            "shrink" => StructuralGate::Shrink,
            "expand" => StructuralGate::Expand,
            _ => StructuralGate::Verify,
        };
        return Some(PipelineEvent {
            kind: EventKind::StructuralGate { gate },
            outcome: canonical_outcome(&caps[2]),
            timestamp: caps[3].to_string(),
        });
    }

    if let Some(caps) = classification_re().captures(name) {
        return Some(PipelineEvent {
            kind: EventKind::ClassificationGate,
            outcome: canonical_outcome(&caps[1]),
            timestamp: caps[2].to_string(),
        });
    }

    if let Some(caps) = scan_re().captures(name) {
        return Some(PipelineEvent {
            kind: EventKind::RepoScan,
            outcome: canonical_outcome(&caps[1]),
            timestamp: caps[2].to_string(),
        });
    }

    if let Some(caps) = exploration_re().captures(name) {
        let track = if &caps[1] == "poc" {
            ExplorationTrack::Poc
        } else {
            ExplorationTrack::Plan
        };
        let step = PhaseNum::parse(&caps[2])?;
        return Some(PipelineEvent {
            kind: EventKind::ExplorationStep {
                track,
                step,
                unit_id: caps.get(3).map(|m| m.as_str().to_string()),
            },
            outcome: canonical_outcome(&caps[4]),
            timestamp: caps[5].to_string(),
        });
    }

    if let Some(caps) = build_re().captures(name) {
        let phase = PhaseNum::parse(&caps[1])?;
        return Some(PipelineEvent {
            kind: EventKind::BuildStep {
                phase,
                unit_id: caps.get(2).map(|m| m.as_str().to_string()),
            },
            outcome: canonical_outcome(&caps[3]),
            timestamp: caps[4].to_string(),
        });
    }

    None
}
