//! End-to-end folds over real iteration directories.

use std::fs;
use std::path::Path;

use stagegate_core::{
    fold_iteration, FlowVariant, GateStatus, IterationStore, LevelTier, CONVENTIONAL_MARKER,
};
use tempfile::TempDir;

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"").expect("write record");
}

#[test]
fn folds_records_in_filename_order() {
    let dir = TempDir::new().expect("tempdir");
    // Written out of order; the fold must sort by filename.
    touch(dir.path(), "gate-check-error-1700000000200");
    touch(dir.path(), "gate-check-pass-1700000000100");

    let snapshot = fold_iteration(dir.path(), None).expect("snapshot");
    // Latest gate event (200) wins under the overwrite family.
    assert_eq!(snapshot.rule_id, "check-blocked");
}

#[test]
fn declaration_files_are_not_events() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "build-phase-1-unit-auth-pass-1700000000100");
    fs::write(
        dir.path().join("complexity.json"),
        r#"[{"name": "auth", "domain": "clear"}]"#,
    )
    .expect("write decls");
    fs::write(dir.path().join("level.json"), r#"{"tier": "M"}"#).expect("write level");

    let store = IterationStore::new(dir.path());
    assert_eq!(store.read_event_log().expect("log").len(), 1);
    assert_eq!(store.read_complexity_decls().expect("decls").len(), 1);
    assert_eq!(store.read_tier().expect("tier"), Some(LevelTier::M));
}

#[test]
fn extension_suffixed_records_still_fold() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "gate-verify-pass-1700000000100.json");

    let snapshot = fold_iteration(dir.path(), None).expect("snapshot");
    assert_eq!(snapshot.rule_id, "pipeline-complete");
    assert_eq!(snapshot.progress_percent, 100);
}

#[test]
fn marker_file_selects_conventional_variant() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), CONVENTIONAL_MARKER);

    let snapshot = fold_iteration(dir.path(), None).expect("snapshot");
    assert_eq!(snapshot.flow, FlowVariant::Conventional);
    assert_eq!(snapshot.gate_status, GateStatus::NotStarted);
}

#[test]
fn declared_tier_sets_the_build_denominator() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("level.json"), r#"{"tier": "S"}"#).expect("write level");
    // Phase 3 of S's 3 built-in checkpoints: full build credit.
    touch(dir.path(), "build-phase-3-unit-auth-pass-1700000000100");

    let snapshot = fold_iteration(dir.path(), None).expect("snapshot");
    assert_eq!(snapshot.progress_percent, 70);
}

#[test]
fn project_override_beats_builtin_plan() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("level.json"), r#"{"tier": "S"}"#).expect("write level");
    fs::write(
        dir.path().join("phase-overrides.json"),
        r#"{"S": {"checkpoints": ["a", "b", "c", "d", "e", "f", "g"], "evidenceRequired": false}}"#,
    )
    .expect("write overrides");
    touch(dir.path(), "build-phase-3-unit-auth-pass-1700000000100");

    let snapshot = fold_iteration(dir.path(), None).expect("snapshot");
    // 3 of 7 declared phases: round(30.0) = 30.
    assert_eq!(snapshot.progress_percent, 30);
}

#[test]
fn fingerprint_changes_only_when_records_are_added() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "gate-check-pass-1700000000100");
    let store = IterationStore::new(dir.path());

    let first = store.fingerprint().expect("fingerprint");
    assert_eq!(first, store.fingerprint().expect("fingerprint"));

    touch(dir.path(), "gate-plan-pass-1700000000200");
    assert_ne!(first, store.fingerprint().expect("fingerprint"));
}

#[test]
fn snapshot_carries_the_fingerprint() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "gate-check-pass-1700000000100");

    let snapshot = fold_iteration(dir.path(), None).expect("snapshot");
    let store = IterationStore::new(dir.path());
    assert_eq!(
        snapshot.fingerprint.as_deref(),
        Some(store.fingerprint().expect("fingerprint").as_str())
    );
}

#[test]
fn missing_directory_is_an_empty_iteration() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("iter-404");
    let snapshot = fold_iteration(&missing, None).expect("snapshot");
    assert_eq!(snapshot.rule_id, "not-started");
    assert_eq!(snapshot.progress_percent, 0);
}

#[test]
fn malformed_declaration_is_reported_not_swallowed() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("complexity.json"), "{not json").expect("write");
    let store = IterationStore::new(dir.path());
    let err = store.read_complexity_decls().expect_err("malformed");
    assert!(err.to_string().contains("complexity.json"));
}
