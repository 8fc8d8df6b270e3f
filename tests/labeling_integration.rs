//! End-to-end tests for the labeling pipeline.
//!
//! Each test builds the stages over a temporary record file and simulates one
//! or more pipeline runs, dropping the store between runs to mimic a process
//! restart.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use labelgate::pipeline::{ConcurrentTransform, collect_items};
use labelgate::{
    ContentHasher, DumpPolicy, Error, FileItem, LabelStages, LabelgateConfig, Pipeline,
    PipelineItem, RecordStore,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn record_path(dir: &TempDir) -> PathBuf {
    dir.path().join("labeled.json")
}

/// Creates stages over a fresh store, as a new process would.
fn fresh_stages(dir: &TempDir) -> LabelStages {
    LabelStages::new(Arc::new(RecordStore::new(record_path(dir))))
}

/// Runs the full filter → label → dump chain.
async fn full_run(stages: &LabelStages, items: Vec<FileItem>) -> Vec<FileItem> {
    Pipeline::new()
        .stage(stages.not_labeled())
        .stage(stages.label())
        .stage(stages.dump())
        .run(items)
        .await
        .expect("pipeline run failed")
        .items
}

fn sorted_paths(items: &[FileItem]) -> Vec<String> {
    let mut paths: Vec<_> = items
        .iter()
        .map(|i| i.path().display().to_string())
        .collect();
    paths.sort();
    paths
}

fn read_record(dir: &TempDir) -> Vec<String> {
    let raw = fs::read_to_string(record_path(dir)).expect("record file missing");
    serde_json::from_str(&raw).expect("record file is not a JSON array")
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_hello_scenario_writes_single_hash() {
    let dir = TempDir::new().unwrap();
    let stages = fresh_stages(&dir);
    assert_eq!(stages.store().load().unwrap(), 0);

    let out = Pipeline::new()
        .stage(stages.label())
        .stage(stages.dump())
        .run(vec![FileItem::buffer("hello.txt", "hello")])
        .await
        .unwrap();

    assert_eq!(out.items.len(), 1);
    assert_eq!(
        read_record(&dir),
        vec!["2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"]
    );
}

#[tokio::test]
async fn test_label_then_filter_across_runs() {
    let dir = TempDir::new().unwrap();

    let first = full_run(&fresh_stages(&dir), vec![FileItem::buffer("a", "A")]).await;
    assert_eq!(sorted_paths(&first), vec!["a"]);

    let second = full_run(
        &fresh_stages(&dir),
        vec![FileItem::buffer("a-again", "A"), FileItem::buffer("b", "B")],
    )
    .await;
    assert_eq!(sorted_paths(&second), vec!["b"]);

    let third = full_run(
        &fresh_stages(&dir),
        vec![FileItem::buffer("a", "A"), FileItem::buffer("b", "B")],
    )
    .await;
    assert!(third.is_empty());
    assert_eq!(read_record(&dir).len(), 2);
}

#[tokio::test]
async fn test_directories_survive_full_run() {
    let dir = TempDir::new().unwrap();
    let stages = fresh_stages(&dir);

    let out = full_run(&stages, vec![FileItem::directory("assets")]).await;

    assert_eq!(out, vec![FileItem::directory("assets")]);
    assert!(!record_path(&dir).exists());
}

#[tokio::test]
async fn test_many_items_under_concurrency() {
    let dir = TempDir::new().unwrap();
    let stages = fresh_stages(&dir);
    let items: Vec<_> = (0..200)
        .map(|i| FileItem::buffer(format!("f{i}"), format!("content {i}")))
        .collect();

    let out = full_run(&stages, items).await;
    assert_eq!(out.len(), 200);

    let record = read_record(&dir);
    assert_eq!(record.len(), 200);
    assert_eq!(stages.store().len().unwrap(), 200);
}

#[tokio::test]
async fn test_duplicate_content_in_one_run_is_labeled_once() {
    let dir = TempDir::new().unwrap();
    let stages = fresh_stages(&dir);

    // Both copies pass the filter because neither is labeled yet.
    let out = full_run(
        &stages,
        vec![FileItem::buffer("one", "same"), FileItem::buffer("two", "same")],
    )
    .await;

    assert_eq!(out.len(), 2);
    assert_eq!(read_record(&dir), vec![ContentHasher::hash(b"same").to_string()]);
}

#[tokio::test]
async fn test_on_finish_policy_persists_all_labels() {
    let dir = TempDir::new().unwrap();
    let config = LabelgateConfig::default()
        .with_record_path(record_path(&dir))
        .with_dump_policy(DumpPolicy::OnFinish);
    let stages = LabelStages::from_config(&config);

    full_run(
        &stages,
        (0u8..20)
            .map(|i| FileItem::buffer(format!("f{i}"), vec![i]))
            .collect(),
    )
    .await;

    assert_eq!(read_record(&dir).len(), 20);
}

#[tokio::test]
async fn test_external_processing_between_stages() {
    let dir = TempDir::new().unwrap();
    let stages = fresh_stages(&dir);

    let output = Pipeline::new()
        .stage(stages.not_labeled())
        .stage(ConcurrentTransform::from_fn("reject_tmp", |item: FileItem| {
            let is_tmp = item.path().extension().is_some_and(|ext| ext == "tmp");
            Ok((!is_tmp).then_some(item))
        }))
        .stage(stages.label())
        .stage(stages.dump())
        .run(vec![
            FileItem::buffer("keep.txt", "keep"),
            FileItem::buffer("scratch.tmp", "scratch"),
        ])
        .await
        .unwrap();

    assert_eq!(sorted_paths(&output.items), vec!["keep.txt"]);
    assert_eq!(output.stats.len(), 4);
    assert_eq!(output.stats[1].dropped, 1);
    // Rejected items never reach the label stage.
    assert_eq!(read_record(&dir), vec![ContentHasher::hash(b"keep").to_string()]);
}

#[tokio::test]
async fn test_directory_source_round_trip() {
    let assets = TempDir::new().unwrap();
    fs::create_dir(assets.path().join("nested")).unwrap();
    fs::write(assets.path().join("a.txt"), "alpha").unwrap();
    fs::write(assets.path().join("nested").join("b.txt"), "beta").unwrap();

    let state = TempDir::new().unwrap();
    let first = full_run(&fresh_stages(&state), collect_items(assets.path()).unwrap()).await;
    assert_eq!(first.len(), 3);

    fs::write(assets.path().join("c.txt"), "gamma").unwrap();
    let second = full_run(&fresh_stages(&state), collect_items(assets.path()).unwrap()).await;

    let names: Vec<_> = second
        .iter()
        .filter(|i| !i.is_null())
        .map(|i| i.path().file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["c.txt"]);
    assert!(second.iter().any(|i| i.path() == assets.path().join("nested")));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_corrupt_record_fails_pipeline() {
    let dir = TempDir::new().unwrap();
    fs::write(record_path(&dir), "[\"unterminated").unwrap();

    let result = Pipeline::new()
        .stage(fresh_stages(&dir).not_labeled())
        .run(vec![FileItem::buffer("a", "A")])
        .await;

    assert!(matches!(result, Err(Error::RecordParse { .. })));
}

#[tokio::test]
async fn test_stream_item_fails_pipeline() {
    let dir = TempDir::new().unwrap();
    let stages = fresh_stages(&dir);

    let result = Pipeline::new()
        .stage(stages.not_labeled())
        .stage(stages.label())
        .run(vec![FileItem::buffer("a", "A"), FileItem::stream("b")])
        .await;

    assert!(matches!(result, Err(Error::HashCompute(_))));
}

#[tokio::test]
async fn test_unwritable_record_fails_dump() {
    let dir = TempDir::new().unwrap();
    let stages = fresh_stages(&dir);
    stages.store().load().unwrap();
    fs::create_dir(record_path(&dir)).unwrap();

    let result = Pipeline::new()
        .stage(stages.label())
        .stage(stages.dump())
        .run(vec![FileItem::buffer("a", "A")])
        .await;

    assert!(matches!(result, Err(Error::FileWrite { .. })));
}
