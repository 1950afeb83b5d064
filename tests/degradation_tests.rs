//! Backend Degradation Tests
//!
//! Tests the one-way fallback switch:
//! - The first index failure flips the engine to the in-memory store
//! - The failed operation re-executes on the fallback before returning
//! - The switch is permanent even if the index later recovers
//! - Concurrent failures degrade cleanly, with no flapping between backends
//!
//! A controllable failing index double stands in for a dying sidecar.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use smriti_memory::{
    EngineConfig, IndexConfig, IndexHit, LocalSimilarityIndex, MemoryEngine, MemoryError,
    MemoryRecord, Metadata, RecordId, Result, ScoringConfig, SimilarityIndex,
};

// ============================================================================
// TEST INFRASTRUCTURE
// ============================================================================

/// Similarity index that fails every operation while `broken` holds.
struct FlakyIndex {
    inner: LocalSimilarityIndex,
    broken: AtomicBool,
}

impl FlakyIndex {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalSimilarityIndex::new(),
            broken: AtomicBool::new(false),
        })
    }

    fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(MemoryError::BackendUnavailable {
                backend: "flaky".to_string(),
                reason: "induced failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SimilarityIndex for FlakyIndex {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn upsert(&self, record: &MemoryRecord) -> Result<()> {
        self.check()?;
        self.inner.upsert(record).await
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>> {
        self.check()?;
        self.inner.search(query, k).await
    }

    async fn get(&self, id: &RecordId) -> Result<Option<MemoryRecord>> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.check()?;
        self.inner.delete(id).await
    }

    async fn dump(&self) -> Result<Vec<MemoryRecord>> {
        self.check()?;
        self.inner.dump().await
    }
}

fn create_test_config(temp_dir: &TempDir) -> EngineConfig {
    EngineConfig {
        data_dir: temp_dir.path().to_path_buf(),
        scoring: ScoringConfig::default(),
    }
}

fn create_flaky_engine() -> (MemoryEngine, Arc<FlakyIndex>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let flaky = FlakyIndex::new();
    let engine = MemoryEngine::new(create_test_config(&temp_dir), Some(flaky.clone()));
    (engine, flaky, temp_dir)
}

// ============================================================================
// FALLBACK SWITCH TESTS
// ============================================================================

#[tokio::test]
async fn test_engine_without_index_starts_fallback_only() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine = MemoryEngine::new(create_test_config(&temp_dir), None);

    assert!(engine.is_fallback_only());
    let id = engine
        .remember("works without any index", Metadata::new())
        .await
        .expect("Fallback-only store failed");
    let results = engine.retrieve("works", 5).await.expect("Retrieval failed");
    assert!(results.iter().any(|s| s.record.id == id));
}

#[tokio::test]
async fn test_first_failure_switches_and_reexecutes_on_fallback() {
    let (engine, flaky, _dir) = create_flaky_engine();

    engine
        .remember("indexed before the outage", Metadata::new())
        .await
        .expect("Healthy index write failed");
    assert!(!engine.is_fallback_only());

    flaky.set_broken(true);
    let id = engine
        .remember("written during the outage", Metadata::new())
        .await
        .expect("The failed write must re-execute on the fallback, not error");

    assert!(engine.is_fallback_only(), "First failure flips the switch");
    let record = engine.get(&id).await.expect("Re-executed write must be readable");
    assert_eq!(record.content, "written during the outage");

    let stats = engine.stats().await.expect("Stats failed");
    assert_eq!(stats.backend_name, "in_memory");
}

#[tokio::test]
async fn test_switch_is_permanent_after_index_recovers() {
    let (engine, flaky, _dir) = create_flaky_engine();

    flaky.set_broken(true);
    engine
        .retrieve("anything", 3)
        .await
        .expect("Failed search must degrade, not error");
    assert!(engine.is_fallback_only());

    // The sidecar coming back does not win the engine back.
    flaky.set_broken(false);
    engine
        .remember("post-recovery write", Metadata::new())
        .await
        .expect("Store failed");

    assert!(engine.is_fallback_only(), "The switch never reverts");
    assert_eq!(
        flaky.inner.len(),
        0,
        "A recovered index must receive no further writes"
    );
    let stats = engine.stats().await.expect("Stats failed");
    assert_eq!(stats.backend_name, "in_memory");
    assert_eq!(stats.total_items, 1);
}

#[tokio::test]
async fn test_index_contents_do_not_migrate() {
    let (engine, flaky, _dir) = create_flaky_engine();

    let indexed_id = engine
        .remember("only ever lived in the index", Metadata::new())
        .await
        .expect("Healthy index write failed");

    flaky.set_broken(true);
    let err = engine
        .get(&indexed_id)
        .await
        .expect_err("Index-only record is unreachable after the switch");
    assert!(err.is_not_found());
    assert!(engine.is_fallback_only());
}

#[tokio::test]
async fn test_feedback_during_outage_reexecutes_then_reports_honestly() {
    let (engine, flaky, _dir) = create_flaky_engine();

    let indexed_id = engine
        .remember("indexed record", Metadata::new())
        .await
        .expect("Healthy index write failed");

    // The outage turns this feedback into a fallback lookup, where the
    // record never existed, so the caller gets NotFound rather than a
    // backend error.
    flaky.set_broken(true);
    let err = engine
        .record_outcome(&indexed_id, true)
        .await
        .expect_err("Feedback for an unmigrated record resolves on the fallback");
    assert!(err.is_not_found());
    assert!(engine.is_fallback_only());

    // Records written after the switch take feedback normally.
    let fallback_id = engine
        .remember("fallback record", Metadata::new())
        .await
        .expect("Store failed");
    engine
        .record_outcome(&fallback_id, true)
        .await
        .expect("Feedback on a fallback record failed");
    let record = engine.get(&fallback_id).await.expect("Fetch failed");
    assert!((record.outcome_score - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn test_concurrent_failures_all_degrade_cleanly() {
    let (engine, flaky, _dir) = create_flaky_engine();
    flaky.set_broken(true);

    let (a, b, c) = tokio::join!(
        engine.retrieve("one", 3),
        engine.retrieve("two", 3),
        engine.remember("three", Metadata::new()),
    );
    a.expect("Concurrent search must degrade");
    b.expect("Concurrent search must degrade");
    c.expect("Concurrent store must degrade");

    assert!(engine.is_fallback_only());
    let stats = engine.stats().await.expect("Stats failed");
    assert_eq!(stats.total_items, 1, "The degraded write landed exactly once");
}

// ============================================================================
// INDEX-BACKED RETRIEVAL TESTS
// ============================================================================

#[tokio::test]
async fn test_indexed_retrieval_ranks_by_similarity() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine = MemoryEngine::new(
        create_test_config(&temp_dir),
        Some(Arc::new(LocalSimilarityIndex::new())),
    );

    let paris = engine
        .remember("paris capital france", Metadata::new())
        .await
        .expect("Store failed");
    let berlin = engine
        .remember("berlin capital germany", Metadata::new())
        .await
        .expect("Store failed");
    engine
        .remember("unrelated text", Metadata::new())
        .await
        .expect("Store failed");

    let results = engine
        .retrieve("capital france", 2)
        .await
        .expect("Retrieval failed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].record.id, paris, "Closest record ranks first");
    assert_eq!(results[1].record.id, berlin);

    let stats = engine.stats().await.expect("Stats failed");
    assert_eq!(stats.backend_name, "local-cosine");
    assert_eq!(stats.total_items, 3);
}

#[tokio::test]
async fn test_indexed_feedback_boosts_and_prunes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine = MemoryEngine::new(
        create_test_config(&temp_dir),
        Some(Arc::new(LocalSimilarityIndex::new())),
    );

    let id = engine
        .remember("soon disliked", Metadata::new())
        .await
        .expect("Store failed");

    engine
        .record_outcome(&id, false)
        .await
        .expect("Feedback failed");
    engine
        .record_outcome(&id, false)
        .await
        .expect("Feedback failed");

    assert!(
        engine.get(&id).await.is_err(),
        "Pruning applies on the index path too"
    );
    assert!(
        !engine.is_fallback_only(),
        "Pruning is not a backend failure"
    );
}

// ============================================================================
// SIDECAR PROBE TESTS
// ============================================================================

#[tokio::test]
async fn test_connect_with_unreachable_sidecar_starts_fallback_only() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine = MemoryEngine::connect(
        create_test_config(&temp_dir),
        &IndexConfig {
            base_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 1,
        },
    )
    .await;

    assert!(engine.is_fallback_only());
    engine
        .remember("still works", Metadata::new())
        .await
        .expect("Fallback-only store failed");
}

#[tokio::test]
async fn test_connect_without_url_skips_the_probe() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine = MemoryEngine::connect(create_test_config(&temp_dir), &IndexConfig::default()).await;
    assert!(engine.is_fallback_only());
}
