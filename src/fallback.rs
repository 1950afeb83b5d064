//! In-process fallback store
//!
//! Keyed record storage with deterministic lexical scoring and snapshot
//! persistence. This is the backend the engine degrades to when the
//! similarity index fails, and the only one guaranteed to exist, so it has no
//! external dependency at all: a `HashMap` behind a read-write lock plus one
//! JSON file on disk.
//!
//! Snapshot discipline: every mutating call reschedules a full snapshot
//! write. The write happens off the caller's path and is best-effort — a
//! failed write degrades durability, never correctness, and is only logged.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ScoringConfig;
use crate::constants::SNAPSHOT_FILE_NAME;
use crate::types::{MemoryRecord, RecordId, ScoredRecord};

/// Backend label reported by `stats()` while the store is active.
pub const FALLBACK_BACKEND_NAME: &str = "in_memory";

/// On-disk snapshot document. The top-level key keeps the file
/// self-describing: the whole store lives under `in_memory_store`.
#[derive(Debug, Deserialize)]
struct Snapshot {
    in_memory_store: HashMap<RecordId, MemoryRecord>,
}

#[derive(Debug, Serialize)]
struct SnapshotRef<'a> {
    in_memory_store: &'a HashMap<RecordId, MemoryRecord>,
}

/// Keyed record store with lexical relevance scoring and snapshot
/// persistence.
pub struct FallbackStore {
    records: RwLock<HashMap<RecordId, MemoryRecord>>,
    snapshot_path: PathBuf,
    /// Monotonic mutation counter; snapshot writers carry the generation they
    /// observed and skip the write when a newer one already landed.
    generation: AtomicU64,
    last_written: Arc<tokio::sync::Mutex<u64>>,
}

impl FallbackStore {
    /// Opens the store rooted at `data_dir`, seeding it from an existing
    /// snapshot. A missing, unreadable, or corrupt snapshot starts the store
    /// empty — degraded durability is never an error.
    pub fn open(data_dir: &Path) -> Self {
        let snapshot_path = data_dir.join(SNAPSHOT_FILE_NAME);
        let records = load_snapshot(&snapshot_path);
        if !records.is_empty() {
            debug!(
                records = records.len(),
                path = %snapshot_path.display(),
                "fallback store seeded from snapshot"
            );
        }
        Self {
            records: RwLock::new(records),
            snapshot_path,
            generation: AtomicU64::new(0),
            last_written: Arc::new(tokio::sync::Mutex::new(0)),
        }
    }

    /// Inserts or overwrites by id.
    pub fn put(&self, record: MemoryRecord) {
        self.records.write().insert(record.id, record);
        self.schedule_snapshot();
    }

    pub fn get(&self, id: &RecordId) -> Option<MemoryRecord> {
        self.records.read().get(id).cloned()
    }

    /// Removes by id. Missing ids are a no-op, so repeated deletes are safe.
    /// Returns whether anything was removed.
    pub fn delete(&self, id: &RecordId) -> bool {
        let removed = self.records.write().remove(id).is_some();
        if removed {
            self.schedule_snapshot();
        }
        removed
    }

    /// Mutates one record in place under the write lock and returns the
    /// updated copy, or `None` when the id is unknown. Keeping the
    /// read-modify-write inside one critical section means concurrent
    /// feedback updates cannot lose each other's increments.
    pub fn update<F>(&self, id: &RecordId, mutate: F) -> Option<MemoryRecord>
    where
        F: FnOnce(&mut MemoryRecord),
    {
        let updated = {
            let mut records = self.records.write();
            let record = records.get_mut(id)?;
            mutate(record);
            record.clone()
        };
        self.schedule_snapshot();
        Some(updated)
    }

    /// Lexical search: whitespace tokens, lower-cased, as sets.
    ///
    /// `text_score = |query ∩ content| / max(1, |query|)` and
    /// `combined = text_score * similarity_weight + (outcome + 1) * outcome_weight`.
    /// Results come back ordered by descending combined score; ties break by
    /// earlier `created_at`, then by id, so the ordering is stable regardless
    /// of map iteration order.
    pub fn search(&self, query: &str, limit: usize, scoring: &ScoringConfig) -> Vec<ScoredRecord> {
        if limit == 0 {
            return Vec::new();
        }
        let query_tokens = tokens(query);

        let mut scored: Vec<ScoredRecord> = {
            let records = self.records.read();
            records
                .values()
                .map(|record| {
                    let content_tokens = tokens(&record.content);
                    let overlap = query_tokens.intersection(&content_tokens).count();
                    let text_score = overlap as f32 / query_tokens.len().max(1) as f32;
                    let combined = text_score * scoring.similarity_weight
                        + (record.outcome_score + 1.0) * scoring.outcome_weight;
                    ScoredRecord {
                        record: record.clone(),
                        combined_score: combined,
                    }
                })
                .collect()
        };

        scored.sort_by(|a, b| {
            OrderedFloat(b.combined_score)
                .cmp(&OrderedFloat(a.combined_score))
                .then_with(|| a.record.created_at.cmp(&b.record.created_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        scored.truncate(limit);
        scored
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Records whose kind marks a logged chat exchange.
    pub fn interaction_count(&self) -> usize {
        self.records
            .read()
            .values()
            .filter(|r| r.is_interaction())
            .count()
    }

    /// Writes the current record set to disk and waits for it, unlike the
    /// fire-and-forget path. Shutdown hook; also what tests call before
    /// simulating a restart.
    ///
    /// The writer lock is taken before the state is captured so an in-flight
    /// background write cannot land an older snapshot afterwards.
    pub async fn flush(&self) {
        let mut last = self.last_written.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);
        let records = self.records.read().clone();
        match write_snapshot(&self.snapshot_path, &records) {
            Ok(()) => {
                if generation > *last {
                    *last = generation;
                }
            }
            Err(e) => warn!(
                error = %e,
                path = %self.snapshot_path.display(),
                "snapshot flush failed; records remain in memory only"
            ),
        }
    }

    /// Snapshot the store after a mutation. Inside a tokio runtime the write
    /// is spawned so the mutating call returns immediately; outside one it
    /// runs inline. Either way a failure is logged and swallowed.
    fn schedule_snapshot(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let records = self.records.read().clone();
        let path = self.snapshot_path.clone();
        let last_written = Arc::clone(&self.last_written);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut last = last_written.lock().await;
                    if generation <= *last {
                        // A newer snapshot already landed; this one is stale.
                        return;
                    }
                    match write_snapshot(&path, &records) {
                        Ok(()) => *last = generation,
                        Err(e) => warn!(
                            error = %e,
                            path = %path.display(),
                            "snapshot write failed; records remain in memory only"
                        ),
                    }
                });
            }
            Err(_) => {
                let mut last = last_written.blocking_lock();
                if generation <= *last {
                    return;
                }
                match write_snapshot(&path, &records) {
                    Ok(()) => *last = generation,
                    Err(e) => warn!(
                        error = %e,
                        path = %path.display(),
                        "snapshot write failed; records remain in memory only"
                    ),
                }
            }
        }
    }
}

/// Whitespace tokens, lower-cased, as a set.
fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

fn load_snapshot(path: &Path) -> HashMap<RecordId, MemoryRecord> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "snapshot unreadable; starting with an empty store"
            );
            return HashMap::new();
        }
    };
    match serde_json::from_slice::<Snapshot>(&bytes) {
        Ok(snapshot) => snapshot.in_memory_store,
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "snapshot failed to parse; starting with an empty store"
            );
            HashMap::new()
        }
    }
}

/// Serializes the record set to a temp file in the same directory, then
/// renames it over the snapshot so readers never see a half-written file.
fn write_snapshot(path: &Path, records: &HashMap<RecordId, MemoryRecord>) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
    }
    let doc = serde_json::to_vec_pretty(&SnapshotRef {
        in_memory_store: records,
    })
    .context("encoding snapshot")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, doc).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
