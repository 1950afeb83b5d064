//! Outcome-based memory engine
//!
//! One interface over two backends: the similarity index (semantic, external,
//! allowed to die) and the fallback store (lexical, in-process, always there).
//! The engine owns the backend-selection state, the 60/40 score fusion, the
//! feedback rule that reshapes ranking over time, and the interaction cache
//! correlating chat exchanges with the records logged for them.
//!
//! Failure discipline: the first error from any index operation flips a
//! one-way flag and the same logical operation re-executes against the
//! fallback store before returning. Callers never see an index failure; they
//! see the degraded backend's answer. The flag never flips back within one
//! engine lifetime — an index that failed once is presumed dead, which avoids
//! flapping latency and split-brain writes between backends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use ordered_float::OrderedFloat;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, IndexConfig};
use crate::constants::{OUTCOME_SCORE_MAX, OUTCOME_SCORE_MIN};
use crate::errors::{MemoryError, Result};
use crate::fallback::{FallbackStore, FALLBACK_BACKEND_NAME};
use crate::index::{HttpSimilarityIndex, IndexHit, SimilarityIndex};
use crate::types::{
    EngineStats, Interaction, Metadata, MemoryRecord, RecordId, ScoredRecord, KIND_INTERACTION,
    META_CONTEXT_IDS, META_LAST_FEEDBACK, META_TYPE,
};

/// The outcome-based memory engine.
///
/// Shared freely across tasks: all state is behind atomics, locks, or
/// concurrent maps, and every operation takes `&self`.
pub struct MemoryEngine {
    config: EngineConfig,
    index: Option<Arc<dyn SimilarityIndex>>,
    fallback: FallbackStore,
    /// One-way switch: false = index active, true = fallback-only.
    fallback_only: AtomicBool,
    /// Process-lifetime chat exchange log, keyed by interaction id.
    interactions: DashMap<RecordId, Interaction>,
}

impl MemoryEngine {
    /// Builds an engine over an injected index. `None` starts fallback-only,
    /// which is a normal mode, not a degraded one — the snapshot still loads
    /// and every operation works.
    pub fn new(config: EngineConfig, index: Option<Arc<dyn SimilarityIndex>>) -> Self {
        let fallback = FallbackStore::open(&config.data_dir);
        let fallback_only = index.is_none();
        match &index {
            Some(index) => info!(backend = index.name(), "memory engine using similarity index"),
            None => info!("no similarity index configured; memory engine on the in-memory store"),
        }
        Self {
            config,
            index,
            fallback,
            fallback_only: AtomicBool::new(fallback_only),
            interactions: DashMap::new(),
        }
    }

    /// Probes the configured HTTP sidecar and brings the engine up on
    /// whichever backend answers. An unreachable sidecar is logged and the
    /// engine starts fallback-only; it never fails construction.
    pub async fn connect(config: EngineConfig, index_config: &IndexConfig) -> Self {
        let mut index: Option<Arc<dyn SimilarityIndex>> = None;

        if let Some(url) = &index_config.base_url {
            match HttpSimilarityIndex::new(url, Duration::from_secs(index_config.timeout_secs)) {
                Ok(http) => {
                    if http.is_available().await {
                        info!(url = %url, "🧠 similarity index online");
                        index = Some(Arc::new(http));
                    } else {
                        warn!(url = %url, "similarity index did not answer; starting on the in-memory store");
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "could not build index client; starting on the in-memory store");
                }
            }
        }

        Self::new(config, index)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the permanent fallback switch has happened (or no index was
    /// ever configured).
    pub fn is_fallback_only(&self) -> bool {
        self.fallback_only.load(Ordering::Acquire)
    }

    /// Stores a record. The reserved metadata keys seed `kind` and the
    /// outcome score; everything else rides along opaquely.
    pub async fn remember(&self, content: impl Into<String>, metadata: Metadata) -> Result<RecordId> {
        let record = MemoryRecord::new(content, metadata);
        let id = record.id;

        if let Some(index) = self.active_index() {
            match index.upsert(&record).await {
                Ok(()) => {
                    debug!(%id, kind = %record.kind, "record stored in similarity index");
                    return Ok(id);
                }
                Err(e) => self.switch_to_fallback("remember", &e),
            }
        }

        debug!(%id, kind = %record.kind, "record stored in fallback store");
        self.fallback.put(record);
        Ok(id)
    }

    /// Logs a chat exchange as a record (`kind = "interaction"`, content
    /// `Q:`/`A:` formatted, context ids in metadata) plus an interaction
    /// cache entry. The returned id lives in the same space as every other
    /// record id.
    pub async fn record_interaction(
        &self,
        query: &str,
        response: &str,
        context_used: &[MemoryRecord],
    ) -> Result<RecordId> {
        let context_ids: Vec<RecordId> = context_used.iter().map(|r| r.id).collect();

        let mut metadata = Metadata::new();
        metadata.insert(META_TYPE.to_string(), json!(KIND_INTERACTION));
        metadata.insert(META_CONTEXT_IDS.to_string(), json!(context_ids));

        let content = format!("Q: {query}\nA: {response}");
        let id = self.remember(content, metadata).await?;

        self.interactions.insert(
            id,
            Interaction {
                id,
                query: query.to_string(),
                response: response.to_string(),
                context_ids,
                created_at: Utc::now(),
            },
        );
        debug!(%id, "interaction recorded");
        Ok(id)
    }

    /// Ranked retrieval. On the index path the candidate pool is oversampled
    /// by the configured factor so outcome re-ranking has room to reorder
    /// before the cut; on the fallback path the store ranks directly.
    pub async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<ScoredRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(index) = self.active_index() {
            let pool = limit * self.config.scoring.oversample_factor;
            match index.search(query, pool).await {
                Ok(hits) => {
                    let ranked = self.rank_hits(hits, limit);
                    debug!(results = ranked.len(), limit, "retrieval served by similarity index");
                    return Ok(ranked);
                }
                Err(e) => self.switch_to_fallback("retrieve", &e),
            }
        }

        let results = self.fallback.search(query, limit, &self.config.scoring);
        debug!(results = results.len(), limit, "retrieval served by fallback store");
        Ok(results)
    }

    /// Applies caller feedback to one record: helpful raises the outcome
    /// score, unhelpful lowers it, both clamped to the score bounds, and a
    /// `last_feedback` timestamp lands in the record's metadata. A record
    /// pushed below the prune threshold is deleted (with its interaction
    /// cache entry) within this same call.
    ///
    /// Unknown ids are a caller bug and surface as `NotFound` — this is the
    /// one path where an error escapes the engine on purpose.
    pub async fn record_outcome(&self, id: &RecordId, helpful: bool) -> Result<()> {
        if let Some(index) = self.active_index() {
            match self.record_outcome_on_index(index, id, helpful).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => self.switch_to_fallback("record_outcome", &e),
            }
        }

        self.record_outcome_on_fallback(id, helpful)
    }

    /// Removes a record from the active backend and the interaction cache.
    /// Missing ids are a no-op, so repeated deletes are safe.
    pub async fn delete_record(&self, id: &RecordId) -> Result<()> {
        if let Some(index) = self.active_index() {
            if let Err(e) = index.delete(id).await {
                self.switch_to_fallback("delete_record", &e);
                self.fallback.delete(id);
            }
        } else {
            self.fallback.delete(id);
        }

        self.interactions.remove(id);
        debug!(%id, "record deleted");
        Ok(())
    }

    /// Fetches one record by id from the active backend.
    pub async fn get(&self, id: &RecordId) -> Result<MemoryRecord> {
        if let Some(index) = self.active_index() {
            match index.get(id).await {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => return Err(MemoryError::NotFound(id.to_string())),
                Err(e) => self.switch_to_fallback("get", &e),
            }
        }

        self.fallback
            .get(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    /// Backend-level counters. Interactions are counted by record kind, so
    /// the numbers reflect what is actually stored, not the process-local
    /// cache.
    pub async fn stats(&self) -> Result<EngineStats> {
        if let Some(index) = self.active_index() {
            match index.dump().await {
                Ok(records) => {
                    let total_items = records.len();
                    let interaction_count =
                        records.iter().filter(|r| r.is_interaction()).count();
                    return Ok(EngineStats {
                        total_items,
                        interaction_count,
                        permanent_memory_count: total_items - interaction_count,
                        backend_name: index.name().to_string(),
                    });
                }
                Err(e) => self.switch_to_fallback("stats", &e),
            }
        }

        let total_items = self.fallback.len();
        let interaction_count = self.fallback.interaction_count();
        Ok(EngineStats {
            total_items,
            interaction_count,
            permanent_memory_count: total_items - interaction_count,
            backend_name: FALLBACK_BACKEND_NAME.to_string(),
        })
    }

    /// Process-local view of a logged exchange, if its record still exists.
    pub fn interaction(&self, id: &RecordId) -> Option<Interaction> {
        self.interactions.get(id).map(|entry| entry.value().clone())
    }

    /// Entries currently held in the interaction cache.
    pub fn cached_interaction_count(&self) -> usize {
        self.interactions.len()
    }

    /// Forces the fallback snapshot to disk and waits for it. Intended for
    /// shutdown; routine persistence happens after every mutation anyway.
    pub async fn flush(&self) {
        self.fallback.flush().await;
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    /// The index, unless it is absent or has been written off.
    fn active_index(&self) -> Option<&dyn SimilarityIndex> {
        if self.fallback_only.load(Ordering::Acquire) {
            return None;
        }
        self.index.as_deref()
    }

    /// Flips to fallback-only mode. Compare-and-set, so concurrent failures
    /// perform the transition exactly once; the first caller logs it loudly.
    fn switch_to_fallback(&self, operation: &str, error: &MemoryError) {
        if self
            .fallback_only
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(
                operation,
                error = %error,
                "similarity index failed; switching to the in-memory store for the rest of this process"
            );
        } else {
            debug!(operation, error = %error, "index failure after fallback switch");
        }
    }

    /// `combined = (1 - distance) * similarity_weight + (outcome + 1) * outcome_weight`,
    /// sorted descending and cut to `limit`. Ties break like the fallback
    /// store: earlier `created_at`, then id.
    fn rank_hits(&self, hits: Vec<IndexHit>, limit: usize) -> Vec<ScoredRecord> {
        let scoring = &self.config.scoring;
        let mut scored: Vec<ScoredRecord> = hits
            .into_iter()
            .map(|hit| {
                let combined = (1.0 - hit.distance) * scoring.similarity_weight
                    + (hit.record.outcome_score + 1.0) * scoring.outcome_weight;
                ScoredRecord {
                    record: hit.record,
                    combined_score: combined,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            OrderedFloat(b.combined_score)
                .cmp(&OrderedFloat(a.combined_score))
                .then_with(|| a.record.created_at.cmp(&b.record.created_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        scored.truncate(limit);
        scored
    }

    fn apply_feedback(&self, old: f32, helpful: bool) -> f32 {
        let scoring = &self.config.scoring;
        if helpful {
            (old + scoring.helpful_boost).min(OUTCOME_SCORE_MAX)
        } else {
            (old - scoring.unhelpful_penalty).max(OUTCOME_SCORE_MIN)
        }
    }

    async fn record_outcome_on_index(
        &self,
        index: &dyn SimilarityIndex,
        id: &RecordId,
        helpful: bool,
    ) -> Result<()> {
        let Some(mut record) = index.get(id).await? else {
            return Err(MemoryError::NotFound(id.to_string()));
        };

        let new_score = self.apply_feedback(record.outcome_score, helpful);
        if new_score < self.config.scoring.prune_threshold {
            index.delete(id).await?;
            self.interactions.remove(id);
            info!(%id, score = new_score, "record pruned after repeated unhelpful feedback");
            return Ok(());
        }

        record.outcome_score = new_score;
        record
            .metadata
            .insert(META_LAST_FEEDBACK.to_string(), json!(Utc::now().to_rfc3339()));
        index.upsert(&record).await?;
        debug!(%id, score = new_score, helpful, "outcome recorded");
        Ok(())
    }

    fn record_outcome_on_fallback(&self, id: &RecordId, helpful: bool) -> Result<()> {
        let updated = self.fallback.update(id, |record| {
            record.outcome_score = self.apply_feedback(record.outcome_score, helpful);
            record
                .metadata
                .insert(META_LAST_FEEDBACK.to_string(), json!(Utc::now().to_rfc3339()));
        });

        let Some(record) = updated else {
            return Err(MemoryError::NotFound(id.to_string()));
        };

        if record.outcome_score < self.config.scoring.prune_threshold {
            self.fallback.delete(id);
            self.interactions.remove(id);
            info!(%id, score = record.outcome_score, "record pruned after repeated unhelpful feedback");
        } else {
            debug!(%id, score = record.outcome_score, helpful, "outcome recorded");
        }
        Ok(())
    }
}
