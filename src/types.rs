//! Core record types shared by every backend
//!
//! A `MemoryRecord` is the one unit of storage: content plus an open metadata
//! map plus a learned outcome score. Interactions (logged chat exchanges) are
//! ordinary records with `kind == "interaction"` and share the same id space.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Open metadata bag attached to every record. The engine reads and writes
/// only the reserved keys below; everything else passes through opaquely.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Reserved metadata key: record kind, consumed into [`MemoryRecord::kind`]
/// at creation.
pub const META_TYPE: &str = "type";
/// Reserved metadata key: seeds [`MemoryRecord::outcome_score`] at creation,
/// then ownership moves to the feedback rule.
pub const META_OUTCOME_SCORE: &str = "outcome_score";
/// Reserved metadata key: RFC 3339 timestamp of the last feedback event,
/// written by the engine on every outcome update.
pub const META_LAST_FEEDBACK: &str = "last_feedback";
/// Reserved metadata key: ids of the records used as context for an
/// interaction, written by the engine when the interaction is logged.
pub const META_CONTEXT_IDS: &str = "context_ids";

/// Default record kind.
pub const KIND_MEMORY: &str = "memory";
/// Kind marking a logged chat exchange.
pub const KIND_INTERACTION: &str = "interaction";
/// Kind used by book ingestion for stored chunks.
pub const KIND_BOOK: &str = "book";

/// Unique identifier for a stored record. Interaction ids live in the same
/// space: an interaction *is* a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored unit of memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Assigned at creation, immutable.
    pub id: RecordId,
    /// The stored text.
    pub content: String,
    /// Caller-supplied open map, minus the reserved keys consumed at creation.
    #[serde(default)]
    pub metadata: Metadata,
    /// Learned usefulness in [-1.0, 1.0]; mutated only by the feedback rule.
    pub outcome_score: f32,
    /// Set at creation, immutable.
    pub created_at: DateTime<Utc>,
    /// Derived from the reserved `type` key, `"memory"` when absent.
    /// Immutable after creation.
    pub kind: String,
}

impl MemoryRecord {
    /// Builds a record from caller content and metadata.
    ///
    /// The reserved keys are consumed out of the open map: `type` fixes
    /// `kind`, and `outcome_score` seeds the score (clamped into [-1, 1]).
    /// A non-string `type` or non-numeric `outcome_score` falls back to the
    /// defaults.
    pub fn new(content: impl Into<String>, mut metadata: Metadata) -> Self {
        let kind = metadata
            .remove(META_TYPE)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| KIND_MEMORY.to_string());

        let outcome_score = metadata
            .remove(META_OUTCOME_SCORE)
            .and_then(|v| v.as_f64())
            .map(|s| (s as f32).clamp(-1.0, 1.0))
            .unwrap_or(0.0);

        Self {
            id: RecordId::new(),
            content: content.into(),
            metadata,
            outcome_score,
            created_at: Utc::now(),
            kind,
        }
    }

    pub fn is_interaction(&self) -> bool {
        self.kind == KIND_INTERACTION
    }
}

/// One retrieval result: the record plus its combined ranking score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    /// Weighted fusion of similarity (or lexical overlap) and the remapped
    /// outcome score; higher ranks first.
    pub combined_score: f32,
}

/// Backend-level counters reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_items: usize,
    pub interaction_count: usize,
    /// Everything that is not an interaction: `total_items - interaction_count`.
    pub permanent_memory_count: usize,
    /// Name of the backend currently serving operations.
    pub backend_name: String,
}

/// Process-lifetime association between a chat exchange and the record logged
/// for it. Never persisted; lost on restart together with its usefulness.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: RecordId,
    pub query: String,
    pub response: String,
    pub context_ids: Vec<RecordId>,
    pub created_at: DateTime<Utc>,
}
