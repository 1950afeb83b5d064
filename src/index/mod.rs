//! Similarity index contract
//!
//! The engine consumes semantic search through this trait and treats any
//! implementation as untrusted: every method may fail, and the first failure
//! flips the engine into fallback-only mode for the rest of the process.
//! Two implementations ship here — an HTTP client for an external vector
//! sidecar, and a local cosine index for offline use.

pub mod http;
pub mod local;

pub use http::HttpSimilarityIndex;
pub use local::LocalSimilarityIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{MemoryRecord, RecordId};

/// One nearest-neighbor match: the stored record plus a distance in [0, 1],
/// where 0 means identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHit {
    pub record: MemoryRecord,
    pub distance: f32,
}

/// Contract over a semantic-similarity search primitive.
///
/// Implementations return `Err` only for backend failures; a lookup miss is
/// `Ok(None)`, which keeps "the id does not exist" distinct from "the index
/// is down" at the engine boundary.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Short backend label surfaced through `stats()`.
    fn name(&self) -> &'static str;

    /// Inserts or overwrites one record.
    async fn upsert(&self, record: &MemoryRecord) -> Result<()>;

    /// Up to `k` nearest matches for `query`, closest first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>>;

    /// Fetches one record by id.
    async fn get(&self, id: &RecordId) -> Result<Option<MemoryRecord>>;

    /// Removes one record by id; unknown ids are not an error.
    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// Every stored record, for stats and diagnostics.
    async fn dump(&self) -> Result<Vec<MemoryRecord>>;
}
