//! Local similarity index
//!
//! In-process stand-in for the external vector sidecar: deterministic hashed
//! embeddings plus cosine distance over an in-memory map. No model, no
//! network, no nondeterminism — texts sharing tokens land near each other,
//! which is enough for offline operation and for exercising the index path.

use std::collections::HashMap;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::types::{MemoryRecord, RecordId};

use super::{IndexHit, SimilarityIndex};

/// Embedding width. Matches the MiniLM-class models the HTTP sidecar runs,
/// though nothing here depends on the value beyond hash bucketing.
const EMBED_DIM: usize = 384;

/// Signed feature hashing: each lower-cased whitespace token adds ±1 to one
/// dimension picked by its digest. Normalized, so cosine against another text
/// reflects token overlap.
fn pseudo_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBED_DIM];
    for token in text.split_whitespace() {
        let digest = Sha256::digest(token.to_lowercase().as_bytes());
        let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
            % EMBED_DIM;
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    // Vectors are normalized at construction, so the dot product is enough.
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Distance in [0, 1] from a cosine in [-1, 1]. Anticorrelated texts are
/// flattened to the far end rather than mapped past it.
fn distance_from(cos: f32) -> f32 {
    (1.0 - cos.max(0.0)).clamp(0.0, 1.0)
}

/// In-memory cosine index over hashed embeddings.
#[derive(Default)]
pub struct LocalSimilarityIndex {
    entries: RwLock<HashMap<RecordId, (MemoryRecord, Vec<f32>)>>,
}

impl LocalSimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SimilarityIndex for LocalSimilarityIndex {
    fn name(&self) -> &'static str {
        "local-cosine"
    }

    async fn upsert(&self, record: &MemoryRecord) -> Result<()> {
        let embedding = pseudo_embedding(&record.content);
        self.entries
            .write()
            .insert(record.id, (record.clone(), embedding));
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = pseudo_embedding(query);

        let mut hits: Vec<IndexHit> = {
            let entries = self.entries.read();
            entries
                .values()
                .map(|(record, embedding)| IndexHit {
                    record: record.clone(),
                    distance: distance_from(cosine(&query_embedding, embedding)),
                })
                .collect()
        };

        hits.sort_by(|a, b| {
            OrderedFloat(a.distance)
                .cmp(&OrderedFloat(b.distance))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<MemoryRecord>> {
        Ok(self.entries.read().get(id).map(|(record, _)| record.clone()))
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.entries.write().remove(id);
        Ok(())
    }

    async fn dump(&self) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .entries
            .read()
            .values()
            .map(|(record, _)| record.clone())
            .collect())
    }
}
