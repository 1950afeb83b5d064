//! HTTP similarity index client
//!
//! Thin adapter over an external vector-index sidecar speaking JSON: the
//! sidecar owns embedding and nearest-neighbor search, this client owns
//! nothing but the wire format. Every transport or status failure maps to
//! `BackendUnavailable`, which the engine converts into its one-way fallback
//! switch — no retries happen at this layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{MemoryError, Result};
use crate::types::{MemoryRecord, RecordId};

use super::{IndexHit, SimilarityIndex};

const BACKEND: &str = "vector-http";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<IndexHit>,
}

#[derive(Debug, Deserialize)]
struct DumpResponse {
    records: Vec<MemoryRecord>,
}

/// Client for a vector-index sidecar.
///
/// Routes: `POST /records` (upsert), `POST /search`, `GET /records/{id}`,
/// `DELETE /records/{id}`, `GET /records` (dump), `GET /health`.
pub struct HttpSimilarityIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSimilarityIndex {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| unavailable(format!("building http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// Health probe used at engine bring-up. Any failure means "no index".
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, url = %url, "index health probe failed");
                false
            }
        }
    }
}

fn unavailable(reason: impl Into<String>) -> MemoryError {
    MemoryError::BackendUnavailable {
        backend: BACKEND.to_string(),
        reason: reason.into(),
    }
}

/// Rejects non-2xx responses so a misbehaving sidecar is indistinguishable
/// from an absent one.
fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(unavailable(format!("sidecar returned {}", resp.status())))
    }
}

#[async_trait::async_trait]
impl SimilarityIndex for HttpSimilarityIndex {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn upsert(&self, record: &MemoryRecord) -> Result<()> {
        let url = format!("{}/records", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| unavailable(format!("upsert failed: {e}")))?;
        check_status(resp)?;
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&SearchRequest { query, k })
            .send()
            .await
            .map_err(|e| unavailable(format!("search failed: {e}")))?;
        let body: SearchResponse = check_status(resp)?
            .json()
            .await
            .map_err(|e| unavailable(format!("search response unreadable: {e}")))?;
        Ok(body.hits)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<MemoryRecord>> {
        let url = format!("{}/records/{id}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(format!("get failed: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record: MemoryRecord = check_status(resp)?
            .json()
            .await
            .map_err(|e| unavailable(format!("record response unreadable: {e}")))?;
        Ok(Some(record))
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let url = format!("{}/records/{id}", self.base_url);
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| unavailable(format!("delete failed: {e}")))?;
        // A 404 here means the record was already gone; same end state.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp)?;
        Ok(())
    }

    async fn dump(&self) -> Result<Vec<MemoryRecord>> {
        let url = format!("{}/records", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(format!("dump failed: {e}")))?;
        let body: DumpResponse = check_status(resp)?
            .json()
            .await
            .map_err(|e| unavailable(format!("dump response unreadable: {e}")))?;
        Ok(body.records)
    }
}
