//! Smriti-Memory Library
//!
//! Outcome-based memory engine for conversational agents.
//! Built to keep answering when its vector backend cannot.
//!
//! # Key Features
//! - Unified record store for memories, chat exchanges, and ingested books
//! - Outcome feedback loop: helpful answers rank higher, bad ones get pruned
//! - One-way degradation from a similarity index to an in-process
//!   token-overlap store on the first backend failure
//! - JSON snapshot persistence that survives restarts without the index
//!
//! # Degraded Operation
//! - Every operation keeps working after the fallback switch
//! - The switch is silent to callers and permanent for the process
//! - Snapshots are plain JSON, readable without any sidecar running

pub mod chat;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod fallback;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod tracing_setup;
pub mod types;

pub use chat::{ChatMessage, ChatRole, ChatService, ChatTurn};
pub use config::{ChatConfig, EngineConfig, IndexConfig, LlmConfig, ScoringConfig};
pub use engine::MemoryEngine;
pub use errors::{MemoryError, Result};
pub use fallback::FallbackStore;
pub use index::{HttpSimilarityIndex, IndexHit, LocalSimilarityIndex, SimilarityIndex};
pub use ingest::{ingest_text, BookSummary};
pub use llm::{LlmClient, TextGenerator};
pub use types::{EngineStats, Interaction, MemoryRecord, Metadata, RecordId, ScoredRecord};

// Re-export dependencies to ensure tests/benchmarks use the same version
pub use chrono;
pub use parking_lot;
pub use uuid;
