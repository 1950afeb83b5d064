//! Documented constants for the memory engine
//!
//! This module contains all tunable parameters with justification for their
//! values. Operational code reads these through `config::ScoringConfig` and
//! friends so deployments can override them; the values here are the defaults.

// =============================================================================
// SCORE FUSION WEIGHTS
// Similarity and learned outcome are blended on a common [0,1] scale; the
// split below is the single knob for "trust the index vs. trust the feedback".
// =============================================================================

/// Weight of the similarity signal in the combined score (60%)
///
/// Applied to `1 - distance` on the index path and to lexical token overlap on
/// the fallback path, so both backends rank with the same blend.
pub const DEFAULT_SIMILARITY_WEIGHT: f32 = 0.6;

/// Weight of the outcome signal in the combined score (40%)
///
/// The outcome score is remapped from [-1, 1] to [0, 1] before weighting so a
/// never-rated record contributes a neutral 0.4 rather than zero.
pub const DEFAULT_OUTCOME_WEIGHT: f32 = 0.4;

// =============================================================================
// FEEDBACK RULE
// Asymmetric on purpose: a record must earn back trust faster than it loses
// it, and three strikes from neutral are enough to remove it outright.
// =============================================================================

/// Outcome boost for helpful feedback (+0.2)
///
/// Five consecutive helpful signals saturate a fresh record at the 1.0 cap.
pub const DEFAULT_HELPFUL_BOOST: f32 = 0.2;

/// Outcome penalty for unhelpful feedback (-0.3)
///
/// Larger than the boost because a misleading memory costs more than a missed
/// one; two strikes take a fresh record from 0.0 to -0.6, past the prune line.
pub const DEFAULT_UNHELPFUL_PENALTY: f32 = 0.3;

/// Outcome score below which a record is deleted during feedback (-0.5)
///
/// Records this far underwater are removed rather than down-weighted, which
/// bounds store growth from persistently bad signal.
pub const DEFAULT_PRUNE_THRESHOLD: f32 = -0.5;

/// Hard bounds for the outcome score
///
/// These are part of the data model, not tuning: every feedback update clamps
/// into this interval.
pub const OUTCOME_SCORE_MIN: f32 = -1.0;
pub const OUTCOME_SCORE_MAX: f32 = 1.0;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Index oversampling factor for retrieval (3x)
///
/// The index is asked for `limit * 3` candidates so outcome-based re-ranking
/// has a pool larger than the final cut to reorder within.
pub const DEFAULT_OVERSAMPLE_FACTOR: usize = 3;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Snapshot file name inside the data directory
///
/// One JSON document per data directory holding the whole fallback store under
/// the top-level key `in_memory_store`.
pub const SNAPSHOT_FILE_NAME: &str = "memory_store.json";

/// Default data directory when none is configured
pub const DEFAULT_DATA_DIR: &str = "./smriti_data";

// =============================================================================
// EXTERNAL BACKENDS
// =============================================================================

/// Request timeout for the similarity index sidecar (seconds)
///
/// Short on purpose: a slow index must degrade into the fallback switch, not
/// stall every retrieval behind it.
pub const DEFAULT_INDEX_TIMEOUT_SECS: u64 = 10;

/// Request timeout for LLM generation (seconds)
///
/// Local models on CPU can take minutes on long prompts; 120s keeps the
/// common case covered without hanging a turn forever.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Default base URL for a KoboldCpp-compatible generation backend
pub const DEFAULT_LLM_URL: &str = "http://localhost:5001";

/// Default completion length in tokens
pub const DEFAULT_LLM_MAX_LENGTH: usize = 512;

/// Default sampling temperature
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.7;

/// Default nucleus sampling cutoff
pub const DEFAULT_LLM_TOP_P: f32 = 0.9;

/// Default repetition penalty
///
/// 1.1 is the KoboldCpp community default; enough to stop verbatim loops
/// without visibly distorting style.
pub const DEFAULT_LLM_REP_PEN: f32 = 1.1;

// =============================================================================
// CHAT
// =============================================================================

/// Memory records injected into a chat prompt (5)
///
/// Five short records fit comfortably in small local-model context windows
/// alongside the running history.
pub const DEFAULT_CONTEXT_LIMIT: usize = 5;

/// Default system prompt for chat turns
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant with access to the user's long-term memory.";

// =============================================================================
// BOOK INGESTION
// =============================================================================

/// Maximum characters per book chunk (1800)
///
/// Roughly 400-500 tokens: small enough that several chunks fit in a prompt,
/// large enough to keep a paragraph of context together.
pub const DEFAULT_BOOK_CHUNK_CHARS: usize = 1800;

/// Hex characters of the content digest used as a book id (8)
///
/// 32 bits of digest; plenty for a personal library, short enough to read in
/// logs and metadata.
pub const BOOK_ID_HEX_LEN: usize = 8;
