//! Configuration management for Smriti-Memory
//!
//! All configurable parameters in one place with environment variable
//! overrides. Follows the principle: sensible defaults, configurable in
//! production. Defaults live in `constants.rs`; nothing outside this module
//! reads those constants directly.

use std::env;
use std::path::PathBuf;

use tracing::info;

use crate::constants::*;

/// Scoring knobs for ranking and feedback.
///
/// The values mirror the behavior the engine was tuned with; they are
/// configuration rather than literals so deployments can adjust the blend
/// without a rebuild.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Weight of `1 - distance` (index) or token overlap (fallback).
    pub similarity_weight: f32,
    /// Weight of the outcome score after remapping to [0, 1].
    pub outcome_weight: f32,
    /// Added to the outcome score on helpful feedback, capped at 1.0.
    pub helpful_boost: f32,
    /// Subtracted on unhelpful feedback, floored at -1.0.
    pub unhelpful_penalty: f32,
    /// Records whose score drops below this are deleted during feedback.
    pub prune_threshold: f32,
    /// Index retrieval asks for `limit * oversample_factor` candidates.
    pub oversample_factor: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            similarity_weight: DEFAULT_SIMILARITY_WEIGHT,
            outcome_weight: DEFAULT_OUTCOME_WEIGHT,
            helpful_boost: DEFAULT_HELPFUL_BOOST,
            unhelpful_penalty: DEFAULT_UNHELPFUL_PENALTY,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            oversample_factor: DEFAULT_OVERSAMPLE_FACTOR,
        }
    }
}

impl ScoringConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("SMRITI_SIMILARITY_WEIGHT") {
            if let Ok(n) = val.parse::<f32>() {
                config.similarity_weight = n.clamp(0.0, 1.0);
            }
        }

        if let Ok(val) = env::var("SMRITI_OUTCOME_WEIGHT") {
            if let Ok(n) = val.parse::<f32>() {
                config.outcome_weight = n.clamp(0.0, 1.0);
            }
        }

        if let Ok(val) = env::var("SMRITI_HELPFUL_BOOST") {
            if let Ok(n) = val.parse::<f32>() {
                config.helpful_boost = n.clamp(0.0, 2.0);
            }
        }

        if let Ok(val) = env::var("SMRITI_UNHELPFUL_PENALTY") {
            if let Ok(n) = val.parse::<f32>() {
                config.unhelpful_penalty = n.clamp(0.0, 2.0);
            }
        }

        if let Ok(val) = env::var("SMRITI_PRUNE_THRESHOLD") {
            if let Ok(n) = val.parse::<f32>() {
                config.prune_threshold = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_OVERSAMPLE") {
            if let Ok(n) = val.parse::<usize>() {
                config.oversample_factor = n.clamp(1, 20);
            }
        }

        config
    }
}

/// Memory engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Data directory holding the fallback snapshot (default: ./smriti_data)
    pub data_dir: PathBuf,

    /// Ranking and feedback knobs
    pub scoring: ScoringConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            scoring: ScoringConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("SMRITI_DATA_DIR") {
            config.data_dir = PathBuf::from(val);
        }

        config.scoring = ScoringConfig::from_env();
        config
    }

    /// Log the current configuration
    pub fn log(&self) {
        info!("📋 Engine configuration:");
        info!("   Data dir: {:?}", self.data_dir);
        info!(
            "   Score blend: similarity {:.2} / outcome {:.2}",
            self.scoring.similarity_weight, self.scoring.outcome_weight
        );
        info!(
            "   Feedback: +{:.2} helpful, -{:.2} unhelpful, prune below {:.2}",
            self.scoring.helpful_boost,
            self.scoring.unhelpful_penalty,
            self.scoring.prune_threshold
        );
        info!("   Oversample: {}x", self.scoring.oversample_factor);
    }
}

/// Similarity index sidecar configuration
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Base URL of the vector index service; `None` disables the index and
    /// the engine runs on the fallback store from the start.
    pub base_url: Option<String>,

    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_INDEX_TIMEOUT_SECS,
        }
    }
}

impl IndexConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("SMRITI_INDEX_URL") {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                config.base_url = Some(trimmed.to_string());
            }
        }

        if let Ok(val) = env::var("SMRITI_INDEX_TIMEOUT") {
            if let Ok(n) = val.parse() {
                config.timeout_secs = n;
            }
        }

        config
    }
}

/// Text-generation backend configuration (KoboldCpp-compatible API)
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the generation backend (default: http://localhost:5001)
    pub base_url: String,

    /// Completion length in tokens (default: 512)
    pub max_length: usize,

    /// Sampling temperature (default: 0.7)
    pub temperature: f32,

    /// Nucleus sampling cutoff (default: 0.9)
    pub top_p: f32,

    /// Repetition penalty (default: 1.1)
    pub rep_pen: f32,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_URL.to_string(),
            max_length: DEFAULT_LLM_MAX_LENGTH,
            temperature: DEFAULT_LLM_TEMPERATURE,
            top_p: DEFAULT_LLM_TOP_P,
            rep_pen: DEFAULT_LLM_REP_PEN,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("SMRITI_LLM_URL") {
            config.base_url = val;
        }

        if let Ok(val) = env::var("SMRITI_LLM_MAX_LENGTH") {
            if let Ok(n) = val.parse() {
                config.max_length = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_LLM_TEMPERATURE") {
            if let Ok(n) = val.parse::<f32>() {
                config.temperature = n.clamp(0.0, 2.0);
            }
        }

        if let Ok(val) = env::var("SMRITI_LLM_TOP_P") {
            if let Ok(n) = val.parse::<f32>() {
                config.top_p = n.clamp(0.0, 1.0);
            }
        }

        if let Ok(val) = env::var("SMRITI_LLM_REP_PEN") {
            if let Ok(n) = val.parse::<f32>() {
                config.rep_pen = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_LLM_TIMEOUT") {
            if let Ok(n) = val.parse() {
                config.timeout_secs = n;
            }
        }

        config
    }
}

/// Chat service configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Memory records retrieved into each prompt (default: 5)
    pub context_limit: usize,

    /// System prompt opening every transcript
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            context_limit: DEFAULT_CONTEXT_LIMIT,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ChatConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("SMRITI_CONTEXT_LIMIT") {
            if let Ok(n) = val.parse::<usize>() {
                config.context_limit = n.clamp(0, 50);
            }
        }

        if let Ok(val) = env::var("SMRITI_SYSTEM_PROMPT") {
            if !val.trim().is_empty() {
                config.system_prompt = val;
            }
        }

        config
    }
}

/// Environment variable documentation
#[allow(unused)] // Public API - available for CLI help output
pub fn print_env_help() {
    println!("Smriti-Memory Configuration Environment Variables:");
    println!();
    println!("  SMRITI_DATA_DIR           - Data directory for the fallback snapshot (default: ./smriti_data)");
    println!("  SMRITI_INDEX_URL          - Similarity index base URL (unset = fallback store only)");
    println!("  SMRITI_INDEX_TIMEOUT      - Index request timeout in seconds (default: 10)");
    println!();
    println!("Scoring:");
    println!("  SMRITI_SIMILARITY_WEIGHT  - Similarity weight in the blend (default: 0.6)");
    println!("  SMRITI_OUTCOME_WEIGHT     - Outcome weight in the blend (default: 0.4)");
    println!("  SMRITI_HELPFUL_BOOST      - Score added on helpful feedback (default: 0.2)");
    println!("  SMRITI_UNHELPFUL_PENALTY  - Score removed on unhelpful feedback (default: 0.3)");
    println!("  SMRITI_PRUNE_THRESHOLD    - Delete records scoring below this (default: -0.5)");
    println!("  SMRITI_OVERSAMPLE         - Index oversampling factor (default: 3)");
    println!();
    println!("Generation backend:");
    println!("  SMRITI_LLM_URL            - KoboldCpp-compatible base URL (default: http://localhost:5001)");
    println!("  SMRITI_LLM_MAX_LENGTH     - Completion length in tokens (default: 512)");
    println!("  SMRITI_LLM_TEMPERATURE    - Sampling temperature (default: 0.7)");
    println!("  SMRITI_LLM_TOP_P          - Nucleus sampling cutoff (default: 0.9)");
    println!("  SMRITI_LLM_REP_PEN        - Repetition penalty (default: 1.1)");
    println!("  SMRITI_LLM_TIMEOUT        - Generation timeout in seconds (default: 120)");
    println!();
    println!("Chat:");
    println!("  SMRITI_CONTEXT_LIMIT      - Memory records per prompt (default: 5)");
    println!("  SMRITI_SYSTEM_PROMPT      - System prompt override");
    println!();
    println!("  RUST_LOG                  - Log level (e.g., info, debug, trace)");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./smriti_data"));
        assert_eq!(config.scoring.similarity_weight, 0.6);
        assert_eq!(config.scoring.outcome_weight, 0.4);
        assert_eq!(config.scoring.helpful_boost, 0.2);
        assert_eq!(config.scoring.unhelpful_penalty, 0.3);
        assert_eq!(config.scoring.prune_threshold, -0.5);
        assert_eq!(config.scoring.oversample_factor, 3);
    }

    #[test]
    fn test_env_override() {
        env::set_var("SMRITI_DATA_DIR", "/tmp/smriti-test");
        env::set_var("SMRITI_OVERSAMPLE", "5");

        let config = EngineConfig::from_env();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/smriti-test"));
        assert_eq!(config.scoring.oversample_factor, 5);

        // A zero oversample would turn retrieval off entirely; the floor is 1.
        env::set_var("SMRITI_OVERSAMPLE", "0");
        let config = ScoringConfig::from_env();
        assert_eq!(config.oversample_factor, 1);

        env::remove_var("SMRITI_DATA_DIR");
        env::remove_var("SMRITI_OVERSAMPLE");
    }

    #[test]
    fn test_index_config_requires_url() {
        let config = IndexConfig::from_env();
        // Without SMRITI_INDEX_URL the index stays disabled.
        if env::var("SMRITI_INDEX_URL").is_err() {
            assert!(config.base_url.is_none());
        }
    }

    #[test]
    fn test_llm_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.base_url, "http://localhost:5001");
        assert_eq!(config.max_length, 512);
        assert!((config.rep_pen - 1.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_chat_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.context_limit, 5);
        assert!(!config.system_prompt.is_empty());
    }
}
