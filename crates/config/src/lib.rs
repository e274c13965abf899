//! Configuration loading, validation, and defaults for Answermill.
//!
//! Every tunable the engine consults lives here rather than as a
//! constant baked into business logic: model tables, batch sizing,
//! timeouts, selection caps, and the malformed-item policy. Loads from
//! TOML with serde defaults so a partial file is always valid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model tables: speed aliases, ceilings, cache thresholds.
    #[serde(default)]
    pub models: ModelConfig,

    /// Batch sizing and per-batch execution limits.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Skill selection knobs.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// How to treat partially-malformed batch items.
    #[serde(default)]
    pub malformed_item_policy: MalformedItemPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            batching: BatchingConfig::default(),
            selection: SelectionConfig::default(),
            malformed_item_policy: MalformedItemPolicy::default(),
        }
    }
}

/// Model-speed aliases and per-model limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Speed alias → concrete model name.
    #[serde(default = "default_speed_map")]
    pub speed_map: HashMap<String, String>,

    /// Speed alias → max output tokens for one call.
    #[serde(default = "default_output_tokens")]
    pub max_output_tokens: HashMap<String, u32>,

    /// Model name → input context ceiling in tokens.
    #[serde(default = "default_input_ceilings")]
    pub input_context_tokens: HashMap<String, usize>,

    /// Input ceiling for models missing from the table.
    #[serde(default = "default_fallback_ceiling")]
    pub fallback_input_context_tokens: usize,

    /// Tokens held back from the input ceiling to absorb estimator
    /// error. Preflight rejects when the estimate crosses
    /// `ceiling - reserve`.
    #[serde(default = "default_context_reserve")]
    pub context_reserve_tokens: usize,

    /// Ordered substring → minimum-token table for cache-worthiness.
    /// First match wins; the empty substring is the catch-all.
    #[serde(default = "default_cache_thresholds")]
    pub cache_thresholds: Vec<CacheThreshold>,
}

/// One row of the cache-worthiness lookup table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheThreshold {
    /// Substring matched against the model name.
    pub model_contains: String,
    /// Minimum token count before caching the stable prefix pays off.
    pub min_tokens: usize,
}

fn default_speed_map() -> HashMap<String, String> {
    HashMap::from([
        ("fast".into(), "claude-haiku-4".into()),
        ("balanced".into(), "claude-sonnet-4".into()),
        ("thorough".into(), "claude-opus-4".into()),
    ])
}

fn default_output_tokens() -> HashMap<String, u32> {
    HashMap::from([
        ("fast".into(), 8_192),
        ("balanced".into(), 16_384),
        ("thorough".into(), 16_384),
    ])
}

fn default_input_ceilings() -> HashMap<String, usize> {
    HashMap::from([
        ("claude-haiku-4".into(), 200_000),
        ("claude-sonnet-4".into(), 200_000),
        ("claude-opus-4".into(), 200_000),
    ])
}

fn default_fallback_ceiling() -> usize {
    100_000
}

fn default_context_reserve() -> usize {
    20_000
}

fn default_cache_thresholds() -> Vec<CacheThreshold> {
    // Smaller/faster models need more stable content before a cache
    // write beats a cold call.
    vec![
        CacheThreshold {
            model_contains: "haiku".into(),
            min_tokens: 2_048,
        },
        CacheThreshold {
            model_contains: String::new(),
            min_tokens: 1_024,
        },
    ]
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            speed_map: default_speed_map(),
            max_output_tokens: default_output_tokens(),
            input_context_tokens: default_input_ceilings(),
            fallback_input_context_tokens: default_fallback_ceiling(),
            context_reserve_tokens: default_context_reserve(),
            cache_thresholds: default_cache_thresholds(),
        }
    }
}

impl ModelConfig {
    /// Resolve a speed alias to its model name, falling back to the
    /// alias itself so callers may pass concrete model names directly.
    pub fn resolve_model(&self, speed_or_model: &str) -> String {
        self.speed_map
            .get(speed_or_model)
            .cloned()
            .unwrap_or_else(|| speed_or_model.to_string())
    }

    /// Input context ceiling for a model.
    pub fn input_ceiling(&self, model: &str) -> usize {
        self.input_context_tokens
            .get(model)
            .copied()
            .unwrap_or(self.fallback_input_context_tokens)
    }

    /// Max output tokens for a speed alias (or a model name mapped
    /// through the speed map).
    pub fn output_ceiling(&self, speed: &str) -> u32 {
        self.max_output_tokens.get(speed).copied().unwrap_or(8_192)
    }
}

/// Batch sizing and execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Absolute safety ceiling on questions per LLM call. Bounds
    /// per-call latency and blast radius on failure.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Expected output tokens per answer; divides the output ceiling
    /// to derive the effective batch size.
    #[serde(default = "default_tokens_per_answer")]
    pub estimated_tokens_per_answer: u32,

    /// Per-batch LLM call ceiling in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub batch_timeout_ms: u64,
}

fn default_max_batch_size() -> usize {
    20
}

fn default_tokens_per_answer() -> u32 {
    800
}

fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            estimated_tokens_per_answer: default_tokens_per_answer(),
            batch_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Skill selection knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Default cap on selected skills when the caller gives none.
    #[serde(default = "default_max_skills")]
    pub max_skills: usize,

    /// Assumed mean token cost per skill for forecast mode.
    #[serde(default = "default_avg_skill_tokens")]
    pub avg_skill_tokens: usize,

    /// Multiplier applied to previously-used items in the
    /// context-continuity rerank, over a neutral baseline of 1.
    #[serde(default = "default_continuity_boost")]
    pub continuity_boost: f64,
}

fn default_max_skills() -> usize {
    10
}

fn default_avg_skill_tokens() -> usize {
    3_000
}

fn default_continuity_boost() -> f64 {
    10.0
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_skills: default_max_skills(),
            avg_skill_tokens: default_avg_skill_tokens(),
            continuity_boost: default_continuity_boost(),
        }
    }
}

/// Policy for batch items that parse but violate the answer contract
/// (a missing `response` field).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedItemPolicy {
    /// Reject the whole batch. A silently-wrong answer is worse than a
    /// visible failure.
    #[default]
    Strict,

    /// Tolerate the item with an empty response string.
    Lenient,
}

impl EngineConfig {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Engine config loaded");
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batching.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batching.max_batch_size must be at least 1".into(),
            ));
        }
        if self.batching.estimated_tokens_per_answer == 0 {
            return Err(ConfigError::Invalid(
                "batching.estimated_tokens_per_answer must be nonzero".into(),
            ));
        }
        if self.selection.max_skills == 0 {
            return Err(ConfigError::Invalid(
                "selection.max_skills must be at least 1".into(),
            ));
        }
        if self.selection.continuity_boost < 1.0 {
            return Err(ConfigError::Invalid(
                "selection.continuity_boost must be >= 1".into(),
            ));
        }
        if !self
            .models
            .cache_thresholds
            .iter()
            .any(|t| t.model_contains.is_empty())
        {
            return Err(ConfigError::Invalid(
                "models.cache_thresholds must include a catch-all row".into(),
            ));
        }
        Ok(())
    }
}
