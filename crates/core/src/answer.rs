//! Answer records and their transparency metadata.
//!
//! An `AnswerRecord` is created once per question per successful batch
//! call and never mutated afterwards. All records from one batch share
//! a single `Transparency` by reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Coarse answer confidence reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Parse the model's confidence string, case-insensitively.
    /// Unknown values fall back to `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// The audit artifact capturing exactly what prompt and content
/// produced a batch of answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transparency {
    /// The fully assembled system prompt sent to the model.
    pub system_prompt: String,

    /// Identifier of the prompt composition that was resolved.
    pub composition_id: String,

    /// Block ids that contributed to the composition, in order.
    pub block_ids: Vec<String>,

    /// Block ids injected at runtime (knowledge items, file context).
    pub runtime_block_ids: Vec<String>,

    /// When the prompt was assembled.
    pub assembled_at: DateTime<Utc>,
}

/// Token usage counters for a single LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,

    /// Tokens written to the provider's prompt cache, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u32>,

    /// Tokens served from the provider's prompt cache, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u32>,
}

impl UsageInfo {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Whether the provider reported a prompt-cache hit for this call.
    pub fn cache_hit(&self) -> bool {
        self.cache_read_tokens.is_some_and(|t| t > 0)
    }
}

/// One structured answer, joined to its question by `question_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Unique record id.
    pub id: String,

    /// Join key back to the originating `Question`.
    pub question_index: usize,

    /// The answer text.
    pub response: String,

    /// Model-reported confidence. Defaults to Medium when absent.
    pub confidence: Confidence,

    /// Which knowledge items the answer drew on, as reported.
    pub sources: String,

    /// The model's reasoning summary.
    pub reasoning: String,

    /// Whether the answer required inference beyond the sources.
    /// Literal "None" when the model reports no inference.
    pub inference: String,

    /// Caveats or remarks. Literal "None" when absent.
    pub remarks: String,

    /// Best-effort even split of the batch call's aggregate usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,

    /// Shared audit metadata for the batch this record came from.
    pub transparency: Arc<Transparency>,
}

impl AnswerRecord {
    pub fn new(
        question_index: usize,
        response: impl Into<String>,
        confidence: Confidence,
        transparency: Arc<Transparency>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            question_index,
            response: response.into(),
            confidence,
            sources: "None".into(),
            reasoning: String::new(),
            inference: "None".into(),
            remarks: "None".into(),
            tokens_used: None,
            transparency,
        }
    }
}
