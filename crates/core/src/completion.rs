//! CompletionProvider trait — the abstraction over the LLM backend.
//!
//! The engine never talks to a wire protocol directly; it calls
//! `complete()` on an injected provider and gets text plus token-usage
//! counters back. Transport, auth, and retries live behind this seam.

use crate::answer::UsageInfo;
use crate::error::CompletionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// System content for a completion call, either a plain string or an
/// ordered list of segments with per-segment cacheability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemContent {
    Plain(String),
    Segmented(Vec<SystemSegment>),
}

/// One segment of system content. Cacheable segments must precede
/// non-cacheable ones so the provider's cache can match a stable prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSegment {
    pub text: String,
    pub cacheable: bool,
}

impl SystemContent {
    /// Reconstruct the full system prompt, joining segments with the
    /// standard separator. Used for token accounting and transparency.
    pub fn joined(&self) -> String {
        match self {
            Self::Plain(s) => s.clone(),
            Self::Segmented(segments) => segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// Whether any segment is flagged cacheable.
    pub fn has_cacheable_segment(&self) -> bool {
        match self {
            Self::Plain(_) => false,
            Self::Segmented(segments) => segments.iter().any(|s| s.cacheable),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g. "claude-sonnet-4").
    pub model: String,

    /// System content, possibly split for prompt caching.
    pub system: SystemContent,

    /// The user message.
    pub user_message: String,

    /// Maximum tokens to generate.
    pub max_output_tokens: u32,
}

/// A completion response: text plus raw usage counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text. May be empty — the engine treats that as a
    /// failure condition distinct from transport errors.
    pub text: String,

    /// Token usage as reported by the provider.
    pub usage: UsageInfo,
}

/// The completion collaborator trait.
///
/// The engine calls `complete()` without knowing which provider is
/// behind it — pure polymorphism, and trivial to mock in tests.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_joined_is_identity() {
        let content = SystemContent::Plain("You are helpful.".into());
        assert_eq!(content.joined(), "You are helpful.");
        assert!(!content.has_cacheable_segment());
    }

    #[test]
    fn segmented_joins_with_separator() {
        let content = SystemContent::Segmented(vec![
            SystemSegment {
                text: "stable".into(),
                cacheable: true,
            },
            SystemSegment {
                text: "dynamic".into(),
                cacheable: false,
            },
        ]);
        assert_eq!(content.joined(), "stable\n\ndynamic");
        assert!(content.has_cacheable_segment());
    }

    #[test]
    fn request_roundtrip() {
        let req = CompletionRequest {
            model: "claude-sonnet-4".into(),
            system: SystemContent::Plain("sys".into()),
            user_message: "hello".into(),
            max_output_tokens: 8192,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: CompletionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model, "claude-sonnet-4");
        assert_eq!(back.system.joined(), "sys");
    }
}
