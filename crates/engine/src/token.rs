//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This
//! approximation is accurate within ~10% for BPE tokenizers on English
//! text, and all batch sizing and overflow margins downstream are
//! calibrated around its conservative bias. Do not swap in an exact
//! tokenizer without re-deriving those margins.

use answermill_config::ModelConfig;
use answermill_core::{KnowledgeItem, Question};

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up. The single source of
/// truth for "how big is this text" — every budget decision in the
/// engine goes through this function.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for an optional string; absent input costs nothing.
pub fn estimate_opt_tokens(text: Option<&str>) -> usize {
    text.map(estimate_tokens).unwrap_or(0)
}

/// Estimate tokens for a question including its optional context.
pub fn estimate_question_tokens(question: &Question) -> usize {
    estimate_tokens(&question.text) + estimate_opt_tokens(question.context.as_deref())
}

/// Estimate tokens for a knowledge item as injected into a prompt
/// (title plus full content).
pub fn estimate_item_tokens(item: &KnowledgeItem) -> usize {
    estimate_tokens(&item.title) + estimate_tokens(&item.content)
}

/// Minimum stable-content size before prompt caching pays off for a
/// model, from the configured substring lookup table. First matching
/// row wins; the catch-all row (empty substring) always matches.
pub fn cache_threshold(model: &str, models: &ModelConfig) -> usize {
    let lowered = model.to_lowercase();
    models
        .cache_thresholds
        .iter()
        .find(|row| lowered.contains(&row.model_contains))
        .map(|row| row.min_tokens)
        .unwrap_or(1_024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn monotonically_non_decreasing() {
        let mut prev = 0;
        for len in 0..64 {
            let tokens = estimate_tokens(&"x".repeat(len));
            assert!(tokens >= prev);
            prev = tokens;
        }
    }

    #[test]
    fn absent_input_is_zero() {
        assert_eq!(estimate_opt_tokens(None), 0);
        assert_eq!(estimate_opt_tokens(Some("text")), 1);
    }

    #[test]
    fn question_context_counts() {
        let bare = Question::new(0, "12345678");
        let with_ctx = Question::new(0, "12345678").with_context("12345678");
        assert_eq!(estimate_question_tokens(&bare), 2);
        assert_eq!(estimate_question_tokens(&with_ctx), 4);
    }

    #[test]
    fn haiku_needs_more_stable_content() {
        let models = ModelConfig::default();
        assert_eq!(cache_threshold("claude-haiku-4", &models), 2_048);
        assert_eq!(cache_threshold("claude-sonnet-4", &models), 1_024);
    }

    #[test]
    fn unknown_model_hits_catch_all() {
        let models = ModelConfig::default();
        assert_eq!(cache_threshold("some-future-model", &models), 1_024);
    }

    #[test]
    fn threshold_lookup_is_case_insensitive() {
        let models = ModelConfig::default();
        assert_eq!(cache_threshold("Claude-Haiku-4", &models), 2_048);
    }
}
