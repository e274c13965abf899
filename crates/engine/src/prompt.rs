//! Prompt assembly: composition folding and cache-aware segmentation.
//!
//! Composition assembly is a pure fold over fragments returned by the
//! injected `BlockResolver` — no global registry. Segmentation splits
//! the system content into a stable, cacheable prefix and a dynamic
//! suffix when the stable part is large enough that a provider-side
//! cache write pays for itself.

use crate::token;
use answermill_config::ModelConfig;
use answermill_core::{
    BlockResolver, CompositionError, PromptComposition, SystemContent, SystemSegment,
};

/// A resolved composition: the assembled text plus the block ids that
/// contributed, kept for the transparency record.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    pub composition_id: String,
    pub block_ids: Vec<String>,
}

/// Resolve a composition into a system-prompt string by folding its
/// blocks in order, joined with blank lines.
pub fn assemble_composition(
    composition: &PromptComposition,
    resolver: &dyn BlockResolver,
) -> Result<AssembledPrompt, CompositionError> {
    let mut fragments = Vec::with_capacity(composition.block_ids.len());
    for block_id in &composition.block_ids {
        let fragment =
            resolver
                .resolve(block_id)
                .map_err(|_| CompositionError::BlockNotFound {
                    composition_id: composition.id.clone(),
                    block_id: block_id.clone(),
                })?;
        fragments.push(fragment);
    }

    Ok(AssembledPrompt {
        text: fragments.join("\n\n"),
        composition_id: composition.id.clone(),
        block_ids: composition.block_ids.clone(),
    })
}

/// Split system content into cacheable and dynamic segments.
///
/// Below the model's cache threshold (and without `force_caching`) the
/// overhead of a cache write costs more than a cold call, so the
/// content stays a single concatenated string. Otherwise the stable
/// content becomes a cacheable segment ordered *before* the dynamic
/// one, so the provider cache can match the stable prefix across calls
/// that differ only in the suffix.
///
/// Joining the returned segments in order always reproduces
/// `stable + "\n\n" + dynamic` (or just `stable` when dynamic is
/// empty).
pub fn build_system_content(
    stable: &str,
    dynamic: &str,
    model: &str,
    force_caching: bool,
    models: &ModelConfig,
) -> SystemContent {
    let stable_tokens = token::estimate_tokens(stable);
    let threshold = token::cache_threshold(model, models);

    if stable_tokens < threshold && !force_caching {
        let text = if dynamic.is_empty() {
            stable.to_string()
        } else {
            format!("{stable}\n\n{dynamic}")
        };
        tracing::debug!(
            stable_tokens,
            threshold,
            model,
            "System content below cache threshold, returning plain string"
        );
        return SystemContent::Plain(text);
    }

    let mut segments = vec![SystemSegment {
        text: stable.to_string(),
        cacheable: true,
    }];
    if !dynamic.is_empty() {
        segments.push(SystemSegment {
            text: dynamic.to_string(),
            cacheable: false,
        });
    }
    tracing::debug!(
        stable_tokens,
        threshold,
        model,
        segments = segments.len(),
        "System content split for prompt caching"
    );
    SystemContent::Segmented(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use answermill_core::StaticBlockResolver;

    fn resolver() -> StaticBlockResolver {
        StaticBlockResolver::new()
            .with_block("identity", "You are an RFP answering assistant.")
            .with_block("rules", "Answer only from the provided knowledge.")
            .with_block("format", "Return a JSON array.")
    }

    #[test]
    fn composition_folds_blocks_in_order() {
        let comp = PromptComposition::new(
            "comp-rfp",
            vec!["identity".into(), "rules".into(), "format".into()],
        );
        let assembled = assemble_composition(&comp, &resolver()).unwrap();
        assert_eq!(
            assembled.text,
            "You are an RFP answering assistant.\n\nAnswer only from the provided knowledge.\n\nReturn a JSON array."
        );
        assert_eq!(assembled.block_ids.len(), 3);
        assert_eq!(assembled.composition_id, "comp-rfp");
    }

    #[test]
    fn unknown_block_fails_with_both_ids() {
        let comp = PromptComposition::new("comp-x", vec!["identity".into(), "ghost".into()]);
        let err = assemble_composition(&comp, &resolver()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ghost"));
        assert!(msg.contains("comp-x"));
    }

    #[test]
    fn small_stable_content_stays_plain() {
        let models = ModelConfig::default();
        let content = build_system_content("short prompt", "dynamic part", "claude-sonnet-4", false, &models);
        assert_eq!(
            content,
            SystemContent::Plain("short prompt\n\ndynamic part".into())
        );
    }

    #[test]
    fn large_stable_content_is_segmented() {
        let models = ModelConfig::default();
        // Threshold for sonnet is 1024 tokens → 4096 chars.
        let stable = "s".repeat(5_000);
        let content = build_system_content(&stable, "dynamic", "claude-sonnet-4", false, &models);
        match &content {
            SystemContent::Segmented(segments) => {
                assert_eq!(segments.len(), 2);
                assert!(segments[0].cacheable);
                assert!(!segments[1].cacheable);
            }
            other => panic!("Expected segments, got: {other:?}"),
        }
    }

    #[test]
    fn force_caching_overrides_threshold() {
        let models = ModelConfig::default();
        let content = build_system_content("tiny", "", "claude-sonnet-4", true, &models);
        assert!(content.has_cacheable_segment());
    }

    #[test]
    fn joined_segments_reproduce_input() {
        let models = ModelConfig::default();
        let stable = "s".repeat(5_000);
        let dynamic = "runtime skills go here";

        let segmented =
            build_system_content(&stable, dynamic, "claude-sonnet-4", false, &models);
        assert_eq!(segmented.joined(), format!("{stable}\n\n{dynamic}"));

        let plain = build_system_content("small", dynamic, "claude-sonnet-4", false, &models);
        assert_eq!(plain.joined(), format!("small\n\n{dynamic}"));
    }

    #[test]
    fn empty_dynamic_yields_single_segment() {
        let models = ModelConfig::default();
        let stable = "s".repeat(5_000);
        let content = build_system_content(&stable, "", "claude-sonnet-4", false, &models);
        match &content {
            SystemContent::Segmented(segments) => assert_eq!(segments.len(), 1),
            other => panic!("Expected segments, got: {other:?}"),
        }
        assert_eq!(content.joined(), stable);
    }

    #[test]
    fn haiku_threshold_is_higher() {
        let models = ModelConfig::default();
        // ~1500 tokens: above sonnet's 1024, below haiku's 2048.
        let stable = "s".repeat(6_000);
        let sonnet = build_system_content(&stable, "", "claude-sonnet-4", false, &models);
        let haiku = build_system_content(&stable, "", "claude-haiku-4", false, &models);
        assert!(sonnet.has_cacheable_segment());
        assert!(!haiku.has_cacheable_segment());
    }
}
