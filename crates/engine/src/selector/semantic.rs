//! Semantic strategy — LLM-based matching, the first tier.
//!
//! Sends candidate scope summaries plus the full question set to the
//! model and asks for matched skill ids with a reason and a coarse
//! confidence bucket. Any failure (transport, parse, unknown ids only,
//! zero matches) makes the orchestrator fall through to the next tier.

use crate::parser;
use answermill_core::{
    CompletionProvider, CompletionRequest, Confidence, Error, KnowledgeItem, RankedMatch,
    SystemContent, sort_matches,
};
use serde::Deserialize;
use std::sync::Arc;

const MATCHER_SYSTEM_PROMPT: &str = "You match knowledge base entries to questionnaire questions. \
Given a list of skills (id and scope) and a list of questions, return a JSON array of the skills \
needed to answer the questions. Each element must be an object with fields \
\"skillId\", \"reason\", and \"confidence\" (High, Medium, or Low). \
Return only skills that are genuinely relevant. Return [] if none apply.";

const MATCHER_MAX_OUTPUT_TOKENS: u32 = 2_048;

/// The wire shape expected from the matching call.
#[derive(Debug, Deserialize)]
struct SemanticHit {
    #[serde(alias = "skillId")]
    skill_id: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: Option<String>,
}

/// Representative scores for the coarse confidence buckets, chosen so
/// score and confidence stay monotonic.
fn score_for_bucket(confidence: Confidence) -> f64 {
    match confidence {
        Confidence::High => 0.9,
        Confidence::Medium => 0.55,
        Confidence::Low => 0.2,
    }
}

/// Ask the model to match candidates to questions.
///
/// Returns an empty vec when the model reports no relevant skills or
/// when every returned id is unknown — the orchestrator treats both as
/// a miss.
pub async fn try_match(
    provider: &Arc<dyn CompletionProvider>,
    model: &str,
    questions: &[String],
    candidates: &[KnowledgeItem],
) -> Result<Vec<RankedMatch>, Error> {
    let request = CompletionRequest {
        model: model.to_string(),
        system: SystemContent::Plain(MATCHER_SYSTEM_PROMPT.to_string()),
        user_message: build_matching_message(questions, candidates),
        max_output_tokens: MATCHER_MAX_OUTPUT_TOKENS,
    };

    let response = provider.complete(request).await?;

    let payload = parser::extract_json_payload(&response.text).ok_or_else(|| {
        Error::Internal(format!(
            "Semantic matcher returned no JSON: {}",
            response.text.chars().take(120).collect::<String>()
        ))
    })?;

    let hits: Vec<SemanticHit> = serde_json::from_str(payload)?;

    let mut matches: Vec<RankedMatch> = hits
        .into_iter()
        .filter_map(|hit| {
            let item = candidates.iter().find(|c| c.id == hit.skill_id)?;
            let confidence = hit
                .confidence
                .as_deref()
                .map(Confidence::parse)
                .unwrap_or(Confidence::Medium);
            Some(RankedMatch {
                skill_id: item.id.clone(),
                title: item.title.clone(),
                score: score_for_bucket(confidence),
                confidence,
                reason: if hit.reason.is_empty() {
                    "Matched by semantic analysis".to_string()
                } else {
                    hit.reason
                },
                matched_terms: Vec::new(),
            })
        })
        .collect();

    sort_matches(&mut matches);
    Ok(matches)
}

/// Lay out candidate summaries and questions for the matching call.
fn build_matching_message(questions: &[String], candidates: &[KnowledgeItem]) -> String {
    let mut message = String::from("Skills:\n");
    for item in candidates {
        message.push_str(&format!("- {} | {}\n", item.id, item.scope_summary()));
    }
    message.push_str("\nQuestions:\n");
    for (i, q) in questions.iter().enumerate() {
        message.push_str(&format!("{}. {}\n", i + 1, q));
    }
    message
}
