//! Keyword strategy — scope-term scoring, the final fallback tier.
//!
//! Pure and LLM-free: every candidate gets a score from the scope
//! relevance scorer, so this tier always produces a ranking.

use crate::scorer;
use answermill_core::{KnowledgeItem, RankedMatch, sort_matches};

/// Score every candidate against the question set.
///
/// Returns one match per candidate, sorted descending by score with
/// the alphabetical tie-break. Items without scope metadata are kept
/// at score 0 so preview mode can show the full library.
pub fn score_all(questions: &[String], candidates: &[KnowledgeItem]) -> Vec<RankedMatch> {
    let mut matches: Vec<RankedMatch> = candidates
        .iter()
        .map(|item| {
            let scored = scorer::score_item_for_batch(questions, item).unwrap_or_default();
            let reason = if !scored.excluded_terms.is_empty() {
                format!(
                    "Penalized by out-of-scope terms: {}",
                    scored.excluded_terms.join(", ")
                )
            } else if scored.matched_terms.is_empty() {
                "No scope terms matched".to_string()
            } else {
                format!("Matched scope terms: {}", scored.matched_terms.join(", "))
            };

            RankedMatch {
                skill_id: item.id.clone(),
                title: item.title.clone(),
                score: scored.score,
                confidence: RankedMatch::confidence_for_score(scored.score),
                reason,
                matched_terms: scored.matched_terms,
            }
        })
        .collect();

    sort_matches(&mut matches);
    matches
}
