//! Context-continuity strategy — the middle fallback tier.
//!
//! When semantic matching fails but the caller carries hints from a
//! related thread or session, items used there are boosted by a fixed
//! multiplier over a neutral baseline of 1 and the candidates are
//! reranked. The tier only applies when at least one hinted item is
//! among the candidates.

use answermill_core::{KnowledgeItem, RankedMatch, sort_matches};

/// Rerank candidates by prior-session usage.
///
/// Returns `None` when no hint matches any candidate — the caller
/// moves on to the next tier. Boosted items normalize to score 1.0,
/// the rest to `1/boost`.
pub fn rerank(
    candidates: &[KnowledgeItem],
    prior_skill_ids: &[String],
    boost: f64,
) -> Option<Vec<RankedMatch>> {
    if prior_skill_ids.is_empty() {
        return None;
    }

    let any_hint_present = candidates
        .iter()
        .any(|c| prior_skill_ids.iter().any(|id| id == &c.id));
    if !any_hint_present {
        return None;
    }

    let mut matches: Vec<RankedMatch> = candidates
        .iter()
        .map(|item| {
            let used_before = prior_skill_ids.iter().any(|id| id == &item.id);
            let weight = if used_before { boost } else { 1.0 };
            let score = (weight / boost).clamp(0.0, 1.0);

            RankedMatch {
                skill_id: item.id.clone(),
                title: item.title.clone(),
                score,
                confidence: RankedMatch::confidence_for_score(score),
                reason: if used_before {
                    "Used earlier in this session context".to_string()
                } else {
                    "Not seen in prior context".to_string()
                },
                matched_terms: Vec::new(),
            }
        })
        .collect();

    sort_matches(&mut matches);
    Some(matches)
}
