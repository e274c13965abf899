//! Scope-based relevance scoring.
//!
//! Scores a question against a knowledge item's declared scope without
//! invoking an LLM. Terms from `covers` carry weight 0.7, terms from
//! `future_additions` 0.2, and any `not_included` hit subtracts 0.5.
//! Scores are clamped to [0, 1]; an item without scope metadata scores
//! exactly 0.

use answermill_core::KnowledgeItem;

const COVERS_WEIGHT: f64 = 0.7;
const FUTURE_WEIGHT: f64 = 0.2;
const EXCLUSION_PENALTY: f64 = 0.5;

/// The outcome of scoring one item, with the terms that drove it.
#[derive(Debug, Clone, Default)]
pub struct ScopeScore {
    /// Relevance in [0, 1].
    pub score: f64,
    /// Scope terms that matched the question text.
    pub matched_terms: Vec<String>,
    /// `not_included` terms found in the question.
    pub excluded_terms: Vec<String>,
}

/// Score a single question against one knowledge item.
pub fn score_item(question: &str, item: &KnowledgeItem) -> ScopeScore {
    let Some(scope) = &item.scope else {
        return ScopeScore::default();
    };
    if scope.covers.trim().is_empty() {
        return ScopeScore::default();
    }

    let question_lower = question.to_lowercase();
    let mut matched_terms = Vec::new();
    let mut excluded_terms = Vec::new();

    let covers_terms = split_terms(&scope.covers);
    // A covers string of only delimiters yields zero terms; bail out
    // before the hit fraction divides by zero.
    if covers_terms.is_empty() {
        return ScopeScore::default();
    }
    let covers_hits = covers_terms
        .iter()
        .filter(|term| {
            let hit = term_matches(term, &question_lower);
            if hit {
                matched_terms.push((*term).clone());
            }
            hit
        })
        .count();
    let covers_fraction = covers_hits as f64 / covers_terms.len() as f64;

    let future_fraction = if scope.future_additions.is_empty() {
        0.0
    } else {
        let hits = scope
            .future_additions
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .filter(|term| {
                let hit = term_matches(term, &question_lower);
                if hit {
                    matched_terms.push(term.clone());
                }
                hit
            })
            .count();
        hits as f64 / scope.future_additions.len() as f64
    };

    let mut score = COVERS_WEIGHT * covers_fraction + FUTURE_WEIGHT * future_fraction;

    for term in scope
        .not_included
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
    {
        if term_matches(&term, &question_lower) {
            excluded_terms.push(term);
            score -= EXCLUSION_PENALTY;
        }
    }

    ScopeScore {
        score: score.clamp(0.0, 1.0),
        matched_terms,
        excluded_terms,
    }
}

/// Score a batch of questions against one item.
///
/// Combines per-question scores as `0.6 * average + 0.4 * max`: items
/// reliably relevant across the batch win, without burying an item
/// that is a perfect match for a single question. Returns `None` for
/// an empty question list — callers treat that as "no selection
/// possible", not a crash.
pub fn score_item_for_batch(questions: &[String], item: &KnowledgeItem) -> Option<ScopeScore> {
    if questions.is_empty() {
        return None;
    }

    let per_question: Vec<ScopeScore> = questions.iter().map(|q| score_item(q, item)).collect();

    let avg = per_question.iter().map(|s| s.score).sum::<f64>() / per_question.len() as f64;
    let max = per_question
        .iter()
        .map(|s| s.score)
        .fold(0.0_f64, f64::max);

    let mut matched_terms: Vec<String> = Vec::new();
    let mut excluded_terms: Vec<String> = Vec::new();
    for s in per_question {
        for t in s.matched_terms {
            if !matched_terms.contains(&t) {
                matched_terms.push(t);
            }
        }
        for t in s.excluded_terms {
            if !excluded_terms.contains(&t) {
                excluded_terms.push(t);
            }
        }
    }

    Some(ScopeScore {
        score: (0.6 * avg + 0.4 * max).clamp(0.0, 1.0),
        matched_terms,
        excluded_terms,
    })
}

/// Split a comma/semicolon-delimited covers string into lowercased,
/// trimmed, non-empty terms.
fn split_terms(covers: &str) -> Vec<String> {
    covers
        .split([',', ';'])
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether a scope term matches the lowercased question.
///
/// A term matches when it appears verbatim in the question, when any
/// of its individual words (>2 chars) appears in the question, or when
/// a question word and a term word share a stem — the last rule lets
/// "invoice" in a question hit the covers term "invoicing".
fn term_matches(term: &str, question_lower: &str) -> bool {
    if question_lower.contains(term) {
        return true;
    }
    let term_words: Vec<&str> = term.split_whitespace().collect();
    if term_words
        .iter()
        .filter(|w| w.len() > 2)
        .any(|w| question_lower.contains(*w))
    {
        return true;
    }
    question_lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.len() > 3)
        .any(|qw| {
            term_words
                .iter()
                .filter(|tw| tw.len() > 3)
                .any(|tw| share_stem(qw, tw))
        })
}

/// Whether two words agree on a leading stem of at least four
/// characters, so inflected forms ("invoice"/"invoicing",
/// "encrypt"/"encryption") match each other.
fn share_stem(a: &str, b: &str) -> bool {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
        >= 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use answermill_core::{KnowledgeItem, ScopeDefinition};

    fn item_covering(covers: &str) -> KnowledgeItem {
        KnowledgeItem::new("sk-1", "Test Skill", "content")
            .with_scope(ScopeDefinition::new(covers))
    }

    #[test]
    fn absent_scope_scores_zero() {
        let item = KnowledgeItem::new("sk-1", "No Scope", "content");
        let result = score_item("anything at all", &item);
        assert_eq!(result.score, 0.0);
        assert!(result.matched_terms.is_empty());
    }

    #[test]
    fn empty_covers_scores_zero() {
        let item = item_covering("   ");
        assert_eq!(score_item("question", &item).score, 0.0);
    }

    #[test]
    fn full_covers_match_scores_seven_tenths() {
        let item = item_covering("password reset");
        let result = score_item("how do I do a password reset?", &item);
        assert!((result.score - 0.7).abs() < 1e-9);
        assert_eq!(result.matched_terms, vec!["password reset"]);
    }

    #[test]
    fn invoicing_matches_invoice_via_stem() {
        let item = item_covering("billing, invoicing");
        let result = score_item("How do I update my invoice address?", &item);
        assert!(result.score > 0.3, "got {}", result.score);
        assert!(result.matched_terms.contains(&"invoicing".to_string()));
    }

    #[test]
    fn stems_match_across_inflections() {
        assert!(share_stem("invoice", "invoicing"));
        assert!(share_stem("encryption", "encrypt"));
        assert!(!share_stem("color", "encryption"));
        // Three shared characters are not enough.
        assert!(!share_stem("address", "additional"));
    }

    #[test]
    fn delimiter_only_covers_scores_zero() {
        let item = item_covering(",,;");
        let result = score_item("any question at all", &item);
        assert_eq!(result.score, 0.0);
        assert!(result.score.is_finite());
        assert!(result.matched_terms.is_empty());
    }

    #[test]
    fn not_included_penalizes() {
        let mut scope = ScopeDefinition::new("billing, invoicing");
        scope.not_included = vec!["refunds".into()];
        let with_exclusion =
            KnowledgeItem::new("sk-1", "Billing", "content").with_scope(scope);
        let without_exclusion = item_covering("billing, invoicing");

        let q = "What is your refunds policy for billing?";
        let penalized = score_item(q, &with_exclusion);
        let clean = score_item(q, &without_exclusion);
        assert!(penalized.score < clean.score);
        assert_eq!(penalized.excluded_terms, vec!["refunds"]);
    }

    #[test]
    fn score_never_negative() {
        let mut scope = ScopeDefinition::new("alpha");
        scope.not_included = vec!["billing".into(), "invoices".into()];
        let item = KnowledgeItem::new("sk-1", "T", "c").with_scope(scope);
        let result = score_item("billing invoices everywhere", &item);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn future_additions_contribute_less() {
        let mut scope = ScopeDefinition::default();
        scope.covers = "networking".into();
        scope.future_additions = vec!["kubernetes".into()];
        let item = KnowledgeItem::new("sk-1", "Infra", "c").with_scope(scope);

        let result = score_item("do you support kubernetes?", &item);
        // Only the future term matches: 0.2 * 1/1.
        assert!((result.score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn batch_combine_rewards_consistency_and_peaks() {
        let item = item_covering("encryption");
        let questions = vec![
            "Is data encryption at rest supported?".to_string(),
            "What is your favorite color?".to_string(),
        ];
        let combined = score_item_for_batch(&questions, &item).unwrap();
        // avg = 0.35, max = 0.7 → 0.6*0.35 + 0.4*0.7 = 0.49
        assert!((combined.score - 0.49).abs() < 1e-9);
        assert_eq!(combined.matched_terms, vec!["encryption"]);
    }

    #[test]
    fn empty_question_list_is_none() {
        let item = item_covering("anything");
        assert!(score_item_for_batch(&[], &item).is_none());
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let mut scope = ScopeDefinition::new("a, b, c");
        scope.future_additions = vec!["a".into(), "b".into()];
        let item = KnowledgeItem::new("sk-1", "T", "c").with_scope(scope);
        let questions: Vec<String> = vec!["a b c together".into()];
        let combined = score_item_for_batch(&questions, &item).unwrap();
        assert!(combined.score <= 1.0);
        assert!(combined.score >= 0.0);
    }
}
