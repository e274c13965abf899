//! Skill selection result types.
//!
//! Selection runs in one of three modes: `Preview` for human review,
//! `Execute` for the final prompt-injection set, `Forecast` for a cheap
//! no-LLM estimate before committing to a run.

use crate::answer::Confidence;
use serde::{Deserialize, Serialize};

/// Which strategy tier produced the final selection. Observable so
/// callers and tests can assert fallback behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// LLM-based semantic matching against scope summaries.
    Semantic,
    /// Context-continuity reranking of previously-used items.
    Continuity,
    /// Scope-term keyword scoring, the final fallback.
    Keyword,
    /// Caller supplied pre-approved skill ids; no strategy ran.
    Approved,
}

/// One scored candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMatch {
    pub skill_id: String,
    pub title: String,

    /// Relevance in [0, 1]. Monotonic with `confidence`.
    pub score: f64,

    pub confidence: Confidence,

    /// Human-readable justification for the score.
    pub reason: String,

    /// Scope terms that matched the question set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_terms: Vec<String>,
}

impl RankedMatch {
    /// Map a score onto its confidence tier. Higher score never yields
    /// a lower tier, which keeps score and confidence monotonic.
    pub fn confidence_for_score(score: f64) -> Confidence {
        if score >= 0.7 {
            Confidence::High
        } else if score >= 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Sort matches descending by score, ties broken ascending by title so
/// results are reproducible.
pub fn sort_matches(matches: &mut [RankedMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
}

/// Aggregate coverage stats for preview mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageStats {
    pub recommended_count: usize,
    pub total_skills: usize,
    pub avg_score: f64,
}

/// The result of a selection call, tagged by mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SelectionResult {
    /// For human review before execution. Never commits to an LLM run.
    Preview {
        /// The capped recommendation set.
        recommendations: Vec<RankedMatch>,
        /// Every candidate, scored — lets a human override the cap.
        all_skills: Vec<RankedMatch>,
        coverage: CoverageStats,
        strategy: SelectionStrategy,
    },

    /// The final set to inject into prompts.
    Execute {
        selected: Vec<RankedMatch>,
        strategy: SelectionStrategy,
    },

    /// A cheap, no-LLM-call estimate for UI feedback.
    Forecast {
        estimated_selected_skills: usize,
        estimated_tokens: usize,
        coverage_percent: f64,
    },
}

/// The requested selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Preview,
    Execute,
    Forecast,
}
