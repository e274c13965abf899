//! Skill selection — three modes over an explicit strategy chain.
//!
//! The chain is an ordered list, not nested exception handling: the
//! orchestrator walks Semantic → Continuity → Keyword and stops at the
//! first tier that produces matches, recording which tier served the
//! result so callers and tests can observe fallbacks.
//!
//! Modes:
//! - `Preview` scores everything LLM-free for human review.
//! - `Execute` runs the full chain and returns the capped final set.
//! - `Forecast` is pure arithmetic for UI feedback before a run.

pub mod continuity;
pub mod keyword;
pub mod semantic;

use answermill_config::SelectionConfig;
use answermill_core::error::SelectionError;
use answermill_core::{
    CompletionProvider, CoverageStats, KnowledgeItem, RankedMatch, Result, SelectionMode,
    SelectionResult, SelectionStrategy,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-call selection options.
#[derive(Debug, Clone, Default)]
pub struct SelectionOptions {
    /// Cap on the returned set. Falls back to the configured default.
    pub max_skills: Option<usize>,

    /// Pre-approved skill ids. When present, the strategy chain is
    /// bypassed entirely.
    pub approved_skill_ids: Option<Vec<String>>,

    /// Skill ids used in a related thread/session — the hint that
    /// enables the continuity tier.
    pub prior_skill_ids: Vec<String>,
}

/// The selection orchestrator.
pub struct SkillSelector {
    provider: Arc<dyn CompletionProvider>,
    config: SelectionConfig,
    /// Model used for the semantic matching call.
    matching_model: String,
}

impl SkillSelector {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        config: SelectionConfig,
        matching_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            config,
            matching_model: matching_model.into(),
        }
    }

    /// Select knowledge items for a question set.
    ///
    /// Fails with `InvalidInput` for an empty question list or
    /// duplicate candidate ids, and with `NoCandidates` for an empty
    /// knowledge base — the latter is a real operational condition the
    /// caller must handle distinctly from "nothing matched".
    pub async fn select(
        &self,
        questions: &[String],
        candidates: &[KnowledgeItem],
        mode: SelectionMode,
        options: &SelectionOptions,
    ) -> Result<SelectionResult> {
        if questions.is_empty() {
            return Err(SelectionError::InvalidInput("question list is empty".into()).into());
        }
        if candidates.is_empty() {
            return Err(SelectionError::NoCandidates.into());
        }
        let mut seen = HashSet::new();
        for c in candidates {
            if !seen.insert(c.id.as_str()) {
                return Err(SelectionError::InvalidInput(format!(
                    "duplicate candidate id: {}",
                    c.id
                ))
                .into());
            }
        }

        let max_skills = options.max_skills.unwrap_or(self.config.max_skills).max(1);

        match mode {
            SelectionMode::Forecast => Ok(self.forecast(candidates.len(), max_skills)),
            SelectionMode::Preview => Ok(self.preview(questions, candidates, max_skills)),
            SelectionMode::Execute => {
                self.execute(questions, candidates, max_skills, options).await
            }
        }
    }

    /// Forecast never touches the LLM: a cheap estimate for UI
    /// responsiveness before committing to a run.
    fn forecast(&self, candidate_count: usize, max_skills: usize) -> SelectionResult {
        let estimated_selected_skills = max_skills.min(candidate_count);
        let estimated_tokens = estimated_selected_skills * self.config.avg_skill_tokens;
        let coverage_percent =
            (estimated_selected_skills as f64 / candidate_count as f64 * 100.0).min(100.0);

        SelectionResult::Forecast {
            estimated_selected_skills,
            estimated_tokens,
            coverage_percent,
        }
    }

    /// Preview scores every candidate without an LLM call so a human
    /// can review and override before execution. `all_skills` ignores
    /// the cap by design.
    fn preview(
        &self,
        questions: &[String],
        candidates: &[KnowledgeItem],
        max_skills: usize,
    ) -> SelectionResult {
        let all_skills = keyword::score_all(questions, candidates);
        let recommendations: Vec<RankedMatch> =
            all_skills.iter().take(max_skills).cloned().collect();

        let avg_score = if all_skills.is_empty() {
            0.0
        } else {
            all_skills.iter().map(|m| m.score).sum::<f64>() / all_skills.len() as f64
        };

        SelectionResult::Preview {
            coverage: CoverageStats {
                recommended_count: recommendations.len(),
                total_skills: all_skills.len(),
                avg_score,
            },
            recommendations,
            all_skills,
            strategy: SelectionStrategy::Keyword,
        }
    }

    /// Execute mode: approved ids bypass the chain; otherwise walk the
    /// tiers in order and stop at the first that produces matches.
    async fn execute(
        &self,
        questions: &[String],
        candidates: &[KnowledgeItem],
        max_skills: usize,
        options: &SelectionOptions,
    ) -> Result<SelectionResult> {
        if let Some(approved) = options
            .approved_skill_ids
            .as_ref()
            .filter(|ids| !ids.is_empty())
        {
            let selected = self.approved_matches(questions, candidates, approved, max_skills);
            info!(count = selected.len(), "Selection served by approved skill ids");
            return Ok(SelectionResult::Execute {
                selected,
                strategy: SelectionStrategy::Approved,
            });
        }

        // Tier 1: semantic matching.
        match semantic::try_match(&self.provider, &self.matching_model, questions, candidates)
            .await
        {
            Ok(matches) if !matches.is_empty() => {
                info!(count = matches.len(), "Selection served by semantic tier");
                return Ok(self.capped(matches, max_skills, SelectionStrategy::Semantic));
            }
            Ok(_) => {
                debug!("Semantic tier returned zero matches, falling through");
            }
            Err(e) => {
                warn!(error = %e, "Semantic tier failed, falling through");
            }
        }

        // Tier 2: context continuity, when prior hints exist.
        if let Some(matches) = continuity::rerank(
            candidates,
            &options.prior_skill_ids,
            self.config.continuity_boost,
        ) {
            info!(count = matches.len(), "Selection served by continuity tier");
            return Ok(self.capped(matches, max_skills, SelectionStrategy::Continuity));
        }

        // Tier 3: keyword scoring always produces a ranking.
        let matches = keyword::score_all(questions, candidates);
        info!(count = matches.len(), "Selection served by keyword tier");
        Ok(self.capped(matches, max_skills, SelectionStrategy::Keyword))
    }

    fn capped(
        &self,
        matches: Vec<RankedMatch>,
        max_skills: usize,
        strategy: SelectionStrategy,
    ) -> SelectionResult {
        SelectionResult::Execute {
            selected: matches.into_iter().take(max_skills).collect(),
            strategy,
        }
    }

    /// Build matches for caller-approved ids, scored by the keyword
    /// scorer so the transparency metadata stays meaningful. Unknown
    /// ids are ignored.
    fn approved_matches(
        &self,
        questions: &[String],
        candidates: &[KnowledgeItem],
        approved: &[String],
        max_skills: usize,
    ) -> Vec<RankedMatch> {
        let approved_set: HashSet<&str> = approved.iter().map(String::as_str).collect();
        let filtered: Vec<KnowledgeItem> = candidates
            .iter()
            .filter(|c| approved_set.contains(c.id.as_str()))
            .cloned()
            .collect();
        keyword::score_all(questions, &filtered)
            .into_iter()
            .take(max_skills)
            .collect()
    }
}
