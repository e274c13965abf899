//! The end-to-end answering pipeline.
//!
//! One `answer_questions` run is: resolve the prompt composition,
//! select knowledge items, split the system content for caching,
//! slice the questions into batches, then execute the batches
//! sequentially. Sequential execution is deliberate: later batches hit
//! the prompt cache written by the first, and a provider outage stops
//! the run at the first failure instead of fanning out.

use crate::batch;
use crate::breaker::CircuitBreaker;
use crate::executor::BatchExecutionEngine;
use crate::prompt;
use crate::selector::{SelectionOptions, SkillSelector};
use crate::transparency;
use answermill_config::EngineConfig;
use answermill_core::{
    AnswerRecord, BlockResolver, CompletionProvider, Error, KnowledgeItem, PromptComposition,
    Question, Result, SelectionMode, SelectionResult, SelectionStrategy, UsageInfo,
};
use std::sync::Arc;
use tracing::info;

/// Aggregate token usage across every LLM call in one run.
#[derive(Debug, Clone, Default)]
pub struct RunUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cache_creation_tokens: u32,
    pub cache_read_tokens: u32,
    /// Number of batch calls that completed.
    pub calls: usize,
}

impl RunUsage {
    fn absorb(&mut self, usage: &UsageInfo) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cache_creation_tokens += usage.cache_creation_tokens.unwrap_or(0);
        self.cache_read_tokens += usage.cache_read_tokens.unwrap_or(0);
        self.calls += 1;
    }
}

/// The result of one full pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Every answer, sorted by question index.
    pub answers: Vec<AnswerRecord>,

    /// Which selection tier produced the knowledge set.
    pub strategy: SelectionStrategy,

    /// Ids of the knowledge items injected into the prompt, in rank
    /// order.
    pub selected_skill_ids: Vec<String>,

    pub usage: RunUsage,
    pub batches_executed: usize,
}

/// The top-level pipeline facade wiring selector and executor around a
/// shared provider and breaker.
pub struct AnswerPipeline {
    selector: SkillSelector,
    executor: BatchExecutionEngine,
    config: EngineConfig,
}

impl AnswerPipeline {
    /// The semantic matching call always runs on the fast model tier;
    /// it is a classification task and the answer quality does not
    /// improve with a larger model.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        breaker: Arc<CircuitBreaker>,
        config: EngineConfig,
    ) -> Self {
        let matching_model = config.models.resolve_model("fast");
        let selector = SkillSelector::new(
            provider.clone(),
            config.selection.clone(),
            matching_model,
        );
        let executor = BatchExecutionEngine::new(provider, breaker, config.clone());
        Self {
            selector,
            executor,
            config,
        }
    }

    /// Attach a trace sink for the batch calls.
    pub fn with_trace(mut self, trace: Arc<dyn answermill_core::TraceSink>) -> Self {
        self.executor = self.executor.with_trace(trace);
        self
    }

    /// Answer a question set against a knowledge base.
    ///
    /// `speed` picks the answering model tier. Any batch failure aborts
    /// the run; answers from earlier batches are discarded with it, so
    /// a returned `RunOutcome` always covers every question.
    pub async fn answer_questions(
        &self,
        questions: &[Question],
        knowledge: &[KnowledgeItem],
        composition: &PromptComposition,
        resolver: &dyn BlockResolver,
        speed: &str,
        options: &SelectionOptions,
    ) -> Result<RunOutcome> {
        let assembled = prompt::assemble_composition(composition, resolver)?;

        let texts: Vec<String> = questions.iter().map(|q| q.text.clone()).collect();
        let selection = self
            .selector
            .select(&texts, knowledge, SelectionMode::Execute, options)
            .await?;
        let SelectionResult::Execute { selected, strategy } = selection else {
            return Err(Error::Internal(
                "execute-mode selection returned a non-execute result".into(),
            ));
        };

        let selected_skill_ids: Vec<String> =
            selected.iter().map(|m| m.skill_id.clone()).collect();
        let dynamic = render_knowledge(knowledge, &selected_skill_ids);

        let model = self.config.models.resolve_model(speed);
        let system = prompt::build_system_content(
            &assembled.text,
            &dynamic,
            &model,
            false,
            &self.config.models,
        );

        let batch_size = batch::derive_batch_size(
            self.config.models.output_ceiling(speed),
            &self.config.batching,
        );
        let batches = batch::compose(questions, batch_size);

        info!(
            questions = questions.len(),
            batches = batches.len(),
            batch_size,
            strategy = ?strategy,
            skills = selected_skill_ids.len(),
            model,
            "Pipeline run starting"
        );

        let mut answers: Vec<AnswerRecord> = Vec::with_capacity(questions.len());
        let mut usage = RunUsage::default();
        let batches_executed = batches.len();

        for question_batch in &batches {
            let shared = transparency::batch_transparency(
                system.joined(),
                assembled.composition_id.clone(),
                assembled.block_ids.clone(),
                selected_skill_ids.clone(),
            );
            let result = self
                .executor
                .execute_batch(question_batch, system.clone(), shared, speed)
                .await?;
            usage.absorb(&result.usage);
            answers.extend(result.records);
        }

        answers.sort_by_key(|r| r.question_index);

        info!(
            answers = answers.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cache_read_tokens = usage.cache_read_tokens,
            "Pipeline run finished"
        );

        Ok(RunOutcome {
            answers,
            strategy,
            selected_skill_ids,
            usage,
            batches_executed,
        })
    }
}

/// Render the selected knowledge items as the dynamic prompt suffix, in
/// rank order.
fn render_knowledge(knowledge: &[KnowledgeItem], selected_ids: &[String]) -> String {
    let mut sections = Vec::with_capacity(selected_ids.len());
    for id in selected_ids {
        if let Some(item) = knowledge.iter().find(|k| &k.id == id) {
            sections.push(format!("## {}\n{}", item.title, item.content));
        }
    }
    sections.join("\n\n")
}
