//! Batch execution: one LLM call per question batch, guarded front and
//! back.
//!
//! Guard order per batch: circuit breaker check, preflight token budget
//! check, then the timed provider call. The preflight runs before any
//! network traffic so a prompt that cannot fit is rejected for free.
//! The engine never retries on its own; retryable failures are surfaced
//! to the caller with `Error::is_retryable`.

use crate::breaker::CircuitBreaker;
use crate::parser;
use crate::token;
use crate::transparency;
use answermill_config::EngineConfig;
use answermill_core::{
    AnswerRecord, CompletionError, CompletionProvider, CompletionRequest, ExecutionError,
    QuestionBatch, Result, SystemContent, TraceEvent, TraceSink, Transparency, UsageInfo,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The outcome of one successful batch call.
#[derive(Debug)]
pub struct BatchResult {
    /// One record per question in the batch, in batch order.
    pub records: Vec<AnswerRecord>,

    /// Aggregate usage for the single underlying LLM call.
    pub usage: UsageInfo,
}

/// Executes question batches against a completion provider.
pub struct BatchExecutionEngine {
    provider: Arc<dyn CompletionProvider>,
    breaker: Arc<CircuitBreaker>,
    config: EngineConfig,
    trace: Option<Arc<dyn TraceSink>>,
}

impl BatchExecutionEngine {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        breaker: Arc<CircuitBreaker>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            breaker,
            config,
            trace: None,
        }
    }

    /// Attach a trace sink. Trace failures are logged and never fail a
    /// batch.
    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Execute one batch: preflight, timed call, parse, attribute.
    ///
    /// `speed` is a speed alias or a concrete model name; `system` is
    /// the already-segmented system content shared across the run.
    pub async fn execute_batch(
        &self,
        batch: &QuestionBatch,
        system: SystemContent,
        shared: Arc<Transparency>,
        speed: &str,
    ) -> Result<BatchResult> {
        let model = self.config.models.resolve_model(speed);

        if self.breaker.is_open(&model) {
            warn!(model, batch_index = batch.batch_index, "Circuit open, rejecting batch");
            return Err(CompletionError::CircuitOpen { model }.into());
        }

        let user_message = build_batch_message(batch);

        // Preflight: the full prompt must fit under the model's input
        // window minus the reserve. The reserve already holds back
        // room for the reply, so no per-answer estimate is added here.
        let computed_tokens =
            token::estimate_tokens(&system.joined()) + token::estimate_tokens(&user_message);
        let limit_tokens = self
            .config
            .models
            .input_ceiling(&model)
            .saturating_sub(self.config.models.context_reserve_tokens);
        if computed_tokens > limit_tokens {
            return Err(ExecutionError::ContextOverflow {
                computed_tokens,
                limit_tokens,
            }
            .into());
        }

        let request = CompletionRequest {
            model: model.clone(),
            system,
            user_message: user_message.clone(),
            max_output_tokens: self.config.models.output_ceiling(speed),
        };

        debug!(
            model,
            batch_index = batch.batch_index,
            questions = batch.len(),
            computed_tokens,
            "Dispatching batch"
        );

        let timeout_ms = self.config.batching.batch_timeout_ms;
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.provider.complete(request),
        )
        .await;

        let response = match outcome {
            Err(_) => {
                self.breaker.record_failure(&model);
                return Err(ExecutionError::Timeout { timeout_ms }.into());
            }
            Ok(Err(e)) => {
                self.breaker.record_failure(&model);
                return Err(e.into());
            }
            Ok(Ok(response)) => {
                self.breaker.record_success(&model);
                response
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        self.record_trace(batch, &user_message, &response.text, latency_ms)
            .await;

        if response.text.trim().is_empty() {
            return Err(ExecutionError::EmptyResponse.into());
        }

        let parsed = parser::parse_batch_answers(
            &response.text,
            self.config.malformed_item_policy,
            &batch.indices(),
        )?;

        let mut records: Vec<AnswerRecord> = parsed
            .into_iter()
            .map(|answer| {
                let mut record = AnswerRecord::new(
                    answer.question_index,
                    answer.response,
                    answer.confidence,
                    shared.clone(),
                );
                record.sources = answer.sources;
                record.reasoning = answer.reasoning;
                record.inference = answer.inference;
                record.remarks = answer.remarks;
                record
            })
            .collect();
        transparency::attribute_usage(&mut records, &response.usage);

        info!(
            model,
            batch_index = batch.batch_index,
            answers = records.len(),
            latency_ms,
            cache_hit = response.usage.cache_hit(),
            "Batch completed"
        );

        Ok(BatchResult {
            records,
            usage: response.usage,
        })
    }

    async fn record_trace(
        &self,
        batch: &QuestionBatch,
        input: &str,
        output: &str,
        latency_ms: u64,
    ) {
        let Some(sink) = &self.trace else { return };
        let event = TraceEvent {
            context: format!("batch-{}", batch.batch_index),
            input: input.to_string(),
            output: output.to_string(),
            latency_ms,
        };
        if let Err(e) = sink.record(event).await {
            warn!(error = %e, "Trace sink rejected event");
        }
    }
}

/// Render a batch as the user message: numbered questions carrying
/// their global indices, followed by the output contract.
pub fn build_batch_message(batch: &QuestionBatch) -> String {
    let mut message = String::from("Answer the following questions.\n\n");
    for question in &batch.questions {
        message.push_str(&format!(
            "Question {index}: {text}\n",
            index = question.index,
            text = question.text
        ));
        if let Some(context) = &question.context {
            message.push_str(&format!("Context: {context}\n"));
        }
        message.push('\n');
    }
    message.push_str(
        "Respond with a JSON array containing one object per question, \
         using the question numbers above:\n\
         [{\"question_index\": <number>, \"response\": \"...\", \
         \"confidence\": \"High|Medium|Low\", \"sources\": \"...\", \
         \"reasoning\": \"...\", \"inference\": \"None or ...\", \
         \"remarks\": \"None or ...\"}]\n\
         Return only the JSON array.",
    );
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitBreakerConfig;
    use answermill_core::{CompletionResponse, Error, Question};
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Script {
        Reply(String),
        Fail(CompletionError),
        Hang,
    }

    struct ScriptedProvider {
        script: Script,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                script: Script::Reply(text.into()),
                calls: Mutex::new(0),
            })
        }

        fn failing(err: CompletionError) -> Arc<Self> {
            Arc::new(Self {
                script: Script::Fail(err),
                calls: Mutex::new(0),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                script: Script::Hang,
                calls: Mutex::new(0),
            })
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, CompletionError> {
            *self.calls.lock().unwrap() += 1;
            match &self.script {
                Script::Reply(text) => Ok(CompletionResponse {
                    text: text.clone(),
                    usage: UsageInfo {
                        input_tokens: 500,
                        output_tokens: 100,
                        model: request.model,
                        cache_creation_tokens: None,
                        cache_read_tokens: None,
                    },
                }),
                Script::Fail(e) => Err(e.clone()),
                Script::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn batch(n: usize) -> QuestionBatch {
        QuestionBatch {
            batch_index: 0,
            questions: (0..n)
                .map(|i| Question::new(i, format!("Question number {i}?")))
                .collect(),
        }
    }

    fn shared() -> Arc<Transparency> {
        transparency::batch_transparency("system prompt", "comp-1", vec!["b1".into()], vec![])
    }

    fn engine(provider: Arc<ScriptedProvider>, config: EngineConfig) -> BatchExecutionEngine {
        BatchExecutionEngine::new(
            provider,
            Arc::new(CircuitBreaker::default()),
            config,
        )
    }

    const TWO_ANSWERS: &str = r#"[
        {"question_index": 0, "response": "Yes.", "confidence": "High",
         "sources": "Security", "reasoning": "Documented.", "inference": "None", "remarks": "None"},
        {"question_index": 1, "response": "Monthly.", "confidence": "Medium",
         "sources": "Billing", "reasoning": "Standard plan.", "inference": "None", "remarks": "None"}
    ]"#;

    #[tokio::test]
    async fn successful_batch_yields_joined_records() {
        let provider = ScriptedProvider::replying(TWO_ANSWERS);
        let engine = engine(provider.clone(), EngineConfig::default());

        let result = engine
            .execute_batch(&batch(2), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].question_index, 0);
        assert_eq!(result.records[0].response, "Yes.");
        assert_eq!(result.records[1].question_index, 1);
        // Even split of 600 total tokens.
        assert_eq!(result.records[0].tokens_used, Some(300));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn partial_batch_response_is_rejected() {
        // Two answers back for a three-question batch must not pass as
        // a successful run.
        let provider = ScriptedProvider::replying(TWO_ANSWERS);
        let engine = engine(provider.clone(), EngineConfig::default());

        let err = engine
            .execute_batch(&batch(3), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap_err();

        match err {
            Error::Execution(ExecutionError::MissingResponse { question_index }) => {
                assert_eq!(question_index, 2);
            }
            other => panic!("Expected MissingResponse, got: {other:?}"),
        }
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn lenient_policy_fills_omitted_questions() {
        let provider = ScriptedProvider::replying(TWO_ANSWERS);
        let mut config = EngineConfig::default();
        config.malformed_item_policy = answermill_config::MalformedItemPolicy::Lenient;
        let engine = engine(provider, config);

        let result = engine
            .execute_batch(&batch(3), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap();

        assert_eq!(result.records.len(), 3);
        assert_eq!(result.records[2].question_index, 2);
        assert_eq!(result.records[2].response, "");
    }

    #[tokio::test]
    async fn overflow_rejected_before_provider_call() {
        let provider = ScriptedProvider::replying(TWO_ANSWERS);
        let mut config = EngineConfig::default();
        config.models.fallback_input_context_tokens = 100;
        config.models.input_context_tokens.clear();
        config.models.context_reserve_tokens = 50;
        let engine = engine(provider.clone(), config);

        let err = engine
            .execute_batch(&batch(2), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap_err();

        match err {
            Error::Execution(ExecutionError::ContextOverflow {
                computed_tokens,
                limit_tokens,
            }) => {
                assert_eq!(limit_tokens, 50);
                assert!(computed_tokens > limit_tokens);
            }
            other => panic!("Expected ContextOverflow, got: {other:?}"),
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn timeout_maps_to_execution_error() {
        let provider = ScriptedProvider::hanging();
        let mut config = EngineConfig::default();
        config.batching.batch_timeout_ms = 20;
        let engine = engine(provider, config);

        let err = engine
            .execute_batch(&batch(1), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Execution(ExecutionError::Timeout { timeout_ms: 20 })
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_provider_call() {
        let provider = ScriptedProvider::replying(TWO_ANSWERS);
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        }));
        breaker.record_failure("claude-sonnet-4");
        let engine = BatchExecutionEngine::new(
            provider.clone(),
            breaker,
            EngineConfig::default(),
        );

        let err = engine
            .execute_batch(&batch(1), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Completion(CompletionError::CircuitOpen { .. })
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_trips_breaker_counter() {
        let provider = ScriptedProvider::failing(CompletionError::Network("refused".into()));
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        }));
        let engine = BatchExecutionEngine::new(
            provider,
            breaker.clone(),
            EngineConfig::default(),
        );

        for _ in 0..2 {
            let _ = engine
                .execute_batch(&batch(1), SystemContent::Plain("s".into()), shared(), "balanced")
                .await;
        }
        assert!(breaker.is_open("claude-sonnet-4"));
    }

    #[tokio::test]
    async fn empty_response_is_an_error() {
        let provider = ScriptedProvider::replying("   ");
        let engine = engine(provider, EngineConfig::default());

        let err = engine
            .execute_batch(&batch(1), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Execution(ExecutionError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn fenced_response_still_parses() {
        let fenced = format!("```json\n{TWO_ANSWERS}\n```");
        let provider = ScriptedProvider::replying(&fenced);
        let engine = engine(provider, EngineConfig::default());

        let result = engine
            .execute_batch(&batch(2), SystemContent::Plain("system".into()), shared(), "balanced")
            .await
            .unwrap();
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn batch_message_carries_global_indices() {
        let b = QuestionBatch {
            batch_index: 1,
            questions: vec![
                Question::new(20, "Do you support SSO?"),
                Question::new(21, "What is the SLA?").with_context("Enterprise tier"),
            ],
        };
        let message = build_batch_message(&b);
        assert!(message.contains("Question 20: Do you support SSO?"));
        assert!(message.contains("Question 21: What is the SLA?"));
        assert!(message.contains("Context: Enterprise tier"));
        assert!(message.contains("question_index"));
    }
}
