//! The Answermill engine: context-budgeted batch answering over a
//! knowledge base.
//!
//! The engine answers questionnaire batches against a set of knowledge
//! items ("skills") while keeping every LLM call inside the model's
//! context window. Selection picks the relevant skills, composition
//! slices questions into bounded batches, prompt assembly splits the
//! system content for provider-side caching, and execution runs the
//! batches sequentially behind a circuit breaker.

pub mod batch;
pub mod breaker;
pub mod executor;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod scorer;
pub mod selector;
pub mod token;
pub mod transparency;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use executor::{BatchExecutionEngine, BatchResult};
pub use pipeline::{AnswerPipeline, RunOutcome, RunUsage};
pub use prompt::AssembledPrompt;
pub use selector::{SelectionOptions, SkillSelector};
