//! # Answermill Core
//!
//! Domain types, traits, and error definitions for the Answermill
//! batch answering engine. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (completion provider, block resolver,
//! trace sink) is defined as a trait here. Implementations live in
//! their respective crates or in the caller. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod answer;
pub mod completion;
pub mod composition;
pub mod error;
pub mod knowledge;
pub mod question;
pub mod selection;
pub mod trace;

// Re-export key types at crate root for ergonomics
pub use answer::{AnswerRecord, Confidence, Transparency, UsageInfo};
pub use completion::{
    CompletionProvider, CompletionRequest, CompletionResponse, SystemContent, SystemSegment,
};
pub use composition::{BlockResolver, PromptComposition, StaticBlockResolver};
pub use error::{
    CompletionError, CompositionError, Error, ExecutionError, Result, SelectionError,
};
pub use knowledge::{KnowledgeItem, ScopeDefinition};
pub use question::{Question, QuestionBatch};
pub use selection::{
    CoverageStats, RankedMatch, SelectionMode, SelectionResult, SelectionStrategy, sort_matches,
};
pub use trace::{TraceEvent, TraceSink};
