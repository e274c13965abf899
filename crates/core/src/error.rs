//! Error types for the Answermill domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Answermill operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Selection errors ---
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    // --- Execution errors ---
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    // --- Completion errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Composition errors ---
    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the skill selection stage.
#[derive(Debug, Clone, Error)]
pub enum SelectionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The knowledge base supplied zero candidates. Distinct from
    /// "the query matched nothing" — callers must surface this.
    #[error("No candidate knowledge items supplied")]
    NoCandidates,
}

/// Errors from the batch execution stage.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Preflight token budget check failed. Raised before any LLM call.
    #[error(
        "Context overflow: prompt needs {computed_tokens} tokens, model limit is {limit_tokens}"
    )]
    ContextOverflow {
        computed_tokens: usize,
        limit_tokens: usize,
    },

    /// The LLM call exceeded the per-batch ceiling. Retryable by the caller;
    /// the engine itself never retries.
    #[error("Batch call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The LLM returned text that no recovery pass could parse as the
    /// expected JSON array. Non-retryable; includes a truncated snippet.
    #[error("Malformed LLM response: {snippet}")]
    MalformedResponse { snippet: String },

    /// The call succeeded at the transport level but returned no text.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// A question in the batch came back with no answer, or its item is
    /// missing the `response` field, under the strict policy.
    #[error("No usable answer for question {question_index} in the batch response")]
    MissingResponse { question_index: usize },
}

/// Errors from the completion collaborator (transport, breaker).
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Provider request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Circuit breaker open for model {model}")]
    CircuitOpen { model: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Errors from prompt composition resolution.
#[derive(Debug, Clone, Error)]
pub enum CompositionError {
    #[error("Composition not found: {0}")]
    NotFound(String),

    #[error("Block not found: {block_id} in composition {composition_id}")]
    BlockNotFound {
        composition_id: String,
        block_id: String,
    },
}

impl Error {
    /// Whether the caller may reasonably retry the operation.
    ///
    /// Timeouts and provider failures are retryable at the caller's
    /// discretion with backoff; malformed output and budget overflows
    /// are not — they will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Execution(ExecutionError::Timeout { .. }) => true,
            Error::Completion(e) => !matches!(e, CompletionError::NotConfigured(_)),
            _ => false,
        }
    }
}
