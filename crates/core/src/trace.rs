//! Tracing collaborator seam.
//!
//! The engine reports every LLM call to an optional `TraceSink`.
//! Sink failures must never fail the answer path — callers of the
//! engine get answers even when the trace store is down.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One recorded LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// What the call was for (e.g. "batch_answer", "semantic_match").
    pub context: String,

    /// The input sent, typically the user message.
    pub input: String,

    /// The raw output received.
    pub output: String,

    /// Wall-clock latency of the call.
    pub latency_ms: u64,
}

/// Persists trace events. Implementations must be non-fatal: the
/// engine logs and continues when `record` fails.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn record(&self, event: TraceEvent) -> std::result::Result<(), String>;
}
