//! Telemetry data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded trace, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedTrace {
    /// Unique trace id.
    pub id: String,

    /// The execution context the event belongs to (e.g. "batch-0").
    pub context: String,

    /// The full prompt/input that was sent.
    pub input: String,

    /// The raw output that came back.
    pub output: String,

    /// Wall-clock latency of the traced call.
    pub latency_ms: u64,

    /// When the trace was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate statistics over the stored traces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceStats {
    /// Number of stored traces.
    pub count: usize,

    /// Mean latency across stored traces, zero when empty.
    pub avg_latency_ms: u64,

    /// Highest latency seen among stored traces.
    pub max_latency_ms: u64,
}
