//! Thread-safe in-memory trace store.
//!
//! Bounded: once the store reaches its capacity the oldest traces are
//! evicted, so a long-running process cannot grow without limit. The
//! store is the engine's `TraceSink` implementation and additionally
//! serves queries for inspection and export.

use crate::model::{RecordedTrace, TraceStats};
use answermill_core::{TraceEvent, TraceSink};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;

/// Default capacity before the oldest traces are evicted.
const DEFAULT_CAPACITY: usize = 1_000;

/// In-memory trace store, thread-safe via `RwLock`.
pub struct MemoryTraceStore {
    /// Recorded traces, oldest first.
    traces: RwLock<Vec<RecordedTrace>>,
    /// Eviction threshold.
    capacity: usize,
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// The `n` most recent traces, newest first.
    pub fn recent(&self, n: usize) -> Vec<RecordedTrace> {
        let traces = self.traces.read().unwrap_or_else(|e| e.into_inner());
        traces.iter().rev().take(n).cloned().collect()
    }

    /// All traces recorded under a given context, oldest first.
    pub fn by_context(&self, context: &str) -> Vec<RecordedTrace> {
        let traces = self.traces.read().unwrap_or_else(|e| e.into_inner());
        traces
            .iter()
            .filter(|t| t.context == context)
            .cloned()
            .collect()
    }

    /// Aggregate latency statistics over the stored traces.
    pub fn stats(&self) -> TraceStats {
        let traces = self.traces.read().unwrap_or_else(|e| e.into_inner());
        if traces.is_empty() {
            return TraceStats::default();
        }
        let total: u64 = traces.iter().map(|t| t.latency_ms).sum();
        let max = traces.iter().map(|t| t.latency_ms).max().unwrap_or(0);
        TraceStats {
            count: traces.len(),
            avg_latency_ms: total / traces.len() as u64,
            max_latency_ms: max,
        }
    }

    pub fn len(&self) -> usize {
        self.traces.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize all stored traces as a JSON array, oldest first.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        let traces = self.traces.read().unwrap_or_else(|e| e.into_inner());
        serde_json::to_string_pretty(&*traces)
    }

    /// Drop all stored traces.
    pub fn clear(&self) {
        self.traces
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for MemoryTraceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TraceSink for MemoryTraceStore {
    async fn record(&self, event: TraceEvent) -> Result<(), String> {
        let trace = RecordedTrace {
            id: uuid::Uuid::new_v4().to_string(),
            context: event.context,
            input: event.input,
            output: event.output,
            latency_ms: event.latency_ms,
            recorded_at: Utc::now(),
        };
        let mut traces = self.traces.write().unwrap_or_else(|e| e.into_inner());
        traces.push(trace);
        if traces.len() > self.capacity {
            let overflow = traces.len() - self.capacity;
            traces.drain(..overflow);
            tracing::debug!(evicted = overflow, "Trace store at capacity, evicted oldest");
        }
        Ok(())
    }
}
