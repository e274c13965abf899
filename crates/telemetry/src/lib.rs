//! Trace recording for Answermill.
//!
//! Implements the engine's `TraceSink` seam with a bounded in-memory
//! store, plus queries and JSON export for inspecting what was sent to
//! the model and what came back.

pub mod model;
pub mod store;

pub use model::{RecordedTrace, TraceStats};
pub use store::MemoryTraceStore;
