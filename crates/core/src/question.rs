//! Question and batch domain types.
//!
//! A `Question` carries a stable `index` that survives batching and
//! out-of-order LLM output: answers are always rejoined on `index`,
//! never on array position.

use serde::{Deserialize, Serialize};

/// One question in a batch-processing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Stable, unique within one pipeline invocation. The join key used
    /// to reassemble answers after batched LLM calls.
    pub index: usize,

    /// The question text.
    pub text: String,

    /// Optional per-question context (e.g. a section heading from the
    /// source questionnaire).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Question {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// An ordered, contiguous sub-sequence of questions answered in one
/// LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBatch {
    /// Position of this batch within the run (0-based).
    pub batch_index: usize,

    /// The questions, in original relative order.
    pub questions: Vec<Question>,
}

impl QuestionBatch {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question indices in batch order.
    pub fn indices(&self) -> Vec<usize> {
        self.questions.iter().map(|q| q.index).collect()
    }
}
