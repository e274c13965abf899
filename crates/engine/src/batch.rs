//! Batch composition — bounded contiguous slicing of the question list.
//!
//! Batch size is derived from the output-token ceiling divided by the
//! expected tokens per answer, then clamped to the configured absolute
//! safety ceiling. No reordering, no difficulty balancing: every
//! question lands in exactly one batch and relative order is preserved,
//! so a run is reproducible for the same input.

use answermill_config::BatchingConfig;
use answermill_core::{Question, QuestionBatch};

/// Derive the effective batch size for a model's output ceiling.
///
/// `output_token_ceiling / estimated_tokens_per_answer`, clamped to
/// `[1, max_batch_size]`.
pub fn derive_batch_size(output_token_ceiling: u32, config: &BatchingConfig) -> usize {
    let by_budget = (output_token_ceiling / config.estimated_tokens_per_answer.max(1)) as usize;
    by_budget.clamp(1, config.max_batch_size)
}

/// Split questions into contiguous batches of at most `max_batch_size`.
pub fn compose(questions: &[Question], max_batch_size: usize) -> Vec<QuestionBatch> {
    let size = max_batch_size.max(1);
    questions
        .chunks(size)
        .enumerate()
        .map(|(batch_index, chunk)| QuestionBatch {
            batch_index,
            questions: chunk.to_vec(),
        })
        .collect()
}
