//! Transparency metadata and usage attribution for answer records.
//!
//! Every answer in a batch shares one `Arc<Transparency>` — the prompt
//! assembly happened once per batch, so the metadata is recorded once
//! and shared rather than duplicated per record.

use answermill_core::{AnswerRecord, Transparency, UsageInfo};
use chrono::Utc;
use std::sync::Arc;

/// Build the shared transparency record for one batch call.
pub fn batch_transparency(
    system_prompt: impl Into<String>,
    composition_id: impl Into<String>,
    block_ids: Vec<String>,
    runtime_block_ids: Vec<String>,
) -> Arc<Transparency> {
    Arc::new(Transparency {
        system_prompt: system_prompt.into(),
        composition_id: composition_id.into(),
        block_ids,
        runtime_block_ids,
        assembled_at: Utc::now(),
    })
}

/// Attribute one batch call's token usage evenly across its answers.
///
/// The split is integer division: with 1000 total tokens over 3 answers
/// each record gets 333 and the remainder stays unattributed. Records
/// keep `tokens_used = None` when the batch produced no answers.
pub fn attribute_usage(records: &mut [AnswerRecord], usage: &UsageInfo) {
    if records.is_empty() {
        return;
    }
    let per_answer = usage.total_tokens() / records.len() as u32;
    for record in records.iter_mut() {
        record.tokens_used = Some(per_answer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use answermill_core::Confidence;

    fn usage(input: u32, output: u32) -> UsageInfo {
        UsageInfo {
            input_tokens: input,
            output_tokens: output,
            model: "claude-sonnet-4".into(),
            cache_creation_tokens: None,
            cache_read_tokens: None,
        }
    }

    fn records(n: usize) -> Vec<AnswerRecord> {
        let shared = batch_transparency("system", "comp-1", vec!["b1".into()], vec![]);
        (0..n)
            .map(|i| {
                AnswerRecord::new(i, format!("answer {i}"), Confidence::High, shared.clone())
            })
            .collect()
    }

    #[test]
    fn usage_splits_evenly() {
        let mut recs = records(4);
        attribute_usage(&mut recs, &usage(900, 100));
        for r in &recs {
            assert_eq!(r.tokens_used, Some(250));
        }
    }

    #[test]
    fn remainder_stays_unattributed() {
        let mut recs = records(3);
        attribute_usage(&mut recs, &usage(800, 200));
        // 1000 / 3 truncates to 333.
        for r in &recs {
            assert_eq!(r.tokens_used, Some(333));
        }
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut recs: Vec<AnswerRecord> = Vec::new();
        attribute_usage(&mut recs, &usage(100, 10));
    }

    #[test]
    fn transparency_is_shared_not_cloned() {
        let recs = records(3);
        // All records point at the same allocation.
        assert!(Arc::ptr_eq(&recs[0].transparency, &recs[1].transparency));
        assert!(Arc::ptr_eq(&recs[1].transparency, &recs[2].transparency));
        assert_eq!(Arc::strong_count(&recs[0].transparency), 3);
    }
}
