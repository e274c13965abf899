//! LLM response parsing and coercion.
//!
//! Models are instructed to return a JSON array, one object per
//! question, but real output arrives in three shapes: pure JSON, JSON
//! wrapped in triple-backtick fences (with an optional language tag),
//! or narrative text trailing into a JSON span. Recovery order is
//! fence-stripping first, then the outermost balanced `{...}`/`[...]`
//! span. If no valid JSON is recoverable the batch fails with
//! `MalformedResponse` — a silently-wrong answer is worse than a
//! visible failure.

use answermill_config::MalformedItemPolicy;
use answermill_core::{Confidence, ExecutionError};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Max characters of raw output echoed into error messages.
const SNIPPET_LEN: usize = 200;

/// One coerced per-question answer payload.
#[derive(Debug, Clone)]
pub struct ParsedAnswer {
    pub question_index: usize,
    pub response: String,
    pub confidence: Confidence,
    pub sources: String,
    pub reasoning: String,
    pub inference: String,
    pub remarks: String,
}

/// The wire shape a model is asked to produce, with every field
/// optional so coercion is explicit.
#[derive(Debug, Deserialize)]
struct RawAnswerItem {
    #[serde(alias = "questionIndex")]
    question_index: Option<usize>,
    response: Option<String>,
    confidence: Option<String>,
    sources: Option<String>,
    reasoning: Option<String>,
    inference: Option<String>,
    remarks: Option<String>,
}

/// Parse a raw LLM response into per-question answers, one for each of
/// `expected_indices` in that order.
///
/// `policy` controls contract violations after a successful parse: a
/// missing `response` field, a missing answer for an expected index, a
/// duplicated index, or an index outside the batch. `Strict` rejects
/// the batch; `Lenient` coerces (empty response, last duplicate wins,
/// extras dropped).
pub fn parse_batch_answers(
    raw: &str,
    policy: MalformedItemPolicy,
    expected_indices: &[usize],
) -> Result<Vec<ParsedAnswer>, ExecutionError> {
    let payload = extract_json_payload(raw).ok_or_else(|| ExecutionError::MalformedResponse {
        snippet: snippet(raw),
    })?;

    let items: Vec<RawAnswerItem> = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(serde_json::Value::Array(values)) => values
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|_| ExecutionError::MalformedResponse {
                snippet: snippet(raw),
            })?,
        // A single-question batch may come back as a bare object.
        Ok(value @ serde_json::Value::Object(_)) => {
            vec![
                serde_json::from_value(value).map_err(|_| ExecutionError::MalformedResponse {
                    snippet: snippet(raw),
                })?,
            ]
        }
        _ => {
            return Err(ExecutionError::MalformedResponse {
                snippet: snippet(raw),
            });
        }
    };

    let expected: HashSet<usize> = expected_indices.iter().copied().collect();
    let mut by_index: HashMap<usize, ParsedAnswer> = HashMap::with_capacity(items.len());
    for item in items {
        // Without a join key the answer cannot be attributed to any
        // question, lenient or not.
        let question_index =
            item.question_index
                .ok_or_else(|| ExecutionError::MalformedResponse {
                    snippet: snippet(raw),
                })?;

        if !expected.contains(&question_index) {
            match policy {
                MalformedItemPolicy::Strict => {
                    return Err(ExecutionError::MalformedResponse {
                        snippet: snippet(raw),
                    });
                }
                MalformedItemPolicy::Lenient => {
                    tracing::warn!(
                        question_index,
                        "Batch item for a question outside the batch, dropped (lenient policy)"
                    );
                    continue;
                }
            }
        }

        let response = match item.response {
            Some(r) => r,
            None => match policy {
                MalformedItemPolicy::Strict => {
                    return Err(ExecutionError::MissingResponse { question_index });
                }
                MalformedItemPolicy::Lenient => {
                    tracing::warn!(
                        question_index,
                        "Batch item missing response field, coerced to empty (lenient policy)"
                    );
                    String::new()
                }
            },
        };

        let parsed = ParsedAnswer {
            question_index,
            response,
            confidence: item
                .confidence
                .as_deref()
                .map(Confidence::parse)
                .unwrap_or(Confidence::Medium),
            sources: item.sources.unwrap_or_else(|| "None".into()),
            reasoning: item.reasoning.unwrap_or_default(),
            inference: item.inference.unwrap_or_else(|| "None".into()),
            remarks: item.remarks.unwrap_or_else(|| "None".into()),
        };

        if by_index.insert(question_index, parsed).is_some() {
            match policy {
                MalformedItemPolicy::Strict => {
                    return Err(ExecutionError::MalformedResponse {
                        snippet: snippet(raw),
                    });
                }
                MalformedItemPolicy::Lenient => {
                    tracing::warn!(
                        question_index,
                        "Duplicate batch item for question, kept the last (lenient policy)"
                    );
                }
            }
        }
    }

    // Every question in the batch must come back with exactly one
    // answer; a partial batch must not pass as a successful run.
    let mut answers = Vec::with_capacity(expected_indices.len());
    for &question_index in expected_indices {
        match by_index.remove(&question_index) {
            Some(parsed) => answers.push(parsed),
            None => match policy {
                MalformedItemPolicy::Strict => {
                    return Err(ExecutionError::MissingResponse { question_index });
                }
                MalformedItemPolicy::Lenient => {
                    tracing::warn!(
                        question_index,
                        "No batch item for question, substituted an empty answer (lenient policy)"
                    );
                    answers.push(ParsedAnswer {
                        question_index,
                        response: String::new(),
                        confidence: Confidence::Low,
                        sources: "None".into(),
                        reasoning: String::new(),
                        inference: "None".into(),
                        remarks: "None".into(),
                    });
                }
            },
        }
    }

    Ok(answers)
}

/// Locate the JSON payload inside raw model output.
///
/// Tries fenced blocks first, then falls back to the outermost
/// balanced brace/bracket span.
pub fn extract_json_payload(raw: &str) -> Option<&str> {
    if let Some(fenced) = strip_code_fence(raw) {
        if let Some(span) = balanced_span(fenced) {
            return Some(span);
        }
    }
    balanced_span(raw)
}

/// Extract the contents of the first triple-backtick fence, skipping
/// an optional language tag on the opening line.
fn strip_code_fence(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after_open = &raw[open + 3..];
    // Skip the language tag line ("json", "JSON", or nothing).
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Find the outermost balanced `{...}` or `[...]` span, whichever
/// starts first.
fn balanced_span(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let first_brace = trimmed.find('{');
    let first_bracket = trimmed.find('[');

    let (start, open, close) = match (first_brace, first_bracket) {
        (Some(b), Some(a)) if b < a => (b, '{', '}'),
        (_, Some(a)) => (a, '[', ']'),
        (Some(b), None) => (b, '{', '}'),
        (None, None) => return None,
    };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in trimmed.char_indices().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&trimmed[start..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}

fn snippet(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() <= SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let mut end = SNIPPET_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
