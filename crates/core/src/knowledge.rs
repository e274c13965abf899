//! Knowledge item domain types.
//!
//! A knowledge item ("skill") is a titled unit of reference content with
//! optional structured scope metadata. The engine treats items as read-only
//! input for the duration of one request; storage lives elsewhere.

use serde::{Deserialize, Serialize};

/// A titled unit of reference content used to ground LLM answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Unique within a single selection call.
    pub id: String,

    /// Human-readable title. Used as the deterministic tie-break when
    /// sorting scored results.
    pub title: String,

    /// Full reference content injected into prompts.
    pub content: String,

    /// Structured hints on what this item covers. Absent scope means
    /// the keyword scorer gives this item a zero score — never an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeDefinition>,
}

/// Structured hints on what topics a knowledge item covers, does not
/// cover, or may cover in the future. Enables cheap relevance scoring
/// without invoking an LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeDefinition {
    /// Comma/semicolon-delimited topic terms this item answers.
    #[serde(default)]
    pub covers: String,

    /// Topics planned but not yet written up. Weaker relevance signal.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub future_additions: Vec<String>,

    /// Topics explicitly out of scope. A match here penalizes the score.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_included: Vec<String>,

    /// Free-form keywords for search surfaces outside this engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl KnowledgeItem {
    /// Create an item without scope metadata.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            scope: None,
        }
    }

    /// Attach scope metadata.
    pub fn with_scope(mut self, scope: ScopeDefinition) -> Self {
        self.scope = Some(scope);
        self
    }

    /// A one-line scope summary for semantic-matching prompts.
    /// Falls back to the title when no scope is declared.
    pub fn scope_summary(&self) -> String {
        match &self.scope {
            Some(s) if !s.covers.is_empty() => format!("{}: {}", self.title, s.covers),
            _ => self.title.clone(),
        }
    }
}

impl ScopeDefinition {
    pub fn new(covers: impl Into<String>) -> Self {
        Self {
            covers: covers.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_without_scope() {
        let item = KnowledgeItem::new("sk-1", "Billing", "How billing works...");
        assert!(item.scope.is_none());
        assert_eq!(item.scope_summary(), "Billing");
    }

    #[test]
    fn scope_summary_includes_covers() {
        let item = KnowledgeItem::new("sk-1", "Billing", "...")
            .with_scope(ScopeDefinition::new("billing, invoicing"));
        assert_eq!(item.scope_summary(), "Billing: billing, invoicing");
    }

    #[test]
    fn scope_deserializes_with_missing_fields() {
        let json = r#"{"covers": "security"}"#;
        let scope: ScopeDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(scope.covers, "security");
        assert!(scope.not_included.is_empty());
        assert!(scope.future_additions.is_empty());
    }
}
