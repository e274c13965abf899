//! Prompt composition types and the block resolver seam.
//!
//! A composition is a named, ordered set of prompt fragment ("block")
//! ids. Blocks are resolved through an injected collaborator rather
//! than a global registry, so assembly stays a pure fold over the
//! resolved fragments.

use crate::error::CompositionError;
use serde::{Deserialize, Serialize};

/// A named, ordered set of prompt block ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptComposition {
    pub id: String,
    pub block_ids: Vec<String>,
}

impl PromptComposition {
    pub fn new(id: impl Into<String>, block_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            block_ids,
        }
    }
}

/// Resolves block ids to their text fragments.
///
/// Implemented by the prompt-composition collaborator; the engine only
/// depends on this trait.
pub trait BlockResolver: Send + Sync {
    /// Return the text for a block id, or an error if unknown.
    fn resolve(&self, block_id: &str) -> std::result::Result<String, CompositionError>;
}

/// A resolver backed by an in-memory map. Useful for tests and for
/// callers that pre-load their block library.
#[derive(Debug, Default, Clone)]
pub struct StaticBlockResolver {
    blocks: std::collections::HashMap<String, String>,
}

impl StaticBlockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.insert(id.into(), text.into());
        self
    }
}

impl BlockResolver for StaticBlockResolver {
    fn resolve(&self, block_id: &str) -> std::result::Result<String, CompositionError> {
        self.blocks
            .get(block_id)
            .cloned()
            .ok_or_else(|| CompositionError::BlockNotFound {
                composition_id: String::new(),
                block_id: block_id.to_string(),
            })
    }
}
