//! Core data models shared by the index, the synthesizer, and the
//! orchestrator.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata for one document as reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    /// Store identity (root-relative path with `/` separators for the filesystem store).
    pub id: String,
    /// Linkable title, the document's base name.
    pub title: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl DocumentMeta {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            size: 0,
            modified: Utc::now(),
            tags: Vec::new(),
        }
    }
}

/// A candidate link found during synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct LinkSuggestion {
    /// The matched text, suffix excluded.
    pub original: String,
    /// The title the match links to.
    pub target: String,
    /// Character offset of the match in the masked working text.
    pub position: usize,
    /// Match quality in `[0, 1]`.
    pub confidence: f64,
    /// Text surrounding the match.
    pub context: String,
    pub approved: bool,
}

/// Outcome of synthesizing one document's text.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub text: String,
    pub changed: bool,
    pub link_count: usize,
    pub suggestions: Vec<LinkSuggestion>,
}

impl SynthesisResult {
    pub fn unchanged(text: String) -> Self {
        Self {
            text,
            changed: false,
            link_count: 0,
            suggestions: Vec::new(),
        }
    }

    /// Distinct link targets that were applied, in first-applied order.
    pub fn applied_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for s in self.suggestions.iter().filter(|s| s.approved) {
            if !targets.contains(&s.target) {
                targets.push(s.target.clone());
            }
        }
        targets
    }
}

/// Per-document outcome inside a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Linked { links: usize },
    Unchanged,
    /// Another synthesis of the same document was already in flight.
    Skipped,
    Failed { error: String },
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub processed: usize,
    pub links_created: usize,
    pub errors: usize,
    pub skipped: usize,
    pub batches: usize,
}
