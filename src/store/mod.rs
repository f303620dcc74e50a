//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the only way the linking core touches
//! documents: enumerate them, read their text, and write it back. Backends
//! are pluggable; the crate ships a filesystem store and an in-memory store.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`list_documents`](DocumentStore::list_documents) | Enumerate every document with its metadata |
//! | [`read`](DocumentStore::read) | Read a document's text by identity |
//! | [`write`](DocumentStore::write) | Replace a document's text by identity |

pub mod fs;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentMeta;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Enumerate all documents in the corpus.
    async fn list_documents(&self) -> Result<Vec<DocumentMeta>>;

    /// Read the full text of a document.
    async fn read(&self, id: &str) -> Result<String>;

    /// Replace the full text of a document.
    async fn write(&self, id: &str, text: &str) -> Result<()>;
}

/// A change reported by the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(String),
    Deleted(String),
    Renamed { from: String, to: String },
    Modified(String),
}

impl ChangeEvent {
    /// Creation, deletion, and rename change the set of titles.
    pub fn is_structural(&self) -> bool {
        !matches!(self, ChangeEvent::Modified(_))
    }
}
