//! Error kinds raised by the linking core.
//!
//! None of these are fatal to the process. The worst outcome of any of them
//! is a single document left unmodified and counted as an error in the batch
//! summary, or a single title skipped for one document.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    /// A read or write against the document store failed.
    #[error("{op} failed for '{id}': {source}")]
    TransientIo {
        op: &'static str,
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A read or write kept failing after every retry attempt.
    #[error("{op} of '{id}' failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        op: &'static str,
        id: String,
        attempts: u32,
        last: String,
    },

    /// A malformed configuration entry. Always recovered by ignoring the entry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A title produced an invalid matcher.
    #[error("cannot compile pattern for title '{title}': {source}")]
    PatternCompilation {
        title: String,
        #[source]
        source: regex::Error,
    },
}
