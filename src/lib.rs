//! # Autolink
//!
//! Automatic cross-reference linking for a Markdown corpus.
//!
//! Every document's title is a potential link target. Autolink finds plain
//! mentions of those titles in other documents and rewrites them into
//! `[[Title]]` wiki-links, without touching links that already exist, without
//! letting a short title steal a match from a longer one, and without
//! flooding a paragraph with links.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │    Store    │──▶│ Title Index │──▶│  Candidates  │──▶│ Synthesizer │
//! │ fs / memory │   │ + exclusion │   │ + synonyms   │   │ mask·match· │
//! └──────┬──────┘   └─────────────┘   └──────────────┘   │ filter·link │
//!        │                                               └──────┬──────┘
//!        │        ┌──────────────┐   ┌───────────┐              │
//!        └───────▶│ Orchestrator │◀──│  Engine   │◀─────────────┘
//!                 │ batches·retry│   │ modes     │
//!                 └──────────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! autolink index                 # list linkable titles
//! autolink preview "Journal.md"  # show suggestions without writing
//! autolink vault                 # link every document
//! autolink incremental           # link documents changed since the last run
//! autolink watch                 # link on save
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds of the linking core |
//! | [`models`] | Core data types |
//! | [`store`] | Document store trait, filesystem and in-memory stores |
//! | [`frontmatter`] | Tag extraction from YAML frontmatter |
//! | [`index`] | Title index and exclusion rules |
//! | [`pattern`] | Title matchers and the pattern cache |
//! | [`candidates`] | Per-document candidate selection and synonyms |
//! | [`mask`] | Placeholder masking of link spans |
//! | [`synth`] | Link synthesis for one document |
//! | [`retry`] | Retry with exponential backoff |
//! | [`batch`] | Batch orchestration and the in-flight guard |
//! | [`progress`] | Progress reporting on stderr |
//! | [`stats`] | Linking statistics |
//! | [`state`] | Persisted checkpoint and statistics |
//! | [`engine`] | Processing modes over a store |
//! | [`watch`] | Filesystem change notifications |

pub mod batch;
pub mod candidates;
pub mod config;
pub mod engine;
pub mod error;
pub mod frontmatter;
pub mod index;
pub mod mask;
pub mod models;
pub mod pattern;
pub mod progress;
pub mod retry;
pub mod state;
pub mod stats;
pub mod store;
pub mod synth;
pub mod watch;
