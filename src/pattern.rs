//! Title matchers and their cache.
//!
//! A title is compiled into a [`CompiledPattern`] according to its script:
//!
//! - **Latin-only** titles (pure ASCII, no Hangul) match as literals between
//!   ASCII word boundaries, or anywhere when partial matching is enabled.
//!   ASCII boundaries mean `Ciel을` still matches `Ciel`, leaving the suffix
//!   untouched.
//! - **Script-sensitive** titles match the literal title followed by at most
//!   one grammatical particle from [`PARTICLES`], captured separately so it
//!   can be written back outside the link.
//!
//! Titles are always escaped, so they never act as sub-patterns.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::{Regex, RegexBuilder};

use crate::error::LinkError;

/// Korean particles that may directly follow a title.
pub const PARTICLES: &[&str] = &[
    "의", "이", "가", "은", "는", "을", "를", "에", "에서", "에게", "께", "으로", "로", "와", "과",
    "도", "만", "뿐", "까지", "부터", "보다", "처럼", "마다", "씩", "조차", "마저", "라도", "께서",
];

/// Options that change what a title matches. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchOptions {
    pub ignore_case: bool,
    pub partial_match: bool,
    pub allow_particles: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            ignore_case: true,
            partial_match: false,
            allow_particles: true,
        }
    }
}

pub fn has_hangul(s: &str) -> bool {
    s.chars().any(|c| {
        ('\u{3131}'..='\u{318E}').contains(&c) || ('\u{AC00}'..='\u{D7A3}').contains(&c)
    })
}

pub fn is_latin_only(s: &str) -> bool {
    !s.is_empty() && s.is_ascii() && !has_hangul(s)
}

pub(crate) fn is_ascii_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A compiled matcher for one title under one option set.
#[derive(Debug)]
pub struct CompiledPattern {
    pub title: String,
    /// Group 1 is the title text; group 2, when present, is the particle.
    pub regex: Regex,
    pub script_sensitive: bool,
}

impl CompiledPattern {
    pub fn build(title: &str, options: MatchOptions) -> Result<Self, LinkError> {
        let escaped = regex::escape(title);
        let script_sensitive = !is_latin_only(title);

        let source = if script_sensitive {
            if options.allow_particles {
                let mut particles: Vec<&str> = PARTICLES.to_vec();
                particles.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
                format!("({})({})?", escaped, particles.join("|"))
            } else {
                format!("({})", escaped)
            }
        } else if options.partial_match {
            format!("({})", escaped)
        } else {
            let lead = title.chars().next().is_some_and(is_ascii_word);
            let trail = title.chars().last().is_some_and(is_ascii_word);
            format!(
                "{}({}){}",
                if lead { r"(?-u:\b)" } else { "" },
                escaped,
                if trail { r"(?-u:\b)" } else { "" }
            )
        };

        let regex = RegexBuilder::new(&source)
            .case_insensitive(options.ignore_case)
            .build()
            .map_err(|source| LinkError::PatternCompilation {
                title: title.to_string(),
                source,
            })?;

        Ok(Self {
            title: title.to_string(),
            regex,
            script_sensitive,
        })
    }
}

type PatternKey = (String, MatchOptions);

/// Cache of compiled patterns keyed by `(title, options)`.
///
/// Entries are immutable once built. Any settings change that affects
/// matching clears the whole cache through [`invalidate`](Self::invalidate).
#[derive(Default)]
pub struct PatternCache {
    entries: RwLock<HashMap<PatternKey, Arc<CompiledPattern>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        title: &str,
        options: MatchOptions,
    ) -> Result<Arc<CompiledPattern>, LinkError> {
        let key = (title.to_string(), options);
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = entries.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }

        let built = Arc::new(CompiledPattern::build(title, options)?);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(entries.entry(key).or_insert(built)))
    }

    pub fn invalidate(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
