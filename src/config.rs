//! TOML configuration.
//!
//! A [`Config`] is immutable once loaded. A settings change is expressed by
//! loading (or building) a new value and handing it to
//! [`Engine::reconfigure`](crate::engine::Engine::reconfigure), which
//! recomputes everything derived from it.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::candidates::SynonymGroup;
use crate::pattern::MatchOptions;

/// Upper bound for `batch.size`.
pub const MAX_BATCH_SIZE: usize = 500;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub exclude: ExcludeConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub synonyms: SynonymsConfig,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

/// Folder list accepted either as a TOML array or as a single
/// semicolon-separated string (`"Templates;Daily Notes"`).
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum FolderList {
    List(Vec<String>),
    Joined(String),
}

impl Default for FolderList {
    fn default() -> Self {
        FolderList::List(Vec::new())
    }
}

impl FolderList {
    pub fn entries(&self) -> Vec<String> {
        match self {
            FolderList::List(v) => v.clone(),
            FolderList::Joined(s) => s.split(';').map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExcludeConfig {
    #[serde(default)]
    pub folders: FolderList,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub min_size: Option<u64>,
    #[serde(default)]
    pub max_size: Option<u64>,
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_true")]
    pub ignore_case: bool,
    #[serde(default)]
    pub partial_match: bool,
    #[serde(default = "default_true")]
    pub allow_particles: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            ignore_case: true,
            partial_match: false,
            allow_particles: true,
        }
    }
}

impl MatchingConfig {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            ignore_case: self.ignore_case,
            partial_match: self.partial_match,
            allow_particles: self.allow_particles,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SynonymsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub groups: Vec<SynonymGroup>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilteringConfig {
    #[serde(default = "default_true")]
    pub avoid_overlinking: bool,
    #[serde(default = "default_max_links_per_paragraph")]
    pub max_links_per_paragraph: usize,
    #[serde(default = "default_true")]
    pub respect_existing_links: bool,
    #[serde(default = "default_proximity_margin")]
    pub proximity_margin: usize,
    #[serde(default)]
    pub review_before_apply: bool,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            avoid_overlinking: true,
            max_links_per_paragraph: default_max_links_per_paragraph(),
            respect_existing_links: true,
            proximity_margin: default_proximity_margin(),
            review_before_apply: false,
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

fn default_max_links_per_paragraph() -> usize {
    3
}
fn default_proximity_margin() -> usize {
    10
}
fn default_confidence_threshold() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default)]
    pub auto_link_on_save: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            auto_link_on_save: false,
        }
    }
}

impl BatchConfig {
    /// Batch size clamped to `1..=MAX_BATCH_SIZE`.
    pub fn effective_size(&self) -> usize {
        self.size.clamp(1, MAX_BATCH_SIZE)
    }
}

fn default_batch_size() -> usize {
    50
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".autolink/state.json")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Configuration with every default and the given corpus root.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            corpus: CorpusConfig {
                root: root.into(),
                include_globs: default_include_globs(),
                follow_symlinks: false,
            },
            exclude: ExcludeConfig::default(),
            matching: MatchingConfig::default(),
            synonyms: SynonymsConfig::default(),
            filtering: FilteringConfig::default(),
            batch: BatchConfig::default(),
            state: StateConfig::default(),
        }
    }

    /// State file location; relative paths are resolved against the corpus root.
    pub fn state_path(&self) -> PathBuf {
        if self.state.path.is_absolute() {
            self.state.path.clone()
        } else {
            self.corpus.root.join(&self.state.path)
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if !(0.0..=1.0).contains(&config.filtering.confidence_threshold) {
        bail!("filtering.confidence_threshold must be in [0.0, 1.0]");
    }

    if config.corpus.include_globs.is_empty() {
        bail!("corpus.include_globs must not be empty");
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_config("[corpus]\nroot = \"/notes\"\n").unwrap();
        assert_eq!(config.corpus.include_globs, vec!["**/*.md"]);
        assert!(config.matching.ignore_case);
        assert!(config.matching.allow_particles);
        assert!(!config.matching.partial_match);
        assert_eq!(config.batch.size, 50);
        assert_eq!(config.filtering.max_links_per_paragraph, 3);
        assert!(!config.synonyms.enabled);
        assert_eq!(
            config.state_path(),
            PathBuf::from("/notes/.autolink/state.json")
        );
    }

    #[test]
    fn folders_accept_joined_string() {
        let config = parse_config(
            "[corpus]\nroot = \"/n\"\n[exclude]\nfolders = \"Templates;Daily Notes\"\n",
        )
        .unwrap();
        assert_eq!(
            config.exclude.folders.entries(),
            vec!["Templates".to_string(), "Daily Notes".to_string()]
        );
    }

    #[test]
    fn folders_accept_list() {
        let config =
            parse_config("[corpus]\nroot = \"/n\"\n[exclude]\nfolders = [\"a\", \"b/c\"]\n")
                .unwrap();
        assert_eq!(config.exclude.folders.entries(), vec!["a", "b/c"]);
    }

    #[test]
    fn synonym_groups_parse() {
        let config = parse_config(
            r#"
[corpus]
root = "/n"

[synonyms]
enabled = true

[[synonyms.groups]]
primary = "JavaScript"
variants = ["JS", "ECMAScript"]
"#,
        )
        .unwrap();
        assert!(config.synonyms.enabled);
        assert_eq!(config.synonyms.groups.len(), 1);
        assert_eq!(config.synonyms.groups[0].variants.len(), 2);
        assert!(!config.synonyms.groups[0].case_sensitive);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = parse_config(
            "[corpus]\nroot = \"/n\"\n[filtering]\nconfidence_threshold = 1.5\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence_threshold"));
    }

    #[test]
    fn batch_size_is_clamped() {
        let mut batch = BatchConfig::default();
        batch.size = 0;
        assert_eq!(batch.effective_size(), 1);
        batch.size = 10_000;
        assert_eq!(batch.effective_size(), MAX_BATCH_SIZE);
    }
}
