//! Title index and exclusion rules.
//!
//! The index is the universe of linkable titles. It is rebuilt wholesale
//! from the full document list whenever the corpus structure or the
//! exclusion rules change, and never edited incrementally.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::config::ExcludeConfig;
use crate::error::LinkError;
use crate::models::DocumentMeta;

/// Documents matching any of these rules are neither linked to nor rewritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionRules {
    /// Normalised folder prefixes, no leading or trailing `/`.
    pub folders: Vec<String>,
    /// Lower-cased tags without `#`.
    pub tags: HashSet<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub max_age_days: Option<u32>,
}

impl ExclusionRules {
    /// Derive the rule set from configuration. Malformed entries are dropped
    /// with a warning.
    pub fn from_config(config: &ExcludeConfig) -> Self {
        let mut folders = Vec::new();
        for raw in config.folders.entries() {
            let folder = raw.trim().replace('\\', "/").trim_matches('/').to_string();
            if folder.is_empty() {
                if !raw.is_empty() {
                    report(LinkError::Configuration(format!(
                        "ignoring empty exclude folder '{}'",
                        raw
                    )));
                }
                continue;
            }
            folders.push(folder);
        }

        let mut tags = HashSet::new();
        for raw in &config.tags {
            let tag = raw.trim().trim_start_matches('#').to_lowercase();
            if tag.is_empty() {
                report(LinkError::Configuration(format!(
                    "ignoring empty exclude tag '{}'",
                    raw
                )));
                continue;
            }
            tags.insert(tag);
        }

        let (min_size, max_size) = match (config.min_size, config.max_size) {
            (Some(min), Some(max)) if min > max => {
                report(LinkError::Configuration(format!(
                    "ignoring size bounds: min_size {} > max_size {}",
                    min, max
                )));
                (None, None)
            }
            bounds => bounds,
        };

        Self {
            folders,
            tags,
            min_size,
            max_size,
            max_age_days: config.max_age_days,
        }
    }

    pub fn is_excluded(&self, doc: &DocumentMeta) -> bool {
        self.is_excluded_at(doc, Utc::now())
    }

    pub fn is_excluded_at(&self, doc: &DocumentMeta, now: DateTime<Utc>) -> bool {
        self.excludes_path(&doc.id)
            || doc
                .tags
                .iter()
                .any(|t| self.tags.contains(&t.trim_start_matches('#').to_lowercase()))
            || self.min_size.is_some_and(|min| doc.size < min)
            || self.max_size.is_some_and(|max| doc.size > max)
            || self
                .max_age_days
                .is_some_and(|days| now - doc.modified > Duration::days(i64::from(days)))
    }

    /// True when `id` equals an excluded folder or lies beneath one.
    pub fn excludes_path(&self, id: &str) -> bool {
        let path = id.replace('\\', "/");
        self.folders.iter().any(|root| {
            path == *root
                || path
                    .strip_prefix(root.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

fn report(err: LinkError) {
    warn!("{}", err);
}

/// The set of linkable titles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleIndex {
    titles: BTreeSet<String>,
}

impl TitleIndex {
    /// Rebuild from the whole corpus. Every non-excluded document contributes
    /// its title exactly once; excluded documents contribute nothing.
    pub fn rebuild(corpus: &[DocumentMeta], rules: &ExclusionRules) -> Self {
        let now = Utc::now();
        let titles = corpus
            .iter()
            .filter(|doc| !rules.is_excluded_at(doc, now))
            .map(|doc| doc.title.clone())
            .collect();
        Self { titles }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.titles.iter()
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FolderList;

    fn doc(id: &str, title: &str) -> DocumentMeta {
        DocumentMeta::new(id, title)
    }

    #[test]
    fn empty_corpus_yields_empty_index() {
        let index = TitleIndex::rebuild(&[], &ExclusionRules::default());
        assert!(index.is_empty());
    }

    #[test]
    fn shared_titles_are_stored_once() {
        let corpus = vec![doc("a/Note.md", "Note"), doc("b/Note.md", "Note")];
        let index = TitleIndex::rebuild(&corpus, &ExclusionRules::default());
        assert_eq!(index.len(), 1);
        assert!(index.contains("Note"));
    }

    #[test]
    fn folder_exclusion_matches_prefix_on_segment_boundary() {
        let config = ExcludeConfig {
            folders: FolderList::Joined("Templates; Daily Notes/ ;".to_string()),
            ..Default::default()
        };
        let rules = ExclusionRules::from_config(&config);
        assert_eq!(rules.folders, vec!["Templates", "Daily Notes"]);

        let corpus = vec![
            doc("Templates/Meeting.md", "Meeting"),
            doc("Templates2/Other.md", "Other"),
            doc("Daily Notes/2024-01-01.md", "2024-01-01"),
            doc("Project.md", "Project"),
        ];
        let index = TitleIndex::rebuild(&corpus, &rules);
        assert_eq!(index.titles(), vec!["Other", "Project"]);
    }

    #[test]
    fn tag_size_and_age_exclusions() {
        let config = ExcludeConfig {
            tags: vec!["#Private".to_string(), "  ".to_string()],
            min_size: Some(5),
            max_size: Some(100),
            max_age_days: Some(30),
            ..Default::default()
        };
        let rules = ExclusionRules::from_config(&config);
        assert_eq!(rules.tags.len(), 1);

        let now = Utc::now();
        let mut tagged = doc("Secret.md", "Secret");
        tagged.size = 50;
        tagged.tags = vec!["private".to_string()];
        let mut tiny = doc("Tiny.md", "Tiny");
        tiny.size = 1;
        let mut huge = doc("Huge.md", "Huge");
        huge.size = 1000;
        let mut stale = doc("Stale.md", "Stale");
        stale.size = 50;
        stale.modified = now - Duration::days(31);
        let mut fresh = doc("Fresh.md", "Fresh");
        fresh.size = 50;

        assert!(rules.is_excluded_at(&tagged, now));
        assert!(rules.is_excluded_at(&tiny, now));
        assert!(rules.is_excluded_at(&huge, now));
        assert!(rules.is_excluded_at(&stale, now));
        assert!(!rules.is_excluded_at(&fresh, now));
    }

    #[test]
    fn inverted_size_bounds_are_ignored() {
        let config = ExcludeConfig {
            min_size: Some(100),
            max_size: Some(10),
            ..Default::default()
        };
        let rules = ExclusionRules::from_config(&config);
        assert_eq!(rules.min_size, None);
        assert_eq!(rules.max_size, None);
    }
}
