//! Per-document candidate selection.
//!
//! Turns the title index into the ordered list of strings to search for in
//! one document: self and low-value titles removed, synonym groups expanded,
//! longest first, and every title that is a substring of an already-kept
//! longer one dropped.
//!
//! The subsumption step must run before every synthesis pass. The
//! synthesizer has no runtime overlap check between different titles and
//! relies on this list being non-redundant.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::warn;

use crate::error::LinkError;

/// A user-declared set of alternative spellings for one title.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SynonymGroup {
    pub primary: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl SynonymGroup {
    fn members(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.variants.iter().map(|v| v.as_str()))
    }

    fn same(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.to_lowercase() == b.to_lowercase()
        }
    }
}

/// Drop malformed synonym groups and blank variants.
pub fn sanitize_groups(groups: &[SynonymGroup]) -> Vec<SynonymGroup> {
    groups
        .iter()
        .filter_map(|g| {
            let primary = g.primary.trim().to_string();
            if primary.is_empty() {
                warn!(
                    "{}",
                    LinkError::Configuration(format!(
                        "ignoring synonym group with empty primary (variants: {:?})",
                        g.variants
                    ))
                );
                return None;
            }
            let variants = g
                .variants
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            Some(SynonymGroup {
                primary,
                variants,
                case_sensitive: g.case_sensitive,
            })
        })
        .collect()
}

/// One string to search for and the title it links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Literal text to match.
    pub text: String,
    /// Index title the link points at. Equal to `text` unless the candidate
    /// came from a synonym group.
    pub target: String,
}

impl Candidate {
    fn plain(title: &str) -> Self {
        Self {
            text: title.to_string(),
            target: title.to_string(),
        }
    }

    pub fn is_alias(&self) -> bool {
        self.text != self.target
    }
}

/// Whether a title is worth linking at all.
///
/// Blank titles never are. Titles with a space read as phrases and always
/// are. Otherwise a single character is too little to link.
pub fn is_linkable(title: &str) -> bool {
    let t = title.trim();
    if t.is_empty() {
        return false;
    }
    if t.contains(' ') {
        return true;
    }
    t.chars().count() >= 2
}

/// Build the candidate list for the document titled `self_title`.
pub fn select_candidates<'a, I>(
    all_titles: I,
    self_title: &str,
    synonyms: Option<&[SynonymGroup]>,
) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a String>,
{
    let self_title = self_title.trim();
    let eligible = |t: &str| is_linkable(t) && t.trim() != self_title;

    let mut seen: HashSet<String> = HashSet::new();
    let mut pool: Vec<Candidate> = Vec::new();
    for title in all_titles {
        if eligible(title) && seen.insert(title.clone()) {
            pool.push(Candidate::plain(title));
        }
    }

    if let Some(groups) = synonyms {
        let titles: Vec<String> = pool.iter().map(|c| c.text.clone()).collect();
        for group in groups {
            let present = |member: &str| titles.iter().find(|t| group.same(t, member)).cloned();
            let target = present(&group.primary).or_else(|| {
                group
                    .variants
                    .iter()
                    .find_map(|v| present(v.as_str()))
            });
            let Some(target) = target else {
                continue;
            };
            if target.trim() == self_title {
                continue;
            }
            for member in group.members() {
                if eligible(member) && seen.insert(member.to_string()) {
                    pool.push(Candidate {
                        text: member.to_string(),
                        target: target.clone(),
                    });
                }
            }
        }
    }

    pool.sort_by(|a, b| {
        b.text
            .chars()
            .count()
            .cmp(&a.text.chars().count())
            .then_with(|| a.text.cmp(&b.text))
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in pool {
        if kept.iter().any(|k| k.text.contains(candidate.text.as_str())) {
            continue;
        }
        kept.push(candidate);
    }
    kept
}
