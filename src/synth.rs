//! Link synthesis for a single document.
//!
//! ```text
//!   raw text ──mask──▶ working text ──per candidate──▶ working text ──restore──▶ output
//!                         │                 │
//!                         │        match ▸ density filter ▸ proximity filter
//!                         │              ▸ confidence ▸ approve ▸ rewrite
//!                         └─ existing [[links]] are placeholders throughout
//! ```
//!
//! Candidates are applied longest first. Each applied link is itself turned
//! into a placeholder right away, so later (shorter) candidates cannot match
//! inside it.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::candidates::Candidate;
use crate::config::Config;
use crate::mask::{placeholders, Masked};
use crate::models::{LinkSuggestion, SynthesisResult};
use crate::pattern::{is_ascii_word, MatchOptions, PatternCache};

/// Every accepted match starts from this confidence.
pub const BASE_CONFIDENCE: f64 = 0.5;
/// Added when the matched text equals the title, ignoring case.
pub const EXACT_MATCH_BONUS: f64 = 0.3;
/// Scaled by the share of the title's words found around the match.
pub const CONTEXT_BONUS: f64 = 0.2;
/// Characters of context taken on each side of a match.
pub const CONTEXT_WINDOW: usize = 50;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n[ \t\r]*\n").expect("static regex"));

/// Knobs for one synthesis pass, derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisOptions {
    pub matching: MatchOptions,
    pub avoid_overlinking: bool,
    pub max_links_per_paragraph: usize,
    pub respect_existing_links: bool,
    pub proximity_margin: usize,
    pub review_before_apply: bool,
    pub confidence_threshold: f64,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            matching: MatchOptions::default(),
            avoid_overlinking: true,
            max_links_per_paragraph: 3,
            respect_existing_links: true,
            proximity_margin: 10,
            review_before_apply: false,
            confidence_threshold: 0.7,
        }
    }
}

impl SynthesisOptions {
    pub fn from_config(config: &Config) -> Self {
        let f = &config.filtering;
        Self {
            matching: config.matching.options(),
            avoid_overlinking: f.avoid_overlinking,
            max_links_per_paragraph: f.max_links_per_paragraph,
            respect_existing_links: f.respect_existing_links,
            proximity_margin: f.proximity_margin,
            review_before_apply: f.review_before_apply,
            confidence_threshold: f.confidence_threshold,
        }
    }
}

/// Rewrite title mentions in `text` into links.
///
/// `candidates` must come from
/// [`select_candidates`](crate::candidates::select_candidates) for the same
/// document. A candidate whose pattern fails to compile is skipped.
pub fn synthesize(
    text: &str,
    candidates: &[Candidate],
    self_title: &str,
    options: &SynthesisOptions,
    cache: &PatternCache,
) -> SynthesisResult {
    if candidates.is_empty() {
        return SynthesisResult::unchanged(text.to_string());
    }

    let mut masked = Masked::new(text);
    let mut work = masked.text.clone();
    let mut link_count = 0usize;
    let mut suggestions = Vec::new();

    for candidate in candidates {
        if candidate.target == self_title {
            continue;
        }

        let pattern = match cache.get_or_build(&candidate.text, options.matching) {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping title: {}", e);
                continue;
            }
        };
        if !pattern.regex.is_match(&work) {
            continue;
        }

        let breaks: Vec<usize> = PARAGRAPH_BREAK.find_iter(&work).map(|m| m.end()).collect();
        let paragraph_of = |offset: usize| breaks.partition_point(|&end| end <= offset);

        let mut paragraph_links = vec![0usize; breaks.len() + 1];
        let mut existing_positions = Vec::new();
        for p in placeholders(&work) {
            paragraph_links[paragraph_of(p.span.start)] += 1;
            if masked.is_existing(p.slot) {
                existing_positions.push(p.span.start);
            }
        }

        let title_len = candidate.text.chars().count();
        let mut out = String::with_capacity(work.len() + 16);
        let mut last = 0usize;

        for caps in pattern.regex.captures_iter(&work) {
            let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let paragraph = paragraph_of(whole.start());

            if options.avoid_overlinking
                && paragraph_links[paragraph] >= options.max_links_per_paragraph
            {
                debug!(
                    "'{}' at {}: paragraph already has {} link(s)",
                    candidate.text,
                    whole.start(),
                    paragraph_links[paragraph]
                );
                continue;
            }

            if options.respect_existing_links
                && near_any(
                    &work,
                    whole.start(),
                    &existing_positions,
                    title_len + options.proximity_margin,
                )
            {
                debug!(
                    "'{}' at {}: too close to an existing link",
                    candidate.text,
                    whole.start()
                );
                continue;
            }

            let (before, after) = context_window(&work, word.range(), CONTEXT_WINDOW);
            let confidence = if options.matching.partial_match {
                let enclosing =
                    enclosing_word(&work, word.range(), whole.end(), !pattern.script_sensitive);
                score(&enclosing, &candidate.text, before, after)
            } else {
                score(word.as_str(), &candidate.text, before, after)
            };
            let approved =
                !options.review_before_apply || confidence > options.confidence_threshold;

            suggestions.push(LinkSuggestion {
                original: word.as_str().to_string(),
                target: candidate.target.clone(),
                position: work[..whole.start()].chars().count(),
                confidence,
                context: masked.restore_fragment(&format!("{}{}{}", before, word.as_str(), after)),
                approved,
            });

            if !approved {
                continue;
            }

            let link = if candidate.is_alias() {
                format!("[[{}|{}]]", candidate.target, word.as_str())
            } else {
                format!("[[{}]]", candidate.target)
            };
            out.push_str(&work[last..whole.start()]);
            out.push_str(&masked.protect(link));
            if let Some(suffix) = caps.get(2) {
                out.push_str(suffix.as_str());
            }
            last = whole.end();

            paragraph_links[paragraph] += 1;
            link_count += 1;
        }

        out.push_str(&work[last..]);
        work = out;
    }

    if link_count == 0 {
        return SynthesisResult {
            text: text.to_string(),
            changed: false,
            link_count: 0,
            suggestions,
        };
    }

    SynthesisResult {
        text: masked.restore(&work),
        changed: true,
        link_count,
        suggestions,
    }
}

/// True when `offset` lies within `limit` characters of any position.
fn near_any(text: &str, offset: usize, positions: &[usize], limit: usize) -> bool {
    positions.iter().any(|&pos| {
        let range = if pos <= offset { pos..offset } else { offset..pos };
        text[range].chars().count() < limit
    })
}

/// The whole word a partial match sits in, leaving out a captured particle.
///
/// `word` is the matched title and `tail` the end of the full match. Latin
/// titles extend over ASCII word characters only.
fn enclosing_word(text: &str, word: Range<usize>, tail: usize, ascii: bool) -> String {
    let is_word = |c: char| {
        if ascii {
            is_ascii_word(c)
        } else {
            c.is_alphanumeric() || c == '_'
        }
    };
    let start = text[..word.start]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word(c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(word.start);
    let end = text[tail..]
        .char_indices()
        .find(|&(_, c)| !is_word(c))
        .map(|(i, _)| tail + i)
        .unwrap_or(text.len());
    format!("{}{}", &text[start..word.end], &text[tail..end])
}

/// Up to `window` characters before and after `span`.
fn context_window(text: &str, span: Range<usize>, window: usize) -> (&str, &str) {
    let start = text[..span.start]
        .char_indices()
        .rev()
        .nth(window.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[span.end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| span.end + i)
        .unwrap_or(text.len());
    (&text[start..span.start], &text[span.end..end])
}

/// Confidence that `matched` is a genuine mention of `title`, in `[0, 1]`.
pub fn score(matched: &str, title: &str, before: &str, after: &str) -> f64 {
    let mut confidence = BASE_CONFIDENCE;

    if matched.to_lowercase() == title.to_lowercase() {
        confidence += EXACT_MATCH_BONUS;
    }

    let words: Vec<String> = title.split_whitespace().map(|w| w.to_lowercase()).collect();
    if !words.is_empty() {
        let context = format!("{} {}", before, after).to_lowercase();
        let present = words.iter().filter(|w| context.contains(w.as_str())).count();
        confidence += CONTEXT_BONUS * present as f64 / words.len() as f64;
    }

    confidence.clamp(0.0, 1.0)
}
