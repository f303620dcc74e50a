//! Two-phase protection of link spans.
//!
//! Every `[[...]]` span is swapped for a placeholder before matching and
//! swapped back afterwards. A placeholder is an opening sentinel, the slot
//! index spelled with private-use digits, and a closing sentinel, so no
//! ordinary title (digits included) can ever match inside one.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

pub const OPEN: char = '\u{E000}';
pub const CLOSE: char = '\u{E001}';
const DIGIT_ZERO: u32 = 0xE010;

static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[\[.*?\]\]").expect("static regex"));
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("\u{E000}([\u{E010}-\u{E019}]+)\u{E001}").expect("static regex")
});

fn is_sentinel(c: char) -> bool {
    c == OPEN || c == CLOSE || (DIGIT_ZERO..DIGIT_ZERO + 10).contains(&(c as u32))
}

fn encode(slot: usize) -> String {
    let mut s = String::new();
    s.push(OPEN);
    for d in slot.to_string().chars() {
        let offset = d.to_digit(10).unwrap_or(0);
        s.push(char::from_u32(DIGIT_ZERO + offset).unwrap_or(OPEN));
    }
    s.push(CLOSE);
    s
}

fn decode(digits: &str) -> Option<usize> {
    let plain: String = digits
        .chars()
        .filter_map(|c| (c as u32).checked_sub(DIGIT_ZERO))
        .filter_map(|d| char::from_digit(d, 10))
        .collect();
    plain.parse().ok()
}

/// A placeholder found in working text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub span: Range<usize>,
    pub slot: usize,
}

/// Masked text plus the side table of original spans.
#[derive(Debug, Clone)]
pub struct Masked {
    pub text: String,
    slots: Vec<String>,
    existing: usize,
}

impl Masked {
    /// Replace every existing link in `input` with a placeholder.
    pub fn new(input: &str) -> Self {
        let mut slots = Vec::new();
        let text = LINK_RE
            .replace_all(input, |caps: &regex::Captures| {
                slots.push(caps[0].to_string());
                encode(slots.len() - 1)
            })
            .into_owned();
        let existing = slots.len();
        Self {
            text,
            slots,
            existing,
        }
    }

    /// Number of links that were present before masking.
    pub fn existing(&self) -> usize {
        self.existing
    }

    pub fn is_existing(&self, slot: usize) -> bool {
        slot < self.existing
    }

    /// Store a freshly written link and return the placeholder standing in for it.
    pub fn protect(&mut self, link: String) -> String {
        self.slots.push(link);
        encode(self.slots.len() - 1)
    }

    /// Restore every placeholder in `text` to its stored span.
    pub fn restore(&self, text: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(text, |caps: &regex::Captures| {
                decode(&caps[1])
                    .and_then(|i| self.slots.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Restore a fragment for display; partial placeholders cut at the
    /// fragment edges are dropped.
    pub fn restore_fragment(&self, fragment: &str) -> String {
        self.restore(fragment)
            .chars()
            .filter(|c| !is_sentinel(*c))
            .collect()
    }
}

/// All placeholders in `text`, in order.
pub fn placeholders(text: &str) -> Vec<Placeholder> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let slot = decode(&caps[1])?;
            Some(Placeholder {
                span: m.range(),
                slot,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_and_restore() {
        let input = "See [[Alpha]] and [[Beta|b]].\n[[multi\nline]]";
        let masked = Masked::new(input);
        assert_eq!(masked.existing(), 3);
        assert!(!masked.text.contains("[["));
        assert!(!masked.text.contains("Alpha"));
        assert_eq!(masked.restore(&masked.text), input);
    }

    #[test]
    fn placeholders_hide_digits() {
        let input = (0..12).map(|i| format!("[[n{}]]", i)).collect::<String>();
        let masked = Masked::new(&input);
        assert!(!masked.text.chars().any(|c| c.is_ascii_digit()));
        let found = placeholders(&masked.text);
        assert_eq!(found.len(), 12);
        assert_eq!(found[11].slot, 11);
        assert_eq!(masked.restore(&masked.text), input);
    }

    #[test]
    fn protected_links_restore_too() {
        let mut masked = Masked::new("x [[a]] y");
        let p = masked.protect("[[b]]".to_string());
        let text = format!("{}{}", masked.text, p);
        assert_eq!(masked.restore(&text), "x [[a]] y[[b]]");
        assert!(masked.is_existing(0));
        assert!(!masked.is_existing(1));
    }

    #[test]
    fn fragment_drops_cut_placeholders() {
        let masked = Masked::new("[[Alpha]] tail");
        let cut = &masked.text[OPEN.len_utf8()..];
        assert_eq!(masked.restore_fragment(cut), " tail");
    }

    #[test]
    fn text_without_links_is_untouched() {
        let masked = Masked::new("plain text");
        assert_eq!(masked.text, "plain text");
        assert_eq!(masked.existing(), 0);
    }
}
