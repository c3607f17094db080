//! Shell-style glob patterns for account listing.
//!
//! Supported syntax: `*` (any run, including empty), `?` (exactly one
//! character), `[abc]`, `[a-z]` and `[!abc]`. A `[` with no closing `]` is
//! an ordinary character. Patterns are translated to an anchored regex;
//! matching is on characters, not bytes, and is case-sensitive.

use regex::{Regex, RegexBuilder};

use crate::RegistryError;

/// Upper bound on the compiled size of one pattern.
const SIZE_LIMIT: usize = 1 << 20;

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidPattern` if the translated pattern is
    /// too large to compile.
    pub fn new(pattern: &str) -> Result<Self, RegistryError> {
        let regex = RegexBuilder::new(&translate(pattern))
            .size_limit(SIZE_LIMIT)
            .build()
            .map_err(|e| RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { regex })
    }

    /// Compile a `list_account` pattern: empty means everything and `_` is
    /// the single-character wildcard.
    pub fn for_listing(raw: &str) -> Result<Self, RegistryError> {
        if raw.is_empty() { Self::new("*") } else { Self::new(&raw.replace('_', "?")) }
    }

    /// Whether `text` matches the whole pattern.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                if !out.ends_with(".*") {
                    out.push_str(".*");
                }
            },
            '?' => out.push('.'),
            '[' => match class(&chars[i..]) {
                Some((negated, ranges, consumed)) => {
                    push_class(&mut out, negated, &ranges);
                    i += consumed;
                },
                None => out.push_str(r"\["),
            },
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}

/// Parse a class body following `[`. Returns the ranges and how many
/// characters were consumed through the closing `]`, or `None` if the class
/// is never closed.
fn class(chars: &[char]) -> Option<(bool, Vec<(char, char)>, usize)> {
    let mut i = 0;
    let negated = chars.first() == Some(&'!');
    if negated {
        i += 1;
    }

    let mut ranges = Vec::new();
    let mut first = true;
    loop {
        let lo = *chars.get(i)?;
        i += 1;
        if lo == ']' && !first {
            return Some((negated, ranges, i));
        }
        first = false;

        let hi = match (chars.get(i), chars.get(i + 1)) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                i += 2;
                hi
            },
            _ => lo,
        };
        // Reversed ranges match nothing
        if lo <= hi {
            ranges.push((lo, hi));
        }
    }
}

fn push_class(out: &mut String, negated: bool, ranges: &[(char, char)]) {
    if ranges.is_empty() {
        // Every range was reversed
        out.push_str(if negated { "." } else { r"[^\s\S]" });
        return;
    }

    out.push('[');
    if negated {
        out.push('^');
    }
    for &(lo, hi) in ranges {
        out.push_str(&regex::escape(lo.encode_utf8(&mut [0; 4])));
        if hi != lo {
            out.push('-');
            out.push_str(&regex::escape(hi.encode_utf8(&mut [0; 4])));
        }
    }
    out.push(']');
}
