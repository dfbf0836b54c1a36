// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern tokens for session loop detection
//!
//! A chunk of session output is reduced to at most one token by an ordered
//! list of matchers; the first matcher that recognises the chunk wins.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::LazyLock;

/// Chunks longer than this (in chars) fall back to a content hash.
pub const HASH_MIN_CHARS: usize = 100;

/// Hex digits kept from the content digest
const HASH_HEX_LEN: usize = 16;

#[allow(clippy::expect_used)]
static CHECKLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:TODO|Todo|✓|☐|→)\s*(.{10,50})").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static FILE_OP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Read|Write|Edit|Create|Delete)\s+(\S+)")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static TEST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Test|test|PASS|FAIL|Error").expect("constant regex pattern is valid")
});

/// Normalized tag derived from one chunk of output
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternToken {
    /// Checklist or progress marker, tagged by the item text
    ChecklistItem(String),
    /// File operation verb, tagged by the path
    FileOp(String),
    /// Test or result keyword
    TestMarker(String),
    /// Digest of a long chunk with no other recognisable shape
    ContentHash(String),
}

impl fmt::Display for PatternToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternToken::ChecklistItem(s) => write!(f, "TODO:{s}"),
            PatternToken::FileOp(s) => write!(f, "FILE:{s}"),
            PatternToken::TestMarker(s) => write!(f, "TEST:{s}"),
            PatternToken::ContentHash(s) => write!(f, "HASH:{s}"),
        }
    }
}

type Matcher = fn(&str) -> Option<PatternToken>;

/// Matchers in priority order
pub const MATCHERS: &[(&str, Matcher)] = &[
    ("checklist", checklist_item),
    ("file_op", file_op),
    ("test_marker", test_marker),
    ("content_hash", content_hash),
];

/// Reduce a chunk to its token, or `None` if it carries no pattern.
pub fn classify(chunk: &str) -> Option<PatternToken> {
    MATCHERS.iter().find_map(|(_, matcher)| matcher(chunk))
}

pub fn checklist_item(chunk: &str) -> Option<PatternToken> {
    let caps = CHECKLIST.captures(chunk)?;
    Some(PatternToken::ChecklistItem(caps.get(1)?.as_str().trim().to_string()))
}

pub fn file_op(chunk: &str) -> Option<PatternToken> {
    let caps = FILE_OP.captures(chunk)?;
    Some(PatternToken::FileOp(caps.get(1)?.as_str().to_string()))
}

pub fn test_marker(chunk: &str) -> Option<PatternToken> {
    TEST_MARKER
        .find(chunk)
        .map(|m| PatternToken::TestMarker(m.as_str().to_string()))
}

pub fn content_hash(chunk: &str) -> Option<PatternToken> {
    if chunk.chars().count() <= HASH_MIN_CHARS {
        return None;
    }
    let mut hex = format!("{:x}", Sha256::digest(chunk.as_bytes()));
    hex.truncate(HASH_HEX_LEN);
    Some(PatternToken::ContentHash(hex))
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
