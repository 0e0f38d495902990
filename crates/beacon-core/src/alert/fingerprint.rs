use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::identity::AlertIdentity;

/// Hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 32;

const FIELD_DELIMITER: char = '|';

lazy_static! {
    // Order matters: broader shapes are replaced before bare numbers can split them.
    static ref VOLATILE: Vec<(Regex, &'static str)> = vec![
        (
            Regex::new(
                r"\b\d{4}-\d{2}-\d{2}(?:[t ]\d{2}:\d{2}(?::\d{2}(?:[.,]\d+)?)?(?:z|[+-]\d{2}:?\d{2})?)?\b"
            )
            .expect("Is a valid regex"),
            "<ts>",
        ),
        (
            Regex::new(r"\b\d{1,2}:\d{2}:\d{2}(?:\.\d+)?\b").expect("Is a valid regex"),
            "<ts>",
        ),
        (
            Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}(?::\d{1,5})?\b").expect("Is a valid regex"),
            "<ip>",
        ),
        (
            Regex::new(r"\b\d+(?:\.\d+)?\s?%").expect("Is a valid regex"),
            "<pct>",
        ),
        (
            Regex::new(r"\b\d+(?:\.\d+)?\s?(?:[kmgtp]i?b|bytes?|b)\b").expect("Is a valid regex"),
            "<size>",
        ),
        (
            Regex::new(
                r"\b(?:\d+(?:\.\d+)?(?:ms|us|ns|h|m|s|d))+\b|\b\d+(?:\.\d+)?\s?(?:milliseconds?|seconds?|secs?|minutes?|mins?|hours?|hrs?|days?)\b"
            )
            .expect("Is a valid regex"),
            "<dur>",
        ),
        (
            Regex::new(r"\b\d+(?:\.\d+)?\b").expect("Is a valid regex"),
            "<num>",
        ),
    ];
}

/// Stable grouping key for "the same logical alert condition".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_identity(identity: &AlertIdentity) -> Self {
        let canonical = [
            canonical_field(identity.namespace()),
            canonical_field(identity.service()),
            canonical_field(identity.instance()),
            identity.severity().as_str().to_string(),
            normalize_message(identity.message()),
        ]
        .join(&FIELD_DELIMITER.to_string());

        let digest = format!("{:x}", Sha256::digest(canonical.as_bytes()));
        Self(digest[..FINGERPRINT_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn canonical_field(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Lower-cases the message, swaps volatile substrings for placeholder tokens and
/// collapses runs of whitespace.
pub fn normalize_message(message: &str) -> String {
    let mut normalized = canonical_field(message);
    for (pattern, token) in VOLATILE.iter() {
        normalized = pattern.replace_all(&normalized, *token).into_owned();
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}
