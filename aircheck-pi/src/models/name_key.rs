//! Structured person names
//!
//! A [`NameKey`] is the normalizer's output: name parts plus the canonical
//! key used for identity lookup. Two raw spellings that normalize to the
//! same canonical key are the same person.

use serde::{Deserialize, Serialize};

use aircheck_common::db::models::UNKNOWN_COMPOSER_KEY;

/// Stands in for a run of undecodable characters from a station feed.
pub const WILDCARD: char = '\u{FFFD}';

/// Decomposed person name with derived canonical forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NameKey {
    /// Honorific stripped from the front ("Sir", "Dame").
    pub prefix: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: String,
    /// Generational suffix ("Jr", "Sr", "II").
    pub suffix: Option<String>,
}

impl NameKey {
    /// Single-token name (mononym or surname-only credit).
    pub fn mononym(name: &str) -> Self {
        NameKey {
            last_name: name.to_string(),
            ..Default::default()
        }
    }

    /// Canonical lookup key: "Last, First Middle, Suffix" with whatever
    /// parts are present. Distinct suffixes produce distinct keys, so
    /// "Strauss, Johann, Sr" and "Strauss, Johann, Jr" never collide.
    pub fn canonical(&self) -> String {
        let mut key = self.last_name.clone();
        let given = self.given_names();
        if !given.is_empty() {
            key.push_str(", ");
            key.push_str(&given);
        }
        if let Some(sfx) = &self.suffix {
            key.push_str(", ");
            key.push_str(sfx);
        }
        key
    }

    /// Natural reading order: "First Middle Last Suffix".
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(f) = &self.first_name {
            parts.push(f);
        }
        if let Some(m) = &self.middle_name {
            parts.push(m);
        }
        parts.push(&self.last_name);
        if let Some(s) = &self.suffix {
            parts.push(s);
        }
        parts.join(" ")
    }

    fn given_names(&self) -> String {
        match (&self.first_name, &self.middle_name) {
            (Some(f), Some(m)) => format!("{} {}", f, m),
            (Some(f), None) => f.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => String::new(),
        }
    }

    /// The shared identity for anonymous/traditional credits and empty
    /// composer fields.
    pub fn unknown_composer() -> Self {
        NameKey::mononym(UNKNOWN_COMPOSER_KEY)
    }

    pub fn is_unknown_composer(&self) -> bool {
        self.canonical() == UNKNOWN_COMPOSER_KEY
    }

    /// True when any part carries the encoding-damage wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.canonical().contains(WILDCARD)
    }
}
