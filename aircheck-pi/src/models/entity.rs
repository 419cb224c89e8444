//! Entity string decomposition types
//!
//! An entity string ("Bach, Johann Sebastian", "Joshua Bell, violin/Edgar
//! Meyer, double bass") decomposes into a flat sequence of [`EntityItem`]s.
//! Classification then labels each item with a [`FieldType`] before name
//! normalization and identity resolution.

use serde::{Deserialize, Serialize};

use crate::models::grammar::{DelimKind, Separator};

/// One span of an entity string produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityItem {
    /// Exact text between separators, untrimmed.
    pub raw: String,
    /// Display text: trimmed, with a fully-enclosing delimiter pair stripped.
    pub text: String,
    /// Byte offset of `raw` in the input.
    pub start: usize,
    /// Byte offset one past the end of `raw` in the input.
    pub end: usize,
    /// Delimiter kind that enclosed the whole item, if any.
    pub delim: Option<DelimKind>,
    /// Input ended inside an unclosed delimiter while reading this item.
    pub truncated: bool,
    /// Separator that terminated this item.
    pub sep_after: Separator,
}

impl EntityItem {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Semantic label assigned to an entity item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Person,
    Ensemble,
    Role,
    /// "<Ensemble>/<Person>" in a single item; both halves resolve.
    Hybrid,
    Unknown,
}

/// Where an item sits in its parsed sequence. Some classification rules
/// only apply at the edges (e.g. a trailing role after a minor separator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPosition {
    First,
    Interior,
    Last,
}

impl ItemPosition {
    pub fn of(index: usize, len: usize) -> Self {
        if index + 1 == len {
            ItemPosition::Last
        } else if index == 0 {
            ItemPosition::First
        } else {
            ItemPosition::Interior
        }
    }
}

/// Classification result for one entity item.
#[derive(Debug, Clone)]
pub struct ClassifiedItem {
    pub item: EntityItem,
    pub field_type: FieldType,
    /// 0.0 (no rule fired, or rules disagreed) up to 1.0.
    pub confidence: f64,
    /// Rules fired for conflicting types with no tiebreak.
    pub ambiguous: bool,
    /// Role phrase found after the final comma of a Person item
    /// ("Previn, conductor"), kept out of the name text.
    pub inline_role: Option<String>,
}

impl ClassifiedItem {
    /// Confidence at or below this marks the item for quarantine review.
    pub const QUARANTINE_CONFIDENCE: f64 = 0.0;

    /// Item text with any trailing inline role removed.
    pub fn name_text(&self) -> &str {
        match (&self.inline_role, self.item.text.rsplit_once(',')) {
            (Some(_), Some((name, _))) => name.trim_end(),
            _ => self.item.text.as_str(),
        }
    }

    pub fn needs_quarantine(&self) -> bool {
        self.confidence <= Self::QUARANTINE_CONFIDENCE
    }
}
