//! Identity resolution outcomes and quarantine diagnostics
//!
//! Resolution never fails a batch over bad content: unresolvable text
//! becomes an [`Unresolved`](ResolvedRef::Unresolved) reference plus a
//! [`Diagnostic`] that the caller persists to the quarantine table.

use serde::{Deserialize, Serialize};

use aircheck_common::db::models::{FieldKind, QuarantineReason};

/// Reference produced by resolving one name against the identity catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedRef {
    Person {
        id: i64,
        confidence: f64,
        raw: String,
    },
    Ensemble {
        id: i64,
        confidence: f64,
        raw: String,
    },
    /// Text that produced no identity. The play keeps going with a
    /// sentinel or absent attribute; the raw text lands in quarantine.
    Unresolved { raw: String },
}

impl ResolvedRef {
    pub fn person_id(&self) -> Option<i64> {
        match self {
            ResolvedRef::Person { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn ensemble_id(&self) -> Option<i64> {
        match self {
            ResolvedRef::Ensemble { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            ResolvedRef::Person { raw, .. }
            | ResolvedRef::Ensemble { raw, .. }
            | ResolvedRef::Unresolved { raw } => raw,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ResolvedRef::Unresolved { .. })
    }
}

/// A performer credit: resolved person plus the role text that followed
/// their name, when the station supplied one.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformerCredit {
    pub person: ResolvedRef,
    pub role: Option<String>,
}

/// One recoverable problem found while resolving a field. Diagnostics ride
/// alongside the value channel; they never abort ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub field: FieldKind,
    pub raw_text: String,
    pub reason: QuarantineReason,
    /// Structured context for the review queue (scores, candidate ids).
    pub detail: Option<serde_json::Value>,
}

impl Diagnostic {
    pub fn parse_failure(field: FieldKind, raw_text: &str, detail: Option<serde_json::Value>) -> Self {
        Diagnostic {
            field,
            raw_text: raw_text.to_string(),
            reason: QuarantineReason::ParseFailure,
            detail,
        }
    }

    pub fn ambiguous(field: FieldKind, raw_text: &str, detail: Option<serde_json::Value>) -> Self {
        Diagnostic {
            field,
            raw_text: raw_text.to_string(),
            reason: QuarantineReason::AmbiguousClassification,
            detail,
        }
    }

    pub fn identity_review(field: FieldKind, raw_text: &str, detail: Option<serde_json::Value>) -> Self {
        Diagnostic {
            field,
            raw_text: raw_text.to_string(),
            reason: QuarantineReason::IdentityReview,
            detail,
        }
    }

    /// Parse failures and ambiguous classifications leave the play's field
    /// unresolved, so the play itself carries the quarantine flag. Identity
    /// reviews resolved to a usable reference and only need the queue entry.
    pub fn marks_play(&self) -> bool {
        matches!(
            self.reason,
            QuarantineReason::ParseFailure | QuarantineReason::AmbiguousClassification
        )
    }
}
