//! Field Classification
//!
//! Labels each parsed entity item as Person, Ensemble, Role, Hybrid, or
//! Unknown. Rules fire in a fixed order and the confidence reflects how
//! many independent signals agreed: two or more put the label in the high
//! band, exactly one lands in the medium band, none leaves the item
//! Unknown at confidence zero for quarantine.
//!
//! Classification is registry-driven, not hardcoded per station: the same
//! rules run everywhere and only the lexicons vary by config.

use aircheck_common::db::models::FieldKind;

use crate::models::{ClassifiedItem, EntityItem, FieldType, ItemPosition, Separator, WILDCARD};
use crate::services::lexicon::{Lexicon, RoleMatch};

/// Lowercase connective words that appear inside proper names.
const NAME_PARTICLES: &[&str] = &[
    "van", "von", "de", "der", "den", "del", "della", "di", "da", "la", "le", "du", "ter",
    "ten", "of", "the", "y",
];

pub struct FieldClassifier {
    lexicon: Lexicon,
}

impl FieldClassifier {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Classify a parsed sequence in order. Sequence context matters: a
    /// role phrase bound to the preceding item by a minor separator gets a
    /// second agreeing signal.
    pub fn classify_items(&self, items: &[EntityItem], context: FieldKind) -> Vec<ClassifiedItem> {
        let len = items.len();
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let prev_sep = if idx == 0 {
                    None
                } else {
                    Some(items[idx - 1].sep_after)
                };
                self.classify_one(item, ItemPosition::of(idx, len), prev_sep, context)
            })
            .collect()
    }

    fn classify_one(
        &self,
        item: &EntityItem,
        position: ItemPosition,
        prev_sep: Option<Separator>,
        context: FieldKind,
    ) -> ClassifiedItem {
        let text = item.text.as_str();

        if text.is_empty() {
            return unknown(item, false);
        }

        // A bare generational suffix is a parse artifact, not an identity.
        if self.lexicon.is_suffix_only(text) {
            return unknown(item, false);
        }

        // Role and ensemble vocabularies claiming the same whole text is a
        // disagreement with no tiebreak.
        if self.lexicon.is_role_and_keyword(text) {
            tracing::debug!(text, "role and ensemble vocabularies both claim item");
            return unknown(item, true);
        }

        match self.lexicon.role_match(text) {
            RoleMatch::Exact => {
                // Vocabulary hit plus trailing placement (bound to the
                // preceding item, or closing the sequence) agree.
                let mut signals = 1u32;
                if prev_sep == Some(Separator::Minor) {
                    signals += 1;
                }
                if position == ItemPosition::Last && prev_sep.is_some() {
                    signals += 1;
                }
                let confidence = if signals >= 2 { 0.9 } else { 0.7 };
                return classified(item, FieldType::Role, confidence, None);
            }
            RoleMatch::Ambiguous => {
                // Token doubles as a person title; keep Role but leave it
                // in the low band so review picks it up.
                return classified(item, FieldType::Role, 0.4, None);
            }
            RoleMatch::None => {}
        }

        if let Some((field_type, confidence)) = self.classify_shape(text, context, 0) {
            return classified(item, field_type, confidence, None);
        }

        // "Name, role" packed into one item: the role rides along and the
        // name part decides the type.
        if let Some((name_part, role_part)) = self.trailing_role(text) {
            if let Some((field_type, confidence)) = self.classify_shape(name_part, context, 1) {
                let inline_role = matches!(field_type, FieldType::Person | FieldType::Hybrid)
                    .then(|| role_part.to_string());
                return classified(item, field_type, confidence, inline_role);
            }
        }

        unknown(item, false)
    }

    /// Shape and vocabulary rules shared by whole items and by the name
    /// part left after an inline role is split off. `extra_signals`
    /// credits evidence the caller already holds.
    fn classify_shape(
        &self,
        text: &str,
        context: FieldKind,
        extra_signals: u32,
    ) -> Option<(FieldType, f64)> {
        if let Some(confidence) = self.hybrid_signals(text) {
            return Some((FieldType::Hybrid, confidence));
        }

        if self.lexicon.has_ensemble_keyword(text) {
            // Person/ensemble tie breaks toward Ensemble when a keyword is
            // present.
            let mut signals = 1 + extra_signals;
            if title_shape(text) {
                signals += 1;
            }
            if context == FieldKind::Ensembles {
                signals += 1;
            }
            let confidence = if signals >= 2 { 0.9 } else { 0.7 };
            return Some((FieldType::Ensemble, confidence));
        }

        let comma = self.comma_name_pattern(text);
        let shape = name_shape(text);
        if comma || shape {
            let mut signals = extra_signals;
            if comma {
                signals += 1;
            }
            if shape {
                signals += 1;
            }
            if matches!(context, FieldKind::Composer | FieldKind::Conductor) {
                signals += 1;
            }
            let confidence = if signals >= 2 { 0.9 } else { 0.7 };
            return Some((FieldType::Person, confidence));
        }

        None
    }

    /// Splits "<name>, <role phrase>" at the final comma when the right
    /// side is in the role vocabulary.
    fn trailing_role<'a>(&self, text: &'a str) -> Option<(&'a str, &'a str)> {
        let (name, role) = text.rsplit_once(',')?;
        let name = name.trim();
        let role = role.trim();
        if name.is_empty() || role.is_empty() {
            return None;
        }
        match self.lexicon.role_match(role) {
            RoleMatch::Exact | RoleMatch::Ambiguous => Some((name, role)),
            RoleMatch::None => None,
        }
    }

    /// "<Ensemble>/<Person>" packed into one item: keyword on the left,
    /// name shape on the right.
    fn hybrid_signals(&self, text: &str) -> Option<f64> {
        let (left, right) = text.split_once('/')?;
        if right.contains('/') {
            return None;
        }
        let left = left.trim();
        let right = right.trim();
        if left.is_empty() || right.is_empty() {
            return None;
        }
        if self.lexicon.has_ensemble_keyword(left)
            && !self.lexicon.has_ensemble_keyword(right)
            && (name_shape(right) || self.comma_name_pattern(right))
        {
            return Some(0.8);
        }
        None
    }

    /// "Last, First [Middle]" (optionally with a trailing suffix segment).
    fn comma_name_pattern(&self, text: &str) -> bool {
        let segments: Vec<&str> = text.split(',').map(|s| s.trim()).collect();
        if !(2..=3).contains(&segments.len()) || segments.iter().any(|s| s.is_empty()) {
            return false;
        }
        segments
            .iter()
            .all(|seg| name_shape(seg) || self.lexicon.is_suffix_only(seg))
    }
}

fn classified(
    item: &EntityItem,
    field_type: FieldType,
    confidence: f64,
    inline_role: Option<String>,
) -> ClassifiedItem {
    ClassifiedItem {
        item: item.clone(),
        field_type,
        confidence,
        ambiguous: false,
        inline_role,
    }
}

fn unknown(item: &EntityItem, ambiguous: bool) -> ClassifiedItem {
    ClassifiedItem {
        item: item.clone(),
        field_type: FieldType::Unknown,
        confidence: 0.0,
        ambiguous,
        inline_role: None,
    }
}

/// Capitalized-name shape: up to five tokens, each capitalized, an
/// initial, a lowercase name particle, or encoding damage. At least one
/// token must be a real capitalized word.
fn name_shape(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() > 5 {
        return false;
    }
    let mut capitalized = 0;
    for tok in &tokens {
        let tok = tok.trim_matches(|c: char| c == ',' || c == '.');
        if tok.is_empty() {
            continue;
        }
        if tok.contains(WILDCARD) {
            continue;
        }
        let mut chars = tok.chars();
        let first = match chars.next() {
            Some(c) => c,
            None => continue,
        };
        if first.is_uppercase() {
            capitalized += 1;
            continue;
        }
        if NAME_PARTICLES.contains(&tok.to_lowercase().as_str()) {
            continue;
        }
        return false;
    }
    capitalized >= 1 || text.contains(WILDCARD)
}

/// Multiword capitalized title, the usual shape of an ensemble name.
fn title_shape(text: &str) -> bool {
    text.split_whitespace().count() >= 2 && name_shape(text)
}
