//! Name Normalization
//!
//! Reduces raw person and ensemble spellings to canonical forms. The
//! person key is "Last, First Middle, Suffix": suffixes are extracted
//! before any comma handling so "Strauss, Johann, Sr" and "Strauss Jr.,
//! Johann" both keep their generation marker, and "Last, First" credits
//! reverse into the same key as "First Last" ones.
//!
//! Each rule can be switched off independently, which matters for
//! stations whose feeds already arrive canonical.

use aircheck_common::db::models::FieldKind;

use crate::models::{NameKey, WILDCARD};
use crate::services::lexicon::Lexicon;

/// Normalization rule switches. All on by default.
#[derive(Debug, Clone, Copy)]
pub struct NormalizerRules {
    /// Strip wrapping quote characters left over from parsing.
    pub strip_quotes: bool,
    /// Collapse runs of whitespace to single spaces.
    pub collapse_whitespace: bool,
    /// Move leading honorifics ("Sir", "Dame") into the prefix slot.
    pub strip_honorifics: bool,
    /// Pull generational suffixes out before comma handling.
    pub extract_suffix: bool,
    /// Reverse "Last, First [Middle]" into structured parts.
    pub reverse_last_first: bool,
    /// Collapse runs of undecodable characters to one wildcard.
    pub wildcard_for_damage: bool,
}

impl Default for NormalizerRules {
    fn default() -> Self {
        NormalizerRules {
            strip_quotes: true,
            collapse_whitespace: true,
            strip_honorifics: true,
            extract_suffix: true,
            reverse_last_first: true,
            wildcard_for_damage: true,
        }
    }
}

/// Secondary separators that pack several people into one credit.
const MULTI_NAME_SEPARATORS: &[&str] = &["/", " & ", " and "];

pub struct NameNormalizer {
    lexicon: Lexicon,
    rules: NormalizerRules,
}

impl NameNormalizer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            lexicon,
            rules: NormalizerRules::default(),
        }
    }

    pub fn with_rules(lexicon: Lexicon, rules: NormalizerRules) -> Self {
        Self { lexicon, rules }
    }

    /// Normalize one person credit. Returns `None` when nothing survives
    /// cleaning. Anonymous and traditional markers collapse to the shared
    /// unknown-composer key.
    pub fn normalize_person(&self, text: &str) -> Option<NameKey> {
        let mut working = self.clean(text);
        if working.is_empty() {
            return None;
        }
        if self.lexicon.is_anonymous_marker(&working) {
            return Some(NameKey::unknown_composer());
        }

        let prefix = if self.rules.strip_honorifics {
            self.take_honorific(&mut working)
        } else {
            None
        };
        let suffix = if self.rules.extract_suffix {
            self.take_suffix(&mut working)
        } else {
            None
        };
        if working.is_empty() {
            return None;
        }

        let mut key = if working.contains(',') && self.rules.reverse_last_first {
            self.from_comma_form(&working)
        } else {
            self.from_natural_order(&working)
        }?;
        key.prefix = prefix;
        key.suffix = suffix;
        Some(key)
    }

    /// Normalize a credit that may pack several people ("Perlman/Ashkenazy",
    /// "Gilbert and Sullivan"). Splitting only happens for fields that
    /// semantically allow multiple people; elsewhere the text stays one name.
    pub fn normalize_people(&self, text: &str, field: FieldKind) -> Vec<NameKey> {
        if !field.allows_multiple() {
            return self.normalize_person(text).into_iter().collect();
        }
        let cleaned = self.clean(text);
        let mut parts = vec![cleaned];
        for sep in MULTI_NAME_SEPARATORS {
            parts = parts
                .into_iter()
                .flat_map(|p| {
                    p.split(sep)
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                })
                .collect();
        }
        parts
            .iter()
            .filter_map(|p| self.normalize_person(p))
            .collect()
    }

    /// Canonical ensemble name: cleaned text with display case preserved.
    pub fn normalize_ensemble(&self, text: &str) -> Option<String> {
        let cleaned = self.clean(text);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// Canonical role form: lowercase, trimmed, single-spaced.
    pub fn normalize_role(&self, text: &str) -> String {
        collapse_ws(&text.to_lowercase())
            .trim_matches(|c: char| c == '.' || c == ',')
            .to_string()
    }

    fn clean(&self, text: &str) -> String {
        let mut working = text.trim().to_string();
        if self.rules.strip_quotes {
            working = working
                .trim_matches(|c: char| c == '"' || c == '\'')
                .to_string();
        }
        if self.rules.wildcard_for_damage {
            working = collapse_damage(&working);
        }
        if self.rules.collapse_whitespace {
            working = collapse_ws(&working);
        }
        working.trim().to_string()
    }

    fn take_honorific(&self, working: &mut String) -> Option<String> {
        let first = working.split_whitespace().next()?.to_string();
        if !self.lexicon.is_honorific(&first) {
            return None;
        }
        let rest = working[first.len()..].trim_start().to_string();
        // A lone honorific is the whole name; leave it alone.
        if rest.is_empty() {
            return None;
        }
        *working = rest;
        Some(first.trim_end_matches('.').to_string())
    }

    /// Extract a generational suffix wherever the station put it: trailing
    /// ("Johann Strauss Sr", "Strauss, Johann, Sr") or attached to the
    /// surname before the comma ("Strauss Jr., Johann").
    fn take_suffix(&self, working: &mut String) -> Option<String> {
        // Trailing token.
        if let Some(idx) = working.rfind(char::is_whitespace) {
            let tail = working[idx..].trim().trim_matches(|c: char| c == ',' || c == '.');
            if self.lexicon.is_suffix(tail) && idx > 0 {
                let canonical = canonical_suffix(tail);
                let mut head = working[..idx].trim_end().to_string();
                if head.ends_with(',') {
                    head.pop();
                    head = head.trim_end().to_string();
                }
                *working = head;
                return Some(canonical);
            }
        }
        // Last token of the surname segment, before the first comma.
        if let Some(comma) = working.find(',') {
            let (head, rest) = working.split_at(comma);
            if let Some(idx) = head.rfind(char::is_whitespace) {
                let tail = head[idx..].trim().trim_matches('.');
                if self.lexicon.is_suffix(tail) {
                    let canonical = canonical_suffix(tail);
                    *working = format!("{}{}", head[..idx].trim_end(), rest);
                    return Some(canonical);
                }
            }
        }
        None
    }

    fn from_comma_form(&self, working: &str) -> Option<NameKey> {
        let mut segments = working.splitn(2, ',');
        let last = segments.next()?.trim().to_string();
        let given = segments.next().unwrap_or("").trim().replace(',', " ");
        let given = collapse_ws(&given);
        if last.is_empty() {
            return self.from_natural_order(&given);
        }
        let mut tokens = given.split_whitespace();
        let first = tokens.next().map(|t| t.to_string());
        let middle = {
            let rest: Vec<&str> = tokens.collect();
            if rest.is_empty() {
                None
            } else {
                Some(rest.join(" "))
            }
        };
        Some(NameKey {
            prefix: None,
            first_name: first,
            middle_name: middle,
            last_name: last,
            suffix: None,
        })
    }

    fn from_natural_order(&self, working: &str) -> Option<NameKey> {
        let tokens: Vec<&str> = working.split_whitespace().collect();
        match tokens.len() {
            0 => None,
            1 => Some(NameKey::mononym(tokens[0])),
            n => Some(NameKey {
                prefix: None,
                first_name: Some(tokens[0].to_string()),
                middle_name: if n > 2 {
                    Some(tokens[1..n - 1].join(" "))
                } else {
                    None
                },
                last_name: tokens[n - 1].to_string(),
                suffix: None,
            }),
        }
    }
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse each run of replacement characters from a broken decode into a
/// single wildcard so damaged spellings still derive a stable key.
fn collapse_damage(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c == WILDCARD {
            if !in_run {
                out.push(WILDCARD);
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Suffixes get one spelling in keys: "jr." and "JR" both become "Jr".
fn canonical_suffix(token: &str) -> String {
    let lowered = token.to_lowercase();
    match lowered.as_str() {
        "jr" => "Jr".to_string(),
        "sr" => "Sr".to_string(),
        other => other.to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(Lexicon::builtin())
    }

    #[test]
    fn test_comma_form_reverses_into_parts() {
        let n = normalizer();
        let key = n.normalize_person("Bach, Johann Sebastian").unwrap();
        assert_eq!(key.last_name, "Bach");
        assert_eq!(key.first_name.as_deref(), Some("Johann"));
        assert_eq!(key.middle_name.as_deref(), Some("Sebastian"));
        assert_eq!(key.canonical(), "Bach, Johann Sebastian");
        assert_eq!(key.full_name(), "Johann Sebastian Bach");
    }

    #[test]
    fn test_suffix_positions_all_reach_same_key() {
        let n = normalizer();
        let a = n.normalize_person("Strauss, Johann, Sr").unwrap();
        let b = n.normalize_person("Johann Strauss Sr.").unwrap();
        let c = n.normalize_person("Strauss Sr., Johann").unwrap();
        assert_eq!(a.canonical(), "Strauss, Johann, Sr");
        assert_eq!(b.canonical(), a.canonical());
        assert_eq!(c.canonical(), a.canonical());
    }

    #[test]
    fn test_junior_and_senior_stay_distinct() {
        let n = normalizer();
        let sr = n.normalize_person("Strauss, Johann, Sr").unwrap();
        let jr = n.normalize_person("Strauss, Johann, Jr").unwrap();
        let ii = n.normalize_person("Strauss II, Johann").unwrap();
        assert_ne!(sr.canonical(), jr.canonical());
        assert_eq!(ii.suffix.as_deref(), Some("II"));
        assert_eq!(ii.last_name, "Strauss");
        assert_eq!(ii.first_name.as_deref(), Some("Johann"));
        assert_ne!(ii.canonical(), sr.canonical());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let n = normalizer();
        for raw in [
            "Bach, Johann Sebastian",
            "Johann Strauss Sr.",
            "Sir Neville Marriner",
            "Sting",
            "  Ludwig  van   Beethoven ",
        ] {
            let once = n.normalize_person(raw).unwrap();
            let twice = n.normalize_person(&once.canonical()).unwrap();
            assert_eq!(once.canonical(), twice.canonical(), "input {:?}", raw);
        }
    }

    #[test]
    fn test_honorific_moves_to_prefix() {
        let n = normalizer();
        let key = n.normalize_person("Sir Neville Marriner").unwrap();
        assert_eq!(key.prefix.as_deref(), Some("Sir"));
        assert_eq!(key.canonical(), "Marriner, Neville");
    }

    #[test]
    fn test_anonymous_markers_share_identity() {
        let n = normalizer();
        let a = n.normalize_person("Anonymous").unwrap();
        let b = n.normalize_person("Traditional").unwrap();
        let c = n.normalize_person("trad.").unwrap();
        assert!(a.is_unknown_composer());
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(b.canonical(), c.canonical());
    }

    #[test]
    fn test_multi_name_split_only_for_multi_fields() {
        let n = normalizer();
        let keys = n.normalize_people("Perlman/Ashkenazy", FieldKind::Performers);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].canonical(), "Perlman");
        assert_eq!(keys[1].canonical(), "Ashkenazy");

        let keys = n.normalize_people("Gilbert and Sullivan", FieldKind::Performers);
        assert_eq!(keys.len(), 2);

        // Conductor credits never split.
        let keys = n.normalize_people("Perlman/Ashkenazy", FieldKind::Conductor);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_damage_runs_collapse_to_one_wildcard() {
        let n = normalizer();
        let key = n.normalize_person("Dvo\u{FFFD}\u{FFFD}\u{FFFD}k, Anton\u{FFFD}n").unwrap();
        assert_eq!(key.last_name, "Dvo\u{FFFD}k");
        assert!(key.has_wildcard());
        // Stable under repeat.
        let again = n.normalize_person(&key.canonical()).unwrap();
        assert_eq!(again.canonical(), key.canonical());
    }

    #[test]
    fn test_particles_stay_with_given_names() {
        let n = normalizer();
        let key = n.normalize_person("Ludwig van Beethoven").unwrap();
        assert_eq!(key.canonical(), "Beethoven, Ludwig van");
    }

    #[test]
    fn test_mononym_passes_through() {
        let n = normalizer();
        let key = n.normalize_person("Sting").unwrap();
        assert_eq!(key.canonical(), "Sting");
        assert!(n.normalize_person("   ").is_none());
    }

    #[test]
    fn test_rules_can_be_disabled() {
        let rules = NormalizerRules {
            reverse_last_first: false,
            ..NormalizerRules::default()
        };
        let n = NameNormalizer::with_rules(Lexicon::builtin(), rules);
        let key = n.normalize_person("Bach, Johann").unwrap();
        // Without reversal the comma form is read in natural order.
        assert_eq!(key.first_name.as_deref(), Some("Bach,"));
        assert_eq!(key.last_name, "Johann");
    }

    #[test]
    fn test_role_normalization() {
        let n = normalizer();
        assert_eq!(n.normalize_role("  Violin "), "violin");
        assert_eq!(n.normalize_role("double  bass/guitar"), "double bass/guitar");
    }
}
