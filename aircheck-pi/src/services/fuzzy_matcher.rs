//! Fuzzy Identity Matching
//!
//! Scores a candidate canonical key against the existing identities of one
//! type. The score blends token-set overlap, whole-string edit distance,
//! and a wildcard bonus for encoding-damaged names, with weights from
//! config. Matching is deterministic: the same identity set and input
//! always produce the same outcome, and score ties go to the lowest id.
//!
//! Scoring runs on lowercased keys. Exact (case-insensitive) hits are the
//! resolver's job; by the time text reaches this matcher it differs from
//! every stored key.

use aircheck_common::config::MatcherConfig;

use crate::models::WILDCARD;

/// Confidence band of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBand {
    /// Merge the surface form into the matched identity.
    High,
    /// Use the match but flag it for manual confirmation.
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub id: i64,
    pub score: f64,
    pub band: MatchBand,
    /// Score sat exactly on a band boundary and was placed in the lower
    /// band.
    pub boundary: bool,
}

pub struct FuzzyMatcher {
    config: MatcherConfig,
}

impl FuzzyMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Best match among `existing` (id, canonical key) pairs, or `None`
    /// when every score sits at or below the floor.
    pub fn best_match(&self, candidate: &str, existing: &[(i64, String)]) -> Option<MatchOutcome> {
        let mut best: Option<(i64, f64)> = None;
        for (id, key) in existing {
            let score = self.score(candidate, key);
            let better = match best {
                None => true,
                Some((best_id, best_score)) => {
                    score > best_score || (score == best_score && *id < best_id)
                }
            };
            if better {
                best = Some((*id, score));
            }
        }
        let (id, score) = best?;

        let floor = self.config.floor;
        let high = self.config.high;
        if score <= floor {
            if score == floor {
                tracing::debug!(candidate, id, score, "score on floor boundary, new identity");
            }
            return None;
        }
        let (band, boundary) = if score > high {
            (MatchBand::High, false)
        } else {
            (MatchBand::Medium, score == high)
        };
        Some(MatchOutcome {
            id,
            score,
            band,
            boundary,
        })
    }

    /// Symmetric similarity score in [0, 1].
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        let tokens_a = tokens(&a);
        let tokens_b = tokens(&b);

        let matched = wildcard_intersection(&tokens_a, &tokens_b);
        let union = tokens_a.len() + tokens_b.len() - matched;
        let overlap = if union == 0 {
            0.0
        } else {
            matched as f64 / union as f64
        };

        let edit = strsim::normalized_levenshtein(&a, &b);

        let damaged = a.contains(WILDCARD) || b.contains(WILDCARD);
        let full_alignment = matched == tokens_a.len() && matched == tokens_b.len();
        let bonus = if damaged && full_alignment { 1.0 } else { 0.0 };

        let score = self.config.token_weight * overlap
            + self.config.edit_weight * edit
            + self.config.wildcard_weight * bonus;
        score.min(1.0)
    }
}

fn tokens(key: &str) -> Vec<String> {
    let mut out: Vec<String> = key
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| c == ',' || c == '.').to_string())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out
}

/// Greedy one-to-one token matching. A token containing the damage
/// wildcard matches when its literal parts align, with the wildcard
/// standing for one or more characters.
fn wildcard_intersection(a: &[String], b: &[String]) -> usize {
    let mut used = vec![false; b.len()];
    let mut matched = 0;
    for tok_a in a {
        for (idx, tok_b) in b.iter().enumerate() {
            if used[idx] {
                continue;
            }
            if tokens_match(tok_a, tok_b) {
                used[idx] = true;
                matched += 1;
                break;
            }
        }
    }
    matched
}

fn tokens_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.contains(WILDCARD) && glob_match(&a.chars().collect::<Vec<_>>(), &b.chars().collect::<Vec<_>>()) {
        return true;
    }
    if b.contains(WILDCARD) && glob_match(&b.chars().collect::<Vec<_>>(), &a.chars().collect::<Vec<_>>()) {
        return true;
    }
    false
}

/// Match `target` against `pattern`, where each wildcard consumes at least
/// one character.
fn glob_match(pattern: &[char], target: &[char]) -> bool {
    match pattern.first() {
        None => target.is_empty(),
        Some(&WILDCARD) => (1..=target.len()).any(|k| glob_match(&pattern[1..], &target[k..])),
        Some(&c) => target.first() == Some(&c) && glob_match(&pattern[1..], &target[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> FuzzyMatcher {
        FuzzyMatcher::new(MatcherConfig::default())
    }

    fn identities(names: &[&str]) -> Vec<(i64, String)> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (i as i64 + 1, n.to_string()))
            .collect()
    }

    #[test]
    fn test_reversed_token_order_lands_medium() {
        let m = matcher();
        let existing = identities(&["Williams, Ralph Vaughan"]);
        let out = m.best_match("Vaughan Williams, Ralph", &existing).unwrap();
        assert_eq!(out.band, MatchBand::Medium);
        assert_eq!(out.id, 1);
    }

    #[test]
    fn test_unrelated_name_below_floor() {
        let m = matcher();
        let existing = identities(&["Bach, Johann Sebastian"]);
        assert!(m.best_match("Copland, Aaron", &existing).is_none());
    }

    #[test]
    fn test_wildcard_damage_reaches_high_band() {
        let m = matcher();
        let existing = identities(&["Dvorak, Antonin"]);
        let out = m
            .best_match("Dvo\u{FFFD}k, Anton\u{FFFD}n", &existing)
            .unwrap();
        assert_eq!(out.band, MatchBand::High, "score {}", out.score);
    }

    #[test]
    fn test_wildcard_does_not_bridge_different_names() {
        let m = matcher();
        let existing = identities(&["Smith, John"]);
        assert!(m.best_match("Dvo\u{FFFD}k, Anton\u{FFFD}n", &existing).is_none());
    }

    #[test]
    fn test_ties_break_to_lowest_id() {
        let m = matcher();
        // Same key stored twice under different ids scores identically.
        let existing = vec![
            (7, "Williams, Ralph Vaughan".to_string()),
            (3, "Williams, Ralph Vaughan".to_string()),
        ];
        let out = m.best_match("Vaughan Williams, Ralph", &existing).unwrap();
        assert_eq!(out.id, 3);
    }

    #[test]
    fn test_deterministic_over_input_order() {
        let m = matcher();
        let mut existing = identities(&[
            "Bach, Johann Sebastian",
            "Williams, Ralph Vaughan",
            "Copland, Aaron",
        ]);
        let forward = m.best_match("Vaughan Williams, Ralph", &existing);
        existing.reverse();
        let reversed = m.best_match("Vaughan Williams, Ralph", &existing);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_exact_boundary_takes_lower_band() {
        let cfg = MatcherConfig {
            floor: 0.2,
            high: 0.9,
            ..MatcherConfig::default()
        };
        let m = FuzzyMatcher::new(cfg);
        // Identical keys score exactly token_weight + edit_weight = 0.9,
        // right on the high boundary.
        let existing = identities(&["Bach, Johann"]);
        let out = m.best_match("Bach, Johann", &existing).unwrap();
        assert_eq!(out.score, 0.9);
        assert_eq!(out.band, MatchBand::Medium);
        assert!(out.boundary);
    }

    #[test]
    fn test_floor_boundary_is_no_match() {
        let cfg = MatcherConfig {
            floor: 0.9,
            high: 0.95,
            ..MatcherConfig::default()
        };
        let m = FuzzyMatcher::new(cfg);
        let existing = identities(&["Bach, Johann"]);
        // Identical key scores exactly 0.9 == floor, which is not above it.
        assert!(m.best_match("Bach, Johann", &existing).is_none());
    }

    #[test]
    fn test_score_capped_at_one() {
        let cfg = MatcherConfig {
            token_weight: 0.8,
            edit_weight: 0.4,
            wildcard_weight: 0.1,
            ..MatcherConfig::default()
        };
        let m = FuzzyMatcher::new(cfg);
        assert_eq!(m.score("Bach, Johann", "Bach, Johann"), 1.0);
    }
}
