//! Classification Lexicons
//!
//! Word lists the classifier and normalizer consult: performance roles,
//! ensemble keywords, honorifics, generational suffixes, and the markers
//! stations use for anonymous or traditional works. Built-ins cover the
//! classical-radio vocabulary; config can extend roles and ensemble
//! keywords per deployment.

use std::collections::HashSet;

use aircheck_common::config::LexiconConfig;

const ROLES: &[&str] = &[
    // strings
    "violin", "viola", "cello", "violoncello", "double bass", "bass", "contrabass",
    "viola da gamba", "viol", "harp", "guitar", "lute", "theorbo", "mandolin", "banjo",
    // keyboards
    "piano", "fortepiano", "pianoforte", "harpsichord", "organ", "harmonium", "celesta",
    "synthesizer", "accordion",
    // winds
    "flute", "piccolo", "recorder", "oboe", "oboe d'amore", "english horn", "clarinet",
    "bass clarinet", "basset horn", "bassoon", "contrabassoon", "saxophone",
    // brass
    "horn", "french horn", "trumpet", "cornet", "trombone", "bass trombone", "tuba",
    "euphonium",
    // percussion
    "timpani", "percussion", "marimba", "vibraphone", "xylophone", "drums",
    // voices
    "soprano", "mezzo-soprano", "mezzo soprano", "alto", "contralto", "countertenor",
    "tenor", "baritone", "bass-baritone", "treble", "narrator", "speaker", "voice",
    "vocals", "vocalist",
    // titles that read as roles in performer credits
    "conductor", "music director", "concertmaster", "chorus master", "soloist",
    "continuo", "basso continuo",
];

/// Role tokens that also appear as organizational titles; they classify as
/// Role but with low confidence so a reviewer sees them.
const AMBIGUOUS_ROLES: &[&str] = &["leader", "director"];

const ENSEMBLE_KEYWORDS: &[&str] = &[
    "orchestra", "symphony", "philharmonic", "philharmonia", "sinfonia", "sinfonietta",
    "ensemble", "quartet", "quintet", "trio", "duo", "sextet", "septet", "octet",
    "nonet", "chorus", "choir", "chorale", "consort", "camerata", "capella", "cappella",
    "players", "band", "singers", "soloists", "society", "academy", "collegium",
    "virtuosi", "musici", "solisti", "opera", "ballet", "festival", "pops", "brass",
    "winds",
];

const HONORIFICS: &[&str] = &["sir", "dame", "dr", "mr", "mrs", "ms", "miss", "maestro"];

const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

/// Markers stations use when the composer is unknown or the work is
/// traditional. These resolve to the shared unknown-composer identity.
const ANONYMOUS_MARKERS: &[&str] = &["anonymous", "anon", "traditional", "trad"];

/// How a text matched the role vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMatch {
    None,
    /// Every part of the phrase is a known role.
    Exact,
    /// Matched, but through a token that doubles as a person title.
    Ambiguous,
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    roles: HashSet<String>,
    ambiguous_roles: HashSet<String>,
    ensemble_keywords: HashSet<String>,
    honorifics: HashSet<String>,
    suffixes: HashSet<String>,
    anonymous_markers: HashSet<String>,
}

impl Lexicon {
    pub fn builtin() -> Self {
        let to_set = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Lexicon {
            roles: to_set(ROLES),
            ambiguous_roles: to_set(AMBIGUOUS_ROLES),
            ensemble_keywords: to_set(ENSEMBLE_KEYWORDS),
            honorifics: to_set(HONORIFICS),
            suffixes: to_set(SUFFIXES),
            anonymous_markers: to_set(ANONYMOUS_MARKERS),
        }
    }

    /// Built-ins extended with deployment-specific vocabulary.
    pub fn with_extras(cfg: &LexiconConfig) -> Self {
        let mut lex = Lexicon::builtin();
        for role in &cfg.extra_roles {
            lex.roles.insert(role.trim().to_lowercase());
        }
        for kw in &cfg.extra_ensemble_keywords {
            lex.ensemble_keywords.insert(kw.trim().to_lowercase());
        }
        lex
    }

    /// Check whether `text` reads as a role phrase. Compound credits like
    /// "double bass/guitar" or "violin & viola" match when every part is a
    /// known role; the compound stays one phrase.
    pub fn role_match(&self, text: &str) -> RoleMatch {
        let lowered = text.to_lowercase();
        let parts: Vec<&str> = lowered
            .split(['/', '&', ','])
            .flat_map(|p| p.split(" and "))
            .map(|p| p.trim().trim_end_matches('.'))
            .collect();
        if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
            return RoleMatch::None;
        }
        let mut saw_ambiguous = false;
        for part in &parts {
            if self.ambiguous_roles.contains(*part) {
                saw_ambiguous = true;
            } else if !self.roles.contains(*part) {
                return RoleMatch::None;
            }
        }
        if saw_ambiguous {
            RoleMatch::Ambiguous
        } else {
            RoleMatch::Exact
        }
    }

    /// Any word of `text` is an ensemble keyword.
    pub fn has_ensemble_keyword(&self, text: &str) -> bool {
        text.to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .any(|w| !w.is_empty() && self.ensemble_keywords.contains(w))
    }

    pub fn is_honorific(&self, token: &str) -> bool {
        self.honorifics
            .contains(token.trim_end_matches('.').to_lowercase().as_str())
    }

    pub fn is_suffix(&self, token: &str) -> bool {
        self.suffixes
            .contains(token.trim_end_matches('.').to_lowercase().as_str())
    }

    /// Every token of `text` is a generational suffix ("Jr.", "III").
    pub fn is_suffix_only(&self, text: &str) -> bool {
        let mut any = false;
        for tok in text.split_whitespace() {
            let tok = tok.trim_matches(|c: char| c == ',' || c == '.');
            if tok.is_empty() {
                continue;
            }
            if !self.is_suffix(tok) {
                return false;
            }
            any = true;
        }
        any
    }

    pub fn is_anonymous_marker(&self, text: &str) -> bool {
        let cleaned = text.trim().trim_end_matches('.').to_lowercase();
        self.anonymous_markers.contains(cleaned.as_str())
    }

    /// The whole text sits in both the role and ensemble vocabularies, so
    /// the rules disagree with no tiebreak. Only possible through config
    /// extras; built-in lists do not overlap.
    pub fn is_role_and_keyword(&self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        self.roles.contains(lowered.as_str()) && self.ensemble_keywords.contains(lowered.as_str())
    }
}
