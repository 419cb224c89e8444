//! Per-station parsing grammar
//!
//! Each station's playlist text uses its own separators and delimiter
//! conventions. The grammar is data: it comes from the station entry in the
//! config file and drives [`crate::services::entity_parser`] without any
//! station-specific code.

use aircheck_common::config::GrammarConfig;

/// Delimiter kinds recognized inside entity strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelimKind {
    DoubleQuote,
    SingleQuote,
    Paren,
    Bracket,
}

impl DelimKind {
    /// Map an opening character to its delimiter kind.
    pub fn from_open(c: char) -> Option<Self> {
        match c {
            '"' => Some(DelimKind::DoubleQuote),
            '\'' => Some(DelimKind::SingleQuote),
            '(' => Some(DelimKind::Paren),
            '[' => Some(DelimKind::Bracket),
            _ => None,
        }
    }

    /// The character that closes this delimiter.
    pub fn close_char(&self) -> char {
        match self {
            DelimKind::DoubleQuote => '"',
            DelimKind::SingleQuote => '\'',
            DelimKind::Paren => ')',
            DelimKind::Bracket => ']',
        }
    }

    /// The character that opens this delimiter.
    pub fn open_char(&self) -> char {
        match self {
            DelimKind::DoubleQuote => '"',
            DelimKind::SingleQuote => '\'',
            DelimKind::Paren => '(',
            DelimKind::Bracket => '[',
        }
    }

    /// Quote delimiters use the same character to open and close.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, DelimKind::DoubleQuote | DelimKind::SingleQuote)
    }
}

/// Separator that terminated an entity item during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// Top-level boundary between unrelated items.
    Major,
    /// Sub-boundary binding an item to its neighbor (e.g. name to role).
    Minor,
    /// End of input.
    End,
}

/// Resolved parsing grammar for one station.
#[derive(Debug, Clone)]
pub struct GrammarDescriptor {
    /// Separator between top-level items.
    pub major_separator: String,
    /// Optional separator for sub-decomposition (name/role pairing).
    pub minor_separator: Option<String>,
    /// Delimiter kinds this station's text may nest.
    pub brackets: Vec<DelimKind>,
    /// Nesting depth beyond which the remainder is kept as one opaque item.
    pub max_depth: usize,
}

impl GrammarDescriptor {
    pub fn from_config(cfg: &GrammarConfig) -> Self {
        let brackets = cfg
            .brackets
            .iter()
            .filter_map(|c| DelimKind::from_open(*c))
            .collect();
        GrammarDescriptor {
            major_separator: cfg.major_separator.clone(),
            minor_separator: cfg.minor_separator.clone(),
            brackets,
            max_depth: cfg.max_depth as usize,
        }
    }

    pub fn recognizes(&self, kind: DelimKind) -> bool {
        self.brackets.contains(&kind)
    }
}

impl Default for GrammarDescriptor {
    fn default() -> Self {
        GrammarDescriptor {
            major_separator: ";".to_string(),
            minor_separator: None,
            brackets: vec![
                DelimKind::DoubleQuote,
                DelimKind::SingleQuote,
                DelimKind::Paren,
                DelimKind::Bracket,
            ],
            max_depth: 2,
        }
    }
}
