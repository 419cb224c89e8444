//! Entity String Parsing
//!
//! Splits a station's free-text credit strings ("composer; arranger",
//! "Joshua Bell, violin/Edgar Meyer, double bass") into a flat sequence of
//! items using the station's grammar. Separators only split at the top
//! level: any text inside a recognized delimiter pair (quotes, parens,
//! square brackets) is protected.
//!
//! Parsing is total. Malformed input never returns an error; damage is
//! reported through the `truncated` flag on the affected item and the
//! classifier downgrades what it cannot read.

use crate::models::{DelimKind, EntityItem, GrammarDescriptor, Separator};

/// Entity string parser for one station grammar.
pub struct EntityParser {
    grammar: GrammarDescriptor,
}

impl EntityParser {
    pub fn new(grammar: GrammarDescriptor) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &GrammarDescriptor {
        &self.grammar
    }

    /// Decompose `input` into items. Empty input yields no items;
    /// non-empty input always yields at least one.
    pub fn parse(&self, input: &str) -> Vec<EntityItem> {
        let mut items = Vec::new();
        if input.is_empty() {
            return items;
        }

        // Longest separator wins at a shared prefix, so a ", " minor takes
        // precedence over a "," major at the same position.
        let mut separators: Vec<(&str, Separator)> = Vec::new();
        if !self.grammar.major_separator.is_empty() {
            separators.push((self.grammar.major_separator.as_str(), Separator::Major));
        }
        if let Some(minor) = &self.grammar.minor_separator {
            if !minor.is_empty() {
                separators.push((minor.as_str(), Separator::Minor));
            }
        }
        separators.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let chars: Vec<(usize, char)> = input.char_indices().collect();
        let mut stack: Vec<DelimKind> = Vec::new();
        let mut seg_start = 0usize;
        let mut opaque = false;
        let mut i = 0usize;

        while i < chars.len() {
            let (off, c) = chars[i];

            if opaque {
                i += 1;
                continue;
            }

            if stack.is_empty() {
                let rest = &input[off..];
                let hit = separators.iter().find(|(lit, _)| rest.starts_with(lit));
                if let Some((lit, sep)) = hit {
                    items.push(self.make_item(input, seg_start, off, false, *sep));
                    seg_start = off + lit.len();
                    while i < chars.len() && chars[i].0 < seg_start {
                        i += 1;
                    }
                    continue;
                }
            }

            // Close of the innermost delimiter takes precedence over
            // re-opening a symmetric quote.
            if let Some(top) = stack.last().copied() {
                if c == top.close_char() && (!top.is_symmetric() || quote_can_close(&chars, i)) {
                    stack.pop();
                    i += 1;
                    continue;
                }
            }

            if let Some(kind) = DelimKind::from_open(c) {
                if self.grammar.recognizes(kind)
                    && (!kind.is_symmetric() || quote_can_open(&chars, i))
                {
                    if stack.len() >= self.grammar.max_depth {
                        // Deeper nesting than the grammar allows: keep the
                        // remainder as one opaque item instead of guessing.
                        tracing::debug!(input, depth = stack.len(), "nesting overflow, remainder kept opaque");
                        opaque = true;
                        stack.clear();
                    } else {
                        stack.push(kind);
                    }
                    i += 1;
                    continue;
                }
            }

            i += 1;
        }

        let truncated = !stack.is_empty();
        items.push(self.make_item(input, seg_start, input.len(), truncated, Separator::End));
        items
    }

    fn make_item(
        &self,
        input: &str,
        start: usize,
        end: usize,
        truncated: bool,
        sep_after: Separator,
    ) -> EntityItem {
        let raw = &input[start..end];
        let trimmed = raw.trim();
        let (text, delim) = if truncated {
            (trimmed.to_string(), None)
        } else {
            match enclosing_delim(trimmed, &self.grammar) {
                Some(kind) => {
                    let inner = &trimmed[kind.open_char().len_utf8()
                        ..trimmed.len() - kind.close_char().len_utf8()];
                    (inner.trim().to_string(), Some(kind))
                }
                None => (trimmed.to_string(), None),
            }
        };
        EntityItem {
            raw: raw.to_string(),
            text,
            start,
            end,
            delim,
            truncated,
            sep_after,
        }
    }
}

/// Opening quotes only count at a word boundary, so the apostrophe in
/// "O'Brien" stays literal.
fn quote_can_open(chars: &[(usize, char)], i: usize) -> bool {
    if i == 0 {
        return true;
    }
    let prev = chars[i - 1].1;
    prev.is_whitespace() || matches!(prev, '(' | '[')
}

fn quote_can_close(chars: &[(usize, char)], i: usize) -> bool {
    match chars.get(i + 1) {
        None => true,
        Some((_, next)) => !next.is_alphanumeric(),
    }
}

/// A delimiter pair counts as enclosing only when the opener at the first
/// character closes at the last, so "(a) and (b)" keeps its text intact.
fn enclosing_delim(text: &str, grammar: &GrammarDescriptor) -> Option<DelimKind> {
    let mut chars = text.chars();
    let first = chars.next()?;
    let last = text.chars().last()?;
    let kind = DelimKind::from_open(first)?;
    if !grammar.recognizes(kind) || last != kind.close_char() || text.chars().count() < 2 {
        return None;
    }
    if kind.is_symmetric() {
        return Some(kind);
    }
    let mut depth = 0i32;
    for (idx, c) in text.char_indices() {
        if c == kind.open_char() {
            depth += 1;
        } else if c == kind.close_char() {
            depth -= 1;
            if depth == 0 && idx + c.len_utf8() < text.len() {
                return None;
            }
        }
    }
    if depth == 0 {
        Some(kind)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircheck_common::config::GrammarConfig;

    fn parser(major: &str, minor: Option<&str>) -> EntityParser {
        let cfg = GrammarConfig {
            major_separator: major.to_string(),
            minor_separator: minor.map(|s| s.to_string()),
            brackets: vec!['"', '\'', '(', '['],
            max_depth: 2,
        };
        EntityParser::new(GrammarDescriptor::from_config(&cfg))
    }

    fn texts(items: &[EntityItem]) -> Vec<&str> {
        items.iter().map(|i| i.text.as_str()).collect()
    }

    #[test]
    fn test_semicolon_major_splits_top_level() {
        let p = parser(";", None);
        let items = p.parse("Bach, Johann Sebastian; arr. Stokowski");
        assert_eq!(texts(&items), vec!["Bach, Johann Sebastian", "arr. Stokowski"]);
        assert_eq!(items[0].sep_after, Separator::Major);
        assert_eq!(items[1].sep_after, Separator::End);
    }

    #[test]
    fn test_minor_separator_wins_over_major_prefix() {
        let p = parser(",", Some(", "));
        let items =
            p.parse("Joshua Bell, violin,Edgar Meyer, double bass/guitar,Chris Thile, mandolin");
        assert_eq!(
            texts(&items),
            vec![
                "Joshua Bell",
                "violin",
                "Edgar Meyer",
                "double bass/guitar",
                "Chris Thile",
                "mandolin"
            ]
        );
        let seps: Vec<Separator> = items.iter().map(|i| i.sep_after).collect();
        assert_eq!(
            seps,
            vec![
                Separator::Minor,
                Separator::Major,
                Separator::Minor,
                Separator::Major,
                Separator::Minor,
                Separator::End
            ]
        );
    }

    #[test]
    fn test_delimiters_protect_separators() {
        let p = parser(";", None);
        let items = p.parse("Concerto (Allegro; Adagio); Joshua Bell");
        assert_eq!(texts(&items), vec!["Concerto (Allegro; Adagio)", "Joshua Bell"]);

        let items = p.parse("\"Fantasy; in C\"; Previn");
        assert_eq!(texts(&items), vec!["Fantasy; in C", "Previn"]);
        assert_eq!(items[0].delim, Some(DelimKind::DoubleQuote));
    }

    #[test]
    fn test_unclosed_delimiter_marks_truncated() {
        let p = parser(";", None);
        let items = p.parse("Beethoven (1770");
        assert_eq!(items.len(), 1);
        assert!(items[0].truncated);
        assert_eq!(items[0].text, "Beethoven (1770");
    }

    #[test]
    fn test_nesting_overflow_keeps_remainder_opaque() {
        let cfg = GrammarConfig {
            major_separator: ";".to_string(),
            minor_separator: None,
            brackets: vec!['(', '['],
            max_depth: 1,
        };
        let p = EntityParser::new(GrammarDescriptor::from_config(&cfg));
        let items = p.parse("a ([b; c] d); e");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "a ([b; c] d); e");
        assert!(!items[0].truncated);
    }

    #[test]
    fn test_spans_reconstruct_input() {
        let p = parser(",", Some(", "));
        let input = "Joshua Bell, violin,Edgar Meyer, double bass";
        let items = p.parse(input);
        let mut rebuilt = String::new();
        for item in &items {
            rebuilt.push_str(&item.raw);
            match item.sep_after {
                Separator::Major => rebuilt.push_str(","),
                Separator::Minor => rebuilt.push_str(", "),
                Separator::End => {}
            }
        }
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn test_apostrophe_inside_word_is_literal() {
        let p = parser(";", None);
        let items = p.parse("O'Brien; Smith");
        assert_eq!(texts(&items), vec!["O'Brien", "Smith"]);
        assert!(items.iter().all(|i| !i.truncated));
    }

    #[test]
    fn test_fully_enclosed_item_reports_delim() {
        let p = parser(";", None);
        let items = p.parse("(Anonymous)");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Anonymous");
        assert_eq!(items[0].delim, Some(DelimKind::Paren));
    }

    #[test]
    fn test_partial_parens_keep_text_intact() {
        let p = parser(";", None);
        let items = p.parse("(a) and (b)");
        assert_eq!(items[0].text, "(a) and (b)");
        assert_eq!(items[0].delim, None);
    }

    #[test]
    fn test_empty_and_blank_segments() {
        let p = parser(";", None);
        assert!(p.parse("").is_empty());

        let items = p.parse("a;;b");
        assert_eq!(texts(&items), vec!["a", "", "b"]);
        assert!(items[1].is_empty());
    }

    #[test]
    fn test_single_quotes_at_word_boundary() {
        let p = parser(";", None);
        let items = p.parse("'Eroica'; Karajan");
        assert_eq!(texts(&items), vec!["Eroica", "Karajan"]);
        assert_eq!(items[0].delim, Some(DelimKind::SingleQuote));
    }
}
