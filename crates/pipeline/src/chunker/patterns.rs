//! Compiled boundary and markup patterns
//!
//! Built once and shared by reference between the chunker and the
//! degradation transforms.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

/// A line made only of three or more `-`, `_` or `*`
const RULE_SEPARATOR: &str = r"\n[ \t]*(?:-{3,}|_{3,}|\*{3,})[ \t]*\r?\n";
/// Newline, optional whitespace, newline
const BLANK_LINES: &str = r"\n\s*\n";
/// Sentence terminator directly followed by a line break
const SENTENCE_NEWLINE: &str = r"[.!?]+[ \t]*\r?\n";
const SENTENCE: &str = r"[.!?]+";
/// Emphasis, headers, brackets, quotes and backticks
const MARKUP: &str = r"[\\*_#\[\]()<>~`|]+";

static SHARED: Lazy<Arc<TextPatterns>> =
    Lazy::new(|| Arc::new(TextPatterns::new().expect("built-in patterns compile")));

/// Immutable set of compiled patterns
#[derive(Debug, Clone)]
pub struct TextPatterns {
    pub rule_separator: Regex,
    pub blank_lines: Regex,
    pub sentence_newline: Regex,
    pub sentence: Regex,
    pub markup: Regex,
}

impl TextPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rule_separator: Regex::new(RULE_SEPARATOR)?,
            blank_lines: Regex::new(BLANK_LINES)?,
            sentence_newline: Regex::new(SENTENCE_NEWLINE)?,
            sentence: Regex::new(SENTENCE)?,
            markup: Regex::new(MARKUP)?,
        })
    }

    /// Process-wide instance
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }
}

/// Split `text` on `pattern`, dropping the separators and empty parts
pub fn split_on<'a>(pattern: &Regex, text: &'a str) -> Vec<&'a str> {
    pattern
        .split(text)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Split `text` after each match of `pattern`, keeping the match with the
/// preceding segment
pub fn split_after<'a>(pattern: &Regex, text: &'a str) -> Vec<&'a str> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in pattern.find_iter(text) {
        segments.push(&text[last..m.end()]);
        last = m.end();
    }
    segments.push(&text[last..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_separator() {
        let p = TextPatterns::shared();
        assert_eq!(
            split_on(&p.rule_separator, "One.\n---\nTwo.\n  ___  \nThree."),
            vec!["One.", "Two.", "Three."]
        );
        assert_eq!(split_on(&p.rule_separator, "a -- b\n--\nc").len(), 1);
        assert_eq!(split_on(&p.rule_separator, "a\n***\nb").len(), 2);
        assert_eq!(split_on(&p.rule_separator, "a\r\n---\r\nb"), vec!["a", "b"]);
    }

    #[test]
    fn test_blank_lines() {
        let p = TextPatterns::shared();
        assert_eq!(
            split_on(&p.blank_lines, "First para.\n\nSecond\npara.\n \t\n\n\nThird."),
            vec!["First para.", "Second\npara.", "Third."]
        );
    }

    #[test]
    fn test_split_after_keeps_terminators() {
        let p = TextPatterns::shared();
        assert_eq!(
            split_after(&p.sentence, "Hi there. How are you?! Fine"),
            vec!["Hi there.", "How are you?!", "Fine"]
        );
        assert_eq!(
            split_after(&p.sentence_newline, "Line one.\nstill one. Line two!\nend"),
            vec!["Line one.", "still one. Line two!", "end"]
        );
        assert!(split_after(&p.sentence, "  ").is_empty());
    }

    #[test]
    fn test_markup_pattern() {
        let p = TextPatterns::shared();
        assert_eq!(p.markup.replace_all("**bold** _it_ `code`", ""), "bold it code");
    }
}
