//! Search expression scanner

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

/// Scanner for one per-column filter string.
///
/// At every token start the scanner tries, in order: the words `AND`/`OR`
/// (any case, followed by whitespace, a quote or end of input), the `!=` operator,
/// a double-quoted span, a single-quoted span, and finally a run of
/// non-whitespace characters. Quoted and plain captures are split on
/// whitespace into terms.
pub struct Scanner<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
    exclude_next: bool,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given filter string.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
            exclude_next: false,
        }
    }

    /// Scan the whole input.
    pub fn tokenize(&mut self) -> Vec<SearchToken> {
        let trimmed = self.source.trim();
        if trimmed == "*" || trimmed == "%" {
            return vec![SearchToken::all()];
        }
        if trimmed.is_empty() {
            return vec![SearchToken::include("")];
        }

        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek_char().is_none() {
                break;
            }
            self.next_tokens(&mut tokens);
        }

        tokens
    }

    /// Consume one lexical unit, pushing zero or more tokens.
    fn next_tokens(&mut self, tokens: &mut Vec<SearchToken>) {
        if let Some(kind) = self.scan_joiner() {
            tokens.push(SearchToken::new(kind, ""));
            return;
        }

        if self.rest().starts_with("!=") {
            self.advance();
            self.advance();
            self.exclude_next = true;
            return;
        }

        let content = match self.peek_char() {
            Some(quote @ ('"' | '\'')) => match self.scan_quoted(quote) {
                Some(content) => content,
                // Unterminated quote: the quote is part of a plain word.
                None => self.scan_word(),
            },
            _ => self.scan_word(),
        };

        self.emit_terms(&content, tokens);
    }

    /// Scan `AND` or `OR` as a whole word.
    fn scan_joiner(&mut self) -> Option<SearchTokenKind> {
        for (word, kind) in [("AND", SearchTokenKind::And), ("OR", SearchTokenKind::Or)] {
            let rest = self.rest();
            let matches_word = rest
                .get(..word.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(word));
            if !matches_word {
                continue;
            }

            let boundary = rest[word.len()..]
                .chars()
                .next()
                .map_or(true, |c| c.is_whitespace() || c == '"' || c == '\'');
            if boundary {
                for _ in 0..word.len() {
                    self.advance();
                }
                return Some(kind);
            }
        }

        None
    }

    /// Scan a quoted span, returning its content. Returns `None` without
    /// consuming anything when the closing quote is missing.
    fn scan_quoted(&mut self, quote: char) -> Option<String> {
        let start = self.pos + quote.len_utf8();
        let close = start + self.source[start..].find(quote)?;

        while self.pos <= close {
            if self.advance().is_none() {
                break;
            }
        }

        Some(self.source[start..close].to_string())
    }

    /// Scan a maximal run of non-whitespace characters.
    fn scan_word(&mut self) -> String {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                break;
            }
            self.advance();
        }

        self.source[start..self.pos].to_string()
    }

    /// Split a capture into terms. A pending `!=` applies to every term of
    /// the capture and is then cleared.
    fn emit_terms(&mut self, content: &str, tokens: &mut Vec<SearchToken>) {
        let kind = if std::mem::take(&mut self.exclude_next) {
            SearchTokenKind::Exclude
        } else {
            SearchTokenKind::Include
        };

        let before = tokens.len();
        for term in content.split_whitespace() {
            tokens.push(SearchToken::new(kind, term));
        }
        if tokens.len() == before {
            tokens.push(SearchToken::new(kind, ""));
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.pos = self
            .chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.source.len());
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tokenize;

    #[test]
    fn test_star_alone_is_all() {
        assert_eq!(tokenize("*"), vec![SearchToken::all()]);
        assert_eq!(tokenize("  %  "), vec![SearchToken::all()]);
    }

    #[test]
    fn test_plain_word() {
        assert_eq!(tokenize("foo"), vec![SearchToken::include("foo")]);
    }

    #[test]
    fn test_exclude_word() {
        assert_eq!(tokenize("!=bar"), vec![SearchToken::exclude("bar")]);
        assert_eq!(tokenize("!= bar"), vec![SearchToken::exclude("bar")]);
    }

    #[test]
    fn test_internal_wildcard_kept_literally() {
        assert_eq!(tokenize("k*rhu"), vec![SearchToken::include("k*rhu")]);
    }

    #[test]
    fn test_joiner_and_quoted_phrase() {
        assert_eq!(
            tokenize("foo AND \"bar baz\""),
            vec![
                SearchToken::include("foo"),
                SearchToken::and(),
                SearchToken::include("bar"),
                SearchToken::include("baz"),
            ]
        );
    }

    #[test]
    fn test_joiners_are_case_insensitive_whole_words() {
        assert_eq!(
            tokenize("a or b"),
            vec![SearchToken::include("a"), SearchToken::or(), SearchToken::include("b")]
        );
        assert_eq!(
            tokenize("android orange"),
            vec![SearchToken::include("android"), SearchToken::include("orange")]
        );
    }

    #[test]
    fn test_joiner_directly_before_quote() {
        assert_eq!(
            tokenize("foo AND\"bar baz\""),
            vec![
                SearchToken::include("foo"),
                SearchToken::and(),
                SearchToken::include("bar"),
                SearchToken::include("baz"),
            ]
        );
        assert_eq!(
            tokenize("a or'b c'"),
            vec![
                SearchToken::include("a"),
                SearchToken::or(),
                SearchToken::include("b"),
                SearchToken::include("c"),
            ]
        );
    }

    #[test]
    fn test_single_quotes() {
        assert_eq!(
            tokenize("'x y' z"),
            vec![
                SearchToken::include("x"),
                SearchToken::include("y"),
                SearchToken::include("z"),
            ]
        );
    }

    #[test]
    fn test_empty_quotes() {
        assert_eq!(tokenize("\"\""), vec![SearchToken::include("")]);
        assert_eq!(tokenize("!=\"\""), vec![SearchToken::exclude("")]);
        assert_eq!(tokenize("!=''"), vec![SearchToken::exclude("")]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(tokenize(""), vec![SearchToken::include("")]);
        assert_eq!(tokenize("   "), vec![SearchToken::include("")]);
    }

    #[test]
    fn test_exclude_clears_after_one_capture() {
        assert_eq!(
            tokenize("!=\"a b\" c"),
            vec![
                SearchToken::exclude("a"),
                SearchToken::exclude("b"),
                SearchToken::include("c"),
            ]
        );
    }

    #[test]
    fn test_unterminated_quote_is_plain_word() {
        assert_eq!(
            tokenize("\"abc def"),
            vec![SearchToken::include("\"abc"), SearchToken::include("def")]
        );
    }

    #[test]
    fn test_operator_inside_word_is_literal() {
        assert_eq!(tokenize("a!=b"), vec![SearchToken::include("a!=b")]);
    }

    #[test]
    fn test_trailing_exclude_emits_nothing() {
        assert_eq!(tokenize("foo !="), vec![SearchToken::include("foo")]);
    }

    #[test]
    fn test_multibyte_input() {
        assert_eq!(
            tokenize("café \"naïve ü\""),
            vec![
                SearchToken::include("café"),
                SearchToken::include("naïve"),
                SearchToken::include("ü"),
            ]
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use crate::search::{tokenize, SearchTokenKind};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Scanning never panics and term values never contain whitespace.
        #[test]
        fn prop_terms_have_no_whitespace(input in "[a-zA-Z !=\"'*%\\t]{0,40}") {
            for token in tokenize(&input) {
                prop_assert!(!token.value.chars().any(char::is_whitespace));
                if matches!(token.kind, SearchTokenKind::And | SearchTokenKind::Or | SearchTokenKind::All) {
                    prop_assert!(token.value.is_empty());
                }
            }
        }
    }
}
