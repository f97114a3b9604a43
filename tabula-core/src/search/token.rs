//! Search token types

use std::fmt;

/// Token kinds of the search grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchTokenKind {
    /// The whole input was `*` or `%`: match every row.
    All,
    /// Joins the next predicate with AND.
    And,
    /// Joins the next predicate with OR.
    Or,
    /// Row must contain the term.
    Include,
    /// Row must not contain the term.
    Exclude,
}

/// One lexical unit of a filter expression. `value` is empty for joiners and
/// for `All`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchToken {
    pub kind: SearchTokenKind,
    pub value: String,
}

impl SearchToken {
    pub fn new(kind: SearchTokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn all() -> Self {
        Self::new(SearchTokenKind::All, "")
    }

    pub fn include(value: impl Into<String>) -> Self {
        Self::new(SearchTokenKind::Include, value)
    }

    pub fn exclude(value: impl Into<String>) -> Self {
        Self::new(SearchTokenKind::Exclude, value)
    }

    pub fn and() -> Self {
        Self::new(SearchTokenKind::And, "")
    }

    pub fn or() -> Self {
        Self::new(SearchTokenKind::Or, "")
    }
}

impl fmt::Display for SearchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SearchTokenKind::All => write!(f, "*"),
            SearchTokenKind::And => write!(f, "AND"),
            SearchTokenKind::Or => write!(f, "OR"),
            SearchTokenKind::Include => write!(f, "{:?}", self.value),
            SearchTokenKind::Exclude => write!(f, "!={:?}", self.value),
        }
    }
}
