//! Per-column search expressions.
//!
//! A filter string such as `foo AND !="bar baz"` is scanned into
//! [`SearchToken`]s and compiled against one SQL column expression into a
//! parenthesized boolean fragment with positional bind values.

pub mod condition;
pub mod scanner;
pub mod token;

pub use condition::{compile_condition, CompiledCondition};
pub use scanner::Scanner;
pub use token::{SearchToken, SearchTokenKind};

/// Scan one raw filter string.
pub fn tokenize(input: &str) -> Vec<SearchToken> {
    Scanner::new(input).tokenize()
}
