//! Search token compilation into SQL boolean fragments.

use super::token::{SearchToken, SearchTokenKind};

/// SQL fragment for one filtered column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCondition {
    /// Parenthesized boolean expression.
    pub sql: String,
    /// Values for the `$n` placeholders used in `sql`, in placeholder order.
    pub binds: Vec<String>,
    /// First placeholder index not used by this fragment.
    pub next_index: usize,
}

/// Compile `tokens` against the column expression `expr`.
///
/// Placeholders are numbered from `start_index`. A joiner token only affects
/// the predicate right after it; predicates are otherwise joined with AND.
/// Returns `None` when the tokens produce no predicate, in which case the
/// column is not filtered at all.
pub fn compile_condition(
    expr: &str,
    tokens: &[SearchToken],
    start_index: usize,
) -> Option<CompiledCondition> {
    let mut sql = String::new();
    let mut binds = Vec::new();
    let mut index = start_index;
    let mut joiner = "AND";
    let mut predicates = 0usize;

    for token in tokens {
        let predicate = match token.kind {
            SearchTokenKind::And => {
                joiner = "AND";
                continue;
            }
            SearchTokenKind::Or => {
                joiner = "OR";
                continue;
            }
            SearchTokenKind::All => "TRUE".to_string(),
            SearchTokenKind::Exclude if token.value.is_empty() => {
                format!("({expr} IS NOT NULL AND {expr} <> '')")
            }
            SearchTokenKind::Include if token.value.is_empty() => {
                format!("({expr} IS NULL OR {expr} = '')")
            }
            SearchTokenKind::Exclude => {
                binds.push(like_pattern(&token.value));
                let predicate = format!("{expr}::text NOT ILIKE ${index}");
                index += 1;
                predicate
            }
            SearchTokenKind::Include => {
                binds.push(like_pattern(&token.value));
                let predicate = format!("{expr}::text ILIKE ${index}");
                index += 1;
                predicate
            }
        };

        if predicates > 0 {
            sql.push(' ');
            sql.push_str(joiner);
            sql.push(' ');
        }
        sql.push_str(&predicate);
        predicates += 1;
        joiner = "AND";
    }

    if predicates == 0 {
        return None;
    }

    Some(CompiledCondition {
        sql: format!("({})", sql),
        binds,
        next_index: index,
    })
}

/// Substring pattern for ILIKE; `*` inside a term is a wildcard.
fn like_pattern(value: &str) -> String {
    format!("%{}%", value.replace('*', "%"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tokenize;

    const EXPR: &str = "\"t\".\"name\"";

    fn compile(input: &str, start: usize) -> Option<CompiledCondition> {
        compile_condition(EXPR, &tokenize(input), start)
    }

    #[test]
    fn test_all_is_true_regardless_of_index() {
        let c = compile("*", 7).unwrap();
        assert_eq!(c.sql, "(TRUE)");
        assert!(c.binds.is_empty());
        assert_eq!(c.next_index, 7);
    }

    #[test]
    fn test_include_term() {
        let c = compile("foo", 1).unwrap();
        assert_eq!(c.sql, "(\"t\".\"name\"::text ILIKE $1)");
        assert_eq!(c.binds, vec!["%foo%".to_string()]);
        assert_eq!(c.next_index, 2);
    }

    #[test]
    fn test_exclude_term() {
        let c = compile("!=bar", 3).unwrap();
        assert_eq!(c.sql, "(\"t\".\"name\"::text NOT ILIKE $3)");
        assert_eq!(c.binds, vec!["%bar%".to_string()]);
        assert_eq!(c.next_index, 4);
    }

    #[test]
    fn test_internal_wildcard() {
        let c = compile("k*rhu", 1).unwrap();
        assert_eq!(c.binds, vec!["%k%rhu%".to_string()]);
    }

    #[test]
    fn test_three_predicates_one_group() {
        let c = compile("foo AND \"bar baz\"", 1).unwrap();
        assert_eq!(
            c.sql,
            "(\"t\".\"name\"::text ILIKE $1 AND \"t\".\"name\"::text ILIKE $2 AND \"t\".\"name\"::text ILIKE $3)"
        );
        assert_eq!(c.binds, vec!["%foo%", "%bar%", "%baz%"]);
        assert_eq!(c.next_index, 4);
    }

    #[test]
    fn test_joiner_applies_to_next_predicate_only() {
        let c = compile("a OR b c", 1).unwrap();
        assert_eq!(
            c.sql,
            "(\"t\".\"name\"::text ILIKE $1 OR \"t\".\"name\"::text ILIKE $2 AND \"t\".\"name\"::text ILIKE $3)"
        );
    }

    #[test]
    fn test_empty_value_semantics() {
        let c = compile("!=\"\"", 1).unwrap();
        assert_eq!(c.sql, "((\"t\".\"name\" IS NOT NULL AND \"t\".\"name\" <> ''))");
        assert!(c.binds.is_empty());
        assert_eq!(c.next_index, 1);

        let c = compile("", 1).unwrap();
        assert_eq!(c.sql, "((\"t\".\"name\" IS NULL OR \"t\".\"name\" = ''))");
    }

    #[test]
    fn test_only_joiners_yields_nothing() {
        assert!(compile("AND OR", 1).is_none());
        assert!(compile_condition(EXPR, &[], 1).is_none());
    }

    #[test]
    fn test_leading_joiner_has_no_prefix() {
        let c = compile("OR foo", 1).unwrap();
        assert_eq!(c.sql, "(\"t\".\"name\"::text ILIKE $1)");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::search::tokenize;
    use proptest::prelude::*;

    fn expression() -> impl Strategy<Value = String> {
        let fragment = prop_oneof![
            "[a-z]{1,6}",
            "[a-z]{1,3}\\*[a-z]{1,3}",
            Just("AND".to_string()),
            Just("OR".to_string()),
            Just("or".to_string()),
            "!=[a-z]{1,5}",
            "\"[a-z ]{0,8}\"",
            "'[a-z ]{0,8}'",
            "!='[a-z ]{0,8}'",
            Just("*".to_string()),
        ];
        prop::collection::vec(fragment, 0..8).prop_map(|parts| parts.join(" "))
    }

    fn plain_word() -> impl Strategy<Value = String> {
        "[a-z]{1,6}".prop_filter("joiner", |w| w != "and" && w != "or")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// One bind per consumed placeholder, numbered contiguously.
        #[test]
        fn prop_bind_count_matches_index_advance(
            input in expression(),
            start in 1usize..20,
        ) {
            if let Some(c) = compile_condition("x", &tokenize(&input), start) {
                prop_assert_eq!(c.binds.len(), c.next_index - start);
                for n in start..c.next_index {
                    let placeholder = format!("${}", n);
                    prop_assert!(c.sql.contains(&placeholder));
                }
                prop_assert!(c.sql.starts_with('(') && c.sql.ends_with(')'));
                for bind in &c.binds {
                    prop_assert!(bind.starts_with('%') && bind.ends_with('%'));
                    prop_assert!(!bind.contains('*'));
                }
            }
        }

        #[test]
        fn prop_or_joins_only_the_next_predicate(
            a in plain_word(),
            b in plain_word(),
            c in plain_word(),
        ) {
            let input = format!("{a} OR '{b}' {c}");
            let compiled = compile_condition("x", &tokenize(&input), 1).unwrap();
            prop_assert_eq!(
                compiled.sql,
                "(x::text ILIKE $1 OR x::text ILIKE $2 AND x::text ILIKE $3)"
            );
            prop_assert_eq!(
                compiled.binds,
                vec![format!("%{a}%"), format!("%{b}%"), format!("%{c}%")]
            );
        }

        #[test]
        fn prop_single_quoted_span_splits_into_terms(
            words in prop::collection::vec(plain_word(), 1..5),
        ) {
            let input = format!("!='{}'", words.join("  "));
            let compiled = compile_condition("x", &tokenize(&input), 1).unwrap();
            prop_assert_eq!(compiled.binds.len(), words.len());
            prop_assert_eq!(compiled.sql.matches("NOT ILIKE").count(), words.len());
        }
    }
}
