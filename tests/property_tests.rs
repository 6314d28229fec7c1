//! Property-based tests for lexing and arithmetic.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use minilisp::builtinops::find_op;
use minilisp::lexer::{TokenKind, tokenize};
use minilisp::{ErrorKind, Interpreter, Value};
use proptest::prelude::*;

// -- Generation Strategies --

/// A balanced expression built from small atoms
fn expression_strategy() -> impl Strategy<Value = String> {
    let atom = prop_oneof![
        (-1000i64..1000).prop_map(|n| n.to_string()),
        prop::string::string_regex("[a-z][a-z0-9]{0,5}").expect("valid regex"),
        Just("+".to_owned()),
    ];
    atom.prop_recursive(4, 32, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(|items| format!("({})", items.join(" ")))
    })
}

/// A variable name that does not collide with a builtin
fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,8}")
        .expect("valid regex")
        .prop_filter("not a builtin", |s| find_op(s).is_none())
}

/// Whether the running paren count never dips below zero and ends at zero
fn is_balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn eval(source: &str) -> Result<Value, minilisp::Error> {
    Interpreter::new().execute(source).outcome
}

proptest! {
    #[test]
    fn balanced_input_has_matching_paren_counts(source in expression_strategy()) {
        let tokens = tokenize(&source).unwrap();
        let opens = tokens.iter().filter(|t| t.kind() == TokenKind::OpenParen).count();
        let closes = tokens.iter().filter(|t| t.kind() == TokenKind::CloseParen).count();
        prop_assert_eq!(opens, closes);
    }

    #[test]
    fn lexing_fails_exactly_when_unbalanced(source in "[() a1-]{0,24}") {
        match tokenize(&source) {
            Ok(_) => prop_assert!(is_balanced(&source)),
            Err(err) => {
                prop_assert!(!is_balanced(&source));
                prop_assert_eq!(err.kind(), ErrorKind::UnbalancedParentheses);
            }
        }
    }

    #[test]
    fn number_tokens_match_integer_syntax(n in any::<i64>()) {
        let tokens = tokenize(&n.to_string()).unwrap();
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(tokens[0].kind(), TokenKind::Number);
    }

    #[test]
    fn addition_and_multiplication_fold(
        a in -100_000i64..100_000,
        b in -100_000i64..100_000,
        c in -100_000i64..100_000,
    ) {
        prop_assert_eq!(eval(&format!("(+ {a} {b} {c})")), Ok(Value::Integer(a + b + c)));
        prop_assert_eq!(eval(&format!("(* {a} {b} {c})")), Ok(Value::Integer(a * b * c)));
        prop_assert_eq!(eval(&format!("(- {a} {b})")), Ok(Value::Integer(a - b)));
    }

    #[test]
    fn division_and_modulo_by_zero_never_yield_a_value(a in any::<i64>()) {
        prop_assert_eq!(
            eval(&format!("(/ {a} 0)")).unwrap_err().kind(),
            ErrorKind::DivisionByZero
        );
        prop_assert_eq!(
            eval(&format!("(% {a} 0)")).unwrap_err().kind(),
            ErrorKind::ModuloByZero
        );
    }

    #[test]
    fn comparisons_agree_with_integer_ordering(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(eval(&format!("(> {a} {b})")), Ok(Value::from(a > b)));
        prop_assert_eq!(eval(&format!("(< {a} {b})")), Ok(Value::from(a < b)));
        prop_assert_eq!(eval(&format!("(= {a} {b})")), Ok(Value::from(a == b)));
    }

    #[test]
    fn setq_round_trips_integers(name in identifier_strategy(), n in any::<i64>()) {
        let mut interp = Interpreter::new();
        let output = interp.run(&format!("(setq {name} {n}) (print {name})"));
        prop_assert_eq!(output, vec![n.to_string()]);
        prop_assert_eq!(interp.environment().get_integer(&name), Some(n));
    }
}
