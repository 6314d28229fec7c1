//! MiniLisp - a small parenthesized expression interpreter
//!
//! This crate evaluates a compact LISP-like language built from integer
//! arithmetic, variable assignment, conditionals, loops and user-defined
//! functions with simple recursion.
//!
//! ```text
//! (setq x 5)                       ; variables
//! (print (+ x 1 2))                ; arithmetic and output
//! (defun sq (n) (* n n))           ; functions
//! (if (> (sq x) 20) big small)     ; conditionals
//! (setq i 0)
//! (while (< i 3) (setq i (+ i 1))) ; loops
//! ```
//!
//! ## Pipeline
//!
//! Source text is split into a flat token sequence by the [`lexer`]. The
//! [`evaluator`] walks those tokens directly: every nested form is located
//! by scanning for its matching close paren and evaluated recursively. All
//! mutable state (variables, call scopes, function definitions and the
//! recursion counter) lives in an explicit [`environment::Environment`]
//! owned by an [`interpreter::Interpreter`] session.
//!
//! ## Values
//!
//! There are exactly two kinds of value: integers and text. Symbols that do
//! not name a variable evaluate to their own text, so `(setq s hello)`
//! stores the text `hello`. Only `0` and empty text are false.
//!
//! ## Modules
//!
//! - `lexer`: text to tokens, with the up-front parenthesis balance check
//! - `environment`: variable scopes, function table and recursion guard
//! - `builtinops`: registry of operators and special forms
//! - `evaluator`: token-walking evaluation engine
//! - `interpreter`: session wrapper and the `run` entry point
//!
//! ## Embedding
//!
//! Hosts that need more than output lines call [`Interpreter::execute`],
//! which returns the final [`Value`] or the [`Error`]. [`Error::kind`] and
//! [`Error::root`] see through the expression context attached to a failure.
//! [`builtinops::get_builtin_ops`] lists every reserved operator name, and
//! [`Interpreter::environment`] exposes variables, functions and scope depth.

use std::fmt;

/// Maximum number of simultaneously active user function calls.
///
/// Each interpreted call costs several host stack frames, so exceeding this
/// fails with [`Error::RecursionLimitExceeded`] instead of exhausting the stack.
pub const MAX_RECURSION_DEPTH: usize = 1000;

/// Longest rendering of a failing expression kept in error context.
pub const MAX_CONTEXT_LEN: usize = 100;

/// Fieldless classification of an [`Error`], for hosts that only care about the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnbalancedParentheses,
    MalformedExpression,
    UnknownCommand,
    ArityMismatch,
    DivisionByZero,
    ModuloByZero,
    NonNumericComparison,
    InvalidOperand,
    ArithmeticOverflow,
    RecursionLimitExceeded,
    IterationLimitExceeded,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnbalancedParentheses => "UnbalancedParentheses",
            ErrorKind::MalformedExpression => "MalformedExpression",
            ErrorKind::UnknownCommand => "UnknownCommand",
            ErrorKind::ArityMismatch => "ArityMismatch",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::ModuloByZero => "ModuloByZero",
            ErrorKind::NonNumericComparison => "NonNumericComparison",
            ErrorKind::InvalidOperand => "InvalidOperand",
            ErrorKind::ArithmeticOverflow => "ArithmeticOverflow",
            ErrorKind::RecursionLimitExceeded => "RecursionLimitExceeded",
            ErrorKind::IterationLimitExceeded => "IterationLimitExceeded",
        };
        f.write_str(name)
    }
}

/// Error types for the interpreter
///
/// Every message renders on a single line so a failed run surfaces exactly
/// one diagnostic line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("UnbalancedParentheses: {0}")]
    UnbalancedParentheses(String),

    #[error("MalformedExpression: {0}")]
    MalformedExpression(String),

    #[error("UnknownCommand: '{0}' is not an operator, function or variable")]
    UnknownCommand(String),

    #[error("ArityMismatch: '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: builtinops::Arity,
        got: usize,
    },

    #[error("DivisionByZero: division by zero")]
    DivisionByZero,

    #[error("ModuloByZero: modulo by zero")]
    ModuloByZero,

    #[error("NonNumericComparison: '{op}' cannot compare non-numeric value '{operand}'")]
    NonNumericComparison { op: String, operand: String },

    #[error("InvalidOperand: '{op}' expects numbers, got '{operand}'")]
    InvalidOperand { op: String, operand: String },

    #[error("ArithmeticOverflow: result of '{0}' is out of range")]
    ArithmeticOverflow(String),

    #[error("RecursionLimitExceeded: call depth exceeded {limit}")]
    RecursionLimitExceeded { limit: usize },

    #[error("IterationLimitExceeded: loop ran more than {limit} iterations")]
    IterationLimitExceeded { limit: u64 },

    /// An error annotated with the innermost form that produced it
    #[error("{source} (while evaluating: {expression})")]
    InContext {
        expression: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The kind of the underlying error, looking through any context
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnbalancedParentheses(_) => ErrorKind::UnbalancedParentheses,
            Error::MalformedExpression(_) => ErrorKind::MalformedExpression,
            Error::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Error::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            Error::DivisionByZero => ErrorKind::DivisionByZero,
            Error::ModuloByZero => ErrorKind::ModuloByZero,
            Error::NonNumericComparison { .. } => ErrorKind::NonNumericComparison,
            Error::InvalidOperand { .. } => ErrorKind::InvalidOperand,
            Error::ArithmeticOverflow(_) => ErrorKind::ArithmeticOverflow,
            Error::RecursionLimitExceeded { .. } => ErrorKind::RecursionLimitExceeded,
            Error::IterationLimitExceeded { .. } => ErrorKind::IterationLimitExceeded,
            Error::InContext { source, .. } => source.kind(),
        }
    }

    /// The error without any context annotation
    pub fn root(&self) -> &Error {
        match self {
            Error::InContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Create an ArityMismatch for the named operator or function
    pub fn arity_mismatch(name: impl Into<String>, expected: builtinops::Arity, got: usize) -> Self {
        Error::ArityMismatch {
            name: name.into(),
            expected,
            got,
        }
    }

    /// Attach the rendered expression as context, unless context is already present.
    ///
    /// Context is attached at the innermost failing form, so outer forms leave it alone.
    pub(crate) fn with_context(self, expression: impl FnOnce() -> String) -> Self {
        match self {
            Error::InContext { .. } => self,
            other => Error::InContext {
                expression: truncate_context(expression()),
                source: Box::new(other),
            },
        }
    }
}

/// Shorten an expression rendering to [`MAX_CONTEXT_LEN`] characters
fn truncate_context(expression: String) -> String {
    if expression.chars().count() <= MAX_CONTEXT_LEN {
        return expression;
    }
    let mut shortened: String = expression.chars().take(MAX_CONTEXT_LEN).collect();
    shortened.push_str("[...]");
    shortened
}

pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod value;

pub use interpreter::{Execution, Interpreter, InterpreterConfig};
pub use value::Value;

/// Run source text in a fresh session and return its output lines.
///
/// Each `print` contributes one line in evaluation order. If lexing or
/// evaluation fails, one final `Error: ...` line describes the failure.
pub fn run(source: &str) -> Vec<String> {
    Interpreter::new().run(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtinops::Arity;

    #[test]
    fn test_error_kind_looks_through_context() {
        let err = Error::DivisionByZero.with_context(|| "(/ 5 0)".to_owned());
        assert_eq!(err.kind(), ErrorKind::DivisionByZero);
        assert_eq!(err.root(), &Error::DivisionByZero);
        assert_eq!(
            err.to_string(),
            "DivisionByZero: division by zero (while evaluating: (/ 5 0))"
        );
    }

    #[test]
    fn test_context_attached_once() {
        let err = Error::ModuloByZero
            .with_context(|| "(% 5 0)".to_owned())
            .with_context(|| "(print (% 5 0))".to_owned());
        match &err {
            Error::InContext { expression, .. } => assert_eq!(expression, "(% 5 0)"),
            other => panic!("expected context, got {other:?}"),
        }
    }

    #[test]
    fn test_context_truncated() {
        let long = format!("({})", "x ".repeat(200));
        let err = Error::UnknownCommand("x".into()).with_context(|| long);
        match err {
            Error::InContext { expression, .. } => {
                assert!(expression.ends_with("[...]"));
                assert_eq!(expression.chars().count(), MAX_CONTEXT_LEN + 5);
            }
            other => panic!("expected context, got {other:?}"),
        }
    }

    #[test]
    fn test_error_messages_are_single_line() {
        let errors = vec![
            Error::UnbalancedParentheses("1 unclosed '('".into()),
            Error::MalformedExpression("empty expression".into()),
            Error::arity_mismatch("sq", Arity::Exact(1), 0),
            Error::NonNumericComparison {
                op: ">".into(),
                operand: "a".into(),
            },
            Error::RecursionLimitExceeded { limit: 1000 },
        ];
        for err in errors {
            assert!(!err.to_string().contains('\n'), "{err}");
        }
        assert_eq!(
            Error::arity_mismatch("sq", Arity::Exact(1), 0).to_string(),
            "ArityMismatch: 'sq' expects exactly 1 argument(s), got 0"
        );
    }
}
