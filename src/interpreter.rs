//! Interpreter sessions.
//!
//! An [`Interpreter`] owns one [`Environment`] for its whole lifetime, so
//! variables and functions defined by one call to [`Interpreter::run`] are
//! visible to the next. Front ends only need `run`: it never panics and
//! always hands back displayable lines.

use crate::environment::{CallScope, Environment};
use crate::evaluator::{EvalOptions, Evaluator};
use crate::lexer::{LexConfig, tokenize_with_config};
use crate::value::Value;
use crate::{Error, MAX_RECURSION_DEPTH};

/// Session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Maximum number of simultaneously active function calls
    pub recursion_limit: usize,
    /// Optional cap on iterations of any single loop; loops are unbounded by default
    pub max_loop_iterations: Option<u64>,
    /// Visibility rule for function call scopes
    pub call_scope: CallScope,
    /// Accept `;` line comments in source text
    pub handle_comments: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            recursion_limit: MAX_RECURSION_DEPTH,
            max_loop_iterations: None,
            call_scope: CallScope::default(),
            handle_comments: false,
        }
    }
}

impl InterpreterConfig {
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_max_loop_iterations(mut self, limit: u64) -> Self {
        self.max_loop_iterations = Some(limit);
        self
    }

    pub fn with_call_scope(mut self, call_scope: CallScope) -> Self {
        self.call_scope = call_scope;
        self
    }

    pub fn with_comments(mut self, handle_comments: bool) -> Self {
        self.handle_comments = handle_comments;
        self
    }

    fn lex_config(&self) -> LexConfig {
        LexConfig {
            handle_comments: self.handle_comments,
        }
    }

    fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            call_scope: self.call_scope,
            max_loop_iterations: self.max_loop_iterations,
        }
    }
}

/// What one execution produced: printed lines and the final outcome.
///
/// Lines printed before a failure are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub output: Vec<String>,
    pub outcome: Result<Value, Error>,
}

impl Execution {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Printed lines, plus one `Error: ...` diagnostic line on failure
    pub fn into_lines(self) -> Vec<String> {
        let Execution { mut output, outcome } = self;
        if let Err(err) = outcome {
            output.push(format!("Error: {err}"));
        }
        output
    }
}

/// An interpreter session
#[derive(Debug, Clone)]
pub struct Interpreter {
    env: Environment,
    config: InterpreterConfig,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Interpreter {
            env: Environment::with_recursion_limit(config.recursion_limit),
            config,
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Lex and evaluate every top-level form in `source`.
    ///
    /// Evaluation stops at the first error. The environment keeps whatever
    /// the forms before it defined, and no call scope outlives the failure.
    #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn execute(&mut self, source: &str) -> Execution {
        let tokens = match tokenize_with_config(source, self.config.lex_config()) {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::debug!(%err, "lexing failed");
                return Execution {
                    output: Vec::new(),
                    outcome: Err(err),
                };
            }
        };

        let mut evaluator = Evaluator::with_options(&mut self.env, self.config.eval_options());
        let outcome = evaluator.evaluate_program(&tokens);
        let output = evaluator.into_output();

        match &outcome {
            Ok(value) => tracing::debug!(%value, lines = output.len(), "execution finished"),
            Err(err) => tracing::debug!(%err, lines = output.len(), "execution failed"),
        }
        Execution { output, outcome }
    }

    /// Execute `source` and return its displayable lines
    pub fn run(&mut self, source: &str) -> Vec<String> {
        self.execute(source).into_lines()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Discard every variable and function
    pub fn reset(&mut self) {
        self.env = Environment::with_recursion_limit(self.config.recursion_limit);
    }
}
