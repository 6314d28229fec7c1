use crate::builtinops::{Arity, OpKind, find_op};
use crate::environment::{CallScope, Environment, FunctionDef};
use crate::lexer::{Token, TokenKind, render_tokens};
use crate::value::Value;
use crate::Error;

mod call_frame;

use call_frame::CallFrame;

/// Minimum stack space to keep available before evaluating a form (100KB red zone)
const RED_ZONE: usize = 100 * 1024;

/// Stack space to allocate when growing (1MB)
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Evaluation options that do not live in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalOptions {
    /// How a function call scope is seeded
    pub call_scope: CallScope,
    /// Upper bound on iterations of a single `while`/`for` loop; unbounded when `None`
    pub max_loop_iterations: Option<u64>,
}

/// Token-walking evaluator.
///
/// No tree is built: whenever an operand starts with `(` the matching `)` is
/// located with [`find_matching_paren`] and that token range is evaluated
/// recursively as a complete form.
pub struct Evaluator<'env> {
    env: &'env mut Environment,
    options: EvalOptions,
    output: Vec<String>,
}

impl<'env> Evaluator<'env> {
    pub fn new(env: &'env mut Environment) -> Self {
        Self::with_options(env, EvalOptions::default())
    }

    pub fn with_options(env: &'env mut Environment, options: EvalOptions) -> Self {
        Evaluator {
            env,
            options,
            output: Vec::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        self.env
    }

    /// Lines printed so far
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn into_output(self) -> Vec<String> {
        self.output
    }

    /// Evaluate exactly one complete form.
    ///
    /// The input must start with `(` and end with its matching `)`.
    pub fn evaluate(&mut self, tokens: &[Token]) -> Result<Value, Error> {
        match tokens.first() {
            Some(first) if first.is_open() => {}
            Some(first) => {
                return Err(Error::MalformedExpression(format!(
                    "expression must start with '(', found '{}'",
                    first.text()
                )));
            }
            None => return Err(Error::MalformedExpression("empty input".to_owned())),
        }
        let end = find_matching_paren(tokens, 0)?;
        if end + 1 != tokens.len() {
            return Err(Error::MalformedExpression(format!(
                "unexpected tokens after expression: '{}'",
                render_tokens(&tokens[end + 1..])
            )));
        }
        self.evaluate_form(tokens)
    }

    /// Evaluate a sequence of top-level forms in order, yielding the last value.
    ///
    /// Stops at the first error. An empty program yields empty text.
    pub fn evaluate_program(&mut self, tokens: &[Token]) -> Result<Value, Error> {
        let mut result = Value::empty();
        let mut pos = 0;
        while let Some(token) = tokens.get(pos) {
            if !token.is_open() {
                return Err(Error::MalformedExpression(format!(
                    "top-level expressions must be parenthesized, found '{}'",
                    token.text()
                )));
            }
            let end = find_matching_paren(tokens, pos)?;
            result = self.evaluate_form(&tokens[pos..=end])?;
            pos = end + 1;
        }
        Ok(result)
    }

    /// Evaluate one complete form `( head operands... )`
    fn evaluate_form(&mut self, form: &[Token]) -> Result<Value, Error> {
        stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || self.dispatch_form(form))
            .map_err(|err| err.with_context(|| render_tokens(form)))
    }

    fn dispatch_form(&mut self, form: &[Token]) -> Result<Value, Error> {
        let inner = match form {
            [open, inner @ .., close] if open.is_open() && close.is_close() => inner,
            _ => {
                return Err(Error::MalformedExpression(format!(
                    "not a parenthesized form: '{}'",
                    render_tokens(form)
                )));
            }
        };
        let Some(head) = inner.first() else {
            return Err(Error::MalformedExpression("empty expression".to_owned()));
        };

        match head.kind() {
            // A form headed by a sub-expression is a block: evaluate each element in order
            TokenKind::OpenParen => {
                let elements = split_operands(inner)?;
                self.evaluate_sequence(&elements)
            }
            TokenKind::Number => {
                let operands = split_operands(&inner[1..])?;
                if !operands.is_empty() {
                    return Err(Error::MalformedExpression(format!(
                        "number '{}' cannot be applied to arguments",
                        head.text()
                    )));
                }
                parse_integer(head)
            }
            TokenKind::Symbol => {
                let operands = split_operands(&inner[1..])?;
                self.apply(head.text(), &operands)
            }
            TokenKind::CloseParen => Err(Error::MalformedExpression(
                "unexpected ')'".to_owned(),
            )),
        }
    }

    /// Resolve a leading symbol: builtin, then user function, then variable
    fn apply(&mut self, name: &str, operands: &[&[Token]]) -> Result<Value, Error> {
        if let Some(op) = find_op(name) {
            op.validate_arity(operands.len())?;
            return match op.op_kind {
                OpKind::Function(func) => {
                    let args = self.eval_operands(operands)?;
                    func(&args)
                }
                OpKind::SpecialForm(special_form) => special_form(self, operands),
            };
        }

        if let Some(function) = self.env.get_function(name) {
            return self.call_function(&function, operands);
        }

        if let Some(value) = self.env.lookup(name) {
            if operands.is_empty() {
                return Ok(value.clone());
            }
            return Err(Error::MalformedExpression(format!(
                "variable '{name}' cannot be applied to arguments"
            )));
        }

        Err(Error::UnknownCommand(name.to_owned()))
    }

    /// Call a user-defined function.
    ///
    /// Arguments are evaluated in the caller's scope. The call scope and the
    /// recursion count are released on every exit path by [`CallFrame`].
    fn call_function(&mut self, function: &FunctionDef, operands: &[&[Token]]) -> Result<Value, Error> {
        let args = self.eval_operands(operands)?;
        if args.len() != function.parameters.len() {
            return Err(Error::arity_mismatch(
                &function.name,
                Arity::Exact(function.parameters.len()),
                args.len(),
            ));
        }
        let body = split_operands(&function.body)?;

        let call_scope = self.options.call_scope;
        let mut frame = CallFrame::enter(self, call_scope)?;
        tracing::trace!(function = %function.name, depth = frame.env.depth(), "call");
        for (param, arg) in function.parameters.iter().zip(args) {
            frame.env.set_variable(param.as_str(), arg.normalized());
        }
        frame.evaluate_sequence(&body)
    }

    /// Evaluate one operand: a number, a symbol, or a parenthesized form.
    ///
    /// A symbol evaluates to its variable's value when bound and to its own
    /// text otherwise.
    pub(crate) fn eval_operand(&mut self, operand: &[Token]) -> Result<Value, Error> {
        match operand {
            [token] => match token.kind() {
                TokenKind::Number => parse_integer(token),
                TokenKind::Symbol => Ok(self
                    .env
                    .lookup(token.text())
                    .cloned()
                    .unwrap_or_else(|| Value::Text(token.text().to_owned()))),
                TokenKind::OpenParen | TokenKind::CloseParen => Err(Error::MalformedExpression(
                    format!("unexpected '{}'", token.text()),
                )),
            },
            [first, ..] if first.is_open() => self.evaluate_form(operand),
            _ => Err(Error::MalformedExpression(format!(
                "invalid operand '{}'",
                render_tokens(operand)
            ))),
        }
    }

    fn eval_operands(&mut self, operands: &[&[Token]]) -> Result<Vec<Value>, Error> {
        operands
            .iter()
            .map(|operand| self.eval_operand(operand))
            .collect()
    }

    /// Evaluate operands in order and yield the last value (empty text if none)
    pub(crate) fn evaluate_sequence(&mut self, operands: &[&[Token]]) -> Result<Value, Error> {
        let mut result = Value::empty();
        for operand in operands {
            result = self.eval_operand(operand)?;
        }
        Ok(result)
    }
}

/// Find the index of the `)` matching the `(` at `open`.
///
/// Only parenthesis tokens change the depth.
pub fn find_matching_paren(tokens: &[Token], open: usize) -> Result<usize, Error> {
    if !tokens.get(open).is_some_and(Token::is_open) {
        return Err(Error::MalformedExpression(format!(
            "expected '(' at token {open}"
        )));
    }
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match token.kind() {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(idx);
                }
            }
            TokenKind::Number | TokenKind::Symbol => {}
        }
    }
    Err(Error::UnbalancedParentheses(format!(
        "no matching ')' for '(' at token {open}"
    )))
}

/// Split a token range into operands: single atoms or complete parenthesized forms
pub fn split_operands(tokens: &[Token]) -> Result<Vec<&[Token]>, Error> {
    let mut operands = Vec::new();
    let mut pos = 0;
    while let Some(token) = tokens.get(pos) {
        let end = match token.kind() {
            TokenKind::OpenParen => find_matching_paren(tokens, pos)? + 1,
            TokenKind::CloseParen => {
                return Err(Error::UnbalancedParentheses(format!(
                    "unexpected ')' at token {pos}"
                )));
            }
            TokenKind::Number | TokenKind::Symbol => pos + 1,
        };
        operands.push(&tokens[pos..end]);
        pos = end;
    }
    Ok(operands)
}

fn parse_integer(token: &Token) -> Result<Value, Error> {
    token
        .text()
        .parse()
        .map(Value::Integer)
        .map_err(|_| Error::MalformedExpression(format!("integer literal '{}' out of range", token.text())))
}

/// The operand must be a single symbol token
fn symbol_name<'t>(form: &str, operand: &'t [Token]) -> Result<&'t str, Error> {
    match operand {
        [token] if token.kind() == TokenKind::Symbol => Ok(token.text()),
        _ => Err(Error::MalformedExpression(format!(
            "'{form}' expects a name, found '{}'",
            render_tokens(operand)
        ))),
    }
}

/// Counts loop iterations against the optional budget
struct LoopBudget {
    limit: Option<u64>,
    count: u64,
}

impl LoopBudget {
    fn new(limit: Option<u64>) -> Self {
        LoopBudget { limit, count: 0 }
    }

    fn tick(&mut self) -> Result<(), Error> {
        self.count += 1;
        match self.limit {
            Some(limit) if self.count > limit => Err(Error::IterationLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

/// Evaluate setq special form: `(setq name value)`
pub(crate) fn eval_setq(ev: &mut Evaluator<'_>, operands: &[&[Token]]) -> Result<Value, Error> {
    let [name, value] = operands else {
        return Err(Error::arity_mismatch("setq", Arity::Exact(2), operands.len()));
    };
    let name = symbol_name("setq", name)?;
    let value = ev.eval_operand(value)?.normalized();
    ev.env.set_variable(name, value.clone());
    Ok(value)
}

/// Evaluate print special form: emits one output line and yields the printed value
pub(crate) fn eval_print(ev: &mut Evaluator<'_>, operands: &[&[Token]]) -> Result<Value, Error> {
    let [expr] = operands else {
        return Err(Error::arity_mismatch("print", Arity::Exact(1), operands.len()));
    };
    let value = ev.eval_operand(expr)?;
    let line = value.to_string();
    tracing::debug!(%line, "print");
    ev.output.push(line);
    Ok(value)
}

/// Evaluate defun special form: `(defun name (params...) body...)`
pub(crate) fn eval_defun(ev: &mut Evaluator<'_>, operands: &[&[Token]]) -> Result<Value, Error> {
    let [name, params, body @ ..] = operands else {
        return Err(Error::arity_mismatch("defun", Arity::AtLeast(3), operands.len()));
    };
    let name = symbol_name("defun", name)?;
    if find_op(name).is_some() {
        return Err(Error::MalformedExpression(format!(
            "cannot redefine built-in '{name}'"
        )));
    }
    let parameters = parameter_list(name, params)?;
    if body.is_empty() {
        return Err(Error::MalformedExpression(format!(
            "function '{name}' has no body"
        )));
    }

    let body: Vec<Token> = body.iter().flat_map(|operand| operand.iter().cloned()).collect();
    ev.env.define_function(name, &parameters, &body);
    tracing::debug!(function = name, params = parameters.len(), "defined function");
    Ok(Value::Text(name.to_owned()))
}

/// Parse `(a b c)` into parameter names
fn parameter_list(function: &str, operand: &[Token]) -> Result<Vec<String>, Error> {
    let inner = match operand {
        [open, inner @ .., close] if open.is_open() && close.is_close() => inner,
        _ => {
            return Err(Error::MalformedExpression(format!(
                "function '{function}' needs a parameter list, found '{}'",
                render_tokens(operand)
            )));
        }
    };

    let mut parameters: Vec<String> = Vec::with_capacity(inner.len());
    for token in inner {
        if token.kind() != TokenKind::Symbol {
            return Err(Error::MalformedExpression(format!(
                "parameters of '{function}' must be names, found '{}'",
                token.text()
            )));
        }
        if parameters.iter().any(|p| p == token.text()) {
            return Err(Error::MalformedExpression(format!(
                "duplicate parameter name '{}' in '{function}'",
                token.text()
            )));
        }
        parameters.push(token.text().to_owned());
    }
    Ok(parameters)
}

/// Evaluate if special form: `(if cond then [else])`, evaluating exactly one branch
pub(crate) fn eval_if(ev: &mut Evaluator<'_>, operands: &[&[Token]]) -> Result<Value, Error> {
    let (condition, then_branch, else_branch) = match operands {
        [condition, then_branch] => (condition, then_branch, None),
        [condition, then_branch, else_branch] => (condition, then_branch, Some(else_branch)),
        _ => return Err(Error::arity_mismatch("if", Arity::Range(2, 3), operands.len())),
    };
    if ev.eval_operand(condition)?.is_truthy() {
        ev.eval_operand(then_branch)
    } else {
        match else_branch {
            Some(else_branch) => ev.eval_operand(else_branch),
            None => Ok(Value::empty()),
        }
    }
}

/// Evaluate while special form: `(while cond body...)`.
///
/// Yields the last body result, or `0` if the body never ran.
pub(crate) fn eval_while(ev: &mut Evaluator<'_>, operands: &[&[Token]]) -> Result<Value, Error> {
    let [condition, body @ ..] = operands else {
        return Err(Error::arity_mismatch("while", Arity::AtLeast(2), operands.len()));
    };
    let mut budget = LoopBudget::new(ev.options.max_loop_iterations);
    let mut result = Value::Integer(0);
    while ev.eval_operand(condition)?.is_truthy() {
        budget.tick()?;
        result = ev.evaluate_sequence(body)?;
    }
    Ok(result)
}

/// Evaluate for special form: `(for init cond body update)`
pub(crate) fn eval_for(ev: &mut Evaluator<'_>, operands: &[&[Token]]) -> Result<Value, Error> {
    let [init, condition, body, update] = operands else {
        return Err(Error::arity_mismatch("for", Arity::Exact(4), operands.len()));
    };
    ev.eval_operand(init)?;
    let mut budget = LoopBudget::new(ev.options.max_loop_iterations);
    let mut result = Value::Integer(0);
    while ev.eval_operand(condition)?.is_truthy() {
        budget.tick()?;
        result = ev.eval_operand(body)?;
        ev.eval_operand(update)?;
    }
    Ok(result)
}
