//! Turns source text into a flat sequence of [`Token`]s.
//!
//! Nesting is not represented structurally: the evaluator rebuilds it by
//! scanning for matching [`TokenKind::OpenParen`]/[`TokenKind::CloseParen`]
//! pairs. Before any tokenizing happens the whole input is scanned once to
//! make sure the parentheses balance.

use std::borrow::Cow;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till1, take_while},
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    multi::many0,
    sequence::{pair, preceded},
};

use crate::Error;

/// Token categories produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Optional `-` followed by one or more ASCII digits
    Number,
    /// Anything else that is not a parenthesis: operators, keywords, identifiers
    Symbol,
    OpenParen,
    CloseParen,
}

/// A single lexical token. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    kind: TokenKind,
    text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Token {
            kind,
            text: text.into(),
        }
    }

    /// Classify a non-parenthesis fragment as a number or a symbol
    pub fn atom(text: &str) -> Self {
        let kind = if is_number_literal(text) {
            TokenKind::Number
        } else {
            TokenKind::Symbol
        };
        Token::new(kind, text)
    }

    pub fn open_paren() -> Self {
        Token::new(TokenKind::OpenParen, "(")
    }

    pub fn close_paren() -> Self {
        Token::new(TokenKind::CloseParen, ")")
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_open(&self) -> bool {
        self.kind == TokenKind::OpenParen
    }

    pub fn is_close(&self) -> bool {
        self.kind == TokenKind::CloseParen
    }
}

/// Lexer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexConfig {
    /// Treat `;` up to the end of the line as a comment
    pub handle_comments: bool,
}

/// Tokenize source text with the default configuration.
pub fn tokenize(text: &str) -> Result<Vec<Token>, Error> {
    tokenize_with_config(text, LexConfig::default())
}

/// Tokenize source text.
///
/// Fails with [`Error::UnbalancedParentheses`] if the running paren depth
/// ever goes negative or does not end at zero. The check covers the entire
/// input before any token is produced.
pub fn tokenize_with_config(text: &str, config: LexConfig) -> Result<Vec<Token>, Error> {
    let text = if config.handle_comments {
        strip_comments(text)
    } else {
        Cow::Borrowed(text)
    };

    check_balance(&text)?;

    match many0(token).parse(text.as_ref()) {
        Ok((remaining, tokens)) => {
            // Only trailing whitespace can be left over
            if remaining.chars().all(char::is_whitespace) {
                tracing::trace!(count = tokens.len(), "tokenized input");
                Ok(tokens)
            } else {
                let near: String = remaining.chars().take(10).collect();
                Err(Error::MalformedExpression(format!(
                    "unexpected input near '{near}'"
                )))
            }
        }
        Err(e) => Err(Error::MalformedExpression(format!("tokenizer failed: {e}"))),
    }
}

/// Render tokens back into source form, e.g. `(+ 1 (* 2 3))`
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous: Option<TokenKind> = None;
    for token in tokens {
        let needs_space = match (previous, token.kind) {
            (None, _) | (Some(TokenKind::OpenParen), _) | (_, TokenKind::CloseParen) => false,
            _ => true,
        };
        if needs_space {
            out.push(' ');
        }
        out.push_str(&token.text);
        previous = Some(token.kind);
    }
    out
}

/// Scan the whole input once, tracking paren depth
fn check_balance(text: &str) -> Result<(), Error> {
    let mut depth: usize = 0;
    for (offset, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::UnbalancedParentheses(format!(
                        "closing ')' without matching '(' at offset {offset}"
                    ))
                })?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::UnbalancedParentheses(format!(
            "{depth} unclosed '(' at end of input"
        )));
    }
    Ok(())
}

/// Remove `;` comments, keeping line breaks
fn strip_comments(text: &str) -> Cow<'_, str> {
    if !text.contains(';') {
        return Cow::Borrowed(text);
    }
    let stripped = text
        .split_inclusive('\n')
        .map(|line| match line.find(';') {
            Some(idx) if line.ends_with('\n') => format!("{}\n", &line[..idx]),
            Some(idx) => line[..idx].to_owned(),
            None => line.to_owned(),
        })
        .collect();
    Cow::Owned(stripped)
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

fn open_paren(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('(').parse(input)?;
    Ok((input, Token::open_paren()))
}

fn close_paren(input: &str) -> IResult<&str, Token> {
    let (input, _) = char(')').parse(input)?;
    Ok((input, Token::close_paren()))
}

/// Any run of characters up to whitespace or a parenthesis
fn atom(input: &str) -> IResult<&str, Token> {
    let (input, text) =
        take_till1(|c: char| c.is_whitespace() || c == '(' || c == ')').parse(input)?;
    Ok((input, Token::atom(text)))
}

fn token(input: &str) -> IResult<&str, Token> {
    preceded(whitespace, alt((open_paren, close_paren, atom))).parse(input)
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(char('-')), digit1)).parse(input)
}

/// Whether the whole fragment matches `-?[0-9]+`
fn is_number_literal(text: &str) -> bool {
    matches!(number_literal(text), Ok(("", _)))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Test result variants for data-driven lexing tests
    #[derive(Debug)]
    enum LexTestResult {
        Success(Vec<Token>),         // Lexing should succeed with these tokens
        SpecificError(&'static str), // Lexing should fail with error containing this string
        AnyError,                    // Lexing should fail (any error)
    }
    use LexTestResult::*;

    fn open() -> Token {
        Token::open_paren()
    }

    fn close() -> Token {
        Token::close_paren()
    }

    fn num(text: &str) -> Token {
        Token::new(TokenKind::Number, text)
    }

    fn sym(text: &str) -> Token {
        Token::new(TokenKind::Symbol, text)
    }

    fn run_lex_tests(test_cases: Vec<(&str, LexTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Lex test #{}", i + 1);
            match (tokenize(input), expected) {
                (Ok(actual), Success(expected_tokens)) => {
                    assert_eq!(&actual, expected_tokens, "{test_id}: tokens mismatch for '{input}'");
                }
                (Err(_), AnyError) => {}
                (Err(err), SpecificError(expected_text)) => {
                    let msg = format!("{err}");
                    assert!(
                        msg.contains(expected_text),
                        "{test_id}: error should contain '{expected_text}', got: {msg}"
                    );
                }
                (Ok(actual), AnyError | SpecificError(_)) => {
                    panic!("{test_id}: expected error for '{input}', got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success for '{input}', got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_tokenize_data_driven() {
        let test_cases = vec![
            // === BASIC FORMS ===
            ("(+ 1 2)", Success(vec![open(), sym("+"), num("1"), num("2"), close()])),
            ("()", Success(vec![open(), close()])),
            ("", Success(vec![])),
            ("   \n\t ", Success(vec![])),
            // === NUMBERS ===
            ("42", Success(vec![num("42")])),
            ("-42", Success(vec![num("-42")])),
            ("007", Success(vec![num("007")])),
            // Not numbers: sign alone, sign after digits, decimals, leading plus
            ("-", Success(vec![sym("-")])),
            ("4-2", Success(vec![sym("4-2")])),
            ("3.5", Success(vec![sym("3.5")])),
            ("+5", Success(vec![sym("+5")])),
            ("--5", Success(vec![sym("--5")])),
            // === SYMBOLS ===
            ("setq", Success(vec![sym("setq")])),
            ("\"hi\"", Success(vec![sym("\"hi\"")])),
            ("x1", Success(vec![sym("x1")])),
            ("%", Success(vec![sym("%")])),
            // === PARENS SPLIT TOKENS WITHOUT WHITESPACE ===
            (
                "(print(+ a-1 b))",
                Success(vec![
                    open(),
                    sym("print"),
                    open(),
                    sym("+"),
                    sym("a-1"),
                    sym("b"),
                    close(),
                    close(),
                ]),
            ),
            (
                "(setq x 5)(print x)",
                Success(vec![
                    open(),
                    sym("setq"),
                    sym("x"),
                    num("5"),
                    close(),
                    open(),
                    sym("print"),
                    sym("x"),
                    close(),
                ]),
            ),
            (
                "  (\n-3\r\n)  ",
                Success(vec![open(), num("-3"), close()]),
            ),
            // === UNBALANCED ===
            (")", SpecificError("UnbalancedParentheses")),
            ("(+ 1 2", SpecificError("1 unclosed")),
            ("((+ 1 2)", SpecificError("1 unclosed")),
            ("(+ 1 2))", SpecificError("offset 7")),
            (")(", SpecificError("offset 0")),
            ("(()", AnyError),
        ];

        run_lex_tests(test_cases);
    }

    #[test]
    fn test_balance_checked_before_tokenizing() {
        // The stray ')' at the very end must be reported even though the prefix is fine
        let err = tokenize("(print 1) (print 2))").unwrap_err();
        assert!(matches!(err, Error::UnbalancedParentheses(_)));
    }

    #[test]
    fn test_comments_only_when_enabled() {
        let source = "(print 1) ; stray )\n(print 2)";
        assert!(tokenize(source).is_err());

        let tokens = tokenize_with_config(
            source,
            LexConfig {
                handle_comments: true,
            },
        )
        .unwrap();
        assert_eq!(render_tokens(&tokens), "(print 1) (print 2)");
    }

    #[test]
    fn test_render_tokens() {
        let tokens = tokenize("( defun sq ( x ) ( * x x ) )").unwrap();
        assert_eq!(render_tokens(&tokens), "(defun sq (x) (* x x))");
        assert_eq!(render_tokens(&[]), "");
    }

    #[test]
    fn test_token_accessors() {
        let token = Token::atom("-12");
        assert_eq!(token.kind(), TokenKind::Number);
        assert_eq!(token.text(), "-12");
        assert!(!token.is_open());
        assert!(Token::open_paren().is_open());
        assert!(Token::close_paren().is_close());
    }
}
