//! Built-in operations registry.
//!
//! Every symbol with dedicated evaluator behaviour is listed once in a
//! single static table, together with the number of operands it accepts.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: every operand is evaluated first and the resulting values
//!   are folded (e.g. `+`, `/`, `>`)
//! - **Special Forms**: receive their operand tokens unevaluated and decide
//!   what to evaluate and when (e.g. `if`, `while`, `defun`)
//!
//! ## Numeric Semantics
//!
//! Operands must read as numbers. Integer operands use checked arithmetic
//! and report overflow. `/` stays in integers while each step divides
//! evenly and `^` while the exponent is a non-negative integer; otherwise
//! both switch to floating point. A floating result that is a whole number
//! comes back as an integer, anything else finite comes back as decimal text
//! (`(/ 7 2)` is `3.5`). Infinite and NaN results are `ArithmeticOverflow`.
//!
//! ## Adding New Operations
//!
//! 1. Implement `fn(&[Value]) -> Result<Value, Error>` for a function, or a
//!    special form in the evaluator
//! 2. Add it to `BUILTIN_OPS` with its arity

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::evaluator::{
    Evaluator, eval_defun, eval_for, eval_if, eval_print, eval_setq, eval_while,
};
use crate::lexer::Token;
use crate::value::{IntegerType, Value};

/// Accepted operand counts for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }

    /// Check an operand count, naming the operation in the error
    pub fn validate(&self, name: &str, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_mismatch(name, *self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Signature of special forms: the evaluator plus the unevaluated operand tokens
pub type SpecialFormFn = fn(&mut Evaluator<'_>, &[&[Token]]) -> Result<Value, Error>;

/// Represents the implementation of a built-in operation
#[derive(Clone, Copy)]
pub enum OpKind {
    /// Takes evaluated operands and returns a value
    Function(fn(&[Value]) -> Result<Value, Error>),
    /// Takes unevaluated operands, one token slice per operand
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The symbol that invokes this operation
    pub id: &'static str,
    pub op_kind: OpKind,
    /// Accepted number of operands
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    pub(crate) fn validate_arity(&self, count: usize) -> Result<(), Error> {
        self.arity.validate(self.id, count)
    }
}

//
// Numeric helpers
//

/// A numeric view of an operand
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(IntegerType),
    Float(f64),
}

impl Number {
    /// Read a value as a number; text must parse as an integer or a finite decimal
    pub(crate) fn from_value(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(n) => Some(Number::Int(*n)),
            Value::Text(s) => {
                if let Ok(n) = s.parse::<IntegerType>() {
                    return Some(Number::Int(n));
                }
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Number::Float)
            }
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    /// Combine two numbers, staying in integers while both sides are integers.
    /// `None` means integer overflow.
    fn combine(
        self,
        other: Number,
        int_op: fn(IntegerType, IntegerType) -> Option<IntegerType>,
        float_op: fn(f64, f64) -> f64,
    ) -> Option<Number> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => int_op(a, b).map(Number::Int),
            (a, b) => Some(Number::Float(float_op(a.as_f64(), b.as_f64()))),
        }
    }

    /// Fails when a floating result is infinite or NaN
    pub(crate) fn into_value(self, op: &str) -> Result<Value, Error> {
        match self {
            Number::Int(n) => Ok(Value::Integer(n)),
            Number::Float(f) => float_to_value(op, f),
        }
    }

    fn compare(self, other: Number) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// Whole floats inside the integer range become integers, other finite floats
/// become decimal text. Infinity and NaN are not values.
fn float_to_value(op: &str, f: f64) -> Result<Value, Error> {
    const LOWER: f64 = IntegerType::MIN as f64;
    const UPPER: f64 = IntegerType::MAX as f64;
    if !f.is_finite() {
        return Err(overflow(op));
    }
    if f.fract() == 0.0 && (LOWER..UPPER).contains(&f) {
        Ok(Value::Integer(f as IntegerType))
    } else {
        Ok(Value::Text(format!("{f}")))
    }
}

fn numeric_operands(op: &str, args: &[Value]) -> Result<Vec<Number>, Error> {
    args.iter()
        .map(|arg| {
            Number::from_value(arg).ok_or_else(|| Error::InvalidOperand {
                op: op.to_owned(),
                operand: arg.to_string(),
            })
        })
        .collect()
}

fn overflow(op: &str) -> Error {
    Error::ArithmeticOverflow(op.to_owned())
}

//
// Builtin Function Implementations
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum = Number::Int(0);
    for n in numeric_operands("+", args)? {
        sum = sum
            .combine(n, IntegerType::checked_add, |a, b| a + b)
            .ok_or_else(|| overflow("+"))?;
    }
    sum.into_value("+")
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product = Number::Int(1);
    for n in numeric_operands("*", args)? {
        product = product
            .combine(n, IntegerType::checked_mul, |a, b| a * b)
            .ok_or_else(|| overflow("*"))?;
    }
    product.into_value("*")
}

/// Split operands into the seed (first operand) and the rest
fn seed_and_rest(op: &str, args: &[Value]) -> Result<(Number, Vec<Number>), Error> {
    let mut numbers = numeric_operands(op, args)?.into_iter();
    let seed = numbers
        .next()
        .ok_or_else(|| Error::arity_mismatch(op, Arity::AtLeast(1), 0))?;
    Ok((seed, numbers.collect()))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let (mut result, rest) = seed_and_rest("-", args)?;
    for n in rest {
        result = result
            .combine(n, IntegerType::checked_sub, |a, b| a - b)
            .ok_or_else(|| overflow("-"))?;
    }
    result.into_value("-")
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let (seed, rest) = seed_and_rest("/", args)?;
    if rest.iter().any(|n| n.is_zero()) {
        return Err(Error::DivisionByZero);
    }
    let mut quotient = seed;
    for n in rest {
        quotient = match (quotient, n) {
            // Stay exact while every step divides evenly
            (Number::Int(a), Number::Int(b)) => match a.checked_rem(b) {
                Some(0) => Number::Int(a.checked_div(b).ok_or_else(|| overflow("/"))?),
                Some(_) => Number::Float(a as f64 / b as f64),
                None => return Err(overflow("/")),
            },
            (a, b) => Number::Float(a.as_f64() / b.as_f64()),
        };
    }
    quotient.into_value("/")
}

fn builtin_mod(args: &[Value]) -> Result<Value, Error> {
    let (mut result, rest) = seed_and_rest("%", args)?;
    if rest.iter().any(|n| n.is_zero()) {
        return Err(Error::ModuloByZero);
    }
    for n in rest {
        result = result
            .combine(n, IntegerType::checked_rem, |a, b| a % b)
            .ok_or_else(|| overflow("%"))?;
    }
    result.into_value("%")
}

fn builtin_pow(args: &[Value]) -> Result<Value, Error> {
    let (seed, rest) = seed_and_rest("^", args)?;
    let mut power = seed;
    for n in rest {
        power = match (power, n) {
            (Number::Int(base), Number::Int(exp)) if exp >= 0 => {
                let exp = u32::try_from(exp).map_err(|_| overflow("^"))?;
                Number::Int(base.checked_pow(exp).ok_or_else(|| overflow("^"))?)
            }
            (base, exp) => Number::Float(base.as_f64().powf(exp.as_f64())),
        };
    }
    power.into_value("^")
}

// Macro to generate binary numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op_str:expr, $($ordering:pat_param)|+) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let [left, right] = args else {
                return Err(Error::arity_mismatch($op_str, Arity::Exact(2), args.len()));
            };
            let as_number = |value: &Value| {
                Number::from_value(value).ok_or_else(|| Error::NonNumericComparison {
                    op: $op_str.to_owned(),
                    operand: value.to_string(),
                })
            };
            let ordering = as_number(left)?.compare(as_number(right)?);
            Ok(Value::from(matches!(ordering, Some($($ordering)|+))))
        }
    };
}

numeric_comparison!(builtin_gt, ">", std::cmp::Ordering::Greater);
numeric_comparison!(builtin_lt, "<", std::cmp::Ordering::Less);
numeric_comparison!(builtin_eq, "=", std::cmp::Ordering::Equal);
numeric_comparison!(
    builtin_ge,
    ">=",
    std::cmp::Ordering::Greater | std::cmp::Ordering::Equal
);
numeric_comparison!(
    builtin_le,
    "<=",
    std::cmp::Ordering::Less | std::cmp::Ordering::Equal
);

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    vec![
        // Arithmetic operations
        BuiltinOp {
            id: "+",
            op_kind: OpKind::Function(builtin_add),
            arity: Arity::Any,
        },
        BuiltinOp {
            id: "-",
            op_kind: OpKind::Function(builtin_sub),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "*",
            op_kind: OpKind::Function(builtin_mul),
            arity: Arity::Any,
        },
        BuiltinOp {
            id: "/",
            op_kind: OpKind::Function(builtin_div),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "^",
            op_kind: OpKind::Function(builtin_pow),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "%",
            op_kind: OpKind::Function(builtin_mod),
            arity: Arity::AtLeast(1),
        },
        // Comparison operations
        BuiltinOp {
            id: ">",
            op_kind: OpKind::Function(builtin_gt),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<",
            op_kind: OpKind::Function(builtin_lt),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "=",
            op_kind: OpKind::Function(builtin_eq),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: ">=",
            op_kind: OpKind::Function(builtin_ge),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<=",
            op_kind: OpKind::Function(builtin_le),
            arity: Arity::Exact(2),
        },
        // Special forms
        BuiltinOp {
            id: "setq",
            op_kind: OpKind::SpecialForm(eval_setq),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "print",
            op_kind: OpKind::SpecialForm(eval_print),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "defun",
            op_kind: OpKind::SpecialForm(eval_defun),
            // name, parameter list and at least one body expression
            arity: Arity::AtLeast(3),
        },
        BuiltinOp {
            id: "if",
            op_kind: OpKind::SpecialForm(eval_if),
            arity: Arity::Range(2, 3),
        },
        BuiltinOp {
            id: "while",
            op_kind: OpKind::SpecialForm(eval_while),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: "for",
            op_kind: OpKind::SpecialForm(eval_for),
            arity: Arity::Exact(4),
        },
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// All builtin operations, in registry order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by the symbol that invokes it
pub fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}
