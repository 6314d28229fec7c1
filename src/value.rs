//! Runtime values. A [`Value`] is either an integer or a piece of text; there
//! is no null. Conversions from common Rust types are provided so tests and
//! hosts can write `val(42)` or `val("hello")`, and [`Value::from_rendered`]
//! applies the language's typing rule: anything that reads as an integer is
//! stored as one.

use std::fmt;

/// Type alias for integer values in the interpreter
pub type IntegerType = i64;

/// Core value type in the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Signed integers
    Integer(IntegerType),
    /// Any other text, including symbols used as literals
    Text(String),
}

impl Value {
    /// Type a rendered result: integer if it parses as one, text otherwise.
    pub fn from_rendered(text: impl Into<String>) -> Value {
        let text = text.into();
        match text.parse::<IntegerType>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(text),
        }
    }

    /// Re-type this value by its rendering, so `Text("42")` becomes `Integer(42)`
    pub fn normalized(self) -> Value {
        match self {
            Value::Text(text) => Value::from_rendered(text),
            integer => integer,
        }
    }

    /// Integer view of this value, if it has one
    pub fn as_integer(&self) -> Option<IntegerType> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Text(s) => s.parse().ok(),
        }
    }

    /// Only `0` and empty text are false. Text that reads as a zero number
    /// (`"0"`, `"-0"`, `"0.0"`) is false as well.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(n) => *n != 0,
            Value::Text(s) => {
                if s.is_empty() {
                    return false;
                }
                if let Ok(n) = s.parse::<IntegerType>() {
                    return n != 0;
                }
                match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => f != 0.0,
                    _ => true,
                }
            }
        }
    }

    /// The empty text value, produced by an `if` with no taken branch
    pub fn empty() -> Value {
        Value::Text(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Integer(IntegerType::from(b))
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(IntegerType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntegerType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

/// Helper function for creating Values from Rust literals
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}
