//! Environment for variable scoping and function storage.
//!
//! Holds one global scope, a stack of call scopes (empty at top level, where
//! the global scope is the implicit base), the function table, and the
//! recursion-depth counter that bounds interpreted calls.
//!
//! Function calls use [`Environment::push_call_scope`]. The plain
//! [`Environment::push_scope`]/[`Environment::pop_scope`] pair is for hosts
//! that want to evaluate with temporary bindings layered over the globals.

use std::collections::HashMap;
use std::sync::Arc;

use crate::lexer::Token;
use crate::value::{IntegerType, Value};
use crate::{Error, MAX_RECURSION_DEPTH};

/// How a function call scope is seeded before parameters are bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallScope {
    /// Start from a copy of the caller's innermost scope, so callees can read
    /// caller locals unless a parameter shadows them.
    #[default]
    CopyCaller,
    /// Start empty and hide caller scopes: callees see their parameters and
    /// global bindings only.
    ParametersOnly,
}

/// One frame of name-to-value bindings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    bindings: HashMap<String, Value>,
    /// Lookups stop here and fall through to the global scope
    isolated: bool,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    fn isolated() -> Self {
        Scope {
            bindings: HashMap::new(),
            isolated: true,
        }
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

/// A user-defined function: parameter names and the body's tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<String>,
    /// Every token between the parameter list and the `defun` form's closing paren
    pub body: Vec<Token>,
}

/// All mutable interpreter state for one session
#[derive(Debug, Clone)]
pub struct Environment {
    global: Scope,
    scopes: Vec<Scope>,
    functions: HashMap<String, Arc<FunctionDef>>,
    depth: usize,
    recursion_limit: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::with_recursion_limit(MAX_RECURSION_DEPTH)
    }

    pub fn with_recursion_limit(recursion_limit: usize) -> Self {
        Environment {
            global: Scope::new(),
            scopes: Vec::new(),
            functions: HashMap::new(),
            depth: 0,
            recursion_limit,
        }
    }

    /// Write into the innermost call scope, or the global scope at top level
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let scope = self.scopes.last_mut().unwrap_or(&mut self.global);
        scope.define(name.into(), value.into());
    }

    /// Look a variable up from the innermost scope outwards, then globally.
    ///
    /// An isolated scope ends the walk early; the global scope is always consulted last.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value);
            }
            if scope.isolated {
                break;
            }
        }
        self.global.get(name)
    }

    /// Integer value of a variable, or `None` if unbound or not an integer
    pub fn get_integer(&self, name: &str) -> Option<IntegerType> {
        self.lookup(name).and_then(Value::as_integer)
    }

    /// Rendered text of a variable, or `None` if unbound
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.lookup(name).map(Value::to_string)
    }

    /// Register a function, overwriting any previous definition of the same name.
    ///
    /// Parameters and body are copied, so the caller's tokens are not shared.
    pub fn define_function(&mut self, name: &str, parameters: &[String], body: &[Token]) {
        let function = FunctionDef {
            name: name.to_owned(),
            parameters: parameters.to_vec(),
            body: body.to_vec(),
        };
        self.functions.insert(name.to_owned(), Arc::new(function));
    }

    pub fn get_function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    /// Push an empty scope
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Push a copy of the innermost scope (or an empty scope at top level)
    pub fn push_function_scope(&mut self) {
        let scope = self.scopes.last().cloned().unwrap_or_default();
        self.scopes.push(Scope {
            isolated: false,
            ..scope
        });
    }

    /// Push an empty scope that hides every scope beneath it except the global one
    pub fn push_isolated_scope(&mut self) {
        self.scopes.push(Scope::isolated());
    }

    /// Push the scope a function call starts with under the given rule
    pub fn push_call_scope(&mut self, rule: CallScope) {
        match rule {
            CallScope::CopyCaller => self.push_function_scope(),
            CallScope::ParametersOnly => self.push_isolated_scope(),
        }
    }

    /// Pop the innermost scope; does nothing at top level
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Count one more active call, failing once the limit would be exceeded
    pub fn enter_recursion(&mut self) -> Result<(), Error> {
        if self.depth >= self.recursion_limit {
            return Err(Error::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit_recursion(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Number of active function calls
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of call scopes on the stack (the global scope is not counted)
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Get all visible variable bindings, sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings: HashMap<&str, &Value> = self
            .global
            .bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();

        // Innermost scopes override outer ones, up to the first isolated scope
        let visible = self
            .scopes
            .iter()
            .rposition(|scope| scope.isolated)
            .unwrap_or(0);
        for scope in &self.scopes[visible..] {
            for (name, value) in &scope.bindings {
                bindings.insert(name.as_str(), value);
            }
        }

        let mut result: Vec<_> = bindings
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Names of all defined functions, sorted
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
