//! RAII guard for one user function call.
//!
//! Entering a call bumps the recursion counter and pushes the call scope;
//! dropping the guard undoes both. Errors propagated with `?` out of a
//! function body therefore always leave the environment as it was before
//! the call.

use std::ops::{Deref, DerefMut};

use super::Evaluator;
use crate::Error;
use crate::environment::CallScope;

/// An active function call. Derefs to the evaluator so the body runs through it.
pub(crate) struct CallFrame<'frame, 'env> {
    evaluator: &'frame mut Evaluator<'env>,
}

impl<'frame, 'env> CallFrame<'frame, 'env> {
    /// Fails without touching the scope stack if the recursion limit is reached
    pub(crate) fn enter(
        evaluator: &'frame mut Evaluator<'env>,
        call_scope: CallScope,
    ) -> Result<Self, Error> {
        evaluator.env.enter_recursion()?;
        evaluator.env.push_call_scope(call_scope);
        Ok(CallFrame { evaluator })
    }
}

impl Drop for CallFrame<'_, '_> {
    fn drop(&mut self) {
        self.evaluator.env.pop_scope();
        self.evaluator.env.exit_recursion();
    }
}

impl<'env> Deref for CallFrame<'_, 'env> {
    type Target = Evaluator<'env>;

    fn deref(&self) -> &Self::Target {
        self.evaluator
    }
}

impl DerefMut for CallFrame<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.evaluator
    }
}
