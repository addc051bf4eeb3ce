//! Evaluator contract
//!
//! Value trees may reference other parts of the tree. Resolving those
//! references is delegated to an [`Evaluator`]; the compiler only decides
//! when to call it and with which scope.

use crate::values::Values;

/// Error type returned by evaluators
pub type EvalError = Box<dyn std::error::Error + Send + Sync>;

/// What the evaluator is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalScope {
    /// A single value file in isolation; references that can't be resolved
    /// yet are left untouched
    Fragment,

    /// The fully merged tree; every reference must resolve
    Merged,
}

/// Transform applied to a parsed value tree
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, tree: Values, scope: EvalScope) -> Result<Values, EvalError>;

    /// Evaluate `tree` with `context` merged underneath it
    ///
    /// The result is `context` with the evaluated `tree` merged over it.
    /// Implementations that can tell the two apart should only render
    /// strings coming from `tree`.
    fn evaluate_with(
        &self,
        tree: Values,
        context: &Values,
        scope: EvalScope,
    ) -> Result<Values, EvalError> {
        let mut merged = context.clone();
        merged.merge(&tree);
        self.evaluate(merged, scope)
    }
}

/// Evaluator that returns the tree unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEvaluator;

impl Evaluator for PassthroughEvaluator {
    fn evaluate(&self, tree: Values, _scope: EvalScope) -> Result<Values, EvalError> {
        Ok(tree)
    }
}
