/// Limits applied while evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// The deepest chain of nested function calls before evaluation fails
    /// with [`EvalError::RecursionLimit`](crate::EvalError::RecursionLimit).
    ///
    /// Recursive inline functions (`$f($f, $n - 1)`) hit this first. Raising
    /// it trades protection against runaway recursion for stack usage.
    ///
    /// Defaults to `256`.
    pub max_depth: usize,
    /// The largest `a to b` range that is materialized.
    ///
    /// Defaults to `10_000_000`.
    pub max_range_len: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_range_len: 10_000_000,
        }
    }
}
