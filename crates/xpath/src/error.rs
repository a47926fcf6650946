use thiserror::Error;

/// A failure raised while evaluating an expression.
///
/// Evaluation errors are values: they travel through the evaluator as
/// [`Item::Error`](crate::Item::Error) and every operator hands an error
/// operand back unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Function '{function}' called with {got} arguments, expected {expected}")]
    ArityMismatch {
        function: String,
        got: usize,
        expected: String,
    },

    #[error("Cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("Variable '${name}' not found")]
    UndefinedVariable { name: String },

    #[error("Function '{name}#{arity}' not found")]
    UndefinedFunction { name: String, arity: usize },

    #[error("Context item is required but not set")]
    UndefinedContext,

    #[error("Index {index} out of bounds (size: {size})")]
    IndexOutOfRange { index: i64, size: usize },

    #[error("Value of type {type_name} is not callable")]
    NotCallable { type_name: String },

    #[error("Cardinality error: expected {expected}, got {actual} items")]
    Cardinality { expected: String, actual: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow in '{op}'")]
    Overflow { op: String },

    #[error("Cannot cast {from_type} to {to_type}")]
    InvalidCast { from_type: String, to_type: String },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid qualified name '{0}'")]
    InvalidName(String),

    #[error("Duplicate map key {0}")]
    DuplicateKey(String),

    #[error("Range of {length} items exceeds the limit of {limit}")]
    RangeTooLarge { length: u64, limit: usize },

    #[error("Call depth limit of {0} exceeded")]
    RecursionLimit(usize),

    #[error("{code}: {message}")]
    User { code: String, message: String },
}

impl EvalError {
    pub fn arity(function: impl Into<String>, got: usize, expected: impl Into<String>) -> Self {
        Self::ArityMismatch {
            function: function.into(),
            got,
            expected: expected.into(),
        }
    }

    pub fn mismatch(op: impl Into<String>, left: &str, right: &str) -> Self {
        Self::TypeMismatch {
            op: op.into(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn cardinality(expected: impl Into<String>, actual: usize) -> Self {
        Self::Cardinality {
            expected: expected.into(),
            actual,
        }
    }

    pub fn cast(from_type: &str, to_type: &str) -> Self {
        Self::InvalidCast {
            from_type: from_type.to_string(),
            to_type: to_type.to_string(),
        }
    }
}

/// One syntax problem found while parsing. Parsing continues after it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, got '{got}' at offset {offset}")]
pub struct ParseError {
    pub expected: String,
    pub got: String,
    pub offset: usize,
}

/// Top-level error for the parse-then-evaluate entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("Parse error in '{expression}': {}", join_errors(.errors))]
    Parse {
        expression: String,
        errors: Vec<ParseError>,
    },

    #[error(transparent)]
    Eval(#[from] EvalError),
}

fn join_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EvalError::arity("concat", 1, "2 or more");
        assert_eq!(
            err.to_string(),
            "Function 'concat' called with 1 arguments, expected 2 or more"
        );
        let err = EvalError::UndefinedVariable { name: "x".into() };
        assert_eq!(err.to_string(), "Variable '$x' not found");
    }

    #[test]
    fn test_parse_errors_are_joined() {
        let err = XPathError::Parse {
            expression: "1 +".into(),
            errors: vec![
                ParseError {
                    expected: "expression".into(),
                    got: "".into(),
                    offset: 3,
                },
                ParseError {
                    expected: "')'".into(),
                    got: "]".into(),
                    offset: 4,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Parse error in '1 +': expected expression, got '' at offset 3; expected ')', got ']' at offset 4"
        );
    }
}
