//! Error types for building, evaluating and decoding expressions.

use thiserror::Error;

/// Errors that can occur while working with expression trees.
///
/// Missing data never produces an error: it shows up as Null or as an
/// indeterminate evaluation instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Operand type with no meaningful interpretation for the operator
    #[error("Unsupported operand type for {operator}: {actual}")]
    UnsupportedOperandType {
        operator: &'static str,
        actual: String,
    },

    /// Integer division or modulus by zero
    #[error("Division by zero in {operator}")]
    DivisionByZero { operator: &'static str },

    /// Integer arithmetic overflowed
    #[error("Arithmetic overflow in {operator}")]
    ArithmeticOverflow { operator: &'static str },

    /// Combinator called with arguments it cannot accept
    #[error("Invalid arguments for {operator}: {reason}")]
    InvalidArguments {
        operator: &'static str,
        reason: String,
    },

    /// Serialized tree does not have a recognized shape
    #[error("Malformed expression tree: {0}")]
    MalformedTree(String),

    /// Serialized tree names an operator the registry does not know
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Tree nesting exceeds the configured limit
    #[error("Expression depth exceeds maximum of {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// Document that cannot be turned into a value or record
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl ExpressionError {
    pub(crate) fn unsupported(operator: &'static str, actual: &crate::value::Value) -> Self {
        ExpressionError::UnsupportedOperandType {
            operator,
            actual: actual.type_name().to_string(),
        }
    }
}

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_error_display() {
        let err = ExpressionError::unsupported("minus", &Value::String("x".to_string()));
        assert_eq!(err.to_string(), "Unsupported operand type for minus: string");

        let err = ExpressionError::DivisionByZero { operator: "div" };
        assert_eq!(err.to_string(), "Division by zero in div");

        let err = ExpressionError::InvalidArguments {
            operator: "mcmp",
            reason: "2 keys but 3 values".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid arguments for mcmp: 2 keys but 3 values");

        let err = ExpressionError::UnknownOperator("frobnicate".to_string());
        assert_eq!(err.to_string(), "Unknown operator: frobnicate");

        let err = ExpressionError::DepthExceeded { max_depth: 8 };
        assert_eq!(err.to_string(), "Expression depth exceeds maximum of 8");
    }
}
