//! Expression algebra for filtering and projecting records.
//!
//! This module provides:
//! - Expression tree nodes built by combinators, with constant folding
//! - Three-valued evaluation against records and collections of records
//! - Compilation into query-language text through a formatter
//! - Multi-field matchers and grouping operators

pub mod aggregate;
pub mod compile;
pub mod error;
pub mod eval;
pub mod expr;
pub mod matcher;
pub mod operator;

pub use aggregate::{distinct_rows, distinct_val};
pub use compile::ExpressionCompiler;
pub use error::{ExpressionError, ExpressionResult};
pub use eval::{
    evaluate_expression, expression_to_predicate, EvaluatorConfig, ExpressionEvaluator,
    Predicate, Scope, DEFAULT_MAX_DEPTH,
};
pub use expr::{Expression, Operand};
pub use matcher::McmpValues;
pub use operator::{Arity, Operator};
