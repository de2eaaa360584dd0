//! Query-language rendering of compiled expressions.
//!
//! The compiler walks an expression tree and hands every node's already
//! compiled operands to a [`Formatter`], which decides the concrete syntax.
//! Formatter output is never inspected by the compiler.

pub mod sql;

pub use sql::SqlFormatter;

use crate::value::Value;

/// Dialect-specific rendering of expression nodes.
///
/// Methods see compiled fragments only. Dispatch from node to method lives in
/// `ExpressionCompiler`, which also substitutes `context` variables with
/// quoted literals before any fragment reaches the formatter, so no method
/// takes the environment.
pub trait Formatter {
    /// Render a literal
    fn quote(&self, value: &Value) -> String;
    /// Render a field reference, optionally qualified by a table alias
    fn field(&self, name: &str, table: Option<&str>) -> String;
    /// Name a fragment in a select list
    fn alias(&self, fragment: &str, alias: &str) -> String;
    /// Enclose a condition used as an operand of another operator
    fn group(&self, fragment: &str) -> String;

    fn join_and(&self, parts: &[String]) -> String;
    fn join_or(&self, parts: &[String]) -> String;

    fn eq(&self, left: &str, right: &str) -> String;
    fn ne(&self, left: &str, right: &str) -> String;
    fn lt(&self, left: &str, right: &str) -> String;
    fn le(&self, left: &str, right: &str) -> String;
    fn gt(&self, left: &str, right: &str) -> String;
    fn ge(&self, left: &str, right: &str) -> String;

    fn is_null(&self, expr: &str) -> String;
    fn is_not_null(&self, expr: &str) -> String;
    fn not(&self, expr: &str) -> String;
    fn minus(&self, expr: &str) -> String;
    fn bitwise_not(&self, expr: &str) -> String;

    fn bit_set(&self, expr: &str, bit: &str) -> String;
    fn bit_clear(&self, expr: &str, bit: &str) -> String;
    fn test_mask(&self, expr: &str, mask: &str, val: &str) -> String;
    fn between(&self, expr: &str, min: &str, max: &str) -> String;
    fn like(&self, expr: &str, mask: &str) -> String;
    /// `list` is the output of [`Formatter::list`] or another compiled operand
    fn is_in(&self, expr: &str, list: &str) -> String;

    fn coalesce(&self, parts: &[String]) -> String;
    fn add(&self, parts: &[String]) -> String;
    fn mul(&self, parts: &[String]) -> String;
    fn sub(&self, left: &str, right: &str) -> String;
    fn div(&self, left: &str, right: &str) -> String;
    fn modulus(&self, left: &str, right: &str) -> String;
    fn concat(&self, parts: &[String]) -> String;

    fn bitwise_and(&self, parts: &[String]) -> String;
    fn bitwise_or(&self, parts: &[String]) -> String;
    fn bitwise_xor(&self, parts: &[String]) -> String;

    fn substring(&self, expr: &str, start: &str, len: &str) -> String;
    fn convert_to_int(&self, expr: &str) -> String;
    /// `max_len` is the quoted Null literal when there is no length limit
    fn convert_to_string(&self, expr: &str, max_len: &str) -> String;

    fn list(&self, parts: &[String]) -> String;

    fn min(&self, expr: &str) -> String;
    fn max(&self, expr: &str) -> String;
    fn sum(&self, expr: &str) -> String;
    fn distinct(&self, parts: &[String]) -> String;
}
