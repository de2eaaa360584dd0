//! Grouping operators evaluated over a collection of records.

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::eval::{arithmetic, determined, malformed, ExpressionEvaluator, Scope};
use crate::expression::expr::{collect_operands, Expression, Operand};
use crate::expression::operator::Operator;
use crate::value::{Evaluation, Record, Value};
use std::cmp::Ordering;

/// Running state of a `min`, `max` or `sum` scan
#[derive(Debug, Clone)]
struct AggregateState {
    function: Operator,
    current: Option<Value>,
}

impl AggregateState {
    fn new(function: Operator) -> Self {
        Self {
            function,
            current: None,
        }
    }

    /// Fold one element into the state. Null elements are skipped.
    fn update(&mut self, value: Value) -> ExpressionResult<()> {
        if value.is_null() {
            return Ok(());
        }
        let current = match self.current.take() {
            None => {
                if self.function == Operator::Sum && value.as_f64().is_none() {
                    return Err(ExpressionError::unsupported("sum", &value));
                }
                self.current = Some(value);
                return Ok(());
            }
            Some(current) => current,
        };
        self.current = Some(match self.function {
            Operator::Sum => arithmetic(Operator::Add, current, value).map_err(|e| match e {
                ExpressionError::UnsupportedOperandType { actual, .. } => {
                    ExpressionError::UnsupportedOperandType {
                        operator: "sum",
                        actual,
                    }
                }
                other => other,
            })?,
            function => {
                let ordering = value.compare(&current).ok_or_else(|| {
                    ExpressionError::unsupported(function.as_str(), &value)
                })?;
                let replace = match function {
                    Operator::Min => ordering == Ordering::Less,
                    _ => ordering == Ordering::Greater,
                };
                if replace {
                    value
                } else {
                    current
                }
            }
        });
        Ok(())
    }

    fn finalize(self) -> Value {
        self.current.unwrap_or(Value::Null)
    }
}

impl Expression {
    /// Smallest non-null value over the collection
    pub fn min(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::Min, vec![Operand::autofield(expr)])
    }

    /// Largest non-null value over the collection
    pub fn max(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::Max, vec![Operand::autofield(expr)])
    }

    /// Sum over the collection, treating null as zero
    pub fn sum(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::Sum, vec![Operand::autofield(expr)])
    }

    /// De-duplicated tuples of `exprs` evaluated against every record
    pub fn distinct<I>(exprs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        let operands = collect_operands(exprs)
            .into_iter()
            .map(Operand::autofield)
            .collect();
        Self::build(Operator::Distinct, operands)
    }
}

impl<'a> ExpressionEvaluator<'a> {
    pub(crate) fn eval_aggregate(
        &self,
        expr: &Expression,
        scope: Option<Scope<'a>>,
        depth: usize,
    ) -> ExpressionResult<Evaluation> {
        let rows = determined!(scope).rows();

        if expr.operator() == Operator::Distinct {
            let mut tuples: Vec<Value> = Vec::new();
            for row in rows {
                let mut tuple = Vec::with_capacity(expr.operands().len());
                for operand in expr.operands() {
                    tuple.push(determined!(self.eval_operand(operand, Some(Scope::Row(row)), depth)?));
                }
                let tuple = Value::List(tuple);
                if !tuples.iter().any(|seen| seen.loose_eq(&tuple)) {
                    tuples.push(tuple);
                }
            }
            return Ok(Some(Value::List(tuples)));
        }

        let [target] = expr.operands() else {
            return Err(malformed(expr));
        };
        let mut state = AggregateState::new(expr.operator());
        for row in rows {
            let value = determined!(self.eval_operand(target, Some(Scope::Row(row)), depth)?);
            state.update(value)?;
        }
        Ok(Some(state.finalize()))
    }
}

/// Distinct values of one field over a collection, in first-occurrence order.
/// A record without the field contributes Null.
pub fn distinct_val(rows: Option<&[Record]>, field: &str) -> Option<Vec<Value>> {
    let rows = rows?;
    let mut seen: Vec<Value> = Vec::new();
    for row in rows {
        let value = row.get(field).cloned().unwrap_or(Value::Null);
        if !seen.iter().any(|v| v.loose_eq(&value)) {
            seen.push(value);
        }
    }
    Some(seen)
}

/// Distinct records of a collection, in first-occurrence order
pub fn distinct_rows(rows: Option<&[Record]>) -> Option<Vec<Record>> {
    let rows = rows?;
    let mut seen: Vec<Record> = Vec::new();
    for row in rows {
        if !seen.contains(row) {
            seen.push(row.clone());
        }
    }
    Some(seen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[Option<i64>]) -> Vec<Record> {
        values
            .iter()
            .map(|v| {
                let mut r = Record::new();
                r.insert("x".to_string(), Value::from(*v));
                r
            })
            .collect()
    }

    #[test]
    fn test_sum_skips_nulls() -> anyhow::Result<()> {
        let data = rows(&[Some(1), None, Some(3)]);
        let expr = Expression::sum("x");
        assert!(expr.is_grouping());
        assert_eq!(expr.evaluate_rows(Some(&data), None)?, Some(Value::Int(4)));
        assert_eq!(expr.evaluate_rows(Some(&rows(&[None])), None)?, Some(Value::Null));
        assert_eq!(expr.evaluate_rows(Some(&[]), None)?, Some(Value::Null));
        assert_eq!(expr.evaluate_rows(None, None)?, None);
        Ok(())
    }

    #[test]
    fn test_aggregate_indeterminate_element() -> anyhow::Result<()> {
        let data = rows(&[Some(1), Some(2)]);
        let expr = Expression::sum(Expression::add([
            Operand::from(Expression::field("x")),
            Operand::from(Expression::context("bonus")),
        ]));
        assert_eq!(expr.evaluate_rows(Some(&data), None)?, None);
        Ok(())
    }

    #[test]
    fn test_min_max() -> anyhow::Result<()> {
        let data = rows(&[Some(4), None, Some(-2), Some(9)]);
        assert_eq!(Expression::min("x").evaluate_rows(Some(&data), None)?, Some(Value::Int(-2)));
        assert_eq!(Expression::max("x").evaluate_rows(Some(&data), None)?, Some(Value::Int(9)));
        assert_eq!(
            Expression::max("x").evaluate_rows(Some(&rows(&[None, None])), None)?,
            Some(Value::Null)
        );
        Ok(())
    }

    #[test]
    fn test_single_record_is_a_collection_of_one() -> anyhow::Result<()> {
        let data = rows(&[Some(7)]);
        assert_eq!(Expression::sum("x").evaluate(Some(&data[0]), None)?, Some(Value::Int(7)));
        Ok(())
    }

    #[test]
    fn test_grouping_inside_scalar_node() -> anyhow::Result<()> {
        let data = rows(&[Some(2), Some(4), Some(6)]);
        let expr = Expression::div(Expression::sum("x"), Expression::max("x"));
        assert_eq!(expr.evaluate_rows(Some(&data), None)?, Some(Value::Int(2)));
        Ok(())
    }

    #[test]
    fn test_incomparable_elements() {
        let mut data = rows(&[Some(1)]);
        let mut r = Record::new();
        r.insert("x".to_string(), Value::from("text"));
        data.push(r);
        assert!(matches!(
            Expression::max("x").evaluate_rows(Some(&data), None),
            Err(ExpressionError::UnsupportedOperandType { operator: "max", .. })
        ));
        assert!(matches!(
            Expression::sum("x").evaluate_rows(Some(&data), None),
            Err(ExpressionError::UnsupportedOperandType { operator: "sum", .. })
        ));
    }

    #[test]
    fn test_distinct() -> anyhow::Result<()> {
        let data = rows(&[Some(1), Some(2), Some(1), None]);
        let expr = Expression::distinct(["x"]);
        let expected = Value::List(vec![
            Value::List(vec![Value::Int(1)]),
            Value::List(vec![Value::Int(2)]),
            Value::List(vec![Value::Null]),
        ]);
        assert_eq!(expr.evaluate_rows(Some(&data), None)?, Some(expected));
        Ok(())
    }

    #[test]
    fn test_distinct_helpers() {
        let data = rows(&[Some(3), Some(3), None, Some(5)]);
        assert_eq!(
            distinct_val(Some(&data), "x"),
            Some(vec![Value::Int(3), Value::Null, Value::Int(5)])
        );
        assert_eq!(distinct_val(None, "x"), None);
        assert_eq!(distinct_rows(Some(&data)).map(|r| r.len()), Some(3));
        assert_eq!(distinct_rows(None), None);
    }
}
