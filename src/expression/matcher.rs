//! Multi-field matchers: compare several fields of a record at once.

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::eval::{determined, malformed, ExpressionEvaluator, Scope};
use crate::expression::expr::{Expression, Operand};
use crate::expression::operator::Operator;
use crate::value::{Evaluation, Record, Value};

/// Values an `mcmp` matcher compares the keys against
#[derive(Debug, Clone)]
pub enum McmpValues {
    /// One operand per key, in key order
    Positional(Vec<Operand>),
    /// Values picked from a record by key name
    Keyed(Record),
}

fn field_for(key: &str, table: Option<&str>) -> Expression {
    match table {
        Some(table) => Expression::qualified_field(key, table),
        None => Expression::field(key),
    }
}

impl Expression {
    /// Match every key of the evaluated record against the corresponding
    /// value.
    ///
    /// No keys at all gives an always-true node. A value that is already
    /// known to be null (or missing from a keyed record) can never match and
    /// gives an always-false node.
    pub fn mcmp<S: AsRef<str>>(
        keys: &[S],
        values: McmpValues,
        table: Option<&str>,
    ) -> ExpressionResult<Expression> {
        if keys.is_empty() {
            return Ok(Expression::constant(true));
        }
        let picked: Vec<Operand> = match values {
            McmpValues::Positional(values) => {
                if values.len() != keys.len() {
                    return Err(ExpressionError::InvalidArguments {
                        operator: "mcmp",
                        reason: format!("{} keys but {} values", keys.len(), values.len()),
                    });
                }
                values
            }
            McmpValues::Keyed(record) => keys
                .iter()
                .map(|k| Operand::Value(record.get(k.as_ref()).cloned().unwrap_or(Value::Null)))
                .collect(),
        };
        if picked.iter().any(|v| matches!(v.literal(), Some(Value::Null))) {
            return Ok(Expression::constant(false));
        }

        let mut operands = vec![
            Operand::List(
                keys.iter()
                    .map(|k| Operand::Value(Value::from(k.as_ref())))
                    .collect(),
            ),
            Operand::List(picked),
        ];
        if let Some(table) = table {
            operands.push(Operand::Value(Value::from(table)));
        }
        Ok(Expression::build(Operator::Mcmp, operands))
    }

    /// Equality on every field of `example`. Null or empty example values
    /// become `isNull` tests.
    ///
    /// Tests are conjoined in iteration order: a [`Record`] yields its keys
    /// sorted, a sequence of pairs keeps its own order.
    pub fn mcmp_eq<'v, I, K>(example: I, table: Option<&str>) -> Expression
    where
        I: IntoIterator<Item = (K, &'v Value)>,
        K: AsRef<str>,
    {
        Expression::and(example.into_iter().map(|(key, value)| {
            let field = field_for(key.as_ref(), table);
            if is_blank(value) {
                Expression::is_null(field)
            } else {
                Expression::eq(field, value.clone())
            }
        }))
    }

    /// Like [`Expression::mcmp_eq`], but string values become `like` masks and
    /// null or empty values are left out.
    pub fn mcmp_like<'v, I, K>(example: I, table: Option<&str>) -> Expression
    where
        I: IntoIterator<Item = (K, &'v Value)>,
        K: AsRef<str>,
    {
        Expression::and(
            example
                .into_iter()
                .filter(|(_, value)| !is_blank(value))
                .map(|(key, value)| {
                    let field = field_for(key.as_ref(), table);
                    match value {
                        Value::String(_) => Expression::like(field, value.clone()),
                        _ => Expression::eq(field, value.clone()),
                    }
                }),
        )
    }

    /// Keys, value operands and table of an `mcmp` node
    pub(crate) fn mcmp_parts(&self) -> Option<(Vec<&str>, &[Operand], Option<&str>)> {
        if self.operator() != Operator::Mcmp {
            return None;
        }
        let (keys, values, table) = match self.operands() {
            [Operand::List(keys), Operand::List(values)] => (keys, values, None),
            [Operand::List(keys), Operand::List(values), table] => (keys, values, Some(table)),
            _ => return None,
        };
        let keys = keys
            .iter()
            .map(|k| k.literal().and_then(Value::as_str))
            .collect::<Option<Vec<_>>>()?;
        let table = table.and_then(Operand::literal).and_then(Value::as_str);
        Some((keys, values.as_slice(), table))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

impl<'a> ExpressionEvaluator<'a> {
    pub(crate) fn eval_mcmp(
        &self,
        expr: &Expression,
        scope: Option<Scope<'a>>,
        depth: usize,
    ) -> ExpressionResult<Evaluation> {
        let (keys, values, _) = expr.mcmp_parts().ok_or_else(|| malformed(expr))?;
        let record = match determined!(scope) {
            Scope::Row(record) => record,
            Scope::Rows(_) => return Ok(Some(Value::Boolean(false))),
        };
        for (key, operand) in keys.iter().zip(values) {
            let actual = match record.get(*key) {
                None | Some(Value::Null) => return Ok(Some(Value::Boolean(false))),
                Some(actual) => actual,
            };
            let expected = match self.eval_operand(operand, scope, depth)? {
                None | Some(Value::Null) => return Ok(Some(Value::Boolean(false))),
                Some(expected) => expected,
            };
            if !actual.loose_eq(&expected) {
                return Ok(Some(Value::Boolean(false)));
            }
        }
        Ok(Some(Value::Boolean(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_mcmp_positional() -> anyhow::Result<()> {
        let expr = Expression::mcmp(
            &["a", "b"],
            McmpValues::Positional(vec![Operand::from(1), Operand::from("x")]),
            None,
        )?;
        let hit = record(&[("a", Value::Int(1)), ("b", Value::from("x"))]);
        let miss = record(&[("a", Value::Int(1)), ("b", Value::from("y"))]);
        let null_side = record(&[("a", Value::Int(1)), ("b", Value::Null)]);

        assert_eq!(expr.evaluate(Some(&hit), None)?, Some(Value::Boolean(true)));
        assert_eq!(expr.evaluate(Some(&miss), None)?, Some(Value::Boolean(false)));
        assert_eq!(expr.evaluate(Some(&null_side), None)?, Some(Value::Boolean(false)));
        assert_eq!(expr.evaluate(None, None)?, None);
        Ok(())
    }

    #[test]
    fn test_mcmp_value_expressions_see_the_record() -> anyhow::Result<()> {
        let expr = Expression::mcmp(
            &["a"],
            McmpValues::Positional(vec![Operand::from(Expression::field("b"))]),
            None,
        )?;
        let same = record(&[("a", Value::Int(3)), ("b", Value::Int(3))]);
        let other = record(&[("a", Value::Int(3)), ("b", Value::Int(4))]);
        assert_eq!(expr.evaluate(Some(&same), None)?, Some(Value::Boolean(true)));
        assert_eq!(expr.evaluate(Some(&other), None)?, Some(Value::Boolean(false)));
        Ok(())
    }

    #[test]
    fn test_mcmp_keyed_and_folding() -> anyhow::Result<()> {
        let source = record(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let expr = Expression::mcmp(&["a", "b"], McmpValues::Keyed(source.clone()), Some("T"))?;
        assert_eq!(expr.operator(), Operator::Mcmp);
        assert_eq!(expr.evaluate(Some(&source), None)?, Some(Value::Boolean(true)));

        let expr = Expression::mcmp(&["a", "zz"], McmpValues::Keyed(source), None)?;
        assert!(expr.is_always_false());

        let keys: [&str; 0] = [];
        let expr = Expression::mcmp(&keys, McmpValues::Positional(vec![]), None)?;
        assert!(expr.is_always_true());
        Ok(())
    }

    #[test]
    fn test_mcmp_arity_mismatch() {
        let result = Expression::mcmp(
            &["a", "b"],
            McmpValues::Positional(vec![Operand::from(1)]),
            None,
        );
        assert!(matches!(
            result,
            Err(ExpressionError::InvalidArguments { operator: "mcmp", .. })
        ));
    }

    #[test]
    fn test_mcmp_dates_by_instant() -> anyhow::Result<()> {
        let d = Utc.with_ymd_and_hms(2023, 7, 1, 8, 30, 0).unwrap();
        let expr = Expression::mcmp(&["d"], McmpValues::Positional(vec![Operand::from(d)]), None)?;
        let r = record(&[("d", Value::Date(d))]);
        assert_eq!(expr.evaluate(Some(&r), None)?, Some(Value::Boolean(true)));
        Ok(())
    }

    #[test]
    fn test_mcmp_eq() -> anyhow::Result<()> {
        let example = record(&[("a", Value::Int(1)), ("b", Value::Null)]);
        let expr = Expression::mcmp_eq(&example, Some("T"));
        assert_eq!(expr.operator(), Operator::And);
        assert_eq!(expr.operands().len(), 2);

        assert_eq!(expr.evaluate(Some(&example), None)?, Some(Value::Boolean(true)));
        let other = record(&[("a", Value::Int(1)), ("b", Value::Int(5))]);
        assert_eq!(expr.evaluate(Some(&other), None)?, Some(Value::Boolean(false)));
        Ok(())
    }

    #[test]
    fn test_mcmp_like() -> anyhow::Result<()> {
        let example = record(&[
            ("name", Value::from("Jo%")),
            ("skip", Value::from("")),
            ("age", Value::Int(30)),
        ]);
        let expr = Expression::mcmp_like(&example, None);
        assert_eq!(expr.operands().len(), 2);

        let r = record(&[("name", Value::from("John")), ("age", Value::Int(30))]);
        assert_eq!(expr.evaluate(Some(&r), None)?, Some(Value::Boolean(true)));
        let r = record(&[("name", Value::from("Ann")), ("age", Value::Int(30))]);
        assert_eq!(expr.evaluate(Some(&r), None)?, Some(Value::Boolean(false)));

        assert!(Expression::mcmp_like(&Record::new(), None).is_always_true());
        Ok(())
    }
}
