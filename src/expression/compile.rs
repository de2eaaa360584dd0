//! Compilation of expression trees into query-language text.

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::eval::{malformed, EvaluatorConfig};
use crate::expression::expr::{Expression, Operand};
use crate::expression::operator::Operator;
use crate::formatter::Formatter;
use crate::value::{Environment, Value};
use log::warn;

/// Walks an expression tree and renders it through a [`Formatter`]
pub struct ExpressionCompiler<'a> {
    formatter: &'a dyn Formatter,
    /// Source of `context` values, substituted as literals
    environment: Option<&'a Environment>,
    config: EvaluatorConfig,
}

impl<'a> ExpressionCompiler<'a> {
    pub fn new(formatter: &'a dyn Formatter) -> Self {
        Self {
            formatter,
            environment: None,
            config: EvaluatorConfig::default(),
        }
    }

    pub fn with_environment(mut self, environment: Option<&'a Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Compile an expression into a condition or value fragment
    pub fn compile(&self, expr: &Expression) -> ExpressionResult<String> {
        self.compile_node(expr, 0)
    }

    /// Compile an expression as a select-list item, applying its alias
    pub fn compile_select(&self, expr: &Expression) -> ExpressionResult<String> {
        let fragment = self.compile(expr)?;
        Ok(match expr.output_alias() {
            Some(alias) => self.formatter.alias(&fragment, alias),
            None => fragment,
        })
    }

    /// Compile an operand of a `parent` node. Condition fragments nested
    /// under anything but a connective are grouped.
    fn compile_operand(
        &self,
        parent: Operator,
        operand: &Operand,
        depth: usize,
    ) -> ExpressionResult<String> {
        match operand {
            Operand::Expr(expr) => {
                let sql = self.compile_node(expr, depth)?;
                let connective = matches!(parent, Operator::And | Operator::Or | Operator::Not);
                if renders_condition(expr) && !connective {
                    Ok(self.formatter.group(&sql))
                } else {
                    Ok(sql)
                }
            }
            Operand::Value(value) => Ok(self.formatter.quote(value)),
            Operand::List(items) => {
                let parts = self.compile_all(Operator::List, items, depth + 1)?;
                Ok(self.formatter.list(&parts))
            }
        }
    }

    fn compile_all(
        &self,
        parent: Operator,
        operands: &[Operand],
        depth: usize,
    ) -> ExpressionResult<Vec<String>> {
        operands
            .iter()
            .map(|operand| self.compile_operand(parent, operand, depth))
            .collect()
    }

    fn compile_node(&self, expr: &Expression, depth: usize) -> ExpressionResult<String> {
        if depth > self.config.max_depth {
            warn!(
                "compilation of {} exceeds depth limit {}",
                expr.operator(),
                self.config.max_depth
            );
            return Err(ExpressionError::DepthExceeded {
                max_depth: self.config.max_depth,
            });
        }
        let f = self.formatter;
        let parts = || self.compile_all(expr.operator(), expr.operands(), depth + 1);
        let one = || -> ExpressionResult<String> {
            match parts()?.as_slice() {
                [a] => Ok(a.clone()),
                _ => Err(malformed(expr)),
            }
        };
        let two = || -> ExpressionResult<(String, String)> {
            match parts()?.as_slice() {
                [a, b] => Ok((a.clone(), b.clone())),
                _ => Err(malformed(expr)),
            }
        };
        let three = || -> ExpressionResult<(String, String, String)> {
            match parts()?.as_slice() {
                [a, b, c] => Ok((a.clone(), b.clone(), c.clone())),
                _ => Err(malformed(expr)),
            }
        };

        let sql = match expr.operator() {
            Operator::Field => {
                let (name, table) = expr.field_ref().ok_or_else(|| malformed(expr))?;
                f.field(name, table)
            }
            Operator::Context => {
                let name = expr.context_name().ok_or_else(|| malformed(expr))?;
                let value = self
                    .environment
                    .and_then(|env| env.get(name))
                    .unwrap_or(&Value::Null);
                f.quote(value)
            }
            Operator::Constant => {
                if expr.is_always_true() {
                    f.eq(&f.quote(&Value::Int(1)), &f.quote(&Value::Int(1)))
                } else if expr.is_always_false() {
                    f.eq(&f.quote(&Value::Int(1)), &f.quote(&Value::Int(0)))
                } else {
                    f.quote(expr.constant_value().unwrap_or(&Value::Null))
                }
            }

            Operator::IsNull => f.is_null(&one()?),
            Operator::IsNotNull => f.is_not_null(&one()?),
            Operator::Not => f.not(&one()?),
            Operator::Minus => f.minus(&one()?),
            Operator::BitwiseNot => f.bitwise_not(&one()?),
            Operator::ConvertToInt => f.convert_to_int(&one()?),
            Operator::Min => f.min(&one()?),
            Operator::Max => f.max(&one()?),
            Operator::Sum => f.sum(&one()?),

            Operator::BitSet => {
                let (a, b) = two()?;
                f.bit_set(&a, &b)
            }
            Operator::BitClear => {
                let (a, b) = two()?;
                f.bit_clear(&a, &b)
            }
            Operator::Like => {
                let (a, b) = two()?;
                f.like(&a, &b)
            }
            Operator::IsIn => {
                let (a, b) = two()?;
                f.is_in(&a, &b)
            }
            Operator::Eq => {
                let (a, b) = two()?;
                f.eq(&a, &b)
            }
            Operator::Ne => {
                let (a, b) = two()?;
                f.ne(&a, &b)
            }
            Operator::Lt => {
                let (a, b) = two()?;
                f.lt(&a, &b)
            }
            Operator::Le => {
                let (a, b) = two()?;
                f.le(&a, &b)
            }
            Operator::Gt => {
                let (a, b) = two()?;
                f.gt(&a, &b)
            }
            Operator::Ge => {
                let (a, b) = two()?;
                f.ge(&a, &b)
            }
            Operator::Sub => {
                let (a, b) = two()?;
                f.sub(&a, &b)
            }
            Operator::Div => {
                let (a, b) = two()?;
                f.div(&a, &b)
            }
            Operator::Modulus => {
                let (a, b) = two()?;
                f.modulus(&a, &b)
            }
            Operator::ConvertToString => {
                let (a, b) = two()?;
                f.convert_to_string(&a, &b)
            }

            Operator::TestMask => {
                let (a, b, c) = three()?;
                f.test_mask(&a, &b, &c)
            }
            Operator::Between => {
                let (a, b, c) = three()?;
                f.between(&a, &b, &c)
            }
            Operator::Substring => {
                let (a, b, c) = three()?;
                f.substring(&a, &b, &c)
            }

            Operator::And => f.join_and(&parts()?),
            Operator::Or => f.join_or(&parts()?),
            Operator::Coalesce => f.coalesce(&parts()?),
            Operator::Add => f.add(&parts()?),
            Operator::Mul => f.mul(&parts()?),
            Operator::Concat => f.concat(&parts()?),
            Operator::BitwiseAnd => f.bitwise_and(&parts()?),
            Operator::BitwiseOr => f.bitwise_or(&parts()?),
            Operator::BitwiseXor => f.bitwise_xor(&parts()?),
            Operator::List => f.list(&parts()?),
            Operator::Distinct => f.distinct(&parts()?),

            Operator::Mcmp => {
                let (keys, values, table) = expr.mcmp_parts().ok_or_else(|| malformed(expr))?;
                let mut tests = Vec::with_capacity(keys.len());
                for (key, value) in keys.iter().zip(values) {
                    let value = self.compile_operand(Operator::Eq, value, depth + 1)?;
                    tests.push(f.eq(&f.field(key, table), &value));
                }
                f.join_and(&tests)
            }
        };
        Ok(sql)
    }
}

/// Whether the node compiles to a bare condition that binds looser than an
/// operand position
fn renders_condition(expr: &Expression) -> bool {
    match expr.operator() {
        Operator::Eq
        | Operator::Ne
        | Operator::Lt
        | Operator::Le
        | Operator::Gt
        | Operator::Ge
        | Operator::IsNull
        | Operator::IsNotNull
        | Operator::Between
        | Operator::Like
        | Operator::IsIn
        | Operator::And
        | Operator::Or
        | Operator::Mcmp => true,
        Operator::Constant => expr.is_always_true() || expr.is_always_false(),
        _ => false,
    }
}

impl Expression {
    /// Compile through `formatter`, substituting `context` variables from
    /// `environment`
    pub fn to_sql(
        &self,
        formatter: &dyn Formatter,
        environment: Option<&Environment>,
    ) -> ExpressionResult<String> {
        ExpressionCompiler::new(formatter)
            .with_environment(environment)
            .compile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::matcher::McmpValues;
    use crate::formatter::SqlFormatter;
    use crate::value::Record;

    fn sql(expr: &Expression) -> String {
        expr.to_sql(&SqlFormatter, None).unwrap()
    }

    #[test]
    fn test_constants() {
        assert_eq!(sql(&Expression::constant(true)), "1 = 1");
        assert_eq!(sql(&Expression::constant(false)), "1 = 0");
        assert_eq!(sql(&Expression::constant("x")), "'x'");
        assert_eq!(sql(&Expression::and(Vec::<Expression>::new())), "1 = 1");
    }

    #[test]
    fn test_predicates() {
        let expr = Expression::and([
            Expression::eq(Expression::qualified_field("a", "T"), 5),
            Expression::like("name", "J%"),
            Expression::is_in("kind", vec![1, 2]),
        ]);
        assert_eq!(sql(&expr), "(T.a = 5 AND name LIKE 'J%' AND kind IN (1, 2))");

        let expr = Expression::or([Expression::is_null("x"), Expression::between("x", 1, 9)]);
        assert_eq!(sql(&expr), "(x IS NULL OR x BETWEEN 1 AND 9)");

        assert_eq!(sql(&Expression::is_not_in("k", vec!["a"])), "NOT (k IN ('a'))");
        assert_eq!(sql(&Expression::bit_set("flags", 3)), "((flags & POWER(2, 3)) <> 0)");
    }

    #[test]
    fn test_arithmetic_and_strings() {
        let expr = Expression::mul([
            Operand::from(Expression::sub("a", Expression::field("b"))),
            Operand::from(2),
        ]);
        assert_eq!(sql(&expr), "((a - b) * 2)");

        let expr = Expression::concat([Operand::from(Expression::field("first")), Operand::from(" "), Operand::from(Expression::field("last"))]);
        assert_eq!(sql(&expr), "CONCAT(first, ' ', last)");

        assert_eq!(sql(&Expression::substring("s", 1, 3)), "SUBSTRING(s, 1, 3)");
        assert_eq!(sql(&Expression::convert_to_string("n", 10)), "CAST(n AS VARCHAR(10))");
        assert_eq!(
            sql(&Expression::convert_to_string("n", Value::Null)),
            "CAST(n AS VARCHAR)"
        );
    }

    #[test]
    fn test_nested_conditions_are_grouped() {
        let expr = Expression::eq(Expression::field("flag"), Expression::constant(false));
        assert_eq!(sql(&expr), "flag = (1 = 0)");

        let expr = Expression::eq(Expression::is_null("a"), Expression::is_null("b"));
        assert_eq!(sql(&expr), "(a IS NULL) = (b IS NULL)");

        let expr = Expression::ne(Expression::lt("a", 1), Expression::field("b"));
        assert_eq!(sql(&expr), "(a < 1) <> b");

        let expr = Expression::coalesce([Expression::between("x", 1, 2), Expression::field("y")]);
        assert_eq!(sql(&expr), "COALESCE((x BETWEEN 1 AND 2), y)");

        let expr = Expression::eq(
            Expression::or([Expression::eq("a", 1), Expression::eq("b", 2)]),
            Expression::constant(true),
        );
        assert_eq!(sql(&expr), "(a = 1 OR b = 2) = (1 = 1)");

        // Connectives take their conditions as they are
        let expr = Expression::not(Expression::like("name", "J%"));
        assert_eq!(sql(&expr), "NOT (name LIKE 'J%')");
    }

    #[test]
    fn test_context_substitution() {
        let mut env = Record::new();
        env.insert("user".to_string(), Value::from("ann"));
        let expr = Expression::eq("owner", Expression::context("user"));
        assert_eq!(expr.to_sql(&SqlFormatter, Some(&env)).unwrap(), "owner = 'ann'");
        assert_eq!(expr.to_sql(&SqlFormatter, None).unwrap(), "owner = NULL");
    }

    #[test]
    fn test_mcmp_and_mcmp_eq() -> anyhow::Result<()> {
        let mut example = Record::new();
        example.insert("a".to_string(), Value::Int(1));
        example.insert("b".to_string(), Value::Null);
        assert_eq!(sql(&Expression::mcmp_eq(&example, Some("T"))), "(T.a = 1 AND T.b IS NULL)");

        // Pairs keep their order, a record is visited in key order
        let (one, two) = (Value::Int(1), Value::Int(2));
        let ordered = Expression::mcmp_eq([("b", &two), ("a", &one)], Some("T"));
        assert_eq!(sql(&ordered), "(T.b = 2 AND T.a = 1)");
        let keyed: Record = [("b".to_string(), two.clone()), ("a".to_string(), one.clone())]
            .into_iter()
            .collect();
        assert_eq!(sql(&Expression::mcmp_eq(&keyed, Some("T"))), "(T.a = 1 AND T.b = 2)");

        let expr = Expression::mcmp(
            &["x", "y"],
            McmpValues::Positional(vec![Operand::from(1), Operand::from("q")]),
            Some("R"),
        )?;
        assert_eq!(sql(&expr), "(R.x = 1 AND R.y = 'q')");
        Ok(())
    }

    #[test]
    fn test_grouping_select() -> anyhow::Result<()> {
        let compiler = ExpressionCompiler::new(&SqlFormatter);
        let expr = Expression::sum("amount").alias("total");
        assert_eq!(compiler.compile_select(&expr)?, "SUM(amount) AS total");
        assert_eq!(compiler.compile(&expr)?, "SUM(amount)");
        assert_eq!(
            compiler.compile(&Expression::distinct(["a", "b"]))?,
            "DISTINCT a, b"
        );
        Ok(())
    }

    #[test]
    fn test_depth_limit() {
        let mut expr = Expression::field("a");
        for _ in 0..6 {
            expr = Expression::not(expr);
        }
        let compiler = ExpressionCompiler::new(&SqlFormatter)
            .with_config(EvaluatorConfig { max_depth: 3 });
        assert!(matches!(
            compiler.compile(&expr),
            Err(ExpressionError::DepthExceeded { max_depth: 3 })
        ));
    }
}
