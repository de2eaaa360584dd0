//! Conversion of expression trees to and from a plain, serializable shape.
//!
//! A tree is encoded as nested [`TreeObject`]s: `{"name", "args", "alias"}`
//! for a node, `{"array"}` for a list operand and `{"value"}` for a literal.
//! Decoding looks the node name up in the operator registry and calls the
//! matching combinator again, so decoded trees are folded and flagged exactly
//! like freshly built ones.

use crate::expression::{
    EvaluatorConfig, Expression, ExpressionError, ExpressionResult, McmpValues, Operand, Operator,
    DEFAULT_MAX_DEPTH,
};
use crate::value::Value;
use log::debug;
use serde::{Deserialize, Serialize};

/// Serializable form of an operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeObject {
    Node {
        name: String,
        args: Vec<TreeObject>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    Array {
        array: Vec<TreeObject>,
    },
    Value {
        value: Value,
    },
}

/// Encode an operand
pub fn to_object(operand: &Operand) -> ExpressionResult<TreeObject> {
    encode(operand, DEFAULT_MAX_DEPTH)
}

fn encode(operand: &Operand, max_depth: usize) -> ExpressionResult<TreeObject> {
    if operand.depth() > max_depth {
        return Err(ExpressionError::DepthExceeded { max_depth });
    }
    Ok(match operand {
        Operand::Expr(expr) => TreeObject::Node {
            name: expr.operator().as_str().to_string(),
            args: expr
                .operands()
                .iter()
                .map(|arg| encode(arg, max_depth))
                .collect::<ExpressionResult<_>>()?,
            alias: expr.output_alias().map(str::to_string),
        },
        Operand::Value(value) => TreeObject::Value {
            value: value.clone(),
        },
        Operand::List(items) => TreeObject::Array {
            array: items
                .iter()
                .map(|item| encode(item, max_depth))
                .collect::<ExpressionResult<_>>()?,
        },
    })
}

impl Expression {
    /// Encode this node and its operands
    pub fn to_object(&self) -> ExpressionResult<TreeObject> {
        self.to_object_with_config(EvaluatorConfig::default())
    }

    /// Encode, refusing trees nested deeper than `config.max_depth`
    pub fn to_object_with_config(&self, config: EvaluatorConfig) -> ExpressionResult<TreeObject> {
        if self.depth() > config.max_depth {
            return Err(ExpressionError::DepthExceeded {
                max_depth: config.max_depth,
            });
        }
        let args = self
            .operands()
            .iter()
            .map(|arg| encode(arg, config.max_depth))
            .collect::<ExpressionResult<_>>()?;
        Ok(TreeObject::Node {
            name: self.operator().as_str().to_string(),
            args,
            alias: self.output_alias().map(str::to_string),
        })
    }
}

/// Decode an operand
pub fn from_object(object: &TreeObject) -> ExpressionResult<Operand> {
    decode(object, 0, DEFAULT_MAX_DEPTH)
}

/// `depth` counts the nodes above `object`; arrays do not add a level
fn decode(object: &TreeObject, depth: usize, max_depth: usize) -> ExpressionResult<Operand> {
    match object {
        TreeObject::Value { value } => Ok(Operand::Value(value.clone())),
        TreeObject::Array { array } => Ok(Operand::List(
            array
                .iter()
                .map(|item| decode(item, depth, max_depth))
                .collect::<ExpressionResult<_>>()?,
        )),
        TreeObject::Node { name, args, alias } => {
            if depth >= max_depth {
                return Err(ExpressionError::DepthExceeded { max_depth });
            }
            let operator = Operator::from_name(name)
                .ok_or_else(|| ExpressionError::UnknownOperator(name.clone()))?;
            let args = args
                .iter()
                .map(|arg| decode(arg, depth + 1, max_depth))
                .collect::<ExpressionResult<Vec<_>>>()?;
            debug!("rebuilding {} with {} arguments", operator, args.len());
            let expr = rebuild(operator, args)?;
            Ok(Operand::Expr(match alias {
                Some(alias) => expr.alias(alias.as_str()),
                None => expr,
            }))
        }
    }
}

/// Decode an object that must describe an expression node
pub fn expression_from_object(object: &TreeObject) -> ExpressionResult<Expression> {
    expression_from_object_with_config(object, EvaluatorConfig::default())
}

pub fn expression_from_object_with_config(
    object: &TreeObject,
    config: EvaluatorConfig,
) -> ExpressionResult<Expression> {
    match decode(object, 0, config.max_depth)? {
        Operand::Expr(expr) => Ok(expr),
        _ => Err(ExpressionError::MalformedTree(
            "expected an expression node at the root".to_string(),
        )),
    }
}

/// Serialize an expression as JSON text
pub fn to_json(expr: &Expression) -> ExpressionResult<String> {
    to_json_with_config(expr, EvaluatorConfig::default())
}

pub fn to_json_with_config(expr: &Expression, config: EvaluatorConfig) -> ExpressionResult<String> {
    serde_json::to_string(&expr.to_object_with_config(config)?)
        .map_err(|e| ExpressionError::InvalidValue(e.to_string()))
}

/// Parse an expression from JSON text
pub fn from_json(text: &str) -> ExpressionResult<Expression> {
    from_json_with_config(text, EvaluatorConfig::default())
}

/// Parse an expression nested at most `config.max_depth` nodes deep.
///
/// A node takes two levels of JSON nesting (the object and its `args`), so
/// serde_json's fixed recursion limit is replaced by a scan bounded by the
/// configured depth.
pub fn from_json_with_config(text: &str, config: EvaluatorConfig) -> ExpressionResult<Expression> {
    let limit = config.max_depth.saturating_mul(4).saturating_add(8);
    let nesting = json_nesting(text);
    if nesting > limit {
        return Err(ExpressionError::DepthExceeded {
            max_depth: config.max_depth,
        });
    }

    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let object = TreeObject::deserialize(&mut deserializer)
        .and_then(|object| deserializer.end().map(|()| object))
        .map_err(|e| ExpressionError::MalformedTree(e.to_string()))?;
    expression_from_object_with_config(&object, config)
}

/// Deepest bracket nesting of a JSON document, ignoring string contents
fn json_nesting(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn take<const N: usize>(operator: Operator, args: Vec<Operand>) -> ExpressionResult<[Operand; N]> {
    let count = args.len();
    args.try_into().map_err(|_| {
        ExpressionError::MalformedTree(format!("{} does not accept {} arguments", operator, count))
    })
}

fn text_arg(operator: Operator, arg: &Operand) -> ExpressionResult<String> {
    match arg.literal() {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ExpressionError::MalformedTree(format!(
            "{} expects a string literal argument",
            operator
        ))),
    }
}

/// Literal carried by a `constant` node's argument
fn literal_arg(arg: Operand) -> ExpressionResult<Value> {
    match arg {
        Operand::Value(value) => Ok(value),
        Operand::Expr(expr) => expr.constant_value().cloned().ok_or_else(|| {
            ExpressionError::MalformedTree("constant expects a literal argument".to_string())
        }),
        Operand::List(items) => items
            .into_iter()
            .map(literal_arg)
            .collect::<ExpressionResult<Vec<_>>>()
            .map(Value::List),
    }
}

/// Call the combinator behind `operator` with decoded arguments
fn rebuild(operator: Operator, args: Vec<Operand>) -> ExpressionResult<Expression> {
    if !operator.arity().accepts(args.len()) {
        return Err(ExpressionError::MalformedTree(format!(
            "{} does not accept {} arguments",
            operator,
            args.len()
        )));
    }

    let expr = match operator {
        Operator::Field => {
            let name = text_arg(operator, &args[0])?;
            match args.get(1).and_then(Operand::literal) {
                None | Some(Value::Null) => Expression::field(name),
                Some(_) => Expression::qualified_field(name, text_arg(operator, &args[1])?),
            }
        }
        Operator::Context => Expression::context(text_arg(operator, &args[0])?),
        Operator::Constant => {
            let [value] = take::<1>(operator, args)?;
            Expression::constant(literal_arg(value)?)
        }

        Operator::IsNull => {
            let [a] = take::<1>(operator, args)?;
            Expression::is_null(a)
        }
        Operator::IsNotNull => {
            let [a] = take::<1>(operator, args)?;
            Expression::is_not_null(a)
        }
        Operator::Not => {
            let [a] = take::<1>(operator, args)?;
            Expression::not(a)
        }
        Operator::Minus => {
            let [a] = take::<1>(operator, args)?;
            Expression::minus(a)
        }
        Operator::BitwiseNot => {
            let [a] = take::<1>(operator, args)?;
            Expression::bitwise_not(a)
        }
        Operator::ConvertToInt => {
            let [a] = take::<1>(operator, args)?;
            Expression::convert_to_int(a)
        }
        Operator::Min => {
            let [a] = take::<1>(operator, args)?;
            Expression::min(a)
        }
        Operator::Max => {
            let [a] = take::<1>(operator, args)?;
            Expression::max(a)
        }
        Operator::Sum => {
            let [a] = take::<1>(operator, args)?;
            Expression::sum(a)
        }

        Operator::BitSet => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::bit_set(a, b)
        }
        Operator::BitClear => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::bit_clear(a, b)
        }
        Operator::Like => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::like(a, b)
        }
        Operator::IsIn => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::is_in(a, b)
        }
        Operator::Eq => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::eq(a, b)
        }
        Operator::Ne => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::ne(a, b)
        }
        Operator::Lt => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::lt(a, b)
        }
        Operator::Le => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::le(a, b)
        }
        Operator::Gt => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::gt(a, b)
        }
        Operator::Ge => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::ge(a, b)
        }
        Operator::Sub => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::sub(a, b)
        }
        Operator::Div => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::div(a, b)
        }
        Operator::Modulus => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::modulus(a, b)
        }
        Operator::ConvertToString => {
            let [a, b] = take::<2>(operator, args)?;
            Expression::convert_to_string(a, b)
        }

        Operator::TestMask => {
            let [a, b, c] = take::<3>(operator, args)?;
            Expression::test_mask(a, b, c)
        }
        Operator::Between => {
            let [a, b, c] = take::<3>(operator, args)?;
            Expression::between(a, b, c)
        }
        Operator::Substring => {
            let [a, b, c] = take::<3>(operator, args)?;
            Expression::substring(a, b, c)
        }

        Operator::And => Expression::and(args),
        Operator::Or => Expression::or(args),
        Operator::Coalesce => Expression::coalesce(args),
        Operator::Add => Expression::add(args),
        Operator::Mul => Expression::mul(args),
        Operator::Concat => Expression::concat(args),
        Operator::BitwiseAnd => Expression::bitwise_and(args),
        Operator::BitwiseOr => Expression::bitwise_or(args),
        Operator::BitwiseXor => Expression::bitwise_xor(args),
        Operator::List => Expression::list(args),
        Operator::Distinct => Expression::distinct(args),

        Operator::Mcmp => {
            let mut args = args.into_iter();
            let (Some(keys), Some(values)) = (args.next(), args.next()) else {
                return Err(ExpressionError::MalformedTree(
                    "mcmp expects keys and values".to_string(),
                ));
            };
            let table = match args.next() {
                Some(table) if !matches!(table.literal(), Some(Value::Null)) => {
                    Some(text_arg(operator, &table)?)
                }
                _ => None,
            };
            let keys = match keys {
                Operand::List(keys) => keys
                    .iter()
                    .map(|k| text_arg(operator, k))
                    .collect::<ExpressionResult<Vec<_>>>()?,
                _ => {
                    return Err(ExpressionError::MalformedTree(
                        "mcmp keys must be an array".to_string(),
                    ))
                }
            };
            let values = match values {
                Operand::List(values) => values,
                _ => {
                    return Err(ExpressionError::MalformedTree(
                        "mcmp values must be an array".to_string(),
                    ))
                }
            };
            Expression::mcmp(keys.as_slice(), McmpValues::Positional(values), table.as_deref())
                .map_err(|e| ExpressionError::MalformedTree(e.to_string()))?
        }
    };
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_object_shape() -> anyhow::Result<()> {
        let expr = Expression::eq("a", 5).alias("check");
        let json = serde_json::to_value(expr.to_object()?)?;
        assert_eq!(
            json,
            serde_json::json!({
                "name": "eq",
                "args": [
                    { "name": "field", "args": [{ "value": "a" }] },
                    { "value": 5 }
                ],
                "alias": "check"
            })
        );
        Ok(())
    }

    #[test]
    fn test_round_trip_preserves_behaviour() -> anyhow::Result<()> {
        let expr = Expression::and([
            Expression::between("age", 18, 65),
            Expression::like(Expression::qualified_field("name", "P"), "A%"),
            Expression::is_in("kind", vec!["x", "y"]),
        ]);
        let decoded = from_json(&to_json(&expr)?)?;
        assert_eq!(decoded, expr);

        let r = record(&[
            ("age", Value::Int(30)),
            ("name", Value::from("Ann")),
            ("kind", Value::from("y")),
        ]);
        assert_eq!(decoded.evaluate(Some(&r), None)?, Some(Value::Boolean(true)));
        Ok(())
    }

    #[test]
    fn test_round_trip_alias_and_mcmp() -> anyhow::Result<()> {
        let expr = Expression::mcmp(
            &["a", "b"],
            McmpValues::Positional(vec![Operand::from(1), Operand::from(Expression::context("b"))]),
            Some("T"),
        )?
        .alias("m");
        let decoded = from_json(&to_json(&expr)?)?;
        assert_eq!(decoded, expr);
        assert_eq!(decoded.output_alias(), Some("m"));
        Ok(())
    }

    #[test]
    fn test_dates_survive_json() -> anyhow::Result<()> {
        let text = r#"{"name":"lt","args":[{"name":"field","args":[{"value":"d"}]},{"value":{"$date":"2024-01-01T00:00:00Z"}}]}"#;
        let expr = from_json(text)?;
        assert!(matches!(expr.operands()[1], Operand::Value(Value::Date(_))));
        let back: serde_json::Value = serde_json::from_str(&to_json(&expr)?)?;
        assert_eq!(back["args"][1]["value"]["$date"], "2024-01-01T00:00:00+00:00");
        Ok(())
    }

    #[test]
    fn test_decoding_refolds() -> anyhow::Result<()> {
        let text = r#"{"name":"and","args":[{"name":"constant","args":[{"value":true}]},{"name":"field","args":[{"value":"ok"}]}]}"#;
        let expr = from_json(text)?;
        assert_eq!(expr.operator(), Operator::And);
        assert_eq!(expr.operands().len(), 1);
        Ok(())
    }

    fn nested_not(levels: usize) -> Expression {
        let mut expr = Expression::field("a");
        for _ in 0..levels {
            expr = Expression::not(expr);
        }
        expr
    }

    #[test]
    fn test_deep_tree_round_trip() -> anyhow::Result<()> {
        let handle = std::thread::Builder::new()
            .stack_size(16 * 1024 * 1024)
            .spawn(|| -> ExpressionResult<()> {
                let expr = nested_not(150);
                let r = record(&[("a", Value::Boolean(true))]);
                let decoded = from_json(&to_json(&expr)?)?;
                assert_eq!(decoded.depth(), 151);
                assert_eq!(decoded.evaluate(Some(&r), None)?, expr.evaluate(Some(&r), None)?);
                assert_eq!(decoded.evaluate(Some(&r), None)?, Some(Value::Boolean(true)));
                Ok(())
            })?;
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("decoding thread panicked"))??;
        Ok(())
    }

    #[test]
    fn test_depth_limits_follow_config() -> anyhow::Result<()> {
        let expr = nested_not(20);
        let shallow = EvaluatorConfig { max_depth: 10 };
        let json = to_json(&expr)?;

        assert!(matches!(
            from_json_with_config(&json, shallow),
            Err(ExpressionError::DepthExceeded { max_depth: 10 })
        ));
        assert!(matches!(
            to_json_with_config(&expr, shallow),
            Err(ExpressionError::DepthExceeded { max_depth: 10 })
        ));
        assert_eq!(from_json_with_config(&json, EvaluatorConfig { max_depth: 21 })?, expr);

        // Brackets inside strings do not count as nesting
        let text = r#"{"name":"eq","args":[{"name":"field","args":[{"value":"a"}]},{"value":"[[[{{{"}]}"#;
        assert_eq!(from_json_with_config(text, EvaluatorConfig { max_depth: 2 })?, Expression::eq("a", "[[[{{{"));
        Ok(())
    }

    #[test]
    fn test_encoding_refuses_runaway_depth() {
        let expr = nested_not(DEFAULT_MAX_DEPTH + 5);
        assert!(matches!(
            expr.to_object(),
            Err(ExpressionError::DepthExceeded { .. })
        ));
        assert!(matches!(to_json(&expr), Err(ExpressionError::DepthExceeded { .. })));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            from_json(r#"{"name":"frobnicate","args":[]}"#),
            Err(ExpressionError::UnknownOperator(name)) if name == "frobnicate"
        ));
        assert!(matches!(
            from_json(r#"{"name":"eq","args":[{"value":1}]}"#),
            Err(ExpressionError::MalformedTree(_))
        ));
        assert!(matches!(
            from_json(r#"{"value":1}"#),
            Err(ExpressionError::MalformedTree(_))
        ));
        assert!(matches!(
            from_json(r#"{"nonsense":true}"#),
            Err(ExpressionError::MalformedTree(_))
        ));
        assert!(matches!(
            from_json(r#"{"name":"field","args":[{"value":3}]}"#),
            Err(ExpressionError::MalformedTree(_))
        ));
        assert!(matches!(
            from_json(r#"{"name":"mcmp","args":[{"array":[{"value":"a"}]},{"array":[]}]}"#),
            Err(ExpressionError::MalformedTree(_))
        ));
    }
}
