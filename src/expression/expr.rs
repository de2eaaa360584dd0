//! Expression tree nodes and the scalar combinator library.
//!
//! Nodes are built through the associated functions on [`Expression`]. Every
//! combinator applies constant folding once, when the node is built: a node
//! whose value can be decided without a record or an environment is replaced
//! by the corresponding constant.

use crate::expression::eval::{like_pattern, ExpressionEvaluator, DEFAULT_MAX_DEPTH};
use crate::expression::operator::Operator;
use crate::value::Value;
use chrono::{DateTime, Utc};
use log::trace;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// An argument of an expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Nested expression
    Expr(Expression),
    /// Literal value
    Value(Value),
    /// Collection of operands, evaluated element by element
    List(Vec<Operand>),
}

impl Operand {
    /// Turn a bare string literal into a field reference.
    ///
    /// Applied at build time to every argument that names "a field or an
    /// expression". Nodes and other literals are returned unchanged.
    pub fn autofield(operand: impl Into<Operand>) -> Operand {
        match operand.into() {
            Operand::Value(Value::String(name)) => Operand::Expr(Expression::field(name)),
            other => other,
        }
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Operand::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// Literal value of the operand, looking through constant nodes
    pub fn literal(&self) -> Option<&Value> {
        match self {
            Operand::Value(v) => Some(v),
            Operand::Expr(e) => e.constant_value(),
            Operand::List(_) => None,
        }
    }

    pub fn is_always_true(&self) -> bool {
        match self {
            Operand::Expr(e) => e.is_always_true(),
            Operand::Value(v) => *v == Value::Boolean(true),
            Operand::List(_) => false,
        }
    }

    pub fn is_always_false(&self) -> bool {
        match self {
            Operand::Expr(e) => e.is_always_false(),
            Operand::Value(v) => *v == Value::Boolean(false),
            Operand::List(_) => false,
        }
    }

    fn is_null_literal(&self) -> bool {
        matches!(self.literal(), Some(Value::Null))
    }

    /// Nesting depth of the operand; literals count as zero
    pub fn depth(&self) -> usize {
        match self {
            Operand::Expr(e) => e.depth(),
            Operand::Value(_) => 0,
            Operand::List(items) => items.iter().map(Operand::depth).max().unwrap_or(0),
        }
    }
}

impl From<Expression> for Operand {
    fn from(e: Expression) -> Self {
        Operand::Expr(e)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl<T: Into<Operand>> From<Vec<T>> for Operand {
    fn from(items: Vec<T>) -> Self {
        Operand::List(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! operand_from_literal {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

operand_from_literal!(bool, i32, i64, f64, &str, String, DateTime<Utc>);

/// Properties derived once when a node is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct NodeFlags {
    constant: bool,
    always_true: bool,
    always_false: bool,
    grouping: bool,
}

/// Compiled form of a literal `like` mask, shared between clones
#[derive(Debug, Clone)]
pub(crate) struct LikePattern(Arc<Regex>);

impl LikePattern {
    pub(crate) fn regex(&self) -> &Regex {
        &self.0
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    operator: Operator,
    operands: Vec<Operand>,
    alias: Option<String>,
    flags: NodeFlags,
    depth: usize,
    pattern: Option<LikePattern>,
}

impl Drop for Expression {
    fn drop(&mut self) {
        // Unlink descendants onto a heap stack so deep trees drop iteratively
        let mut pending = std::mem::take(&mut self.operands);
        while let Some(operand) = pending.pop() {
            match operand {
                Operand::Expr(mut expr) => pending.append(&mut expr.operands),
                Operand::List(items) => pending.extend(items),
                Operand::Value(_) => {}
            }
        }
    }
}

/// Collect a variadic operand sequence. A single list operand stands for its
/// elements.
pub(crate) fn collect_operands<I>(operands: I) -> Vec<Operand>
where
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    let mut items: Vec<Operand> = operands.into_iter().map(Into::into).collect();
    if items.len() == 1 && matches!(items[0], Operand::List(_)) {
        if let Some(Operand::List(inner)) = items.pop() {
            return inner;
        }
    }
    items
}

impl Expression {
    /// Build a node and fold it into a constant when its value does not
    /// depend on a record or an environment.
    pub(crate) fn build(operator: Operator, operands: Vec<Operand>) -> Self {
        let depth = 1 + operands.iter().map(Operand::depth).max().unwrap_or(0);
        let node = Expression {
            operator,
            operands,
            alias: None,
            flags: NodeFlags {
                grouping: operator.is_grouping(),
                ..NodeFlags::default()
            },
            depth,
            pattern: None,
        };
        if depth > DEFAULT_MAX_DEPTH {
            return node;
        }
        match ExpressionEvaluator::new(None).evaluate(&node) {
            Ok(Some(value)) => {
                trace!("folded {} into constant {}", node, value);
                Expression::constant(value)
            }
            _ => node,
        }
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Name of the result column, if one was assigned
    pub fn output_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name this node's result column
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.alias = Some(name.into());
        self
    }

    /// Nesting depth of the tree rooted here; a leaf has depth 1
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pre-compiled pattern of a `like` node with a literal mask
    pub(crate) fn like_pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref().map(LikePattern::regex)
    }

    pub fn is_constant(&self) -> bool {
        self.flags.constant
    }

    pub fn is_always_true(&self) -> bool {
        self.flags.always_true
    }

    pub fn is_always_false(&self) -> bool {
        self.flags.always_false
    }

    /// Whether the node needs a collection of records rather than a single one
    pub fn is_grouping(&self) -> bool {
        self.flags.grouping
    }

    /// Value of a constant node
    pub fn constant_value(&self) -> Option<&Value> {
        match (self.operator, self.operands.first()) {
            (Operator::Constant, Some(Operand::Value(v))) => Some(v),
            _ => None,
        }
    }

    /// Field name and optional table of a field node
    pub fn field_ref(&self) -> Option<(&str, Option<&str>)> {
        if self.operator != Operator::Field {
            return None;
        }
        let name = self.operands.first().and_then(Operand::literal)?.as_str()?;
        let table = self
            .operands
            .get(1)
            .and_then(Operand::literal)
            .and_then(Value::as_str);
        Some((name, table))
    }

    /// Variable name of a context node
    pub fn context_name(&self) -> Option<&str> {
        match (self.operator, self.operands.first()) {
            (Operator::Context, Some(Operand::Value(Value::String(name)))) => Some(name),
            _ => None,
        }
    }

    // ---- Leaves ----

    /// Reference to a field of the evaluated record
    pub fn field(name: impl Into<String>) -> Self {
        Expression {
            operator: Operator::Field,
            operands: vec![Operand::Value(Value::String(name.into()))],
            alias: None,
            flags: NodeFlags::default(),
            depth: 1,
            pattern: None,
        }
    }

    /// Reference to a field qualified by a table alias
    pub fn qualified_field(name: impl Into<String>, table: impl Into<String>) -> Self {
        Expression {
            operator: Operator::Field,
            operands: vec![
                Operand::Value(Value::String(name.into())),
                Operand::Value(Value::String(table.into())),
            ],
            alias: None,
            flags: NodeFlags::default(),
            depth: 1,
            pattern: None,
        }
    }

    /// Reference to a variable of the evaluation environment
    pub fn context(variable: impl Into<String>) -> Self {
        Expression {
            operator: Operator::Context,
            operands: vec![Operand::Value(Value::String(variable.into()))],
            alias: None,
            flags: NodeFlags::default(),
            depth: 1,
            pattern: None,
        }
    }

    /// Literal constant. `true` and `false` produce the always-true and
    /// always-false nodes.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let flags = NodeFlags {
            constant: true,
            always_true: value == Value::Boolean(true),
            always_false: value == Value::Boolean(false),
            grouping: false,
        };
        Expression {
            operator: Operator::Constant,
            operands: vec![Operand::Value(value)],
            alias: None,
            flags,
            depth: 1,
            pattern: None,
        }
    }

    // ---- Predicates ----

    pub fn is_null(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::IsNull, vec![Operand::autofield(expr)])
    }

    pub fn is_not_null(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::IsNotNull, vec![Operand::autofield(expr)])
    }

    pub fn not(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::Not, vec![Operand::autofield(expr)])
    }

    /// True if bit `bit` of `expr` is set
    pub fn bit_set(expr: impl Into<Operand>, bit: impl Into<Operand>) -> Self {
        Self::build(Operator::BitSet, vec![Operand::autofield(expr), bit.into()])
    }

    /// True if bit `bit` of `expr` is clear
    pub fn bit_clear(expr: impl Into<Operand>, bit: impl Into<Operand>) -> Self {
        Self::build(Operator::BitClear, vec![Operand::autofield(expr), bit.into()])
    }

    /// True if `expr & mask == val & mask`
    pub fn test_mask(
        expr: impl Into<Operand>,
        mask: impl Into<Operand>,
        val: impl Into<Operand>,
    ) -> Self {
        Self::build(
            Operator::TestMask,
            vec![Operand::autofield(expr), mask.into(), val.into()],
        )
    }

    /// Inclusive range test
    pub fn between(
        expr: impl Into<Operand>,
        min: impl Into<Operand>,
        max: impl Into<Operand>,
    ) -> Self {
        Self::build(
            Operator::Between,
            vec![Operand::autofield(expr), min.into(), max.into()],
        )
    }

    /// SQL-style pattern match: `%` matches any run of characters, `_`
    /// exactly one
    pub fn like(expr: impl Into<Operand>, mask: impl Into<Operand>) -> Self {
        let mut node = Self::build(Operator::Like, vec![Operand::autofield(expr), mask.into()]);
        if node.operator == Operator::Like {
            if let Some(Value::String(mask)) = node.operands.get(1).and_then(Operand::literal) {
                node.pattern = like_pattern(mask).ok().map(|re| LikePattern(Arc::new(re)));
            }
        }
        node
    }

    pub fn is_in(expr: impl Into<Operand>, list: impl Into<Operand>) -> Self {
        Self::build(Operator::IsIn, vec![Operand::autofield(expr), list.into()])
    }

    pub fn is_not_in(expr: impl Into<Operand>, list: impl Into<Operand>) -> Self {
        Self::not(Self::is_in(expr, list))
    }

    // ---- Comparison ----

    fn comparison(op: Operator, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::build(op, vec![Operand::autofield(left), right.into()])
    }

    pub fn eq(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::comparison(Operator::Eq, left, right)
    }

    pub fn ne(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::comparison(Operator::Ne, left, right)
    }

    pub fn lt(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::comparison(Operator::Lt, left, right)
    }

    pub fn le(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::comparison(Operator::Le, left, right)
    }

    pub fn gt(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::comparison(Operator::Gt, left, right)
    }

    pub fn ge(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::comparison(Operator::Ge, left, right)
    }

    fn null_or(
        op: Operator,
        expr: impl Into<Operand>,
        value: impl Into<Operand>,
    ) -> Self {
        let expr = Operand::autofield(expr);
        Self::or([
            Operand::Expr(Self::is_null(expr.clone())),
            Operand::Expr(Self::comparison(op, expr, value)),
        ])
    }

    /// `expr` is null or equal to `value`
    pub fn is_null_or_eq(expr: impl Into<Operand>, value: impl Into<Operand>) -> Self {
        Self::null_or(Operator::Eq, expr, value)
    }

    pub fn is_null_or_gt(expr: impl Into<Operand>, value: impl Into<Operand>) -> Self {
        Self::null_or(Operator::Gt, expr, value)
    }

    pub fn is_null_or_ge(expr: impl Into<Operand>, value: impl Into<Operand>) -> Self {
        Self::null_or(Operator::Ge, expr, value)
    }

    pub fn is_null_or_lt(expr: impl Into<Operand>, value: impl Into<Operand>) -> Self {
        Self::null_or(Operator::Lt, expr, value)
    }

    pub fn is_null_or_le(expr: impl Into<Operand>, value: impl Into<Operand>) -> Self {
        Self::null_or(Operator::Le, expr, value)
    }

    // ---- Logical ----

    /// Conjunction. Always-true operands are dropped, an always-false operand
    /// makes the whole node always-false, and no operands at all gives
    /// always-true.
    pub fn and<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        let mut kept = Vec::new();
        for operand in collect_operands(operands) {
            if operand.is_always_false() {
                return Self::constant(false);
            }
            if !operand.is_always_true() {
                kept.push(operand);
            }
        }
        if kept.is_empty() {
            return Self::constant(true);
        }
        Self::build(Operator::And, kept)
    }

    /// Disjunction, the mirror image of [`Expression::and`]
    pub fn or<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        let mut kept = Vec::new();
        for operand in collect_operands(operands) {
            if operand.is_always_true() {
                return Self::constant(true);
            }
            if !operand.is_always_false() {
                kept.push(operand);
            }
        }
        if kept.is_empty() {
            return Self::constant(false);
        }
        Self::build(Operator::Or, kept)
    }

    /// First operand that is not null
    pub fn coalesce<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::build(Operator::Coalesce, collect_operands(operands))
    }

    // ---- Arithmetic ----

    pub fn minus(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::Minus, vec![Operand::autofield(expr)])
    }

    pub fn add<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::build(Operator::Add, collect_operands(operands))
    }

    pub fn mul<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::build(Operator::Mul, collect_operands(operands))
    }

    pub fn sub(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::build(Operator::Sub, vec![Operand::autofield(left), right.into()])
    }

    pub fn div(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::build(Operator::Div, vec![Operand::autofield(left), right.into()])
    }

    pub fn modulus(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::build(Operator::Modulus, vec![Operand::autofield(left), right.into()])
    }

    // ---- Bitwise ----

    pub fn bitwise_not(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::BitwiseNot, vec![Operand::autofield(expr)])
    }

    fn bitwise_fold<I>(op: Operator, operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        let kept: Vec<Operand> = collect_operands(operands)
            .into_iter()
            .filter(|operand| !operand.is_null_literal())
            .collect();
        if kept.is_empty() {
            return Self::constant(Value::Null);
        }
        Self::build(op, kept)
    }

    /// Bitwise and of the operands. Null literals are left out.
    pub fn bitwise_and<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::bitwise_fold(Operator::BitwiseAnd, operands)
    }

    pub fn bitwise_or<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::bitwise_fold(Operator::BitwiseOr, operands)
    }

    pub fn bitwise_xor<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::bitwise_fold(Operator::BitwiseXor, operands)
    }

    // ---- Strings and conversions ----

    /// String concatenation, skipping null operands
    pub fn concat<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::build(Operator::Concat, collect_operands(operands))
    }

    /// Substring with a 1-based `start`
    pub fn substring(
        expr: impl Into<Operand>,
        start: impl Into<Operand>,
        len: impl Into<Operand>,
    ) -> Self {
        Self::build(
            Operator::Substring,
            vec![Operand::autofield(expr), start.into(), len.into()],
        )
    }

    pub fn convert_to_int(expr: impl Into<Operand>) -> Self {
        Self::build(Operator::ConvertToInt, vec![Operand::autofield(expr)])
    }

    pub fn convert_to_string(expr: impl Into<Operand>, max_len: impl Into<Operand>) -> Self {
        Self::build(
            Operator::ConvertToString,
            vec![Operand::autofield(expr), max_len.into()],
        )
    }

    /// List of the operands' values; null if any of them is null
    pub fn list<I>(operands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self::build(Operator::List, collect_operands(operands))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Expr(e) => write!(f, "{}", e),
            Operand::Value(Value::String(s)) => write!(f, "'{}'", s),
            Operand::Value(v) => write!(f, "{}", v),
            Operand::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Operand]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((name, table)) = self.field_ref() {
            return match table {
                Some(table) => write!(f, "{}.{}", table, name),
                None => write!(f, "{}", name),
            };
        }
        write!(f, "{}(", self.operator)?;
        if self.depth > DEFAULT_MAX_DEPTH {
            write!(f, "...")?;
        } else {
            write_joined(f, &self.operands)?;
        }
        write!(f, ")")?;
        if let Some(alias) = &self.alias {
            write!(f, " as {}", alias)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_flags() {
        let t = Expression::constant(true);
        assert!(t.is_constant());
        assert!(t.is_always_true());
        assert!(!t.is_always_false());

        let f = Expression::constant(false);
        assert!(f.is_always_false());

        let k = Expression::constant(5);
        assert!(k.is_constant());
        assert!(!k.is_always_true());
        assert_eq!(k.constant_value(), Some(&Value::Int(5)));
    }

    #[test]
    fn test_depth_tracking() {
        assert_eq!(Expression::field("a").depth(), 1);
        assert_eq!(Expression::eq("a", 1).depth(), 2);
        let expr = Expression::is_in("a", vec![Operand::from(Expression::minus("b")), Operand::from(3)]);
        assert_eq!(expr.depth(), 3);
    }

    #[test]
    fn test_very_deep_tree_is_built_shown_and_dropped() {
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let mut expr = Expression::field("a");
                for _ in 0..200_000 {
                    expr = Expression::not(expr);
                }
                assert_eq!(expr.depth(), 200_001);
                assert_eq!(expr.to_string(), "not(...)");
                drop(expr);
            })
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_constant_normalizes_indeterminate_to_null() {
        let k = Expression::constant(None::<i64>);
        assert_eq!(k.constant_value(), Some(&Value::Null));
    }

    #[test]
    fn test_autofield() {
        let op = Operand::autofield("price");
        let expr = op.as_expression().unwrap();
        assert_eq!(expr.field_ref(), Some(("price", None)));

        assert_eq!(Operand::autofield(12), Operand::Value(Value::Int(12)));

        // Only the first argument of a comparison names a field
        let expr = Expression::eq("a", "b");
        assert!(expr.operands()[0].as_expression().is_some());
        assert_eq!(expr.operands()[1], Operand::Value(Value::String("b".into())));
    }

    #[test]
    fn test_and_folding() {
        let x = Expression::gt("x", 1);

        let expr = Expression::and([Expression::constant(true), x.clone()]);
        assert_eq!(expr.operator(), Operator::And);
        assert_eq!(expr.operands().len(), 1);

        let expr = Expression::and([x.clone(), Expression::constant(false)]);
        assert!(expr.is_always_false());

        let expr = Expression::and(Vec::<Expression>::new());
        assert!(expr.is_always_true());

        let expr = Expression::and([Expression::constant(true), Expression::constant(true)]);
        assert!(expr.is_always_true());
    }

    #[test]
    fn test_or_folding() {
        let x = Expression::gt("x", 1);

        let expr = Expression::or([Expression::constant(false), x.clone()]);
        assert_eq!(expr.operator(), Operator::Or);
        assert_eq!(expr.operands().len(), 1);

        let expr = Expression::or([x, Expression::constant(true)]);
        assert!(expr.is_always_true());

        let expr = Expression::or(Vec::<Expression>::new());
        assert!(expr.is_always_false());
    }

    #[test]
    fn test_single_list_operand_is_flattened() {
        let expr = Expression::and([Operand::from(vec![
            Expression::gt("x", 1),
            Expression::lt("x", 5),
        ])]);
        assert_eq!(expr.operands().len(), 2);
    }

    #[test]
    fn test_constant_subtrees_fold() {
        let expr = Expression::eq(Expression::constant(1), Expression::constant(1));
        assert!(expr.is_always_true());

        let expr = Expression::add([1, 2, 3]);
        assert_eq!(expr.constant_value(), Some(&Value::Int(6)));

        let expr = Expression::coalesce([Operand::Value(Value::Int(7)), Expression::field("a").into()]);
        assert_eq!(expr.constant_value(), Some(&Value::Int(7)));

        // Depends on the record, so nothing to fold
        let expr = Expression::add([Operand::from(Expression::field("a")), Operand::from(1)]);
        assert_eq!(expr.operator(), Operator::Add);
    }

    #[test]
    fn test_failing_fold_is_deferred() {
        let expr = Expression::div(Expression::constant(1), 0);
        assert_eq!(expr.operator(), Operator::Div);
    }

    #[test]
    fn test_bitwise_drops_null_literals() {
        let expr = Expression::bitwise_or([Operand::Value(Value::Null), Operand::from(Expression::field("f"))]);
        assert_eq!(expr.operands().len(), 1);

        let expr = Expression::bitwise_and([Value::Null, Value::Null]);
        assert_eq!(expr.constant_value(), Some(&Value::Null));
    }

    #[test]
    fn test_alias() {
        let expr = Expression::field("a").alias("total");
        assert_eq!(expr.output_alias(), Some("total"));
        assert_eq!(Expression::field("a").output_alias(), None);
    }

    #[test]
    fn test_display() {
        let expr = Expression::and([
            Expression::eq(Expression::qualified_field("a", "T"), 5),
            Expression::like("name", "J%"),
        ]);
        assert_eq!(expr.to_string(), "and(eq(T.a,5),like(name,'J%'))");
    }
}
