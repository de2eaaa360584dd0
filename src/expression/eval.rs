//! Expression evaluation implementation.

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::expr::{Expression, Operand};
use crate::expression::operator::Operator;
use crate::value::{Environment, Evaluation, Record, Value};
use log::warn;
use regex::Regex;
use std::cmp::Ordering;

/// Default bound on tree nesting for evaluation and compilation
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Unwrap a determinate evaluation or return Indeterminate from the caller
macro_rules! determined {
    ($evaluation:expr) => {
        match $evaluation {
            Some(value) => value,
            None => return Ok(None),
        }
    };
}
pub(crate) use determined;

/// What an expression is evaluated against
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Row(&'a Record),
    Rows(&'a [Record]),
}

impl<'a> Scope<'a> {
    /// Records a grouping operator iterates over. A single record is a
    /// one-element collection.
    pub fn rows(&self) -> &'a [Record] {
        match *self {
            Scope::Row(record) => std::slice::from_ref(record),
            Scope::Rows(rows) => rows,
        }
    }
}

/// Evaluator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Deepest nesting accepted before reporting `DepthExceeded`
    pub max_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Evaluator for expressions
pub struct ExpressionEvaluator<'a> {
    /// Record or records to evaluate against; `None` when absent
    scope: Option<Scope<'a>>,
    /// Variables read by `context` nodes
    environment: Option<&'a Environment>,
    config: EvaluatorConfig,
}

pub(crate) fn malformed(expr: &Expression) -> ExpressionError {
    ExpressionError::MalformedTree(format!(
        "{} node with {} operands",
        expr.operator(),
        expr.operands().len()
    ))
}

impl<'a> ExpressionEvaluator<'a> {
    /// Create an evaluator over an optional scope and no environment
    pub fn new(scope: Option<Scope<'a>>) -> Self {
        Self {
            scope,
            environment: None,
            config: EvaluatorConfig::default(),
        }
    }

    pub fn for_record(record: Option<&'a Record>) -> Self {
        Self::new(record.map(Scope::Row))
    }

    pub fn for_rows(rows: Option<&'a [Record]>) -> Self {
        Self::new(rows.map(Scope::Rows))
    }

    pub fn with_environment(mut self, environment: Option<&'a Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluate an expression. `Ok(None)` is an indeterminate result.
    pub fn evaluate(&self, expr: &Expression) -> ExpressionResult<Evaluation> {
        self.eval_node(expr, self.scope, 0)
    }

    pub(crate) fn eval_node(
        &self,
        expr: &Expression,
        scope: Option<Scope<'a>>,
        depth: usize,
    ) -> ExpressionResult<Evaluation> {
        if depth > self.config.max_depth {
            warn!(
                "evaluation of {} exceeds depth limit {}",
                expr.operator(),
                self.config.max_depth
            );
            return Err(ExpressionError::DepthExceeded {
                max_depth: self.config.max_depth,
            });
        }
        let next = depth + 1;

        match expr.operator() {
            Operator::Field => self.eval_field(expr, scope),

            Operator::Context => {
                let name = expr.context_name().ok_or_else(|| malformed(expr))?;
                Ok(self
                    .environment
                    .map(|env| env.get(name).cloned().unwrap_or(Value::Null)))
            }

            Operator::Constant => Ok(Some(expr.constant_value().cloned().unwrap_or(Value::Null))),

            Operator::IsNull | Operator::IsNotNull => {
                let [operand] = expr.operands() else {
                    return Err(malformed(expr));
                };
                let value = determined!(self.eval_operand(operand, scope, next)?);
                let is_null = value.is_null();
                let result = if expr.operator() == Operator::IsNull {
                    is_null
                } else {
                    !is_null
                };
                Ok(Some(Value::Boolean(result)))
            }

            Operator::Not | Operator::Minus | Operator::BitwiseNot => {
                let [operand] = expr.operands() else {
                    return Err(malformed(expr));
                };
                let value = determined!(self.eval_operand(operand, scope, next)?);
                unary(expr.operator(), value).map(Some)
            }

            Operator::BitSet | Operator::BitClear => {
                let (value, bit) = self.eval_pair(expr, scope, next)?;
                match (value, bit) {
                    (Some(Value::Null), _) | (_, Some(Value::Null)) => Ok(Some(Value::Null)),
                    (Some(value), Some(bit)) => {
                        let set = bit_is_set(expr.operator(), &value, &bit)?;
                        let result = if expr.operator() == Operator::BitSet {
                            set
                        } else {
                            !set
                        };
                        Ok(Some(Value::Boolean(result)))
                    }
                    _ => Ok(None),
                }
            }

            Operator::TestMask | Operator::Between => {
                let [first, second, third] = expr.operands() else {
                    return Err(malformed(expr));
                };
                let mut values = Vec::with_capacity(3);
                for operand in [first, second, third] {
                    match determined!(self.eval_operand(operand, scope, next)?) {
                        Value::Null => return Ok(Some(Value::Boolean(false))),
                        value => values.push(value),
                    }
                }
                let result = if expr.operator() == Operator::TestMask {
                    test_mask(&values[0], &values[1], &values[2])?
                } else {
                    values[0].compare(&values[1]).is_some_and(|o| o != Ordering::Less)
                        && values[0].compare(&values[2]).is_some_and(|o| o != Ordering::Greater)
                };
                Ok(Some(Value::Boolean(result)))
            }

            Operator::Like => {
                let (value, mask) = match self.eval_pair(expr, scope, next)? {
                    (Some(value), Some(mask)) => (value, mask),
                    _ => return Ok(None),
                };
                match (value, mask) {
                    (Value::String(value), Value::String(mask)) => {
                        let matched = match expr.like_pattern() {
                            Some(pattern) => pattern.is_match(&value),
                            None => like_pattern(&mask)?.is_match(&value),
                        };
                        Ok(Some(Value::Boolean(matched)))
                    }
                    _ => Ok(Some(Value::Boolean(false))),
                }
            }

            Operator::IsIn => {
                let (value, list) = match self.eval_pair(expr, scope, next)? {
                    (Some(value), Some(list)) => (value, list),
                    _ => return Ok(None),
                };
                let found = match (&value, &list) {
                    (Value::Null, _) | (_, Value::Null) => false,
                    (_, Value::List(items)) => items.iter().any(|item| value.loose_eq(item)),
                    (_, single) => value.loose_eq(single),
                };
                Ok(Some(Value::Boolean(found)))
            }

            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge => {
                let (left, right) = match self.eval_pair(expr, scope, next)? {
                    (Some(left), Some(right)) => (left, right),
                    _ => return Ok(None),
                };
                Ok(Some(Value::Boolean(compare(expr.operator(), &left, &right))))
            }

            Operator::And | Operator::Or => self.eval_connective(expr, scope, next),

            Operator::Coalesce => {
                for operand in expr.operands() {
                    match determined!(self.eval_operand(operand, scope, next)?) {
                        Value::Null => continue,
                        value => return Ok(Some(value)),
                    }
                }
                Ok(Some(Value::Null))
            }

            Operator::Add
            | Operator::Mul
            | Operator::BitwiseAnd
            | Operator::BitwiseOr
            | Operator::BitwiseXor => self.eval_fold(expr, scope, next),

            Operator::Sub | Operator::Div | Operator::Modulus => {
                let (left, right) = self.eval_pair(expr, scope, next)?;
                match (left, right) {
                    (Some(Value::Null), _) | (_, Some(Value::Null)) => Ok(Some(Value::Null)),
                    (Some(left), Some(right)) => arithmetic(expr.operator(), left, right).map(Some),
                    _ => Ok(None),
                }
            }

            Operator::Concat => {
                let mut text: Option<String> = None;
                for operand in expr.operands() {
                    let value = determined!(self.eval_operand(operand, scope, next)?);
                    if value.is_null() {
                        continue;
                    }
                    let part = value
                        .to_text()
                        .ok_or_else(|| ExpressionError::unsupported("concat", &value))?;
                    text.get_or_insert_with(String::new).push_str(&part);
                }
                Ok(Some(text.map(Value::String).unwrap_or(Value::Null)))
            }

            Operator::Substring => {
                let [source, start, len] = expr.operands() else {
                    return Err(malformed(expr));
                };
                let mut values = Vec::with_capacity(3);
                for operand in [source, start, len] {
                    match determined!(self.eval_operand(operand, scope, next)?) {
                        Value::Null => return Ok(Some(Value::Null)),
                        value => values.push(value),
                    }
                }
                substring(&values[0], &values[1], &values[2]).map(Some)
            }

            Operator::ConvertToInt => {
                let [operand] = expr.operands() else {
                    return Err(malformed(expr));
                };
                let value = determined!(self.eval_operand(operand, scope, next)?);
                convert_to_int(value).map(Some)
            }

            Operator::ConvertToString => {
                let [operand, max_len] = expr.operands() else {
                    return Err(malformed(expr));
                };
                let value = determined!(self.eval_operand(operand, scope, next)?);
                let max_len = determined!(self.eval_operand(max_len, scope, next)?);
                convert_to_string(value, max_len).map(Some)
            }

            Operator::List => {
                let mut items = Vec::with_capacity(expr.operands().len());
                let mut some_null = false;
                for operand in expr.operands() {
                    let value = determined!(self.eval_operand(operand, scope, next)?);
                    some_null |= value.is_null();
                    items.push(value);
                }
                if some_null {
                    return Ok(Some(Value::Null));
                }
                Ok(Some(Value::List(items)))
            }

            Operator::Mcmp => self.eval_mcmp(expr, scope, next),

            Operator::Min | Operator::Max | Operator::Sum | Operator::Distinct => {
                self.eval_aggregate(expr, scope, next)
            }
        }
    }

    /// Evaluate an operand. A list is Indeterminate as a whole if any element is.
    pub(crate) fn eval_operand(
        &self,
        operand: &Operand,
        scope: Option<Scope<'a>>,
        depth: usize,
    ) -> ExpressionResult<Evaluation> {
        match operand {
            Operand::Expr(expr) => self.eval_node(expr, scope, depth),
            Operand::Value(value) => Ok(Some(value.clone())),
            Operand::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(determined!(self.eval_operand(item, scope, depth + 1)?));
                }
                Ok(Some(Value::List(values)))
            }
        }
    }

    /// Evaluate both operands of a binary node without short-circuiting
    fn eval_pair(
        &self,
        expr: &Expression,
        scope: Option<Scope<'a>>,
        depth: usize,
    ) -> ExpressionResult<(Evaluation, Evaluation)> {
        let [left, right] = expr.operands() else {
            return Err(malformed(expr));
        };
        Ok((
            self.eval_operand(left, scope, depth)?,
            self.eval_operand(right, scope, depth)?,
        ))
    }

    fn eval_field(&self, expr: &Expression, scope: Option<Scope<'a>>) -> ExpressionResult<Evaluation> {
        let (name, _) = expr.field_ref().ok_or_else(|| malformed(expr))?;
        Ok(match scope {
            None => None,
            Some(Scope::Row(record)) => Some(record.get(name).cloned().unwrap_or(Value::Null)),
            Some(Scope::Rows(_)) => Some(Value::Null),
        })
    }

    fn eval_connective(
        &self,
        expr: &Expression,
        scope: Option<Scope<'a>>,
        depth: usize,
    ) -> ExpressionResult<Evaluation> {
        // `and` stops on false, `or` on true
        let deciding = expr.operator() == Operator::Or;
        let mut some_indeterminate = false;
        let mut some_null = false;
        for operand in expr.operands() {
            match self.eval_operand(operand, scope, depth)? {
                None => some_indeterminate = true,
                Some(Value::Null) => some_null = true,
                Some(Value::Boolean(b)) if b == deciding => return Ok(Some(Value::Boolean(b))),
                Some(Value::Boolean(_)) => {}
                Some(other) => {
                    return Err(ExpressionError::unsupported(expr.operator().as_str(), &other))
                }
            }
        }
        if some_indeterminate {
            return Ok(None);
        }
        if some_null {
            return Ok(Some(Value::Null));
        }
        Ok(Some(Value::Boolean(!deciding)))
    }

    /// Variadic arithmetic and bitwise folds: Null stops the scan, an
    /// Indeterminate operand makes the result Indeterminate
    fn eval_fold(
        &self,
        expr: &Expression,
        scope: Option<Scope<'a>>,
        depth: usize,
    ) -> ExpressionResult<Evaluation> {
        let op = expr.operator();
        let mut acc: Option<Value> = None;
        let mut some_indeterminate = false;
        for operand in expr.operands() {
            match self.eval_operand(operand, scope, depth)? {
                None => some_indeterminate = true,
                Some(Value::Null) => return Ok(Some(Value::Null)),
                Some(value) => {
                    acc = Some(match acc {
                        None => check_foldable(op, value)?,
                        Some(acc) => arithmetic(op, acc, value)?,
                    });
                }
            }
        }
        if some_indeterminate {
            return Ok(None);
        }
        Ok(Some(acc.unwrap_or(Value::Null)))
    }
}

/// First operand of a fold must already be of a type the fold accepts
fn check_foldable(op: Operator, value: Value) -> ExpressionResult<Value> {
    let accepted = match op {
        Operator::BitwiseAnd | Operator::BitwiseOr | Operator::BitwiseXor => {
            matches!(value, Value::Int(_) | Value::Boolean(_))
        }
        _ => matches!(value, Value::Int(_) | Value::Float(_)),
    };
    if accepted {
        Ok(value)
    } else {
        Err(ExpressionError::unsupported(op.as_str(), &value))
    }
}

fn unary(op: Operator, value: Value) -> ExpressionResult<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (Operator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (Operator::Minus, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(ExpressionError::ArithmeticOverflow { operator: "minus" }),
        (Operator::Minus, Value::Float(n)) => Ok(Value::Float(-n)),
        (Operator::BitwiseNot, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (Operator::BitwiseNot, Value::Int(n)) => Ok(Value::Int(!n)),
        (op, other) => Err(ExpressionError::unsupported(op.as_str(), &other)),
    }
}

/// Comparison of two determinate values; any Null operand gives false
pub(crate) fn compare(op: Operator, left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        Operator::Eq => left.loose_eq(right),
        Operator::Ne => !left.loose_eq(right),
        _ => match left.compare(right) {
            None => false,
            Some(ordering) => match op {
                Operator::Lt => ordering == Ordering::Less,
                Operator::Le => ordering != Ordering::Greater,
                Operator::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            },
        },
    }
}

/// Binary arithmetic and bitwise operations
pub(crate) fn arithmetic(op: Operator, left: Value, right: Value) -> ExpressionResult<Value> {
    let name = op.as_str();
    let overflow = || ExpressionError::ArithmeticOverflow { operator: name };
    match (op, &left, &right) {
        (Operator::BitwiseAnd, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
        (Operator::BitwiseOr, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
        (Operator::BitwiseXor, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a ^ b)),
        (Operator::BitwiseAnd, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a & b)),
        (Operator::BitwiseOr, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a | b)),
        (Operator::BitwiseXor, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a ^ b)),
        (Operator::BitwiseAnd | Operator::BitwiseOr | Operator::BitwiseXor, Value::Int(_) | Value::Boolean(_), _) => {
            Err(ExpressionError::unsupported(name, &right))
        }
        (Operator::BitwiseAnd | Operator::BitwiseOr | Operator::BitwiseXor, _, _) => {
            Err(ExpressionError::unsupported(name, &left))
        }

        (_, Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                Operator::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
                Operator::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
                Operator::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
                Operator::Div => {
                    if b == 0 {
                        return Err(ExpressionError::DivisionByZero { operator: name });
                    }
                    let rem = a.checked_rem(b).ok_or_else(overflow)?;
                    if rem == 0 {
                        a.checked_div(b).map(Value::Int).ok_or_else(overflow)
                    } else {
                        Ok(Value::Float(a as f64 / b as f64))
                    }
                }
                Operator::Modulus => {
                    if b == 0 {
                        return Err(ExpressionError::DivisionByZero { operator: name });
                    }
                    a.checked_rem(b).map(Value::Int).ok_or_else(overflow)
                }
                _ => Err(ExpressionError::unsupported(name, &left)),
            }
        }

        _ => {
            let a = left
                .as_f64()
                .ok_or_else(|| ExpressionError::unsupported(name, &left))?;
            let b = right
                .as_f64()
                .ok_or_else(|| ExpressionError::unsupported(name, &right))?;
            match op {
                Operator::Add => Ok(Value::Float(a + b)),
                Operator::Sub => Ok(Value::Float(a - b)),
                Operator::Mul => Ok(Value::Float(a * b)),
                Operator::Div | Operator::Modulus if b == 0.0 => {
                    Err(ExpressionError::DivisionByZero { operator: name })
                }
                Operator::Div => Ok(Value::Float(a / b)),
                Operator::Modulus => Ok(Value::Float(a % b)),
                _ => Err(ExpressionError::unsupported(name, &left)),
            }
        }
    }
}

fn bit_is_set(op: Operator, value: &Value, bit: &Value) -> ExpressionResult<bool> {
    let value = value
        .as_i64()
        .ok_or_else(|| ExpressionError::unsupported(op.as_str(), value))?;
    match bit.as_i64() {
        Some(bit @ 0..=63) => Ok(value & (1i64 << bit) != 0),
        Some(bit) => Err(ExpressionError::InvalidArguments {
            operator: op.as_str(),
            reason: format!("bit index {} out of range", bit),
        }),
        None => Err(ExpressionError::unsupported(op.as_str(), bit)),
    }
}

fn test_mask(value: &Value, mask: &Value, expected: &Value) -> ExpressionResult<bool> {
    let as_int = |v: &Value| {
        v.as_i64()
            .ok_or_else(|| ExpressionError::unsupported("testMask", v))
    };
    let mask = as_int(mask)?;
    Ok(as_int(value)? & mask == as_int(expected)? & mask)
}

/// Translate a `like` mask into an anchored regular expression
pub(crate) fn like_pattern(mask: &str) -> ExpressionResult<Regex> {
    let mut pattern = String::from("(?s)^");
    for ch in mask.chars() {
        match ch {
            '%' => pattern.push_str(".*"),
            '_' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| ExpressionError::InvalidArguments {
        operator: "like",
        reason: e.to_string(),
    })
}

fn substring(source: &Value, start: &Value, len: &Value) -> ExpressionResult<Value> {
    let text = source
        .as_str()
        .ok_or_else(|| ExpressionError::unsupported("substring", source))?;
    let start = start
        .as_i64()
        .ok_or_else(|| ExpressionError::unsupported("substring", start))?;
    let len = len
        .as_i64()
        .ok_or_else(|| ExpressionError::unsupported("substring", len))?;
    let skip = usize::try_from(start.saturating_sub(1)).unwrap_or(0);
    let take = usize::try_from(len).unwrap_or(0);
    Ok(Value::String(text.chars().skip(skip).take(take).collect()))
}

fn convert_to_int(value: Value) -> ExpressionResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(n) => Ok(Value::Int(n)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Float(_) => Ok(Value::Null),
        Value::String(s) => Ok(parse_int_prefix(&s).map(Value::Int).unwrap_or(Value::Null)),
        other => Err(ExpressionError::unsupported("convertToInt", &other)),
    }
}

/// Integer formed by the leading sign and digits of `s`, ignoring leading
/// whitespace
fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}

fn convert_to_string(value: Value, max_len: Value) -> ExpressionResult<Value> {
    let text = match &value {
        Value::Null => return Ok(Value::Null),
        Value::String(s) if s.is_empty() => return Ok(Value::Null),
        other => other
            .to_text()
            .ok_or_else(|| ExpressionError::unsupported("convertToString", other))?,
    };
    match max_len {
        Value::Null => Ok(Value::String(text)),
        Value::Int(n) => {
            let n = usize::try_from(n).unwrap_or(0);
            Ok(Value::String(text.chars().take(n).collect()))
        }
        other => Err(ExpressionError::unsupported("convertToString", &other)),
    }
}

/// Evaluate an expression against an optional record and environment
pub fn evaluate_expression(
    expr: &Expression,
    record: Option<&Record>,
    environment: Option<&Environment>,
) -> ExpressionResult<Evaluation> {
    ExpressionEvaluator::for_record(record)
        .with_environment(environment)
        .evaluate(expr)
}

/// Type alias for predicate functions
pub type Predicate = Box<dyn Fn(&Record) -> bool + Send + Sync + 'static>;

/// Turn an expression into a record filter. Only a determinate `true` passes.
pub fn expression_to_predicate(expr: Expression, environment: Option<Environment>) -> Predicate {
    Box::new(move |record| {
        matches!(
            evaluate_expression(&expr, Some(record), environment.as_ref()),
            Ok(Some(Value::Boolean(true)))
        )
    })
}

impl Expression {
    /// Evaluate against a single record
    pub fn evaluate(
        &self,
        record: Option<&Record>,
        environment: Option<&Environment>,
    ) -> ExpressionResult<Evaluation> {
        evaluate_expression(self, record, environment)
    }

    /// Evaluate against a collection of records, as grouping operators expect
    pub fn evaluate_rows(
        &self,
        rows: Option<&[Record]>,
        environment: Option<&Environment>,
    ) -> ExpressionResult<Evaluation> {
        ExpressionEvaluator::for_rows(rows)
            .with_environment(environment)
            .evaluate(self)
    }
}
