//! Generic SQL rendering.

use crate::formatter::Formatter;
use crate::value::Value;

/// ANSI-flavoured SQL formatter
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFormatter;

impl SqlFormatter {
    pub fn new() -> Self {
        Self
    }

    fn infix(parts: &[String], op: &str) -> String {
        format!("({})", parts.join(op))
    }

    fn call(name: &str, parts: &[String]) -> String {
        format!("{}({})", name, parts.join(", "))
    }

    /// True if the opening parenthesis of `sql` closes at its last character
    fn is_enclosed(sql: &str) -> bool {
        if !sql.starts_with('(') || !sql.ends_with(')') {
            return false;
        }
        let mut open = 0usize;
        let mut quoted = false;
        for (i, ch) in sql.char_indices() {
            match ch {
                '\'' => quoted = !quoted,
                '(' if !quoted => open += 1,
                ')' if !quoted => {
                    open = open.saturating_sub(1);
                    if open == 0 {
                        return i == sql.len() - 1;
                    }
                }
                _ => {}
            }
        }
        false
    }
}

impl Formatter for SqlFormatter {
    fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d %H:%M:%S%.3f")),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.quote(v)).collect();
                self.list(&parts)
            }
        }
    }

    fn field(&self, name: &str, table: Option<&str>) -> String {
        match table {
            Some(table) => format!("{}.{}", table, name),
            None => name.to_string(),
        }
    }

    fn alias(&self, fragment: &str, alias: &str) -> String {
        format!("{} AS {}", fragment, alias)
    }

    fn group(&self, fragment: &str) -> String {
        if Self::is_enclosed(fragment) {
            fragment.to_string()
        } else {
            format!("({})", fragment)
        }
    }

    fn join_and(&self, parts: &[String]) -> String {
        match parts {
            [] => self.eq("1", "1"),
            [single] => single.clone(),
            _ => Self::infix(parts, " AND "),
        }
    }

    fn join_or(&self, parts: &[String]) -> String {
        match parts {
            [] => self.eq("1", "0"),
            [single] => single.clone(),
            _ => Self::infix(parts, " OR "),
        }
    }

    fn eq(&self, left: &str, right: &str) -> String {
        format!("{} = {}", left, right)
    }

    fn ne(&self, left: &str, right: &str) -> String {
        format!("{} <> {}", left, right)
    }

    fn lt(&self, left: &str, right: &str) -> String {
        format!("{} < {}", left, right)
    }

    fn le(&self, left: &str, right: &str) -> String {
        format!("{} <= {}", left, right)
    }

    fn gt(&self, left: &str, right: &str) -> String {
        format!("{} > {}", left, right)
    }

    fn ge(&self, left: &str, right: &str) -> String {
        format!("{} >= {}", left, right)
    }

    fn is_null(&self, expr: &str) -> String {
        format!("{} IS NULL", expr)
    }

    fn is_not_null(&self, expr: &str) -> String {
        format!("{} IS NOT NULL", expr)
    }

    fn not(&self, expr: &str) -> String {
        format!("NOT ({})", expr)
    }

    fn minus(&self, expr: &str) -> String {
        format!("-({})", expr)
    }

    fn bitwise_not(&self, expr: &str) -> String {
        format!("~({})", expr)
    }

    fn bit_set(&self, expr: &str, bit: &str) -> String {
        format!("(({} & POWER(2, {})) <> 0)", expr, bit)
    }

    fn bit_clear(&self, expr: &str, bit: &str) -> String {
        format!("(({} & POWER(2, {})) = 0)", expr, bit)
    }

    fn test_mask(&self, expr: &str, mask: &str, val: &str) -> String {
        format!("(({} & {}) = ({} & {}))", expr, mask, val, mask)
    }

    fn between(&self, expr: &str, min: &str, max: &str) -> String {
        format!("{} BETWEEN {} AND {}", expr, min, max)
    }

    fn like(&self, expr: &str, mask: &str) -> String {
        format!("{} LIKE {}", expr, mask)
    }

    fn is_in(&self, expr: &str, list: &str) -> String {
        format!("{} IN {}", expr, list)
    }

    fn coalesce(&self, parts: &[String]) -> String {
        Self::call("COALESCE", parts)
    }

    fn add(&self, parts: &[String]) -> String {
        Self::infix(parts, " + ")
    }

    fn mul(&self, parts: &[String]) -> String {
        Self::infix(parts, " * ")
    }

    fn sub(&self, left: &str, right: &str) -> String {
        format!("({} - {})", left, right)
    }

    fn div(&self, left: &str, right: &str) -> String {
        format!("({} / {})", left, right)
    }

    fn modulus(&self, left: &str, right: &str) -> String {
        format!("({} % {})", left, right)
    }

    fn concat(&self, parts: &[String]) -> String {
        Self::call("CONCAT", parts)
    }

    fn bitwise_and(&self, parts: &[String]) -> String {
        Self::infix(parts, " & ")
    }

    fn bitwise_or(&self, parts: &[String]) -> String {
        Self::infix(parts, " | ")
    }

    fn bitwise_xor(&self, parts: &[String]) -> String {
        Self::infix(parts, " ^ ")
    }

    fn substring(&self, expr: &str, start: &str, len: &str) -> String {
        format!("SUBSTRING({}, {}, {})", expr, start, len)
    }

    fn convert_to_int(&self, expr: &str) -> String {
        format!("CAST({} AS BIGINT)", expr)
    }

    fn convert_to_string(&self, expr: &str, max_len: &str) -> String {
        if max_len == self.quote(&Value::Null) {
            format!("CAST({} AS VARCHAR)", expr)
        } else {
            format!("CAST({} AS VARCHAR({}))", expr, max_len)
        }
    }

    fn list(&self, parts: &[String]) -> String {
        format!("({})", parts.join(", "))
    }

    fn min(&self, expr: &str) -> String {
        format!("MIN({})", expr)
    }

    fn max(&self, expr: &str) -> String {
        format!("MAX({})", expr)
    }

    fn sum(&self, expr: &str) -> String {
        format!("SUM({})", expr)
    }

    fn distinct(&self, parts: &[String]) -> String {
        format!("DISTINCT {}", parts.join(", "))
    }
}
