//! Operator tags identifying which combinator built a node.
//!
//! The tag doubles as the registry used by the codec: every tag has a stable
//! name and an arity, and [`Operator::from_name`] is the inverse of
//! [`Operator::as_str`].

/// Every combinator that produces an expression node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Leaves
    Field,
    Context,
    Constant,

    // Predicates
    IsNull,
    IsNotNull,
    Not,
    BitSet,
    BitClear,
    TestMask,
    Between,
    Like,
    IsIn,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
    Coalesce,

    // Arithmetic
    Minus,
    Add,
    Sub,
    Mul,
    Div,
    Modulus,

    // Bitwise
    BitwiseNot,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,

    // String and conversion
    Concat,
    Substring,
    ConvertToInt,
    ConvertToString,

    // Collections
    List,
    Mcmp,

    // Grouping
    Min,
    Max,
    Sum,
    Distinct,
}

/// Number of arguments an operator accepts when rebuilt from a serialized tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    Variadic,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::Variadic => true,
        }
    }
}

impl Operator {
    pub const ALL: [Operator; 41] = [
        Operator::Field,
        Operator::Context,
        Operator::Constant,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::Not,
        Operator::BitSet,
        Operator::BitClear,
        Operator::TestMask,
        Operator::Between,
        Operator::Like,
        Operator::IsIn,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::And,
        Operator::Or,
        Operator::Coalesce,
        Operator::Minus,
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Modulus,
        Operator::BitwiseNot,
        Operator::BitwiseAnd,
        Operator::BitwiseOr,
        Operator::BitwiseXor,
        Operator::Concat,
        Operator::Substring,
        Operator::ConvertToInt,
        Operator::ConvertToString,
        Operator::List,
        Operator::Mcmp,
        Operator::Min,
        Operator::Max,
        Operator::Sum,
        Operator::Distinct,
    ];

    /// Registry name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Field => "field",
            Operator::Context => "context",
            Operator::Constant => "constant",
            Operator::IsNull => "isNull",
            Operator::IsNotNull => "isNotNull",
            Operator::Not => "not",
            Operator::BitSet => "bitSet",
            Operator::BitClear => "bitClear",
            Operator::TestMask => "testMask",
            Operator::Between => "between",
            Operator::Like => "like",
            Operator::IsIn => "isIn",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Coalesce => "coalesce",
            Operator::Minus => "minus",
            Operator::Add => "add",
            Operator::Sub => "sub",
            Operator::Mul => "mul",
            Operator::Div => "div",
            Operator::Modulus => "modulus",
            Operator::BitwiseNot => "bitwiseNot",
            Operator::BitwiseAnd => "bitwiseAnd",
            Operator::BitwiseOr => "bitwiseOr",
            Operator::BitwiseXor => "bitwiseXor",
            Operator::Concat => "concat",
            Operator::Substring => "substring",
            Operator::ConvertToInt => "convertToInt",
            Operator::ConvertToString => "convertToString",
            Operator::List => "list",
            Operator::Mcmp => "mcmp",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::Sum => "sum",
            Operator::Distinct => "distinct",
        }
    }

    /// Look an operator up by registry name
    pub fn from_name(name: &str) -> Option<Operator> {
        let op = match name {
            "field" => Operator::Field,
            "context" => Operator::Context,
            "constant" => Operator::Constant,
            "isNull" => Operator::IsNull,
            "isNotNull" => Operator::IsNotNull,
            "not" => Operator::Not,
            "bitSet" => Operator::BitSet,
            "bitClear" => Operator::BitClear,
            "testMask" => Operator::TestMask,
            "between" => Operator::Between,
            "like" => Operator::Like,
            "isIn" => Operator::IsIn,
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "lt" => Operator::Lt,
            "le" => Operator::Le,
            "gt" => Operator::Gt,
            "ge" => Operator::Ge,
            "and" => Operator::And,
            "or" => Operator::Or,
            "coalesce" => Operator::Coalesce,
            "minus" => Operator::Minus,
            "add" => Operator::Add,
            "sub" => Operator::Sub,
            "mul" => Operator::Mul,
            "div" => Operator::Div,
            "modulus" => Operator::Modulus,
            "bitwiseNot" => Operator::BitwiseNot,
            "bitwiseAnd" => Operator::BitwiseAnd,
            "bitwiseOr" => Operator::BitwiseOr,
            "bitwiseXor" => Operator::BitwiseXor,
            "concat" => Operator::Concat,
            "substring" => Operator::Substring,
            "convertToInt" => Operator::ConvertToInt,
            "convertToString" => Operator::ConvertToString,
            "list" => Operator::List,
            "mcmp" => Operator::Mcmp,
            "min" => Operator::Min,
            "max" => Operator::Max,
            "sum" => Operator::Sum,
            "distinct" => Operator::Distinct,
            _ => return None,
        };
        Some(op)
    }

    /// Arguments accepted when rebuilding the operator
    pub fn arity(&self) -> Arity {
        match self {
            Operator::Field => Arity::Range(1, 2),
            Operator::Mcmp => Arity::Range(2, 3),

            Operator::Context
            | Operator::Constant
            | Operator::IsNull
            | Operator::IsNotNull
            | Operator::Not
            | Operator::Minus
            | Operator::BitwiseNot
            | Operator::ConvertToInt
            | Operator::Min
            | Operator::Max
            | Operator::Sum => Arity::Exact(1),

            Operator::BitSet
            | Operator::BitClear
            | Operator::Like
            | Operator::IsIn
            | Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge
            | Operator::Sub
            | Operator::Div
            | Operator::Modulus
            | Operator::ConvertToString => Arity::Exact(2),

            Operator::TestMask | Operator::Between | Operator::Substring => Arity::Exact(3),

            Operator::And
            | Operator::Or
            | Operator::Coalesce
            | Operator::Add
            | Operator::Mul
            | Operator::Concat
            | Operator::BitwiseAnd
            | Operator::BitwiseOr
            | Operator::BitwiseXor
            | Operator::List
            | Operator::Distinct => Arity::Variadic,
        }
    }

    /// Whether the operator consumes a collection of records
    pub fn is_grouping(&self) -> bool {
        matches!(
            self,
            Operator::Min | Operator::Max | Operator::Sum | Operator::Distinct
        )
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_name(op.as_str()), Some(op));
        }
        assert_eq!(Operator::from_name("frobnicate"), None);
        assert_eq!(Operator::from_name("IsNull"), None);
    }

    #[test]
    fn test_arity() {
        assert!(Operator::Field.arity().accepts(1));
        assert!(Operator::Field.arity().accepts(2));
        assert!(!Operator::Field.arity().accepts(3));
        assert!(Operator::Between.arity().accepts(3));
        assert!(!Operator::Eq.arity().accepts(1));
        assert!(Operator::And.arity().accepts(0));
        assert!(Operator::Concat.arity().accepts(7));
    }

    #[test]
    fn test_grouping_operators() {
        assert!(Operator::Sum.is_grouping());
        assert!(Operator::Distinct.is_grouping());
        assert!(!Operator::Add.is_grouping());
        assert!(!Operator::Field.is_grouping());
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(Operator::BitwiseXor.to_string(), "bitwiseXor");
        assert_eq!(Operator::ConvertToString.to_string(), "convertToString");
    }
}
