pub mod codec;
pub mod expression;
pub mod formatter;
pub mod value;

pub use codec::{from_json, to_json, TreeObject};
pub use expression::{Expression, ExpressionError, ExpressionResult, Operand, Operator};
pub use formatter::{Formatter, SqlFormatter};
pub use value::{Environment, Evaluation, Record, Value};
