//! The PineVM engine: values, expressions, kernel primitives, evaluator,
//! and the codecs between them.

pub mod codec;
pub mod eval;
pub mod expression;
pub mod json;
pub mod kernel;
pub mod value;

pub use codec::{DecodeExprError, decode_expression, encode_expression};
pub use eval::{EvalError, EvalMetrics, Evaluator, NativeFunction, OverrideEvaluate};
pub use expression::Expression;
pub use json::{JsonValueError, json_from_value, json_str_from_value, value_from_json, value_from_json_str};
pub use kernel::{KernelFn, KernelTable, kernel_function, kernel_table};
pub use value::{
    HashParseError, Value, ValueHash, int_from_value, int_value, sha256_bytes, string_from_value,
    string_value,
};
