//! Math modules
//!
//! Modules that transform scalar values.

mod binary;
mod sum;
mod unary;

pub use binary::{BinaryOperator, EvaluateScalarBinary, EvaluateScalarBinaryConfig};
pub use sum::SumScalars;
pub use unary::{EvaluateScalarUnary, EvaluateScalarUnaryConfig, UnaryOperator};
