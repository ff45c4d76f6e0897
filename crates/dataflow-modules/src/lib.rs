//! Dataflow Modules
//!
//! Built-in module implementations for the dataflow network engine.
//! Every module here registers itself with `inventory`, so
//! `ModuleRegistry::with_builtins()` picks them all up.
//!
//! # Categories
//!
//! - **Input**: Modules that produce values or receive external data
//! - **Math**: Modules that transform scalars
//! - **Output**: Modules that consume values for observers

pub mod input;
pub mod output;
pub mod processing;

pub use input::*;
pub use output::*;
pub use processing::*;

use dataflow_engine::{ExecutionContext, NetworkError, Result};

/// Datatype tag carried by every port in this crate
pub const SCALAR: &str = "Scalar";

/// Package name shared by all built-in module types
pub const PACKAGE: &str = "Dataflow";

/// Read a required input as a number
pub(crate) fn scalar_input(ctx: &ExecutionContext, port: &str) -> Result<f64> {
    let value = ctx.require_input(port)?;
    value.as_f64().ok_or_else(|| {
        NetworkError::failed(format!(
            "{}: input '{}' is not a number: {}",
            ctx.module_id(),
            port,
            value
        ))
    })
}
