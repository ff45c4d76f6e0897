//! Evaluate Scalar Binary Module
//!
//! Combines two numbers with a configurable operation.

use async_trait::async_trait;
use dataflow_engine::{
    ExecutionContext, ModuleBehavior, ModuleDescription, ModuleDescriptor, ModuleRegistration,
    ModuleTypeId, NetworkError, PortDescription, Result,
};
use serde::{Deserialize, Serialize};

use crate::{scalar_input, PACKAGE, SCALAR};

/// Operation applied by `EvaluateScalarBinary`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    #[default]
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Min,
    Max,
}

impl BinaryOperator {
    pub fn apply(self, lhs: f64, rhs: f64) -> Result<f64> {
        match self {
            Self::Add => Ok(lhs + rhs),
            Self::Subtract => Ok(lhs - rhs),
            Self::Multiply => Ok(lhs * rhs),
            Self::Divide if rhs == 0.0 => Err(NetworkError::failed("division by zero")),
            Self::Divide => Ok(lhs / rhs),
            Self::Power => Ok(lhs.powf(rhs)),
            Self::Min => Ok(lhs.min(rhs)),
            Self::Max => Ok(lhs.max(rhs)),
        }
    }
}

/// Parameters of an `EvaluateScalarBinary` module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateScalarBinaryConfig {
    pub operator: BinaryOperator,
}

/// Evaluate Scalar Binary Module
///
/// # Inputs
/// - `lhs` (required) - left operand
/// - `rhs` (required) - right operand
///
/// # Parameters
/// - `operator` - `add` (default), `subtract`, `multiply`, `divide`,
///   `power`, `min` or `max`
///
/// # Outputs
/// - `result`
#[derive(Debug, Default)]
pub struct EvaluateScalarBinary;

impl EvaluateScalarBinary {
    pub const PORT_LHS: &'static str = "lhs";
    pub const PORT_RHS: &'static str = "rhs";
    pub const PORT_RESULT: &'static str = "result";
}

impl ModuleDescriptor for EvaluateScalarBinary {
    fn descriptor() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("EvaluateScalarBinary", "Math", PACKAGE))
            .with_description("Combines two numbers")
            .with_input(PortDescription::fixed(Self::PORT_LHS, SCALAR))
            .with_input(PortDescription::fixed(Self::PORT_RHS, SCALAR))
            .with_output(PortDescription::fixed(Self::PORT_RESULT, SCALAR))
    }
}

inventory::submit!(ModuleRegistration {
    descriptor: EvaluateScalarBinary::descriptor,
    create: || Box::new(EvaluateScalarBinary),
});

#[async_trait]
impl ModuleBehavior for EvaluateScalarBinary {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let config: EvaluateScalarBinaryConfig = ctx.parameters_as()?;
        let lhs = scalar_input(ctx, Self::PORT_LHS)?;
        let rhs = scalar_input(ctx, Self::PORT_RHS)?;
        let result = config.operator.apply(lhs, rhs)?;

        log::debug!(
            "EvaluateScalarBinary {}: {} {:?} {} = {}",
            ctx.module_id(),
            lhs,
            config.operator,
            rhs,
            result
        );
        ctx.send_output(Self::PORT_RESULT, serde_json::json!(result));
        Ok(())
    }
}
