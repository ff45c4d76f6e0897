//! Evaluate Scalar Unary Module
//!
//! Applies a configurable single-argument operation to a number.

use async_trait::async_trait;
use dataflow_engine::{
    ExecutionContext, ModuleBehavior, ModuleDescription, ModuleDescriptor, ModuleRegistration,
    ModuleTypeId, NetworkError, PortDescription, Result,
};
use serde::{Deserialize, Serialize};

use crate::{scalar_input, PACKAGE, SCALAR};

/// Operation applied by `EvaluateScalarUnary`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    #[default]
    Negate,
    Abs,
    Square,
    Sqrt,
    Increment,
}

impl UnaryOperator {
    pub fn apply(self, x: f64) -> Result<f64> {
        match self {
            Self::Negate => Ok(-x),
            Self::Abs => Ok(x.abs()),
            Self::Square => Ok(x * x),
            Self::Sqrt if x < 0.0 => Err(NetworkError::failed(format!(
                "square root of negative number {}",
                x
            ))),
            Self::Sqrt => Ok(x.sqrt()),
            Self::Increment => Ok(x + 1.0),
        }
    }
}

/// Parameters of an `EvaluateScalarUnary` module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateScalarUnaryConfig {
    pub operator: UnaryOperator,
}

/// Evaluate Scalar Unary Module
///
/// # Inputs
/// - `input` (required) - the operand
///
/// # Parameters
/// - `operator` - one of `negate` (default), `abs`, `square`, `sqrt`, `increment`
///
/// # Outputs
/// - `result` - the operator applied to the operand
#[derive(Debug, Default)]
pub struct EvaluateScalarUnary;

impl EvaluateScalarUnary {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_RESULT: &'static str = "result";
}

impl ModuleDescriptor for EvaluateScalarUnary {
    fn descriptor() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("EvaluateScalarUnary", "Math", PACKAGE))
            .with_description("Applies a unary operation to a number")
            .with_input(PortDescription::fixed(Self::PORT_INPUT, SCALAR))
            .with_output(PortDescription::fixed(Self::PORT_RESULT, SCALAR))
    }
}

inventory::submit!(ModuleRegistration {
    descriptor: EvaluateScalarUnary::descriptor,
    create: || Box::new(EvaluateScalarUnary),
});

#[async_trait]
impl ModuleBehavior for EvaluateScalarUnary {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let config: EvaluateScalarUnaryConfig = ctx.parameters_as()?;
        let x = scalar_input(ctx, Self::PORT_INPUT)?;
        let result = config.operator.apply(x)?;

        log::debug!(
            "EvaluateScalarUnary {}: {:?}({}) = {}",
            ctx.module_id(),
            config.operator,
            x,
            result
        );
        ctx.send_output(Self::PORT_RESULT, serde_json::json!(result));
        Ok(())
    }
}
