//! Sum Scalars Module
//!
//! Adds any number of inputs through a dynamic port group.

use async_trait::async_trait;
use dataflow_engine::{
    ExecutionContext, ModuleBehavior, ModuleDescription, ModuleDescriptor, ModuleRegistration,
    ModuleTypeId, NetworkError, PortDescription, Result,
};

use crate::{PACKAGE, SCALAR};

/// Sum Scalars Module
///
/// # Inputs
/// - `values` (dynamic) - a new slot opens each time one is connected
///
/// # Outputs
/// - `sum` - total of all connected inputs (0 when none are connected)
/// - `count` - number of connected inputs
#[derive(Debug, Default)]
pub struct SumScalars;

impl SumScalars {
    pub const PORT_VALUES: &'static str = "values";
    pub const PORT_SUM: &'static str = "sum";
    pub const PORT_COUNT: &'static str = "count";
}

impl ModuleDescriptor for SumScalars {
    fn descriptor() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("SumScalars", "Math", PACKAGE))
            .with_description("Adds any number of inputs")
            .with_input(PortDescription::dynamic(Self::PORT_VALUES, SCALAR))
            .with_output(PortDescription::fixed(Self::PORT_SUM, SCALAR))
            .with_output(PortDescription::fixed(Self::PORT_COUNT, SCALAR))
    }
}

inventory::submit!(ModuleRegistration {
    descriptor: SumScalars::descriptor,
    create: || Box::new(SumScalars),
});

#[async_trait]
impl ModuleBehavior for SumScalars {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let values = ctx
            .group_inputs(Self::PORT_VALUES)
            .into_iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| NetworkError::failed(format!("input is not a number: {}", v)))
            })
            .collect::<Result<Vec<f64>>>()?;

        let sum: f64 = values.iter().sum();
        log::debug!(
            "SumScalars {}: {} input(s), sum {}",
            ctx.module_id(),
            values.len(),
            sum
        );
        ctx.send_output(Self::PORT_SUM, serde_json::json!(sum));
        ctx.send_output(Self::PORT_COUNT, serde_json::json!(values.len()));
        Ok(())
    }
}
