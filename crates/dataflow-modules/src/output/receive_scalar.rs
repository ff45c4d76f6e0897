//! Receive Scalar Module
//!
//! Terminal module that records the number it receives.

use async_trait::async_trait;
use dataflow_engine::{
    ExecutionContext, ModuleBehavior, ModuleDescription, ModuleDescriptor, ModuleRegistration,
    ModuleTypeId, PortDescription, Result,
};

use crate::{scalar_input, PACKAGE, SCALAR};

/// Receive Scalar Module
///
/// # Inputs
/// - `scalar` (required) - the number to record
///
/// # Transient values
/// - `received` - the last number received
#[derive(Debug, Default)]
pub struct ReceiveScalar;

impl ReceiveScalar {
    pub const PORT_SCALAR: &'static str = "scalar";
    /// Transient key holding the received number
    pub const RECEIVED: &'static str = "received";
}

impl ModuleDescriptor for ReceiveScalar {
    fn descriptor() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("ReceiveScalar", "Output", PACKAGE))
            .with_description("Records the number it receives")
            .with_input(PortDescription::fixed(Self::PORT_SCALAR, SCALAR))
    }
}

inventory::submit!(ModuleRegistration {
    descriptor: ReceiveScalar::descriptor,
    create: || Box::new(ReceiveScalar),
});

#[async_trait]
impl ModuleBehavior for ReceiveScalar {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let value = scalar_input(ctx, Self::PORT_SCALAR)?;
        log::debug!("ReceiveScalar {}: received {}", ctx.module_id(), value);
        ctx.set_transient(Self::RECEIVED, serde_json::json!(value));
        Ok(())
    }
}
