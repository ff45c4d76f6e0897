//! Send Scalar Module
//!
//! Publishes a configured number. The usual head of a network.

use async_trait::async_trait;
use dataflow_engine::{
    ExecutionContext, ModuleBehavior, ModuleDescription, ModuleDescriptor, ModuleRegistration,
    ModuleTypeId, PortDescription, Result,
};
use serde::{Deserialize, Serialize};

use crate::{PACKAGE, SCALAR};

/// Parameters of a `SendScalar` module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendScalarConfig {
    /// Value published on every execution
    pub value: f64,
}

/// Send Scalar Module
///
/// # Parameters
/// - `value` - the number to publish (defaults to 0)
///
/// # Outputs
/// - `scalar` - the configured number
#[derive(Debug, Default)]
pub struct SendScalar;

impl SendScalar {
    /// Port name for the scalar output
    pub const PORT_SCALAR: &'static str = "scalar";
}

impl ModuleDescriptor for SendScalar {
    fn descriptor() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("SendScalar", "Input", PACKAGE))
            .with_description("Publishes a configured number")
            .with_output(PortDescription::fixed(Self::PORT_SCALAR, SCALAR))
    }
}

inventory::submit!(ModuleRegistration {
    descriptor: SendScalar::descriptor,
    create: || Box::new(SendScalar),
});

#[async_trait]
impl ModuleBehavior for SendScalar {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let config: SendScalarConfig = ctx.parameters_as()?;
        log::debug!("SendScalar {}: sending {}", ctx.module_id(), config.value);
        ctx.send_output(Self::PORT_SCALAR, serde_json::json!(config.value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use serde_json::json;

    #[tokio::test]
    async fn test_sends_configured_value() {
        let mut ctx = context(&[], json!({"value": 2.5}));
        SendScalar.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.output("scalar"), Some(&json!(2.5)));
    }

    #[tokio::test]
    async fn test_defaults_to_zero() {
        let mut ctx = context(&[], json!({}));
        SendScalar.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.output("scalar"), Some(&json!(0.0)));
    }

    #[tokio::test]
    async fn test_rejects_non_numeric_value() {
        let mut ctx = context(&[], json!({"value": "three"}));
        assert!(SendScalar.execute(&mut ctx).await.is_err());
    }
}
