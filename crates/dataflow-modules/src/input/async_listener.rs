//! Async Scalar Listener Module
//!
//! Receives numbers pushed from outside the network through the
//! controller's `AsyncDataSender` and republishes them.

use async_trait::async_trait;
use dataflow_engine::{
    ExecutionContext, ModuleBehavior, ModuleDescription, ModuleDescriptor, ModuleRegistration,
    ModuleTypeId, NetworkError, PortDescription, Result,
};

use crate::{PACKAGE, SCALAR};

/// Async Scalar Listener Module
///
/// Keeps a running total of everything received over its lifetime.
///
/// # Inputs
/// - `feed` (asynchronous, dynamic) - numbers pushed by producers
///
/// # Outputs
/// - `latest` - the most recent number received
/// - `total` - sum of every number received so far
///
/// # Transient values
/// - `received` - how many numbers arrived for this execution
#[derive(Debug, Default)]
pub struct AsyncScalarListener {
    total: f64,
    latest: Option<f64>,
}

impl AsyncScalarListener {
    pub const PORT_FEED: &'static str = "feed";
    pub const PORT_LATEST: &'static str = "latest";
    pub const PORT_TOTAL: &'static str = "total";
}

impl ModuleDescriptor for AsyncScalarListener {
    fn descriptor() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("AsyncScalarListener", "Input", PACKAGE))
            .with_description("Republishes numbers pushed from outside the network")
            .with_input(PortDescription::dynamic(Self::PORT_FEED, SCALAR).asynchronous())
            .with_output(PortDescription::fixed(Self::PORT_LATEST, SCALAR))
            .with_output(PortDescription::fixed(Self::PORT_TOTAL, SCALAR))
    }
}

inventory::submit!(ModuleRegistration {
    descriptor: AsyncScalarListener::descriptor,
    create: || Box::new(AsyncScalarListener::default()),
});

#[async_trait]
impl ModuleBehavior for AsyncScalarListener {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let mut received = 0usize;
        for value in ctx.async_inputs() {
            let number = value.as_f64().ok_or_else(|| {
                NetworkError::failed(format!("{}: async value is not a number: {}", ctx.module_id(), value))
            })?;
            self.total += number;
            self.latest = Some(number);
            received += 1;
        }

        // Connected synchronous feeds count too
        for value in ctx.group_inputs(Self::PORT_FEED) {
            if let Some(number) = value.as_f64() {
                self.latest = Some(number);
            }
        }

        log::debug!(
            "AsyncScalarListener {}: {} value(s) received, total {}",
            ctx.module_id(),
            received,
            self.total
        );

        ctx.set_transient("received", serde_json::json!(received));
        if let Some(latest) = self.latest {
            ctx.send_output(Self::PORT_LATEST, serde_json::json!(latest));
        }
        ctx.send_output(Self::PORT_TOTAL, serde_json::json!(self.total));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use serde_json::json;

    #[test]
    fn test_descriptor_marks_async_input() {
        let description = AsyncScalarListener::descriptor();
        assert!(description.accepts_async_input());
        assert!(description.has_dynamic_ports());
    }

    #[tokio::test]
    async fn test_accumulates_across_executions() {
        let mut listener = AsyncScalarListener::default();

        let mut ctx = context(&[], json!({})).with_async_inputs(vec![json!(1.0), json!(2.0)]);
        listener.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.output("latest"), Some(&json!(2.0)));
        assert_eq!(ctx.transient("received"), Some(&json!(2)));

        let mut ctx = context(&[], json!({})).with_async_inputs(vec![json!(4.0)]);
        listener.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.output("total"), Some(&json!(7.0)));
        assert_eq!(ctx.transient("received"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_nothing_received_yet() {
        let mut ctx = context(&[], json!({}));
        AsyncScalarListener::default().execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.output("latest"), None);
        assert_eq!(ctx.output("total"), Some(&json!(0.0)));
    }

    #[tokio::test]
    async fn test_rejects_non_numeric_data() {
        let mut ctx = context(&[], json!({})).with_async_inputs(vec![json!("x")]);
        assert!(AsyncScalarListener::default().execute(&mut ctx).await.is_err());
    }
}
