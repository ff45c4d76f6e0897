//! Module instances
//!
//! A `Module` pairs an opaque `ModuleBehavior` with the engine-side state
//! the network and scheduler manage: its ordered port lists, execution
//! state, change flags and the values it produced last.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{ExecutionContext, InterruptHandle};
use crate::descriptor::{ModuleDescription, PortDescription};
use crate::error::Result;
use crate::port::Port;
use crate::reexecution::{DynamicReexecutionStrategy, ReexecutionFlags, ReexecutionStrategy};
use crate::types::{Datatype, ExecutionState, ModuleId, ModuleTypeId, PortDirection, PortId};

/// The opaque computation a module performs
///
/// Implementations read inputs and parameters from the context and publish
/// results with `send_output`. Long-running work should poll
/// `ctx.check_interrupted()`.
#[async_trait]
pub trait ModuleBehavior: Send {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()>;
}

/// Key of a dynamic group: direction plus group name
pub(crate) type GroupKey = (PortDirection, String);

/// A module instance inside a network
pub struct Module {
    id: ModuleId,
    description: ModuleDescription,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    next_serials: BTreeMap<GroupKey, usize>,
    state: ExecutionState,
    flags: ReexecutionFlags,
    execution_disabled: bool,
    strategy: Arc<dyn ReexecutionStrategy>,
    behavior: Box<dyn ModuleBehavior>,
    parameters: serde_json::Map<String, serde_json::Value>,
    output_values: HashMap<String, serde_json::Value>,
    transient: HashMap<String, serde_json::Value>,
    pending_async: Vec<serde_json::Value>,
    error_message: Option<String>,
    interrupt: InterruptHandle,
}

impl Module {
    /// Instantiate a module from its description
    ///
    /// Fixed ports get index 0; each dynamic group starts as a single open
    /// slot with serial 0.
    pub fn new(
        id: ModuleId,
        description: ModuleDescription,
        behavior: Box<dyn ModuleBehavior>,
    ) -> Self {
        let mut next_serials = BTreeMap::new();
        let inputs = build_ports(&id, PortDirection::Input, &description.inputs, &mut next_serials);
        let outputs =
            build_ports(&id, PortDirection::Output, &description.outputs, &mut next_serials);

        Self {
            id,
            description,
            inputs,
            outputs,
            next_serials,
            state: ExecutionState::NotExecuted,
            flags: ReexecutionFlags::default(),
            execution_disabled: false,
            strategy: Arc::new(DynamicReexecutionStrategy),
            behavior,
            parameters: serde_json::Map::new(),
            output_values: HashMap::new(),
            transient: HashMap::new(),
            pending_async: Vec::new(),
            error_message: None,
            interrupt: InterruptHandle::new(),
        }
    }

    /// Replace the generated port layout with a recorded one
    pub(crate) fn restore_layout(
        &mut self,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
        next_serials: BTreeMap<GroupKey, usize>,
    ) {
        self.inputs = inputs;
        self.outputs = outputs;
        self.next_serials = next_serials;
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.reset_connections();
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn type_id(&self) -> &ModuleTypeId {
        &self.description.type_id
    }

    pub fn description(&self) -> &ModuleDescription {
        &self.description
    }

    // Ports

    pub fn input_ports(&self) -> &[Port] {
        &self.inputs
    }

    pub fn output_ports(&self) -> &[Port] {
        &self.outputs
    }

    pub fn ports(&self, direction: PortDirection) -> &[Port] {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    pub(crate) fn ports_mut(&mut self, direction: PortDirection) -> &mut Vec<Port> {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        }
    }

    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.ports(id.direction).iter().find(|p| p.id() == id)
    }

    pub(crate) fn port_mut(&mut self, id: &PortId) -> Option<&mut Port> {
        self.ports_mut(id.direction).iter_mut().find(|p| p.id() == id)
    }

    /// First unconnected port of a datatype in a direction
    pub fn free_port(&self, direction: PortDirection, datatype: &Datatype) -> Option<&Port> {
        self.ports(direction).iter().find(|p| {
            p.datatype() == datatype && (direction == PortDirection::Output || !p.is_connected())
        })
    }

    /// Ports of one dynamic group, in display order
    pub fn group_ports(&self, direction: PortDirection, group: &str) -> Vec<&Port> {
        self.ports(direction)
            .iter()
            .filter(|p| p.group() == Some(group))
            .collect()
    }

    /// Hand out the next serial for a dynamic group
    pub(crate) fn allocate_serial(&mut self, direction: PortDirection, group: &str) -> usize {
        let next = self
            .next_serials
            .entry((direction, group.to_string()))
            .or_insert(0);
        let serial = *next;
        *next += 1;
        serial
    }

    pub(crate) fn next_serials(&self) -> &BTreeMap<GroupKey, usize> {
        &self.next_serials
    }

    // Execution state

    pub fn execution_state(&self) -> ExecutionState {
        self.state
    }

    pub fn set_execution_state(&mut self, state: ExecutionState) {
        self.state = state;
    }

    /// Whether the re-execution strategy asks for a run
    pub fn need_to_execute(&self) -> bool {
        self.strategy.needs_execution(&self.flags)
    }

    pub fn reexecution_flags(&self) -> ReexecutionFlags {
        self.flags
    }

    pub fn force_execution(&mut self) {
        self.flags.forced = true;
    }

    pub(crate) fn mark_inputs_changed(&mut self) {
        self.flags.inputs_changed = true;
    }

    pub fn execution_disabled(&self) -> bool {
        self.execution_disabled
    }

    pub fn set_execution_disabled(&mut self, disabled: bool) {
        self.execution_disabled = disabled;
    }

    pub fn reexecution_strategy(&self) -> &Arc<dyn ReexecutionStrategy> {
        &self.strategy
    }

    pub fn set_reexecution_strategy(&mut self, strategy: Arc<dyn ReexecutionStrategy>) {
        self.strategy = strategy;
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    // Parameters and data

    pub fn parameters(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }

    /// Set a parameter and mark the module for re-execution
    pub fn set_parameter(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.parameters.insert(key.into(), value);
        self.flags.parameters_changed = true;
    }

    pub(crate) fn replace_parameters(
        &mut self,
        parameters: serde_json::Map<String, serde_json::Value>,
    ) {
        self.parameters = parameters;
    }

    /// Last value produced on an output port
    pub fn output_value(&self, port: &str) -> Option<&serde_json::Value> {
        self.output_values.get(port)
    }

    pub fn transient_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.transient.get(key)
    }

    pub(crate) fn push_async_input(&mut self, value: serde_json::Value) {
        self.pending_async.push(value);
        self.flags.inputs_changed = true;
    }

    pub(crate) fn take_async_inputs(&mut self) -> Vec<serde_json::Value> {
        std::mem::take(&mut self.pending_async)
    }

    // Pass bookkeeping

    /// Build the context for one execution from already gathered inputs
    pub(crate) fn prepare_context(
        &mut self,
        inputs: Vec<crate::context::InputValue>,
    ) -> ExecutionContext {
        let async_inputs = self.take_async_inputs();
        ExecutionContext::new(
            self.id.clone(),
            inputs,
            self.parameters.clone(),
            self.interrupt.clone(),
        )
        .with_async_inputs(async_inputs)
    }

    pub(crate) async fn run_behavior(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.behavior.execute(ctx).await
    }

    pub(crate) fn mark_completed(
        &mut self,
        outputs: HashMap<String, serde_json::Value>,
        transient: HashMap<String, serde_json::Value>,
    ) {
        self.output_values = outputs;
        self.transient.extend(transient);
        self.flags = ReexecutionFlags::completed();
        self.error_message = None;
        self.state = ExecutionState::Completed;
    }

    pub(crate) fn mark_errored(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.flags.has_completed = false;
        self.state = ExecutionState::Errored;
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("type_id", &self.description.type_id)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("execution_disabled", &self.execution_disabled)
            .field("strategy", &self.strategy.name())
            .finish_non_exhaustive()
    }
}

fn build_ports(
    module_id: &ModuleId,
    direction: PortDirection,
    templates: &[PortDescription],
    next_serials: &mut BTreeMap<GroupKey, usize>,
) -> Vec<Port> {
    templates
        .iter()
        .map(|template| {
            let id = PortId::new(module_id.clone(), direction, template.name.clone(), 0);
            if template.dynamic {
                next_serials.insert((direction, template.name.clone()), 1);
                Port::dynamic(id, template.datatype.clone(), template.asynchronous)
            } else {
                Port::fixed(id, template.datatype.clone())
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::reexecution::AlwaysReexecuteStrategy;

    /// Behavior that does nothing
    pub(crate) struct Noop;

    #[async_trait]
    impl ModuleBehavior for Noop {
        async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    /// Behavior that always fails
    pub(crate) struct Fail;

    #[async_trait]
    impl ModuleBehavior for Fail {
        async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<()> {
            Err(NetworkError::failed("boom"))
        }
    }

    fn sum_description() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("Sum", "Math", "Test"))
            .with_input(PortDescription::fixed("scale", "Scalar"))
            .with_input(PortDescription::dynamic("values", "Scalar"))
            .with_output(PortDescription::fixed("sum", "Scalar"))
    }

    #[test]
    fn test_new_module_builds_ports_from_description() {
        let module = Module::new(ModuleId::new("Sum:0"), sum_description(), Box::new(Noop));

        assert_eq!(module.input_ports().len(), 2);
        assert_eq!(module.output_ports().len(), 1);
        let group = module.group_ports(PortDirection::Input, "values");
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].id().index, 0);
        assert_eq!(module.execution_state(), ExecutionState::NotExecuted);
        assert!(module.need_to_execute());
    }

    #[test]
    fn test_serials_continue_after_open_slot() {
        let mut module = Module::new(ModuleId::new("Sum:0"), sum_description(), Box::new(Noop));
        assert_eq!(module.allocate_serial(PortDirection::Input, "values"), 1);
        assert_eq!(module.allocate_serial(PortDirection::Input, "values"), 2);
    }

    #[test]
    fn test_completion_clears_flags() {
        let mut module = Module::new(ModuleId::new("Sum:0"), sum_description(), Box::new(Noop));
        module.set_parameter("factor", serde_json::json!(2));
        assert!(module.reexecution_flags().parameters_changed);

        module.mark_completed(HashMap::new(), HashMap::new());
        assert!(!module.need_to_execute());
        assert_eq!(module.execution_state(), ExecutionState::Completed);

        module.set_reexecution_strategy(Arc::new(AlwaysReexecuteStrategy));
        assert!(module.need_to_execute());
    }

    #[tokio::test]
    async fn test_errored_module_needs_execution() {
        let mut module = Module::new(ModuleId::new("Sum:0"), sum_description(), Box::new(Fail));
        let mut ctx = module.prepare_context(Vec::new());
        let err = module.run_behavior(&mut ctx).await.unwrap_err();
        module.mark_errored(err.to_string());

        assert_eq!(module.execution_state(), ExecutionState::Errored);
        assert!(module.error_message().unwrap().contains("boom"));
        assert!(module.need_to_execute());
    }
}
