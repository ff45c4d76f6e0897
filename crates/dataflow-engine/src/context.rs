//! Per-execution context handed to module behaviors
//!
//! The scheduler gathers a module's inputs into an owned
//! `ExecutionContext` before calling `execute`, and collects the outputs
//! the behavior sent once it returns. Behaviors never see the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{NetworkError, Result};
use crate::types::{ModuleId, PortId};

/// Cooperative interruption flag shared between a module and its host
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    requested: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the module to stop at its next check
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Data present on one connected input port
#[derive(Debug, Clone)]
pub struct InputValue {
    pub port: PortId,
    pub value: serde_json::Value,
}

/// Everything a module sees while executing
pub struct ExecutionContext {
    module_id: ModuleId,
    inputs: Vec<InputValue>,
    async_inputs: Vec<serde_json::Value>,
    parameters: serde_json::Map<String, serde_json::Value>,
    outputs: HashMap<String, serde_json::Value>,
    transient: HashMap<String, serde_json::Value>,
    interrupt: InterruptHandle,
}

impl ExecutionContext {
    pub fn new(
        module_id: ModuleId,
        inputs: Vec<InputValue>,
        parameters: serde_json::Map<String, serde_json::Value>,
        interrupt: InterruptHandle,
    ) -> Self {
        Self {
            module_id,
            inputs,
            async_inputs: Vec::new(),
            parameters,
            outputs: HashMap::new(),
            transient: HashMap::new(),
            interrupt,
        }
    }

    /// Attach data received from asynchronous producers
    pub fn with_async_inputs(mut self, values: Vec<serde_json::Value>) -> Self {
        self.async_inputs = values;
        self
    }

    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Value on the first connected port with this name
    pub fn input(&self, name: &str) -> Option<&serde_json::Value> {
        self.inputs
            .iter()
            .find(|i| i.port.name == name)
            .map(|i| &i.value)
    }

    /// Like `input`, failing with `MissingInput` when nothing is connected
    pub fn require_input(&self, name: &str) -> Result<&serde_json::Value> {
        self.input(name)
            .ok_or_else(|| NetworkError::MissingInput(format!("{}.{}", self.module_id, name)))
    }

    /// Values on every connected port of a dynamic group, in port order
    pub fn group_inputs(&self, group: &str) -> Vec<&serde_json::Value> {
        self.inputs
            .iter()
            .filter(|i| i.port.name == group)
            .map(|i| &i.value)
            .collect()
    }

    /// All connected inputs in port order
    pub fn inputs(&self) -> &[InputValue] {
        &self.inputs
    }

    /// Data delivered by asynchronous producers since the last execution
    pub fn async_inputs(&self) -> &[serde_json::Value] {
        &self.async_inputs
    }

    pub fn parameters(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }

    /// Deserialize the parameter map into a typed config
    pub fn parameters_as<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::Value::Object(self.parameters.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Publish a value on an output port
    ///
    /// Outputs are keyed by port name, so every member of a dynamic output
    /// group carries the value sent under the group's name.
    pub fn send_output(&mut self, port: impl Into<String>, value: serde_json::Value) {
        self.outputs.insert(port.into(), value);
    }

    /// Record a value observers can read back from the module
    pub fn set_transient(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.transient.insert(key.into(), value);
    }

    /// Value published on an output port during this execution
    pub fn output(&self, port: &str) -> Option<&serde_json::Value> {
        self.outputs.get(port)
    }

    pub fn transient(&self, key: &str) -> Option<&serde_json::Value> {
        self.transient.get(key)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_requested()
    }

    /// Fail with `Interrupted` if the host asked the module to stop
    pub fn check_interrupted(&self) -> Result<()> {
        if self.is_interrupted() {
            Err(NetworkError::Interrupted)
        } else {
            Ok(())
        }
    }

    pub(crate) fn into_results(
        self,
    ) -> (
        HashMap<String, serde_json::Value>,
        HashMap<String, serde_json::Value>,
    ) {
        (self.outputs, self.transient)
    }
}
