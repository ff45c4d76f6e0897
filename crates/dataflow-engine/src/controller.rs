//! Network controller
//!
//! `NetworkController` is the single owner of a `Network`. Every mutation,
//! execution pass and memento load goes through it, and it reports each
//! change to subscribed `EventSink`s.
//!
//! # Execution
//!
//! A pass resolves an `ExecutionScope` to a module set and orders it
//! topologically. A module runs when its re-execution strategy asks for
//! it or when an upstream module in the same pass runs. A failing module
//! blocks everything downstream of it; independent branches still finish.
//!
//! # Asynchronous inputs
//!
//! Producers on other threads push data through an `AsyncDataSender`. The
//! controller only looks at that queue when `process_async_data` or
//! `wait_for_async_data` is called, so the network is never touched from
//! outside the controller's task.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::catalog::ModuleFactory;
use crate::context::{InputValue, InterruptHandle};
use crate::descriptor::ModuleDescription;
use crate::dynamic_ports::PortChange;
use crate::error::{NetworkError, Result};
use crate::events::{EventBus, EventSink, NetworkEvent, SubscriptionId};
use crate::module::Module;
use crate::network::Network;
use crate::provenance::NetworkIo;
use crate::reexecution::ReexecutionStrategy;
use crate::replacement::{
    ConnectedPortInfo, ModuleReplacementFilter, ModuleReplacementFilterBuilder,
    DEFAULT_DYNAMIC_EXPANSION,
};
use crate::scheduler::{resolve_scope, topological_order, ExecutionScope};
use crate::snapshot::{NetworkMemento, NetworkSnapshot};
use crate::types::{
    Connection, ConnectionDescription, ConnectionId, Datatype, ExecutionState, ModuleId,
    ModuleTypeId, PortDirection, PortId,
};
use crate::validation::validate_network;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Run the receiving module's downstream too when async data arrives
    pub async_executes_downstream: bool,
    /// Ports a dynamic group contributes when building the replacement filter
    pub replacement_dynamic_expansion: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            async_executes_downstream: false,
            replacement_dynamic_expansion: DEFAULT_DYNAMIC_EXPANSION,
        }
    }
}

impl ControllerConfig {
    pub fn with_async_executes_downstream(mut self, enabled: bool) -> Self {
        self.async_executes_downstream = enabled;
        self
    }

    pub fn with_replacement_dynamic_expansion(mut self, expansion: usize) -> Self {
        self.replacement_dynamic_expansion = expansion;
        self
    }
}

/// What happened to one module during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ModuleExecutionStatus {
    /// The behavior ran and succeeded
    Executed,
    /// Nothing changed, previous outputs reused
    Cached,
    /// Execution is disabled for the module
    Disabled,
    /// The behavior failed
    Errored(String),
    /// The behavior stopped on an interruption request
    Interrupted,
    /// An upstream module failed in the same pass
    Blocked,
}

impl ModuleExecutionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Errored(_) | Self::Interrupted)
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub execution_id: String,
    pub statuses: BTreeMap<ModuleId, ModuleExecutionStatus>,
    /// Number of modules that errored or were interrupted
    pub error_code: usize,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }

    pub fn status(&self, id: &ModuleId) -> Option<&ModuleExecutionStatus> {
        self.statuses.get(id)
    }

    /// Modules whose behavior ran successfully
    pub fn executed(&self) -> Vec<&ModuleId> {
        self.statuses
            .iter()
            .filter(|(_, status)| **status == ModuleExecutionStatus::Executed)
            .map(|(id, _)| id)
            .collect()
    }
}

/// Data pushed by an asynchronous producer
#[derive(Debug, Clone)]
pub struct AsyncData {
    pub module_id: ModuleId,
    pub value: serde_json::Value,
}

/// Cloneable handle for pushing data to asynchronous input modules
#[derive(Debug, Clone)]
pub struct AsyncDataSender {
    tx: mpsc::UnboundedSender<AsyncData>,
}

impl AsyncDataSender {
    pub fn send(&self, module_id: ModuleId, value: serde_json::Value) -> Result<()> {
        self.tx
            .send(AsyncData { module_id, value })
            .map_err(|_| NetworkError::ChannelClosed)
    }
}

/// Owner of a network: mutations, execution and persistence
pub struct NetworkController {
    factory: Arc<dyn ModuleFactory>,
    config: ControllerConfig,
    network: Network,
    events: EventBus,
    replacement_filter: Option<ModuleReplacementFilter>,
    async_tx: mpsc::UnboundedSender<AsyncData>,
    async_rx: mpsc::UnboundedReceiver<AsyncData>,
}

impl NetworkController {
    pub fn new(factory: Arc<dyn ModuleFactory>) -> Self {
        Self::with_config(factory, ControllerConfig::default())
    }

    pub fn with_config(factory: Arc<dyn ModuleFactory>, config: ControllerConfig) -> Self {
        let (async_tx, async_rx) = mpsc::unbounded_channel();
        Self {
            factory,
            config,
            network: Network::new(),
            events: EventBus::new(),
            replacement_filter: None,
            async_tx,
            async_rx,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn factory(&self) -> &Arc<dyn ModuleFactory> {
        &self.factory
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.network.module(id)
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) -> SubscriptionId {
        self.events.subscribe(sink)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // Modules

    /// Instantiate a module type from the catalog
    pub fn add_module(&mut self, type_id: &ModuleTypeId) -> Result<ModuleId> {
        let description = self
            .factory
            .lookup_description(type_id)
            .ok_or_else(|| NetworkError::UnknownModuleType(type_id.clone()))?;
        let behavior = self.factory.create(&description)?;

        let id = self.network.next_module_id(&type_id.name);
        let id = self
            .network
            .insert_module(Module::new(id, description, behavior))?;

        log::debug!("Added module {} ({})", id, type_id);
        self.events.emit(NetworkEvent::ModuleAdded {
            module_id: id.clone(),
            type_id: type_id.clone(),
        });
        Ok(id)
    }

    /// Remove a module together with its connections
    pub fn remove_module(&mut self, id: &ModuleId) -> Result<()> {
        let removed = self.network.remove_module(id)?;

        for connection in &removed.connections {
            self.mark_consumer_changed(connection);
            self.events.emit(NetworkEvent::ConnectionRemoved {
                connection_id: connection.id.clone(),
            });
        }
        self.emit_port_changes(&removed.port_changes);

        log::debug!("Removed module {}", id);
        self.events.emit(NetworkEvent::ModuleRemoved {
            module_id: id.clone(),
        });
        Ok(())
    }

    // Connections

    /// Connect two ports given in either order
    ///
    /// Rejected requests emit `InvalidConnection` and change nothing.
    pub fn request_connection(&mut self, a: PortId, b: PortId) -> Result<ConnectionId> {
        let desc = if a.direction == PortDirection::Input && b.direction == PortDirection::Output {
            ConnectionDescription::new(b, a)
        } else {
            ConnectionDescription::new(a, b)
        };
        self.connect(desc)
    }

    /// Connect an output port to an input port
    pub fn connect(&mut self, desc: ConnectionDescription) -> Result<ConnectionId> {
        let (from, to) = (desc.from.clone(), desc.to.clone());
        let outcome = match self.network.connect(desc) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Rejected connection {} -> {}: {}", from, to, e);
                self.events.emit(NetworkEvent::InvalidConnection {
                    from,
                    to,
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        if let Some(consumer) = self.network.module_mut(&to.module_id) {
            consumer.mark_inputs_changed();
        }
        self.emit_port_changes(&outcome.port_changes);
        self.events.emit(NetworkEvent::ConnectionAdded {
            connection_id: outcome.connection_id.clone(),
            from,
            to,
        });
        Ok(outcome.connection_id)
    }

    pub fn remove_connection(&mut self, id: &ConnectionId) -> Result<()> {
        let outcome = self.network.disconnect(id)?;

        self.mark_consumer_changed(&outcome.connection);
        self.emit_port_changes(&outcome.port_changes);
        self.events.emit(NetworkEvent::ConnectionRemoved {
            connection_id: id.clone(),
        });
        Ok(())
    }

    fn mark_consumer_changed(&mut self, connection: &Connection) {
        if let Some(consumer) = self.network.module_mut(&connection.to.module_id) {
            consumer.mark_inputs_changed();
        }
    }

    fn emit_port_changes(&self, changes: &[PortChange]) {
        for change in changes {
            let event = match change {
                PortChange::Added(port) => NetworkEvent::PortAdded { port: port.clone() },
                PortChange::Removed(port) => NetworkEvent::PortRemoved { port: port.clone() },
            };
            self.events.emit(event);
        }
    }

    // Module settings

    pub fn set_parameter(
        &mut self,
        id: &ModuleId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<()> {
        self.network.require_module_mut(id)?.set_parameter(key, value);
        Ok(())
    }

    pub fn force_execution(&mut self, id: &ModuleId) -> Result<()> {
        self.network.require_module_mut(id)?.force_execution();
        Ok(())
    }

    pub fn set_execution_disabled(&mut self, id: &ModuleId, disabled: bool) -> Result<()> {
        self.network
            .require_module_mut(id)?
            .set_execution_disabled(disabled);
        Ok(())
    }

    pub fn set_reexecution_strategy(
        &mut self,
        id: &ModuleId,
        strategy: Arc<dyn ReexecutionStrategy>,
    ) -> Result<()> {
        self.network
            .require_module_mut(id)?
            .set_reexecution_strategy(strategy);
        Ok(())
    }

    pub fn interrupt_handle(&self, id: &ModuleId) -> Result<InterruptHandle> {
        Ok(self.network.require_module(id)?.interrupt_handle())
    }

    /// Ask a running module to stop at its next interruption check
    ///
    /// A request made while the module is idle is discarded when it next
    /// starts executing.
    pub fn interrupt_module(&self, id: &ModuleId) -> Result<()> {
        self.interrupt_handle(id)?.request();
        log::info!("Interrupt requested for {}", id);
        Ok(())
    }

    // Replacement

    /// The catalog's replacement filter, built on first use
    pub fn replacement_filter(&mut self) -> &ModuleReplacementFilter {
        let factory = &self.factory;
        let expansion = self.config.replacement_dynamic_expansion;
        self.replacement_filter.get_or_insert_with(|| {
            ModuleReplacementFilterBuilder::new(factory.descriptions())
                .with_dynamic_expansion(expansion)
                .build()
        })
    }

    /// Rebuild the filter after the catalog changed
    pub fn rebuild_replacement_filter(&mut self) {
        self.replacement_filter = None;
        self.replacement_filter();
    }

    /// Module types that could take over all of a module's connections
    pub fn replacement_candidates(&mut self, id: &ModuleId) -> Result<Vec<ModuleDescription>> {
        let module = self.network.require_module(id)?;
        let signature = ConnectedPortInfo::from_module(module);
        let own_type = module.type_id().clone();

        Ok(self
            .replacement_filter()
            .find_replacements(&signature)
            .into_iter()
            .filter(|d| d.type_id != own_type)
            .cloned()
            .collect())
    }

    /// Swap a module for another type, re-attaching its connections
    ///
    /// Parameters are not carried over. Returns the new module's id. The
    /// rewiring is worked out on a copy of the network first, so on error
    /// the network is left as it was.
    pub fn replace_module(&mut self, id: &ModuleId, new_type: &ModuleTypeId) -> Result<ModuleId> {
        let candidates = self.replacement_candidates(id)?;
        if !candidates.iter().any(|d| &d.type_id == new_type) {
            return Err(NetworkError::InvalidReplacement {
                module: id.clone(),
                replacement: new_type.clone(),
            });
        }
        let description = self
            .factory
            .lookup_description(new_type)
            .ok_or_else(|| NetworkError::UnknownModuleType(new_type.clone()))?;

        let old = self.network.require_module(id)?;
        let mut plan: Vec<(Connection, PortDirection, Datatype)> = Vec::new();
        for connection in self.network.incoming(id) {
            let datatype = old
                .port(&connection.to)
                .map(|p| p.datatype().clone())
                .ok_or_else(|| NetworkError::PortNotFound(connection.to.clone()))?;
            plan.push((connection.clone(), PortDirection::Input, datatype));
        }
        for connection in self.network.outgoing(id) {
            let datatype = old
                .port(&connection.from)
                .map(|p| p.datatype().clone())
                .ok_or_else(|| NetworkError::PortNotFound(connection.from.clone()))?;
            plan.push((connection.clone(), PortDirection::Output, datatype));
        }

        let mut scratch = self.snapshot().restore(self.factory.as_ref())?;
        let scratch_id = scratch.next_module_id(&new_type.name);
        let behavior = self.factory.create(&description)?;
        scratch.insert_module(Module::new(scratch_id.clone(), description, behavior))?;
        scratch.remove_module(id)?;
        let wiring = match rewire(&mut scratch, &scratch_id, plan) {
            Ok(wiring) => wiring,
            Err(e) => {
                log::warn!("Cannot replace {} with {}: {}", id, new_type, e);
                return Err(e);
            }
        };

        let new_id = self.add_module(new_type)?;
        debug_assert_eq!(new_id, scratch_id);
        self.remove_module(id)?;
        for desc in wiring {
            self.connect(desc)?;
        }

        log::info!("Replaced module {} with {}", id, new_id);
        Ok(new_id)
    }

    // Execution

    /// Run every module that needs it
    pub async fn execute_all(&mut self) -> Result<ExecutionReport> {
        self.execute(ExecutionScope::All).await
    }

    /// Bring one module up to date, including what it depends on
    pub async fn execute_module(&mut self, id: &ModuleId) -> Result<ExecutionReport> {
        self.execute(ExecutionScope::Upstream(vec![id.clone()])).await
    }

    /// Run one pass over `scope`
    ///
    /// Module failures are reported in the returned report. Only scheduling
    /// problems (unknown modules, cycles) return `Err`, before any module
    /// changes state.
    pub async fn execute(&mut self, scope: ExecutionScope) -> Result<ExecutionReport> {
        let execution_id = uuid::Uuid::new_v4().to_string();
        self.events.emit(NetworkEvent::ExecutionStarted {
            execution_id: execution_id.clone(),
        });

        let order = match resolve_scope(&self.network, &scope)
            .and_then(|members| topological_order(&self.network, &members))
        {
            Ok(order) => order,
            Err(e) => {
                log::warn!("Execution {} aborted: {}", execution_id, e);
                self.events.emit(NetworkEvent::ExecutionFinished {
                    execution_id,
                    error_code: 1,
                });
                return Err(e);
            }
        };
        log::info!(
            "Execution {} started over {} module(s)",
            execution_id,
            order.len()
        );

        // Decide up front who runs, so downstream of anything re-running
        // is refreshed too
        let mut will_run = BTreeSet::new();
        for id in &order {
            let module = self.network.require_module(id)?;
            if module.execution_disabled() {
                continue;
            }
            let upstream_runs = self
                .network
                .upstream_of(id)
                .iter()
                .any(|up| will_run.contains(up));
            if module.need_to_execute() || upstream_runs {
                will_run.insert(id.clone());
            }
        }

        let mut prior_states = HashMap::new();
        for id in &will_run {
            let module = self.network.require_module_mut(id)?;
            prior_states.insert(id.clone(), module.execution_state());
            module.set_execution_state(ExecutionState::Waiting);
            self.emit_state(id, ExecutionState::Waiting);
        }

        // Modules whose dependents must not run in this pass
        let mut failed: BTreeSet<ModuleId> = BTreeSet::new();
        let mut statuses = BTreeMap::new();
        for id in &order {
            let blocked = self
                .network
                .upstream_of(id)
                .iter()
                .any(|up| failed.contains(up));

            // Skipped modules pass a block on without failing themselves
            let disabled = self.network.require_module(id)?.execution_disabled();
            if disabled || !will_run.contains(id) {
                if blocked {
                    failed.insert(id.clone());
                }
                let status = if disabled {
                    ModuleExecutionStatus::Disabled
                } else {
                    ModuleExecutionStatus::Cached
                };
                statuses.insert(id.clone(), status);
                continue;
            }

            if blocked {
                let prior = prior_states
                    .get(id)
                    .copied()
                    .unwrap_or(ExecutionState::NotExecuted);
                self.network.require_module_mut(id)?.set_execution_state(prior);
                self.emit_state(id, prior);
                log::debug!("Module {} blocked by a failed upstream module", id);
                failed.insert(id.clone());
                statuses.insert(id.clone(), ModuleExecutionStatus::Blocked);
                continue;
            }

            let status = self.run_module(id).await?;
            if status.is_failure() {
                failed.insert(id.clone());
            }
            statuses.insert(id.clone(), status);
        }

        let error_code = statuses.values().filter(|s| s.is_failure()).count();
        log::info!(
            "Execution {} finished with error code {}",
            execution_id,
            error_code
        );
        self.events.emit(NetworkEvent::ExecutionFinished {
            execution_id: execution_id.clone(),
            error_code,
        });

        Ok(ExecutionReport {
            execution_id,
            statuses,
            error_code,
        })
    }

    async fn run_module(&mut self, id: &ModuleId) -> Result<ModuleExecutionStatus> {
        let inputs = self.gather_inputs(id)?;

        let module = self.network.require_module_mut(id)?;
        let mut ctx = module.prepare_context(inputs);
        // Only requests made while the behavior runs count
        let interrupt = module.interrupt_handle();
        if interrupt.is_requested() {
            log::debug!("Discarding interrupt request made while {} was idle", id);
            interrupt.reset();
        }
        module.set_execution_state(ExecutionState::Executing);
        self.events.emit(NetworkEvent::ModuleStateChanged {
            module_id: id.clone(),
            state: ExecutionState::Executing,
        });

        log::debug!("Executing module {}", id);
        let result = module.run_behavior(&mut ctx).await;
        let interrupted = interrupt.is_requested();
        interrupt.reset();

        let status = match result {
            Ok(()) if !interrupted => {
                let (outputs, transient) = ctx.into_results();
                module.mark_completed(outputs, transient);
                ModuleExecutionStatus::Executed
            }
            Err(e) if !interrupted && !matches!(e, NetworkError::Interrupted) => {
                log::warn!("Module {} failed: {}", id, e);
                module.mark_errored(e.to_string());
                ModuleExecutionStatus::Errored(e.to_string())
            }
            _ => {
                log::info!("Module {} interrupted", id);
                module.mark_errored(NetworkError::Interrupted.to_string());
                ModuleExecutionStatus::Interrupted
            }
        };
        let state = module.execution_state();
        self.emit_state(id, state);

        if status == ModuleExecutionStatus::Executed {
            for consumer in self.network.downstream_of(id) {
                if let Some(module) = self.network.module_mut(&consumer) {
                    module.mark_inputs_changed();
                }
            }
        }
        Ok(status)
    }

    /// Upstream outputs for every connected input port, in port order
    ///
    /// Values are looked up by the upstream port's name; all members of a
    /// dynamic output group deliver the same value.
    fn gather_inputs(&self, id: &ModuleId) -> Result<Vec<InputValue>> {
        let module = self.network.require_module(id)?;
        let mut inputs = Vec::new();
        for port in module.input_ports() {
            let Some(connection) = self.network.connection_into(port.id()) else {
                continue;
            };
            let value = self
                .network
                .module(&connection.from.module_id)
                .and_then(|upstream| upstream.output_value(&connection.from.name));
            if let Some(value) = value {
                inputs.push(InputValue {
                    port: port.id().clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(inputs)
    }

    fn emit_state(&self, id: &ModuleId, state: ExecutionState) {
        self.events.emit(NetworkEvent::ModuleStateChanged {
            module_id: id.clone(),
            state,
        });
    }

    // Asynchronous inputs

    pub fn async_sender(&self) -> AsyncDataSender {
        AsyncDataSender {
            tx: self.async_tx.clone(),
        }
    }

    /// Deliver all queued async data and run the receiving modules
    ///
    /// Returns one report per receiving module, in module id order.
    pub async fn process_async_data(&mut self) -> Result<Vec<ExecutionReport>> {
        let mut targets = BTreeSet::new();
        while let Ok(data) = self.async_rx.try_recv() {
            if let Some(target) = self.accept_async(data) {
                targets.insert(target);
            }
        }
        self.run_async_targets(targets).await
    }

    /// Wait for async data to arrive, then process everything queued
    ///
    /// Waits indefinitely when nothing is sent. The controller holds a
    /// sender of its own, so the queue never closes underneath it.
    pub async fn wait_for_async_data(&mut self) -> Result<Vec<ExecutionReport>> {
        let data = self
            .async_rx
            .recv()
            .await
            .ok_or(NetworkError::ChannelClosed)?;

        let mut targets = BTreeSet::new();
        if let Some(target) = self.accept_async(data) {
            targets.insert(target);
        }
        while let Ok(data) = self.async_rx.try_recv() {
            if let Some(target) = self.accept_async(data) {
                targets.insert(target);
            }
        }
        self.run_async_targets(targets).await
    }

    fn accept_async(&mut self, data: AsyncData) -> Option<ModuleId> {
        let Some(module) = self.network.module_mut(&data.module_id) else {
            log::warn!("Dropping async data for unknown module {}", data.module_id);
            return None;
        };
        if !module.description().accepts_async_input() {
            log::warn!(
                "Dropping async data for {}: module has no asynchronous input",
                data.module_id
            );
            return None;
        }
        module.push_async_input(data.value);
        Some(data.module_id)
    }

    async fn run_async_targets(&mut self, targets: BTreeSet<ModuleId>) -> Result<Vec<ExecutionReport>> {
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            let scope = if self.config.async_executes_downstream {
                ExecutionScope::Downstream(target)
            } else {
                ExecutionScope::Single(target)
            };
            reports.push(self.execute(scope).await?);
        }
        Ok(reports)
    }

    // Snapshots

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot::capture(&self.network)
    }
}

impl NetworkIo for NetworkController {
    type Memento = NetworkMemento;

    fn save_network(&self) -> Result<NetworkMemento> {
        NetworkMemento::encode(&self.snapshot())
    }

    fn load_network(&mut self, memento: &NetworkMemento) -> Result<()> {
        let snapshot = memento.decode()?;
        let network = snapshot.restore(self.factory.as_ref())?;
        if self.network.module_count() > 0 {
            self.clear();
        }
        self.network = network;

        for module in self.network.modules() {
            self.events.emit(NetworkEvent::ModuleAdded {
                module_id: module.id().clone(),
                type_id: module.type_id().clone(),
            });
        }
        for connection in self.network.connections() {
            self.events.emit(NetworkEvent::ConnectionAdded {
                connection_id: connection.id.clone(),
                from: connection.from.clone(),
                to: connection.to.clone(),
            });
        }

        for problem in validate_network(&self.network) {
            log::warn!("Loaded network is inconsistent: {}", problem);
        }
        log::info!(
            "Loaded network with {} module(s) and {} connection(s)",
            self.network.module_count(),
            self.network.connection_count()
        );
        self.events.emit(NetworkEvent::NetworkDoneLoading);
        Ok(())
    }

    fn clear(&mut self) {
        let (connections, modules) = self.network.clear();
        for connection in connections {
            self.events.emit(NetworkEvent::ConnectionRemoved {
                connection_id: connection.id,
            });
        }
        for module_id in modules {
            self.events.emit(NetworkEvent::ModuleRemoved { module_id });
        }
    }
}

/// Attach a replacement module to the recorded connections of the module
/// it replaces, returning the connections made in order
fn rewire(
    network: &mut Network,
    new_id: &ModuleId,
    plan: Vec<(Connection, PortDirection, Datatype)>,
) -> Result<Vec<ConnectionDescription>> {
    let mut output_map: HashMap<PortId, PortId> = HashMap::new();
    let mut wiring = Vec::with_capacity(plan.len());
    for (connection, side, datatype) in plan {
        let desc = match side {
            PortDirection::Input => {
                let local = free_input(network, new_id, &datatype)?;
                let remote = resolve_endpoint(network, &connection.from)?;
                ConnectionDescription::new(remote, local)
            }
            PortDirection::Output => {
                let local = match output_map.get(&connection.from) {
                    Some(port) => port.clone(),
                    None => {
                        let taken: Vec<&PortId> = output_map.values().collect();
                        let port = pick_output(network, new_id, &datatype, &taken)?;
                        output_map.insert(connection.from.clone(), port.clone());
                        port
                    }
                };
                let remote = resolve_endpoint(network, &connection.to)?;
                ConnectionDescription::new(local, remote)
            }
        };
        network.connect(desc.clone())?;
        wiring.push(desc);
    }
    Ok(wiring)
}

fn free_input(network: &Network, id: &ModuleId, datatype: &Datatype) -> Result<PortId> {
    let module = network.require_module(id)?;
    module
        .free_port(PortDirection::Input, datatype)
        .map(|p| p.id().clone())
        .ok_or_else(|| NetworkError::InvalidReplacement {
            module: id.clone(),
            replacement: module.type_id().clone(),
        })
}

fn pick_output(
    network: &Network,
    id: &ModuleId,
    datatype: &Datatype,
    taken: &[&PortId],
) -> Result<PortId> {
    let module = network.require_module(id)?;
    let mut matching = module
        .output_ports()
        .iter()
        .filter(|p| p.datatype() == datatype);
    matching
        .clone()
        .find(|p| !taken.contains(&p.id()) && !p.is_connected())
        .or_else(|| matching.next())
        .map(|p| p.id().clone())
        .ok_or_else(|| NetworkError::InvalidReplacement {
            module: id.clone(),
            replacement: module.type_id().clone(),
        })
}

/// A recorded endpoint on another module, or its group's open slot if the
/// port was compacted away meanwhile
fn resolve_endpoint(network: &Network, port: &PortId) -> Result<PortId> {
    let module = network.require_module(&port.module_id)?;
    if module.port(port).is_some() {
        return Ok(port.clone());
    }
    module
        .group_ports(port.direction, &port.name)
        .last()
        .map(|p| p.id().clone())
        .ok_or_else(|| NetworkError::PortNotFound(port.clone()))
}
