//! The network: modules, connections and derived adjacency
//!
//! `Network` is a plain data structure. It owns the modules and
//! connections, enforces the connection rules and keeps dynamic port
//! groups in shape, but knows nothing about events, execution or undo.
//! `NetworkController` layers those on top.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::dynamic_ports::{self, PortChange};
use crate::error::{NetworkError, Result};
use crate::module::Module;
use crate::types::{
    Connection, ConnectionDescription, ConnectionId, ModuleId, PortDirection, PortId,
};

/// Result of adding a connection
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    pub connection_id: ConnectionId,
    pub port_changes: Vec<PortChange>,
}

/// Result of removing a connection
#[derive(Debug, Clone)]
pub struct DisconnectOutcome {
    pub connection: Connection,
    pub port_changes: Vec<PortChange>,
}

/// Result of removing a module
#[derive(Debug)]
pub struct RemovedModule {
    pub module: Module,
    pub connections: Vec<Connection>,
    pub port_changes: Vec<PortChange>,
}

/// Modules and the connections between them
#[derive(Debug, Default)]
pub struct Network {
    modules: BTreeMap<ModuleId, Module>,
    connections: BTreeMap<ConnectionId, Connection>,
    instance_counters: HashMap<String, usize>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    // Modules

    /// Next free instance id for a module type name
    pub fn next_module_id(&mut self, type_name: &str) -> ModuleId {
        let counter = self.instance_counters.entry(type_name.to_string()).or_insert(0);
        loop {
            let id = ModuleId::for_instance(type_name, *counter);
            *counter += 1;
            if !self.modules.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn instance_counters(&self) -> &HashMap<String, usize> {
        &self.instance_counters
    }

    pub(crate) fn set_instance_counters(&mut self, counters: HashMap<String, usize>) {
        self.instance_counters = counters;
    }

    /// Insert a module under its own id
    pub fn insert_module(&mut self, module: Module) -> Result<ModuleId> {
        let id = module.id().clone();
        if self.modules.contains_key(&id) {
            return Err(NetworkError::DuplicateModule(id));
        }
        self.modules.insert(id.clone(), module);
        Ok(id)
    }

    /// Remove a module and every connection touching it
    pub fn remove_module(&mut self, id: &ModuleId) -> Result<RemovedModule> {
        if !self.modules.contains_key(id) {
            return Err(NetworkError::ModuleNotFound(id.clone()));
        }

        let touching: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| &c.from.module_id == id || &c.to.module_id == id)
            .map(|c| c.id.clone())
            .collect();

        let mut connections = Vec::with_capacity(touching.len());
        let mut port_changes = Vec::new();
        for connection_id in touching {
            let outcome = self.disconnect(&connection_id)?;
            connections.push(outcome.connection);
            port_changes.extend(outcome.port_changes);
        }

        let module = self
            .modules
            .remove(id)
            .ok_or_else(|| NetworkError::ModuleNotFound(id.clone()))?;

        // Changes on the removed module itself are not interesting to anyone
        port_changes.retain(|change| match change {
            PortChange::Added(p) | PortChange::Removed(p) => &p.module_id != id,
        });

        Ok(RemovedModule {
            module,
            connections,
            port_changes,
        })
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn module_mut(&mut self, id: &ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    pub(crate) fn require_module(&self, id: &ModuleId) -> Result<&Module> {
        self.modules
            .get(id)
            .ok_or_else(|| NetworkError::ModuleNotFound(id.clone()))
    }

    pub(crate) fn require_module_mut(&mut self, id: &ModuleId) -> Result<&mut Module> {
        self.modules
            .get_mut(id)
            .ok_or_else(|| NetworkError::ModuleNotFound(id.clone()))
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn contains_module(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    // Connections

    /// Check a connection request without mutating anything
    ///
    /// `desc.from` must be an output port and `desc.to` an input port.
    pub fn validate_connection(&self, desc: &ConnectionDescription) -> Result<()> {
        if desc.from.direction != PortDirection::Output || desc.to.direction != PortDirection::Input
        {
            return Err(NetworkError::DirectionMismatch {
                from: desc.from.clone(),
                to: desc.to.clone(),
            });
        }
        if desc.from.module_id == desc.to.module_id {
            return Err(NetworkError::SameModule(desc.from.module_id.clone()));
        }

        let source = self.require_module(&desc.from.module_id)?;
        let target = self.require_module(&desc.to.module_id)?;
        let from = source
            .port(&desc.from)
            .ok_or_else(|| NetworkError::PortNotFound(desc.from.clone()))?;
        let to = target
            .port(&desc.to)
            .ok_or_else(|| NetworkError::PortNotFound(desc.to.clone()))?;

        if to.is_connected() {
            return Err(NetworkError::InputAlreadyConnected(desc.to.clone()));
        }
        if !from.datatype().is_compatible_with(to.datatype()) {
            return Err(NetworkError::IncompatibleDatatypes {
                from_type: from.datatype().to_string(),
                to_type: to.datatype().to_string(),
            });
        }
        Ok(())
    }

    /// Add a connection, updating dynamic groups on both ends
    pub fn connect(&mut self, desc: ConnectionDescription) -> Result<ConnectOutcome> {
        self.validate_connection(&desc)?;

        let connection = Connection::new(desc);
        let connection_id = connection.id.clone();

        let mut port_changes = Vec::new();
        for end in [&connection.from, &connection.to] {
            let module = self.require_module_mut(&end.module_id)?;
            port_changes.extend(dynamic_ports::on_connection_added(module, end)?);
        }

        log::debug!("Connected {}", connection_id);
        self.connections.insert(connection_id.clone(), connection);

        Ok(ConnectOutcome {
            connection_id,
            port_changes,
        })
    }

    /// Re-add a recorded connection against a recorded port layout
    ///
    /// Only connection counts change; groups are not grown.
    pub(crate) fn restore_connection(&mut self, connection: Connection) -> Result<()> {
        for end in [&connection.from, &connection.to] {
            self.require_module_mut(&end.module_id)?
                .port_mut(end)
                .ok_or_else(|| NetworkError::PortNotFound(end.clone()))?
                .increment_connections();
        }
        self.connections.insert(connection.id.clone(), connection);
        Ok(())
    }

    /// Remove a connection, compacting dynamic groups on both ends
    pub fn disconnect(&mut self, id: &ConnectionId) -> Result<DisconnectOutcome> {
        let connection = self
            .connections
            .remove(id)
            .ok_or_else(|| NetworkError::ConnectionNotFound(id.to_string()))?;

        let mut port_changes = Vec::new();
        for end in [&connection.from, &connection.to] {
            if let Some(module) = self.modules.get_mut(&end.module_id) {
                port_changes.extend(dynamic_ports::on_connection_removed(module, end)?);
            }
        }

        log::debug!("Disconnected {}", id);
        Ok(DisconnectOutcome {
            connection,
            port_changes,
        })
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections arriving at a module, in connection id order
    pub fn incoming(&self, id: &ModuleId) -> Vec<&Connection> {
        self.connections
            .values()
            .filter(|c| &c.to.module_id == id)
            .collect()
    }

    /// Connections leaving a module, in connection id order
    pub fn outgoing(&self, id: &ModuleId) -> Vec<&Connection> {
        self.connections
            .values()
            .filter(|c| &c.from.module_id == id)
            .collect()
    }

    /// The connection feeding an input port, if any
    pub fn connection_into(&self, port: &PortId) -> Option<&Connection> {
        self.connections.values().find(|c| &c.to == port)
    }

    /// Modules feeding directly into `id`
    pub fn upstream_of(&self, id: &ModuleId) -> BTreeSet<ModuleId> {
        self.incoming(id)
            .into_iter()
            .map(|c| c.from.module_id.clone())
            .collect()
    }

    /// Modules fed directly by `id`
    pub fn downstream_of(&self, id: &ModuleId) -> BTreeSet<ModuleId> {
        self.outgoing(id)
            .into_iter()
            .map(|c| c.to.module_id.clone())
            .collect()
    }

    /// `roots` plus everything they transitively depend on
    pub fn upstream_closure(&self, roots: &[ModuleId]) -> BTreeSet<ModuleId> {
        self.closure(roots, |id| self.upstream_of(id))
    }

    /// `root` plus everything that transitively depends on it
    pub fn downstream_closure(&self, root: &ModuleId) -> BTreeSet<ModuleId> {
        self.closure(std::slice::from_ref(root), |id| self.downstream_of(id))
    }

    fn closure<F>(&self, roots: &[ModuleId], next: F) -> BTreeSet<ModuleId>
    where
        F: Fn(&ModuleId) -> BTreeSet<ModuleId>,
    {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<ModuleId> = roots
            .iter()
            .filter(|id| self.modules.contains_key(*id))
            .cloned()
            .collect();
        while let Some(id) = stack.pop() {
            if seen.insert(id.clone()) {
                stack.extend(next(&id));
            }
        }
        seen
    }

    /// Remove every module and connection
    pub fn clear(&mut self) -> (Vec<Connection>, Vec<ModuleId>) {
        let connections = std::mem::take(&mut self.connections).into_values().collect();
        let modules = std::mem::take(&mut self.modules).into_keys().collect();
        (connections, modules)
    }
}
