//! Whole-network snapshots and compressed mementos
//!
//! A `NetworkSnapshot` records everything needed to rebuild a network
//! exactly: each module's type, parameters, re-execution strategy name and
//! port layout (including dynamic port serials) plus every connection.
//! Behaviors are recreated from the catalog on restore.
//!
//! `NetworkMemento` is the snapshot serialized to JSON and compressed with
//! zstd. It is what undo/redo stores.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::ModuleFactory;
use crate::error::{NetworkError, Result};
use crate::module::Module;
use crate::network::Network;
use crate::port::Port;
use crate::reexecution::{strategy_by_name, DynamicReexecutionStrategy, ReexecutionStrategy};
use crate::types::{Connection, ModuleId, ModuleTypeId, PortDirection};

const COMPRESSION_LEVEL: i32 = 3;

/// Next serial of one dynamic group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSerial {
    pub direction: PortDirection,
    pub group: String,
    pub next: usize,
}

/// Recorded state of one module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSnapshot {
    pub id: ModuleId,
    pub type_id: ModuleTypeId,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub execution_disabled: bool,
    /// `name()` of the module's re-execution strategy
    #[serde(default = "default_strategy")]
    pub reexecution_strategy: String,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub group_serials: Vec<GroupSerial>,
}

fn default_strategy() -> String {
    DynamicReexecutionStrategy.name().to_string()
}

/// Recorded state of a whole network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub modules: Vec<ModuleSnapshot>,
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub instance_counters: BTreeMap<String, usize>,
}

impl NetworkSnapshot {
    /// Record the current state of a network
    pub fn capture(network: &Network) -> Self {
        let modules = network
            .modules()
            .map(|module| ModuleSnapshot {
                id: module.id().clone(),
                type_id: module.type_id().clone(),
                parameters: module.parameters().clone(),
                execution_disabled: module.execution_disabled(),
                reexecution_strategy: module.reexecution_strategy().name().to_string(),
                inputs: module.input_ports().to_vec(),
                outputs: module.output_ports().to_vec(),
                group_serials: module
                    .next_serials()
                    .iter()
                    .map(|((direction, group), next)| GroupSerial {
                        direction: *direction,
                        group: group.clone(),
                        next: *next,
                    })
                    .collect(),
            })
            .collect();

        Self {
            modules,
            connections: network.connections().cloned().collect(),
            instance_counters: network
                .instance_counters()
                .iter()
                .map(|(name, counter)| (name.clone(), *counter))
                .collect(),
        }
    }

    /// Rebuild a network, creating behaviors through `factory`
    ///
    /// Connections are restored against the recorded port layouts without
    /// growing dynamic groups, so the result matches the snapshot exactly.
    pub fn restore(&self, factory: &dyn ModuleFactory) -> Result<Network> {
        let mut network = Network::new();

        for recorded in &self.modules {
            let description = factory
                .lookup_description(&recorded.type_id)
                .ok_or_else(|| NetworkError::UnknownModuleType(recorded.type_id.clone()))?;
            let behavior = factory.create(&description)?;

            let mut module = Module::new(recorded.id.clone(), description, behavior);
            let serials = recorded
                .group_serials
                .iter()
                .map(|s| ((s.direction, s.group.clone()), s.next))
                .collect();
            module.restore_layout(recorded.inputs.clone(), recorded.outputs.clone(), serials);
            module.replace_parameters(recorded.parameters.clone());
            module.set_execution_disabled(recorded.execution_disabled);
            match strategy_by_name(&recorded.reexecution_strategy) {
                Some(strategy) => module.set_reexecution_strategy(strategy),
                None => log::warn!(
                    "Unknown re-execution strategy '{}' on {}, using the default",
                    recorded.reexecution_strategy,
                    recorded.id
                ),
            }

            network.insert_module(module)?;
        }

        for connection in &self.connections {
            network.restore_connection(connection.clone())?;
        }

        network.set_instance_counters(
            self.instance_counters
                .iter()
                .map(|(name, counter)| (name.clone(), *counter))
                .collect::<HashMap<_, _>>(),
        );
        Ok(network)
    }
}

/// A compressed `NetworkSnapshot`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMemento(Vec<u8>);

impl NetworkMemento {
    /// Serialize and compress a snapshot
    pub fn encode(snapshot: &NetworkSnapshot) -> Result<Self> {
        let json = serde_json::to_vec(snapshot)?;
        let compressed = zstd::encode_all(&json[..], COMPRESSION_LEVEL)
            .map_err(|e| NetworkError::Compression(e.to_string()))?;
        Ok(Self(compressed))
    }

    /// Decompress and deserialize the snapshot
    pub fn decode(&self) -> Result<NetworkSnapshot> {
        let json =
            zstd::decode_all(&self.0[..]).map_err(|e| NetworkError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn compressed_size(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModuleRegistry;
    use crate::descriptor::{ModuleDescription, PortDescription};
    use crate::module::tests::Noop;
    use crate::reexecution::AlwaysReexecuteStrategy;
    use crate::types::{ConnectionDescription, PortId};
    use std::sync::Arc;

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register_fn(
            ModuleDescription::new(ModuleTypeId::new("Source", "Data", "Test"))
                .with_output(PortDescription::fixed("value", "Scalar")),
            || Box::new(Noop),
        );
        registry.register_fn(
            ModuleDescription::new(ModuleTypeId::new("Sum", "Math", "Test"))
                .with_input(PortDescription::dynamic("values", "Scalar"))
                .with_output(PortDescription::fixed("sum", "Scalar")),
            || Box::new(Noop),
        );
        registry
    }

    fn add(network: &mut Network, registry: &ModuleRegistry, name: &str) -> ModuleId {
        let description = registry.find_by_name(name).cloned().unwrap();
        let behavior = registry.create(&description).unwrap();
        let id = network.next_module_id(name);
        network
            .insert_module(Module::new(id, description, behavior))
            .unwrap()
    }

    fn open_slot(network: &Network, id: &ModuleId) -> PortId {
        network
            .module(id)
            .unwrap()
            .group_ports(PortDirection::Input, "values")
            .last()
            .map(|p| p.id().clone())
            .unwrap()
    }

    #[test]
    fn test_round_trip_preserves_dynamic_layout() {
        let registry = registry();
        let mut network = Network::new();
        let sum = add(&mut network, &registry, "Sum");
        let sources: Vec<_> = (0..3).map(|_| add(&mut network, &registry, "Source")).collect();
        for source in &sources {
            let slot = open_slot(&network, &sum);
            network
                .connect(ConnectionDescription::new(PortId::output(source.clone(), "value"), slot))
                .unwrap();
        }
        // Compact the middle port away so serials have a gap
        let middle = network.incoming(&sum)[1].id.clone();
        network.disconnect(&middle).unwrap();
        network
            .module_mut(&sum)
            .unwrap()
            .set_parameter("scale", serde_json::json!(2.5));

        let snapshot = NetworkSnapshot::capture(&network);
        let memento = NetworkMemento::encode(&snapshot).unwrap();
        let restored = memento.decode().unwrap().restore(&registry).unwrap();

        assert_eq!(NetworkSnapshot::capture(&restored), snapshot);
        let restored_sum = restored.module(&sum).unwrap();
        let serials: Vec<_> = restored_sum
            .input_ports()
            .iter()
            .map(|p| (p.id().index, p.connection_count()))
            .collect();
        let original: Vec<_> = network
            .module(&sum)
            .unwrap()
            .input_ports()
            .iter()
            .map(|p| (p.id().index, p.connection_count()))
            .collect();
        assert_eq!(serials, original);
        assert_eq!(restored_sum.parameter("scale"), Some(&serde_json::json!(2.5)));
    }

    #[test]
    fn test_restored_counters_avoid_collisions() {
        let registry = registry();
        let mut network = Network::new();
        add(&mut network, &registry, "Source");
        add(&mut network, &registry, "Source");

        let snapshot = NetworkSnapshot::capture(&network);
        let mut restored = snapshot.restore(&registry).unwrap();
        let fresh = add(&mut restored, &registry, "Source");
        assert_eq!(fresh.as_str(), "Source:2");
    }

    #[test]
    fn test_reexecution_strategy_survives_restore() {
        let registry = registry();
        let mut network = Network::new();
        let always = add(&mut network, &registry, "Source");
        let plain = add(&mut network, &registry, "Source");
        network
            .module_mut(&always)
            .unwrap()
            .set_reexecution_strategy(Arc::new(AlwaysReexecuteStrategy));

        let mut snapshot = NetworkSnapshot::capture(&network);
        assert_eq!(snapshot.modules[0].reexecution_strategy, "always");
        let restored = snapshot.restore(&registry).unwrap();
        assert_eq!(restored.module(&always).unwrap().reexecution_strategy().name(), "always");
        assert_eq!(restored.module(&plain).unwrap().reexecution_strategy().name(), "dynamic");

        snapshot.modules[0].reexecution_strategy = "sometimes".to_string();
        let restored = snapshot.restore(&registry).unwrap();
        assert_eq!(restored.module(&always).unwrap().reexecution_strategy().name(), "dynamic");
    }

    #[test]
    fn test_missing_strategy_field_defaults_to_dynamic() {
        let registry = registry();
        let mut network = Network::new();
        add(&mut network, &registry, "Source");
        let mut json = serde_json::to_value(NetworkSnapshot::capture(&network)).unwrap();
        json["modules"][0]
            .as_object_mut()
            .unwrap()
            .remove("reexecutionStrategy");

        let snapshot: NetworkSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.modules[0].reexecution_strategy, "dynamic");
    }

    #[test]
    fn test_unknown_type_fails_restore() {
        let registry = registry();
        let mut network = Network::new();
        add(&mut network, &registry, "Source");
        let mut snapshot = NetworkSnapshot::capture(&network);
        snapshot.modules[0].type_id = ModuleTypeId::new("Gone", "Data", "Test");

        assert!(matches!(
            snapshot.restore(&registry),
            Err(NetworkError::UnknownModuleType(_))
        ));
    }

    #[test]
    fn test_corrupt_memento_is_a_compression_error() {
        let memento = NetworkMemento::from_bytes(vec![1, 2, 3]);
        assert!(matches!(memento.decode(), Err(NetworkError::Compression(_))));
    }
}
