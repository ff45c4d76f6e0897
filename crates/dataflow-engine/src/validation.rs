//! Network consistency checks
//!
//! The controller keeps a network consistent on its own; these checks are
//! for networks rebuilt from outside data (mementos, hand-written
//! snapshots) and for tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::dynamic_ports::group_invariant_holds;
use crate::network::Network;
use crate::types::{ConnectionId, ModuleId, PortDirection, PortId};

/// A single consistency problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A connection references a module that is not in the network
    UnknownModule {
        connection_id: ConnectionId,
        module_id: ModuleId,
    },
    /// A connection references a port its module does not have
    UnknownPort {
        connection_id: ConnectionId,
        port: PortId,
    },
    /// The connection graph is not acyclic
    CycleDetected { modules: Vec<ModuleId> },
    /// More than one connection feeds the same input port
    InputBoundTwice { port: PortId, connections: usize },
    /// A port's connection count disagrees with the connection set
    ConnectionCountMismatch {
        port: PortId,
        recorded: usize,
        actual: usize,
    },
    /// A dynamic group is not "all connected, then one open slot"
    DynamicGroupInvariant {
        module_id: ModuleId,
        direction: PortDirection,
        group: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModule {
                connection_id,
                module_id,
            } => write!(
                f,
                "Connection '{}' references unknown module '{}'",
                connection_id, module_id
            ),
            Self::UnknownPort {
                connection_id,
                port,
            } => write!(
                f,
                "Connection '{}' references unknown port '{}'",
                connection_id, port
            ),
            Self::CycleDetected { modules } => {
                let names: Vec<&str> = modules.iter().map(|m| m.as_str()).collect();
                write!(f, "Cycle detected among modules: {}", names.join(", "))
            }
            Self::InputBoundTwice { port, connections } => write!(
                f,
                "Input '{}' is fed by {} connections",
                port, connections
            ),
            Self::ConnectionCountMismatch {
                port,
                recorded,
                actual,
            } => write!(
                f,
                "Port '{}' records {} connection(s) but has {}",
                port, recorded, actual
            ),
            Self::DynamicGroupInvariant {
                module_id,
                direction,
                group,
            } => write!(
                f,
                "Dynamic {} group '{}' on '{}' is not compacted",
                direction, group, module_id
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a network for structural problems
///
/// Returns every problem found, not just the first.
pub fn validate_network(network: &Network) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_connection_references(network, &mut errors);
    validate_port_counts(network, &mut errors);
    validate_dynamic_groups(network, &mut errors);
    detect_cycles(network, &mut errors);

    errors
}

/// Check that both ends of every connection exist
fn validate_connection_references(network: &Network, errors: &mut Vec<ValidationError>) {
    for connection in network.connections() {
        for end in [&connection.from, &connection.to] {
            match network.module(&end.module_id) {
                None => errors.push(ValidationError::UnknownModule {
                    connection_id: connection.id.clone(),
                    module_id: end.module_id.clone(),
                }),
                Some(module) if module.port(end).is_none() => {
                    errors.push(ValidationError::UnknownPort {
                        connection_id: connection.id.clone(),
                        port: end.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }
}

/// Check port connection counts against the connection set
fn validate_port_counts(network: &Network, errors: &mut Vec<ValidationError>) {
    let mut actual: HashMap<&PortId, usize> = HashMap::new();
    for connection in network.connections() {
        *actual.entry(&connection.from).or_insert(0) += 1;
        *actual.entry(&connection.to).or_insert(0) += 1;
    }

    for module in network.modules() {
        for port in module.input_ports().iter().chain(module.output_ports()) {
            let count = actual.get(port.id()).copied().unwrap_or(0);
            if port.connection_count() != count {
                errors.push(ValidationError::ConnectionCountMismatch {
                    port: port.id().clone(),
                    recorded: port.connection_count(),
                    actual: count,
                });
            }
            if port.direction() == PortDirection::Input && count > 1 {
                errors.push(ValidationError::InputBoundTwice {
                    port: port.id().clone(),
                    connections: count,
                });
            }
        }
    }
}

fn validate_dynamic_groups(network: &Network, errors: &mut Vec<ValidationError>) {
    for module in network.modules() {
        let groups: BTreeSet<(PortDirection, &str)> = module
            .input_ports()
            .iter()
            .chain(module.output_ports())
            .filter_map(|p| p.group().map(|g| (p.direction(), g)))
            .collect();

        for (direction, group) in groups {
            if !group_invariant_holds(module, direction, group) {
                errors.push(ValidationError::DynamicGroupInvariant {
                    module_id: module.id().clone(),
                    direction,
                    group: group.to_string(),
                });
            }
        }
    }
}

/// Kahn's algorithm over the whole network
fn detect_cycles(network: &Network, errors: &mut Vec<ValidationError>) {
    let mut in_degree: BTreeMap<&ModuleId, usize> = network.module_ids().map(|id| (id, 0)).collect();
    let mut consumers: HashMap<&ModuleId, Vec<&ModuleId>> = HashMap::new();

    for connection in network.connections() {
        let (from, to) = (&connection.from.module_id, &connection.to.module_id);
        if !in_degree.contains_key(from) {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(to) {
            *degree += 1;
            consumers.entry(from).or_default().push(to);
        }
    }

    let mut queue: VecDeque<&ModuleId> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();

    while let Some(id) = queue.pop_front() {
        for &consumer in consumers.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(consumer) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(consumer);
                }
            }
        }
    }

    let remaining: Vec<ModuleId> = in_degree
        .into_iter()
        .filter(|(_, degree)| *degree > 0)
        .map(|(id, _)| id.clone())
        .collect();
    if !remaining.is_empty() {
        errors.push(ValidationError::CycleDetected { modules: remaining });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ModuleDescription, PortDescription};
    use crate::module::tests::Noop;
    use crate::module::Module;
    use crate::types::{Connection, ConnectionDescription, ModuleTypeId};

    fn relay() -> ModuleDescription {
        ModuleDescription::new(ModuleTypeId::new("Relay", "Test", "Test"))
            .with_input(PortDescription::fixed("in", "Scalar"))
            .with_input(PortDescription::dynamic("extra", "Scalar"))
            .with_output(PortDescription::fixed("out", "Scalar"))
    }

    fn add(network: &mut Network) -> ModuleId {
        let id = network.next_module_id("Relay");
        network
            .insert_module(Module::new(id, relay(), Box::new(Noop)))
            .unwrap()
    }

    fn link(network: &mut Network, from: &ModuleId, to: &ModuleId) {
        network
            .connect(ConnectionDescription::new(
                PortId::output(from.clone(), "out"),
                PortId::input(to.clone(), "in"),
            ))
            .unwrap();
    }

    #[test]
    fn test_valid_network_has_no_errors() {
        let mut network = Network::new();
        let a = add(&mut network);
        let b = add(&mut network);
        let c = add(&mut network);
        link(&mut network, &a, &b);
        link(&mut network, &b, &c);
        network
            .connect(ConnectionDescription::new(
                PortId::output(a.clone(), "out"),
                PortId::input(c.clone(), "extra"),
            ))
            .unwrap();

        assert!(validate_network(&network).is_empty());
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut network = Network::new();
        let a = add(&mut network);
        let b = add(&mut network);
        let lone = add(&mut network);
        link(&mut network, &a, &b);
        link(&mut network, &b, &a);

        let errors = validate_network(&network);
        assert_eq!(
            errors,
            vec![ValidationError::CycleDetected {
                modules: vec![a, b]
            }]
        );
        assert!(errors[0].to_string().contains("Relay:0"));
        assert!(!errors[0].to_string().contains(lone.as_str()));
    }

    #[test]
    fn test_double_bound_input_and_count_mismatch() {
        let mut network = Network::new();
        let a = add(&mut network);
        let b = add(&mut network);
        let c = add(&mut network);
        link(&mut network, &a, &c);
        network
            .restore_connection(Connection::new(ConnectionDescription::new(
                PortId::output(b.clone(), "out"),
                PortId::input(c.clone(), "in"),
            )))
            .unwrap();
        network
            .module_mut(&a)
            .and_then(|m| m.port_mut(&PortId::output(a.clone(), "out")))
            .unwrap()
            .increment_connections();

        let errors = validate_network(&network);
        assert!(errors.contains(&ValidationError::InputBoundTwice {
            port: PortId::input(c.clone(), "in"),
            connections: 2,
        }));
        assert!(errors.contains(&ValidationError::ConnectionCountMismatch {
            port: PortId::output(a, "out"),
            recorded: 2,
            actual: 1,
        }));
    }

    #[test]
    fn test_uncompacted_group_is_reported() {
        let mut network = Network::new();
        let a = add(&mut network);
        // Mark the open slot connected without growing the group
        network
            .module_mut(&a)
            .and_then(|m| m.port_mut(&PortId::input(a.clone(), "extra")))
            .unwrap()
            .increment_connections();

        let errors = validate_network(&network);
        assert!(errors.contains(&ValidationError::DynamicGroupInvariant {
            module_id: a,
            direction: PortDirection::Input,
            group: "extra".to_string(),
        }));
    }
}
