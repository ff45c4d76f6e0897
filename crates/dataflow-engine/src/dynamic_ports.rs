//! Dynamic port management
//!
//! A dynamic group always shows every connected member plus exactly one
//! unconnected open slot at its end. The network calls into this module
//! for both endpoints of every connection it adds or removes.
//!
//! Port identities are stable: a port keeps its serial (`PortId.index`)
//! for its whole life. Compaction removes disconnected members from the
//! ordered port list, which is what renumbers their display position.

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};
use crate::module::Module;
use crate::types::{PortDirection, PortId};

/// A port that appeared on or disappeared from a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "port", rename_all = "snake_case")]
pub enum PortChange {
    Added(PortId),
    Removed(PortId),
}

/// Record a new connection on `port`, growing its group if needed
pub fn on_connection_added(module: &mut Module, port: &PortId) -> Result<Vec<PortChange>> {
    let target = module
        .port_mut(port)
        .ok_or_else(|| NetworkError::PortNotFound(port.clone()))?;
    target.increment_connections();

    match target.group().map(str::to_string) {
        Some(group) => Ok(normalize_group(module, port.direction, &group)),
        None => Ok(Vec::new()),
    }
}

/// Record a removed connection on `port`, compacting its group if needed
pub fn on_connection_removed(module: &mut Module, port: &PortId) -> Result<Vec<PortChange>> {
    let target = module
        .port_mut(port)
        .ok_or_else(|| NetworkError::PortNotFound(port.clone()))?;
    target.decrement_connections();

    match target.group().map(str::to_string) {
        Some(group) => Ok(normalize_group(module, port.direction, &group)),
        None => Ok(Vec::new()),
    }
}

/// Restore the group invariant: drop unconnected members that are not the
/// last one, then append an open slot if the last member is connected.
pub(crate) fn normalize_group(
    module: &mut Module,
    direction: PortDirection,
    group: &str,
) -> Vec<PortChange> {
    let mut changes = Vec::new();

    let ports = module.ports_mut(direction);
    let positions: Vec<usize> = ports
        .iter()
        .enumerate()
        .filter(|(_, p)| p.group() == Some(group))
        .map(|(i, _)| i)
        .collect();
    let Some((_, members)) = positions.split_last() else {
        return changes;
    };

    for &pos in members.iter().rev() {
        if !ports[pos].is_connected() {
            let removed = ports.remove(pos);
            changes.push(PortChange::Removed(removed.id().clone()));
        }
    }
    changes.reverse();

    let last = ports.iter().rposition(|p| p.group() == Some(group));
    let template = match last {
        Some(pos) if ports[pos].is_connected() => Some((pos, ports[pos].clone())),
        _ => None,
    };

    if let Some((pos, template)) = template {
        let serial = module.allocate_serial(direction, group);
        let slot = template.open_slot_like(serial);
        let id = slot.id().clone();
        module.ports_mut(direction).insert(pos + 1, slot);
        changes.push(PortChange::Added(id));
    }

    for change in &changes {
        log::debug!("Dynamic port change on {}: {:?}", module.id(), change);
    }
    changes
}

/// Whether a group shows its connected members followed by one open slot
pub fn group_invariant_holds(module: &Module, direction: PortDirection, group: &str) -> bool {
    let members = module.group_ports(direction, group);
    match members.split_last() {
        Some((last, rest)) => !last.is_connected() && rest.iter().all(|p| p.is_connected()),
        None => false,
    }
}
