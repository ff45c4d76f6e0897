//! Ports: typed connection points on a module

use serde::{Deserialize, Serialize};

use crate::types::{Datatype, PortDirection, PortId};

/// Whether a port's count is fixed or tracks its connections
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortCardinality {
    /// Exactly one port, always present
    Fixed,
    /// Member of a dynamic group
    Dynamic { group: String },
}

/// A single connection point on a module instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    id: PortId,
    datatype: Datatype,
    cardinality: PortCardinality,
    #[serde(default)]
    asynchronous: bool,
    #[serde(default)]
    connection_count: usize,
}

impl Port {
    pub fn fixed(id: PortId, datatype: Datatype) -> Self {
        Self {
            id,
            datatype,
            cardinality: PortCardinality::Fixed,
            asynchronous: false,
            connection_count: 0,
        }
    }

    pub fn dynamic(id: PortId, datatype: Datatype, asynchronous: bool) -> Self {
        let group = id.name.clone();
        Self {
            id,
            datatype,
            cardinality: PortCardinality::Dynamic { group },
            asynchronous,
            connection_count: 0,
        }
    }

    /// A new unconnected member of the same group with another serial
    pub(crate) fn open_slot_like(&self, index: usize) -> Self {
        Self {
            id: self.id.clone().with_index(index),
            datatype: self.datatype.clone(),
            cardinality: self.cardinality.clone(),
            asynchronous: self.asynchronous,
            connection_count: 0,
        }
    }

    pub fn id(&self) -> &PortId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn direction(&self) -> PortDirection {
        self.id.direction
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn cardinality(&self) -> &PortCardinality {
        &self.cardinality
    }

    /// Dynamic group name, or `None` for fixed ports
    pub fn group(&self) -> Option<&str> {
        match &self.cardinality {
            PortCardinality::Fixed => None,
            PortCardinality::Dynamic { group } => Some(group),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.cardinality, PortCardinality::Dynamic { .. })
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count
    }

    pub fn is_connected(&self) -> bool {
        self.connection_count > 0
    }

    pub(crate) fn increment_connections(&mut self) {
        self.connection_count += 1;
    }

    pub(crate) fn decrement_connections(&mut self) {
        self.connection_count = self.connection_count.saturating_sub(1);
    }

    pub(crate) fn reset_connections(&mut self) {
        self.connection_count = 0;
    }
}
