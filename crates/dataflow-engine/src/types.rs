//! Core identifier and state types for dataflow networks
//!
//! These types name module types, module instances, ports and
//! connections, and describe a module's execution state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a module *type* (a template), not a running instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTypeId {
    /// Module name (e.g., "EvaluateScalarUnary")
    pub name: String,
    /// Category for grouping in a palette
    pub category: String,
    /// Package providing the module
    pub package: String,
}

impl ModuleTypeId {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            package: package.into(),
        }
    }
}

impl fmt::Display for ModuleTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.category, self.name)
    }
}

/// Unique identifier for a module instance
///
/// Generated ids have the form `<type name>:<counter>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the id of the `counter`-th instance of a module type
    pub fn for_instance(type_name: &str, counter: usize) -> Self {
        Self(format!("{}:{}", type_name, counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Whether a port receives or produces data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("in"),
            Self::Output => f.write_str("out"),
        }
    }
}

/// Identifies one port on one module
///
/// For fixed ports `index` is always 0. For dynamic ports it is a serial
/// handed out by the port's group; it never changes while the port lives,
/// even when earlier ports of the group are compacted away.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortId {
    pub module_id: ModuleId,
    pub direction: PortDirection,
    pub name: String,
    pub index: usize,
}

impl PortId {
    pub fn new(
        module_id: ModuleId,
        direction: PortDirection,
        name: impl Into<String>,
        index: usize,
    ) -> Self {
        Self {
            module_id,
            direction,
            name: name.into(),
            index,
        }
    }

    /// A fixed input port
    pub fn input(module_id: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        Self::new(module_id.into(), PortDirection::Input, name, 0)
    }

    /// A fixed output port
    pub fn output(module_id: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        Self::new(module_id.into(), PortDirection::Output, name, 0)
    }

    /// Same port name and direction with another serial
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}#{}",
            self.module_id, self.direction, self.name, self.index
        )
    }
}

/// The datatype tag carried by a port (e.g., "Scalar", "Matrix")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datatype(String);

impl Datatype {
    /// Tag accepted by, and accepting, every other datatype
    pub const ANY: &'static str = "Datatype";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this type can connect to another type
    pub fn is_compatible_with(&self, other: &Datatype) -> bool {
        self.0 == Self::ANY || other.0 == Self::ANY || self == other
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Datatype {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Execution state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    NotExecuted,
    Waiting,
    Executing,
    Completed,
    Errored,
}

/// Unique identifier for a connection, derived from its endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_description(desc: &ConnectionDescription) -> Self {
        Self(format!("{}_@to@_{}", desc.from, desc.to))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two endpoints of a (requested or existing) connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescription {
    /// Output port data leaves from
    pub from: PortId,
    /// Input port data arrives at
    pub to: PortId,
}

impl ConnectionDescription {
    pub fn new(from: PortId, to: PortId) -> Self {
        Self { from, to }
    }
}

/// An edge connecting an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub from: PortId,
    pub to: PortId,
}

impl Connection {
    pub fn new(desc: ConnectionDescription) -> Self {
        Self {
            id: ConnectionId::from_description(&desc),
            from: desc.from,
            to: desc.to,
        }
    }

    pub fn description(&self) -> ConnectionDescription {
        ConnectionDescription::new(self.from.clone(), self.to.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_compatibility() {
        let scalar = Datatype::new("Scalar");
        let matrix = Datatype::new("Matrix");
        assert!(scalar.is_compatible_with(&Datatype::new("Scalar")));
        assert!(!scalar.is_compatible_with(&matrix));
        assert!(Datatype::any().is_compatible_with(&matrix));
        assert!(matrix.is_compatible_with(&Datatype::any()));
    }

    #[test]
    fn test_module_id_for_instance() {
        let id = ModuleId::for_instance("SendScalar", 3);
        assert_eq!(id.as_str(), "SendScalar:3");
    }

    #[test]
    fn test_connection_id_is_derived_from_endpoints() {
        let desc = ConnectionDescription::new(
            PortId::output("a:0", "out"),
            PortId::input("b:0", "in"),
        );
        let first = Connection::new(desc.clone());
        let second = Connection::new(desc);
        assert_eq!(first.id, second.id);
        assert_eq!(first.id.as_str(), "a:0/out:out#0_@to@_b:0/in:in#0");
    }
}
