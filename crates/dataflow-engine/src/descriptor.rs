//! Module descriptor trait and description types
//!
//! A `ModuleDescription` is the "class" of a module: its type id plus the
//! declared port templates. Module instances, their port lists and their
//! replacement signatures are all derived from it.
//!
//! Module implementations describe themselves through `ModuleDescriptor`,
//! so the behavior and its port layout live in one place.

use serde::{Deserialize, Serialize};

use crate::types::{Datatype, ModuleTypeId};

/// Trait for module implementations that can describe their ports
///
/// # Example
///
/// ```ignore
/// impl ModuleDescriptor for Negate {
///     fn descriptor() -> ModuleDescription {
///         ModuleDescription::new(ModuleTypeId::new("Negate", "Math", "Core"))
///             .with_input(PortDescription::fixed("value", "Scalar"))
///             .with_output(PortDescription::fixed("result", "Scalar"))
///     }
/// }
/// ```
pub trait ModuleDescriptor {
    /// Get the static description for this module type
    fn descriptor() -> ModuleDescription
    where
        Self: Sized;
}

/// Declared port template (fixed port or dynamic group)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescription {
    /// Port name (also the group name for dynamic ports)
    pub name: String,
    /// Datatype tag
    pub datatype: Datatype,
    /// Whether this template declares a dynamic group
    pub dynamic: bool,
    /// Whether the group receives data from asynchronous sources
    pub asynchronous: bool,
}

impl PortDescription {
    /// A fixed port: always exactly one port
    pub fn fixed(name: impl Into<String>, datatype: impl Into<Datatype>) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
            dynamic: false,
            asynchronous: false,
        }
    }

    /// A dynamic group: one port per connection plus one open slot
    pub fn dynamic(name: impl Into<String>, datatype: impl Into<Datatype>) -> Self {
        Self {
            dynamic: true,
            ..Self::fixed(name, datatype)
        }
    }

    /// Mark this group as fed by asynchronous sources (implies dynamic)
    pub fn asynchronous(mut self) -> Self {
        self.dynamic = true;
        self.asynchronous = true;
        self
    }
}

/// Complete description of a module type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescription {
    /// Type identifier
    pub type_id: ModuleTypeId,
    /// What the module does
    #[serde(default)]
    pub description: String,
    /// Input port templates, in display order
    pub inputs: Vec<PortDescription>,
    /// Output port templates, in display order
    pub outputs: Vec<PortDescription>,
}

impl ModuleDescription {
    pub fn new(type_id: ModuleTypeId) -> Self {
        Self {
            type_id,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, port: PortDescription) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortDescription) -> Self {
        self.outputs.push(port);
        self
    }

    /// Whether any input group accepts asynchronous data
    pub fn accepts_async_input(&self) -> bool {
        self.inputs.iter().any(|p| p.asynchronous)
    }

    /// Whether any template is a dynamic group
    pub fn has_dynamic_ports(&self) -> bool {
        self.inputs.iter().chain(&self.outputs).any(|p| p.dynamic)
    }
}
