//! Error types for the dataflow engine

use thiserror::Error;

use crate::types::{ModuleId, ModuleTypeId, PortId};

/// Result type alias using NetworkError
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors that can occur in the dataflow engine
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Module is not part of the network
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    /// Module id is already taken
    #[error("Module already exists: {0}")]
    DuplicateModule(ModuleId),

    /// Port is not present on its module
    #[error("Port not found: {0}")]
    PortNotFound(PortId),

    /// Connection is not part of the network
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Both ends of a connection request have the same direction
    #[error("Cannot connect {from} to {to}: a connection needs one output and one input port")]
    DirectionMismatch { from: PortId, to: PortId },

    /// Datatypes of the two ports do not match
    #[error("Cannot connect {from_type} output to {to_type} input")]
    IncompatibleDatatypes { from_type: String, to_type: String },

    /// Input ports accept a single connection
    #[error("Input port {0} is already connected")]
    InputAlreadyConnected(PortId),

    /// A module cannot feed itself
    #[error("Cannot connect module {0} to itself")]
    SameModule(ModuleId),

    /// Catalog has no entry for a module type
    #[error("Unknown module type: {0}")]
    UnknownModuleType(ModuleTypeId),

    /// Requested type cannot stand in for the module's current connections
    #[error("Module type {replacement} cannot replace module {module}")]
    InvalidReplacement {
        module: ModuleId,
        replacement: ModuleTypeId,
    },

    /// The requested scope contains a dependency cycle
    #[error("Cyclic dependency between modules: {}", format_modules(.modules))]
    CyclicDependency { modules: Vec<ModuleId> },

    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Module execution failed
    #[error("Module execution failed: {0}")]
    ExecutionFailed(String),

    /// Module honored an interruption request
    #[error("execution interrupted")]
    Interrupted,

    /// Async data channel was closed
    #[error("Async data channel closed")]
    ChannelClosed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Network save/load collaborator failed
    #[error("Network I/O error: {0}")]
    NetworkIo(String),
}

impl NetworkError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Whether this error was rejected at the API boundary before mutation
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound(_)
                | Self::DuplicateModule(_)
                | Self::PortNotFound(_)
                | Self::ConnectionNotFound(_)
                | Self::DirectionMismatch { .. }
                | Self::IncompatibleDatatypes { .. }
                | Self::InputAlreadyConnected(_)
                | Self::SameModule(_)
                | Self::UnknownModuleType(_)
                | Self::InvalidReplacement { .. }
        )
    }
}

fn format_modules(modules: &[ModuleId]) -> String {
    modules
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
