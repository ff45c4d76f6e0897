//! Dataflow Engine - typed module networks with dynamic ports and provenance
//!
//! A network is a directed graph of modules connected output port to input
//! port. This crate owns the graph and everything that changes it:
//!
//! - Dynamic port groups that grow and compact as connections change
//! - Replacement lookup for module types that fit a connection pattern
//! - Scoped execution passes with re-execution avoidance
//! - Compressed snapshot-based undo/redo
//! - Asynchronous input handoff from producer threads
//!
//! Module behavior is opaque: each module type supplies a `ModuleBehavior`
//! and a `ModuleDescription` of its ports.
//!
//! # Architecture
//!
//! - `NetworkController`: single owner of a `Network`; mutations, passes,
//!   mementos and events all go through it
//! - `ModuleFactory` / `ModuleRegistry`: the catalog of module types
//! - `ProvenanceManager`: undo/redo over any `NetworkIo` collaborator
//! - `EventSink`: observer interface (not tied to any UI)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dataflow_engine::{ModuleRegistry, NetworkController, PortId};
//!
//! let mut controller = NetworkController::new(Arc::new(ModuleRegistry::with_builtins()));
//! let source = controller.add_module(&source_type)?;
//! let sink = controller.add_module(&sink_type)?;
//! controller.request_connection(
//!     PortId::output(source.clone(), "value"),
//!     PortId::input(sink.clone(), "value"),
//! )?;
//! let report = controller.execute_all().await?;
//! ```

pub mod catalog;
pub mod context;
pub mod controller;
pub mod descriptor;
pub mod dynamic_ports;
pub mod error;
pub mod events;
pub mod module;
pub mod network;
pub mod port;
pub mod provenance;
pub mod reexecution;
pub mod replacement;
pub mod scheduler;
pub mod snapshot;
pub mod types;
pub mod validation;

// Re-export key types
pub use catalog::{BehaviorFactory, ModuleFactory, ModuleRegistration, ModuleRegistry};
pub use context::{ExecutionContext, InputValue, InterruptHandle};
pub use controller::{
    AsyncDataSender, ControllerConfig, ExecutionReport, ModuleExecutionStatus, NetworkController,
};
pub use descriptor::{ModuleDescription, ModuleDescriptor, PortDescription};
pub use error::{NetworkError, Result};
pub use events::{EventSink, NetworkEvent, SubscriptionId};
pub use module::{Module, ModuleBehavior};
pub use network::Network;
pub use port::Port;
pub use provenance::{NetworkIo, ProvenanceManager};
pub use reexecution::{AlwaysReexecuteStrategy, DynamicReexecutionStrategy, ReexecutionStrategy};
pub use replacement::{ConnectedPortInfo, ModuleReplacementFilter};
pub use scheduler::ExecutionScope;
pub use snapshot::{NetworkMemento, NetworkSnapshot};
pub use types::{
    Connection, ConnectionDescription, ConnectionId, Datatype, ExecutionState, ModuleId,
    ModuleTypeId, PortDirection, PortId,
};
pub use validation::{validate_network, ValidationError};
