//! Network events and their delivery
//!
//! Events report structural changes and execution progress to observers
//! (an editor canvas, a log, a test). They are delivered synchronously on
//! the controller's task as owned values, so observers never touch the
//! network while it is being mutated.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, ExecutionState, ModuleId, ModuleTypeId, PortId};

/// Trait for receiving network events
///
/// This abstracts over the transport (channel, log, UI bridge) so the
/// controller can be used in different hosts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: NetworkEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted by the network controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NetworkEvent {
    #[serde(rename_all = "camelCase")]
    ModuleAdded {
        module_id: ModuleId,
        type_id: ModuleTypeId,
    },

    #[serde(rename_all = "camelCase")]
    ModuleRemoved { module_id: ModuleId },

    #[serde(rename_all = "camelCase")]
    ConnectionAdded {
        connection_id: ConnectionId,
        from: PortId,
        to: PortId,
    },

    #[serde(rename_all = "camelCase")]
    ConnectionRemoved { connection_id: ConnectionId },

    /// A connection request was rejected
    #[serde(rename_all = "camelCase")]
    InvalidConnection {
        from: PortId,
        to: PortId,
        reason: String,
    },

    /// A dynamic port appeared
    #[serde(rename_all = "camelCase")]
    PortAdded { port: PortId },

    /// A dynamic port was compacted away
    #[serde(rename_all = "camelCase")]
    PortRemoved { port: PortId },

    #[serde(rename_all = "camelCase")]
    ModuleStateChanged {
        module_id: ModuleId,
        state: ExecutionState,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionStarted { execution_id: String },

    /// A pass ended; `error_code` is non-zero when anything failed
    #[serde(rename_all = "camelCase")]
    ExecutionFinished {
        execution_id: String,
        error_code: usize,
    },

    /// A memento finished loading
    NetworkDoneLoading,
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: NetworkEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<NetworkEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<NetworkEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: NetworkEvent) -> Result<(), EventError> {
        let mut events = self.events.lock().map_err(|_| EventError {
            message: "Event buffer poisoned".to_string(),
        })?;
        events.push(event);
        Ok(())
    }
}

/// Handle returned by `EventBus::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out of events to any number of sinks
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, std::sync::Arc<dyn EventSink>)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: std::sync::Arc<dyn EventSink>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, sink));
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Deliver an event to every subscriber in subscription order
    pub fn emit(&self, event: NetworkEvent) {
        for (id, sink) in &self.subscribers {
            if let Err(e) = sink.send(event.clone()) {
                log::warn!("Dropping event for subscriber {:?}: {}", id, e);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();
        sink.send(NetworkEvent::ModuleRemoved {
            module_id: ModuleId::new("Source:0"),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            NetworkEvent::ModuleRemoved { module_id } => assert_eq!(module_id.as_str(), "Source:0"),
            _ => panic!("Expected ModuleRemoved event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_bus_subscribe_and_unsubscribe() {
        let mut bus = EventBus::new();
        let first = Arc::new(VecEventSink::new());
        let second = Arc::new(VecEventSink::new());
        let first_id = bus.subscribe(first.clone());
        bus.subscribe(second.clone());

        bus.emit(NetworkEvent::NetworkDoneLoading);
        assert!(bus.unsubscribe(first_id));
        assert!(!bus.unsubscribe(first_id));
        bus.emit(NetworkEvent::NetworkDoneLoading);

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 2);
    }

    #[test]
    fn test_event_serialization() {
        let event = NetworkEvent::ExecutionFinished {
            execution_id: "exec".to_string(),
            error_code: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "executionFinished");
        assert_eq!(json["errorCode"], 2);
    }
}
