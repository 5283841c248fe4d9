use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use wsrt_core::{MachineStatus, RuntimeIdentity};

const DEFAULT_CAPACITY: usize = 256;

/// One machine status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineStatusEvent {
    pub identity: RuntimeIdentity,
    pub machine_name: String,
    pub event_type: MachineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fan-out of status events to any number of subscribers.
///
/// Publishing never blocks; subscribers that fall behind lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventService {
    sender: broadcast::Sender<MachineStatusEvent>,
}

impl Default for EventService {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventService {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MachineStatusEvent> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        identity: &RuntimeIdentity,
        machine_name: &str,
        event_type: MachineStatus,
        error: Option<String>,
    ) {
        debug!(machine = machine_name, status = %event_type, "Machine status changed");
        let event = MachineStatusEvent {
            identity: identity.clone(),
            machine_name: machine_name.to_string(),
            event_type,
            error,
            timestamp: Utc::now(),
        };
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}
