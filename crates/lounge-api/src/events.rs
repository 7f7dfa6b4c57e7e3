//! Event types for service -> client streaming

use chrono::{DateTime, Local};
use lounge_util::{DeviceId, MemberId};
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, LayoutView, StateSnapshot};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: lounge_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventPayload {
    /// Occupancy changed; re-render from this snapshot
    StateChanged(StateSnapshot),

    /// Device placement changed
    LayoutChanged(LayoutView),

    /// A station switch failed and could not be undone
    ReconciliationRequired {
        identity: MemberId,
        from: DeviceId,
        to: DeviceId,
        message: String,
    },

    /// Service is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tagging() {
        let event = Event::new(EventPayload::Shutdown);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"shutdown\""));
    }
}
