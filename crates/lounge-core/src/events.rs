//! Core events emitted by the engine

use chrono::{DateTime, Local};
use lounge_api::Session;
use lounge_util::{DeviceId, MemberId};
use std::time::Duration;

/// Transitions reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A session was created, on a device or in the queue
    CheckedIn { session: Session },

    /// A session ended
    CheckedOut {
        identity: MemberId,
        device: DeviceId,
        checked_in_at: DateTime<Local>,
        checked_out_at: DateTime<Local>,
        usage: Duration,
    },

    /// A queued session was dropped before getting a device
    Dequeued {
        identity: MemberId,
        waited: Duration,
    },

    /// A queued session got a device
    Assigned { identity: MemberId, device: DeviceId },

    /// A session moved between devices
    Switched {
        identity: MemberId,
        from: DeviceId,
        to: DeviceId,
    },
}
