//! Shared types for the lounge API

use chrono::{DateTime, Local};
use lounge_util::{DeviceId, MemberId};
use serde::{Deserialize, Serialize};

/// Category of a physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Exclusively bound to at most one session
    Workstation,
    /// Shared by any number of concurrent sessions
    SharedConsole,
}

/// Occupancy status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Free,
    Occupied,
}

/// A person's active or queued occupancy record.
///
/// This is also the on-disk shape of the session snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: MemberId,
    pub name: String,
    pub checked_in_at: DateTime<Local>,
    /// `DeviceId::QUEUE` while waiting for assignment
    pub device: DeviceId,
}

impl Session {
    pub fn is_queued(&self) -> bool {
        self.device.is_queue()
    }
}

/// One row of the daily usage log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub name: String,
    pub identity: MemberId,
    pub device: DeviceId,
    pub checked_in_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_out_at: Option<DateTime<Local>>,
    /// Formatted usage duration, set together with `checked_out_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

impl LogEntry {
    /// Open entry for a session that just checked in
    pub fn opened(session: &Session) -> Self {
        Self {
            name: session.name.clone(),
            identity: session.identity.clone(),
            device: session.device,
            checked_in_at: session.checked_in_at,
            checked_out_at: None,
            usage: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.checked_out_at.is_none()
    }
}

/// Member directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub identity: MemberId,
}

/// Session as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub identity: MemberId,
    pub name: String,
    pub device: DeviceId,
    pub checked_in_at: DateTime<Local>,
    /// Formatted time since check-in
    pub elapsed: String,
}

/// Device as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceView {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    /// Bound session for workstations
    pub occupant: Option<MemberId>,
    /// Every session on this device (at most one for a workstation)
    pub sessions: Vec<SessionView>,
}

/// Full occupancy snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub api_version: u32,
    pub devices: Vec<DeviceView>,
    /// Sessions waiting for a device, oldest first
    pub queue: Vec<SessionView>,
    pub active_sessions: usize,
    pub device_count: usize,
}

/// Placement of one device in the room layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotView {
    pub device: DeviceId,
    pub slot: usize,
    pub x: f32,
    pub y: f32,
}

/// Current room layout for the given surface size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutView {
    pub width: f32,
    pub height: f32,
    pub slots: Vec<SlotView>,
    /// Device currently being dragged, if any
    pub dragging: Option<DeviceId>,
}

/// Result of releasing a dragged device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DragOutcome {
    /// No drag was in progress, or it was abandoned
    Cancelled,
    /// Released over the device's own slot
    Unchanged { device: DeviceId, slot: usize },
    /// Moved into an empty slot
    Moved {
        device: DeviceId,
        from: usize,
        to: usize,
    },
    /// Traded slots with the device that owned the target
    Swapped {
        device: DeviceId,
        other: DeviceId,
        from: usize,
        to: usize,
    },
}
