//! Command types for the lounge protocol

use chrono::NaiveDate;
use lounge_util::{DeviceId, MemberId};
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, DragOutcome, LayoutView, LogEntry, Member, Session, StateSnapshot};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// The command
    pub command: Command,
}

fn default_api_version() -> u32 {
    API_VERSION
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, ResponseResult::Ok(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    DuplicateSession,
    SessionNotFound,
    SessionNotQueued,
    AlreadyAssigned,
    DeviceNotFound,
    DeviceBusy,
    SameDevice,
    SessionQueued,
    SwitchRolledBack,
    /// Both the switch and its compensation failed; needs an operator
    SwitchAndRollbackFailed,
    StoreError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get current occupancy state
    GetState,

    /// Check a person in, to a device or (device 0 / omitted) into the queue
    CheckIn {
        name: String,
        identity: MemberId,
        #[serde(default)]
        device: DeviceId,
    },

    /// Check a person out, ending their session
    CheckOut { identity: MemberId },

    /// Drop a queued session without it ever getting a device
    RemoveFromQueue { identity: MemberId },

    /// Give a queued session a device
    AssignQueued {
        identity: MemberId,
        device: DeviceId,
    },

    /// Move an assigned session to another device
    SwitchStation {
        identity: MemberId,
        device: DeviceId,
    },

    /// Read the usage log of a day (default: today)
    GetLog {
        #[serde(default)]
        day: Option<NaiveDate>,
    },

    /// Search the member directory by name or identity
    SearchMembers { query: String },

    /// Current room layout
    GetLayout,

    /// Set the size of the surface the layout is drawn on
    Resize { width: f32, height: f32 },

    /// Press over a device icon
    BeginDrag { x: f32, y: f32 },

    /// Pointer moved while dragging
    UpdateDrag { x: f32, y: f32 },

    /// Release: snap to the nearest slot
    EndDrag,

    /// Abandon the drag without moving anything
    CancelDrag,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether this command can change occupancy state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::CheckIn { .. }
                | Command::CheckOut { .. }
                | Command::RemoveFromQueue { .. }
                | Command::AssignQueued { .. }
                | Command::SwitchStation { .. }
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(StateSnapshot),
    CheckedIn {
        session: Session,
    },
    CheckedOut {
        identity: MemberId,
        device: DeviceId,
        usage: String,
    },
    Dequeued {
        identity: MemberId,
    },
    Assigned {
        identity: MemberId,
        device: DeviceId,
    },
    Switched {
        identity: MemberId,
        from: DeviceId,
        to: DeviceId,
    },
    Log {
        day: NaiveDate,
        entries: Vec<LogEntry>,
    },
    Members {
        members: Vec<Member>,
    },
    Layout(LayoutView),
    DragStarted {
        device: Option<DeviceId>,
    },
    DragMoved {
        x: f32,
        y: f32,
    },
    DragEnded {
        outcome: DragOutcome,
    },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(1, Command::GetState);
        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 1);
        assert!(matches!(parsed.command, Command::GetState));
    }

    #[test]
    fn check_in_defaults_to_queue() {
        let line = r#"{"request_id":7,"command":{"type":"check_in","name":"Ann","identity":"S1"}}"#;
        let parsed: Request = serde_json::from_str(line).unwrap();

        assert_eq!(parsed.api_version, API_VERSION);
        match parsed.command {
            Command::CheckIn { device, .. } => assert!(device.is_queue()),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn mutating_commands() {
        assert!(Command::CheckOut { identity: "S1".into() }.is_mutating());
        assert!(!Command::GetState.is_mutating());
        assert!(!Command::EndDrag.is_mutating());
    }

    #[test]
    fn error_response_serialization() {
        let resp = Response::error(
            3,
            ErrorInfo::new(ErrorCode::DeviceBusy, "Device 9 is busy"),
        );

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("device_busy"));
        assert!(!resp.is_ok());
    }
}
