//! Engine errors

use lounge_store::StoreError;
use lounge_util::{DeviceId, MemberId};
use thiserror::Error;

/// Why an occupancy operation was refused or failed
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{identity} ({name}) is already checked in on device {device}")]
    DuplicateSession {
        identity: MemberId,
        name: String,
        device: DeviceId,
    },

    #[error("No active session for {0}")]
    SessionNotFound(MemberId),

    #[error("{identity} is not queued; already assigned to device {device}")]
    SessionNotQueued { identity: MemberId, device: DeviceId },

    #[error("{identity} is already on device {device}")]
    AlreadyAssigned { identity: MemberId, device: DeviceId },

    #[error("Device {0} does not exist")]
    DeviceNotFound(DeviceId),

    #[error("Device {device} is busy (occupied by {occupant})")]
    DeviceBusy { device: DeviceId, occupant: MemberId },

    #[error("{identity} is already on device {device}")]
    SameDevice { identity: MemberId, device: DeviceId },

    #[error("{0} is in the queue; assign a device instead of switching")]
    SessionQueued(MemberId),

    #[error("Switch of {identity} to device {target} failed, restored to device {restored_to}: {source}")]
    SwitchRolledBack {
        identity: MemberId,
        target: DeviceId,
        restored_to: DeviceId,
        #[source]
        source: Box<EngineError>,
    },

    #[error(
        "Switch of {identity} from device {from} to device {to} failed and could not be undone \
         (switch: {switch_error}; rollback: {rollback_error}); the session needs manual reconciliation"
    )]
    SwitchAndRollbackFailed {
        identity: MemberId,
        from: DeviceId,
        to: DeviceId,
        switch_error: Box<EngineError>,
        rollback_error: Box<EngineError>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// The session may exist nowhere; an operator has to sort it out
    pub fn requires_manual_reconciliation(&self) -> bool {
        matches!(self, EngineError::SwitchAndRollbackFailed { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_double_failure_needs_reconciliation() {
        let busy = EngineError::DeviceBusy {
            device: DeviceId::new(3),
            occupant: MemberId::new("S1"),
        };
        assert!(!busy.requires_manual_reconciliation());
        assert_eq!(busy.to_string(), "Device 3 is busy (occupied by S1)");

        let failed = EngineError::SwitchAndRollbackFailed {
            identity: MemberId::new("S1"),
            from: DeviceId::new(3),
            to: DeviceId::new(4),
            switch_error: Box::new(EngineError::Store(StoreError::Serialization("disk".into()))),
            rollback_error: Box::new(EngineError::Store(StoreError::Serialization("disk".into()))),
        };
        assert!(failed.requires_manual_reconciliation());
        assert!(failed.to_string().contains("manual reconciliation"));
    }
}
