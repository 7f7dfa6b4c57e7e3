//! Device table

use lounge_api::{DeviceKind, DeviceStatus};
use lounge_config::RoomConfig;
use lounge_util::{DeviceId, MemberId};
use std::collections::BTreeMap;

use crate::SessionTable;

/// A physical device and its occupancy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    /// Bound session; only ever set for workstations
    pub occupant: Option<MemberId>,
}

impl Device {
    fn new(id: DeviceId, kind: DeviceKind) -> Self {
        Self {
            id,
            kind,
            status: DeviceStatus::Free,
            occupant: None,
        }
    }

    pub fn is_workstation(&self) -> bool {
        self.kind == DeviceKind::Workstation
    }

    /// Who blocks a new session on this device, if anyone.
    /// Consoles never block.
    pub fn blocker(&self) -> Option<&MemberId> {
        match self.kind {
            DeviceKind::Workstation => self.occupant.as_ref(),
            DeviceKind::SharedConsole => None,
        }
    }
}

/// In-memory table of every device in the room.
///
/// Never persisted: it is rebuilt from the room configuration and derived
/// from the session table.
#[derive(Debug, Clone)]
pub struct DeviceTable {
    devices: BTreeMap<DeviceId, Device>,
}

impl DeviceTable {
    /// All devices free
    pub fn from_room(room: &RoomConfig) -> Self {
        let devices = room
            .devices()
            .map(|(id, kind)| (id, Device::new(id, kind)))
            .collect();
        Self { devices }
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    /// Devices in id order
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Recompute one device's status and binding from the sessions on it.
    /// Ids that are not devices (the queue marker) are ignored.
    pub(crate) fn sync(&mut self, id: DeviceId, sessions: &SessionTable) {
        let Some(device) = self.devices.get_mut(&id) else {
            return;
        };

        let mut on_device = sessions.on_device(id);
        let first = on_device.next().map(|s| s.identity.clone());

        device.status = if first.is_some() {
            DeviceStatus::Occupied
        } else {
            DeviceStatus::Free
        };
        device.occupant = match device.kind {
            DeviceKind::Workstation => first,
            DeviceKind::SharedConsole => None,
        };
    }

    /// Recompute every device
    pub(crate) fn sync_all(&mut self, sessions: &SessionTable) {
        for id in self.ids() {
            self.sync(id, sessions);
        }
    }
}
