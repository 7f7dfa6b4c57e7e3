//! Validated configuration structures

use crate::schema::{RawConfig, RawLayout, RawRoom, RawServiceConfig};
use lounge_api::DeviceKind;
use lounge_util::DeviceId;
use std::path::PathBuf;

/// Slot preference of the reference room (16 workstations, 2 consoles),
/// following the physical floor plan.
pub const REFERENCE_SLOT_ORDER: [u32; 18] =
    [16, 15, 14, 11, 12, 13, 10, 9, 8, 7, 6, 5, 1, 2, 3, 4, 17, 18];

/// Validated configuration ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub service: ServiceConfig,
    pub room: RoomConfig,
    pub layout: LayoutMetrics,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            room: RoomConfig::from_raw(raw.room),
            layout: LayoutMetrics::from_raw(raw.layout),
        }
    }
}

/// File locations
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub member_file: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let data_dir = raw.data_dir.unwrap_or_else(lounge_util::default_data_dir);
        let member_file = match raw.member_file {
            Some(path) if path.is_absolute() => path,
            Some(path) => data_dir.join(path),
            None => data_dir.join("membership.csv"),
        };
        Self {
            data_dir,
            member_file,
        }
    }

    /// Move the data directory, keeping a member file that lived inside it
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        if let Ok(relative) = self.member_file.strip_prefix(&self.data_dir) {
            self.member_file = data_dir.join(relative);
        }
        self.data_dir = data_dir;
        self
    }

    pub fn sessions_file(&self) -> PathBuf {
        self.data_dir.join("active_sessions.json")
    }

    pub fn layout_file(&self) -> PathBuf {
        self.data_dir.join("device_layout.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// The fixed device roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    pub workstations: u32,
    pub consoles: u32,
    pub slot_order: Vec<DeviceId>,
}

impl RoomConfig {
    fn from_raw(raw: RawRoom) -> Self {
        let slot_order = match raw.slot_order {
            Some(order) => order,
            None if raw.workstations == 16 && raw.consoles == 2 => REFERENCE_SLOT_ORDER.to_vec(),
            None => (1..=raw.workstations.saturating_add(raw.consoles)).collect(),
        };
        Self {
            workstations: raw.workstations,
            consoles: raw.consoles,
            slot_order: slot_order.into_iter().map(DeviceId::new).collect(),
        }
    }

    /// Highest device id; the roster is bounded by validation
    fn last_id(&self) -> u32 {
        self.workstations.saturating_add(self.consoles)
    }

    pub fn device_count(&self) -> usize {
        self.last_id() as usize
    }

    /// Every device in id order, with its kind
    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, DeviceKind)> + '_ {
        (1..=self.last_id()).map(|id| {
            let kind = if id <= self.workstations {
                DeviceKind::Workstation
            } else {
                DeviceKind::SharedConsole
            };
            (DeviceId::new(id), kind)
        })
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices().map(|(id, _)| id).collect()
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::from_raw(RawRoom::default())
    }
}

/// Geometry of the room layout surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub icon_size: f32,
    pub spacing_x: f32,
    pub spacing_y: f32,
    pub margin: f32,
    pub primary_width_ratio: f32,
}

impl LayoutMetrics {
    fn from_raw(raw: RawLayout) -> Self {
        let defaults = Self::default();
        Self {
            icon_size: raw.icon_size.unwrap_or(defaults.icon_size),
            spacing_x: raw.spacing_x.unwrap_or(defaults.spacing_x),
            spacing_y: raw.spacing_y.unwrap_or(defaults.spacing_y),
            margin: raw.margin.unwrap_or(defaults.margin),
            primary_width_ratio: raw
                .primary_width_ratio
                .unwrap_or(defaults.primary_width_ratio),
        }
    }
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            icon_size: 64.0,
            spacing_x: 120.0,
            spacing_y: 150.0,
            margin: 24.0,
            primary_width_ratio: 0.85,
        }
    }
}
