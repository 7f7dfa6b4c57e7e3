//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Global service settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Device roster
    #[serde(default)]
    pub room: RawRoom,

    /// Room layout geometry
    #[serde(default)]
    pub layout: RawLayout,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for sessions, layout and logs
    pub data_dir: Option<PathBuf>,

    /// Member directory CSV (relative paths resolve against data_dir)
    pub member_file: Option<PathBuf>,
}

/// Device roster. Workstations get ids `1..=workstations`, consoles follow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRoom {
    #[serde(default = "default_workstations")]
    pub workstations: u32,

    #[serde(default = "default_consoles")]
    pub consoles: u32,

    /// Preferred order in which devices fill slots on first placement
    pub slot_order: Option<Vec<u32>>,
}

impl Default for RawRoom {
    fn default() -> Self {
        Self {
            workstations: default_workstations(),
            consoles: default_consoles(),
            slot_order: None,
        }
    }
}

fn default_workstations() -> u32 {
    16
}

fn default_consoles() -> u32 {
    2
}

/// Layout geometry, in surface units
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLayout {
    pub icon_size: Option<f32>,
    pub spacing_x: Option<f32>,
    pub spacing_y: Option<f32>,
    pub margin: Option<f32>,
    /// Share of the surface width used by the primary grid
    pub primary_width_ratio: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_room() {
        let toml_str = r#"
            config_version = 1

            [room]
            workstations = 4
            consoles = 1
            slot_order = [4, 3, 2, 1, 5]
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.room.workstations, 4);
        assert_eq!(config.room.consoles, 1);
        assert_eq!(config.room.slot_order.unwrap().len(), 5);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert_eq!(config.room.workstations, 16);
        assert_eq!(config.room.consoles, 2);
        assert!(config.room.slot_order.is_none());
        assert!(config.layout.icon_size.is_none());
        assert!(config.service.data_dir.is_none());
    }
}
