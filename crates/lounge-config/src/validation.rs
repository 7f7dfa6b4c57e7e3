//! Configuration validation

use crate::schema::{RawConfig, RawLayout, RawRoom};
use std::collections::HashSet;
use thiserror::Error;

/// Largest room the service accepts
pub const MAX_DEVICES: u32 = 1024;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Room has no devices")]
    EmptyRoom,

    #[error("Room has {0} devices, more than the limit of {}", MAX_DEVICES)]
    TooManyDevices(u64),

    #[error("slot_order references device {0}, which is not in the room")]
    UnknownDevice(u32),

    #[error("slot_order lists device {0} more than once")]
    DuplicateSlotOrder(u32),

    #[error("Layout '{field}' must be positive, got {value}")]
    NonPositiveMetric { field: &'static str, value: f32 },

    #[error("primary_width_ratio must be in (0, 1], got {0}")]
    InvalidWidthRatio(f32),
}

/// Validate a raw configuration, collecting every error
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = validate_room(&config.room);
    errors.extend(validate_layout(&config.layout));
    errors
}

fn validate_room(room: &RawRoom) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let device_count = u64::from(room.workstations) + u64::from(room.consoles);
    if device_count == 0 {
        errors.push(ValidationError::EmptyRoom);
    } else if device_count > u64::from(MAX_DEVICES) {
        errors.push(ValidationError::TooManyDevices(device_count));
    }

    if let Some(order) = &room.slot_order {
        let mut seen = HashSet::new();
        for &id in order {
            // 0 is the queue marker, never a device
            if id == 0 || u64::from(id) > device_count {
                errors.push(ValidationError::UnknownDevice(id));
            } else if !seen.insert(id) {
                errors.push(ValidationError::DuplicateSlotOrder(id));
            }
        }
    }

    errors
}

fn validate_layout(layout: &RawLayout) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let metrics = [
        ("icon_size", layout.icon_size),
        ("spacing_x", layout.spacing_x),
        ("spacing_y", layout.spacing_y),
    ];
    for (field, value) in metrics {
        if let Some(value) = value
            && value.partial_cmp(&0.0) != Some(std::cmp::Ordering::Greater)
        {
            errors.push(ValidationError::NonPositiveMetric { field, value });
        }
    }

    if let Some(margin) = layout.margin
        && margin.partial_cmp(&0.0) == Some(std::cmp::Ordering::Less)
    {
        errors.push(ValidationError::NonPositiveMetric {
            field: "margin",
            value: margin,
        });
    }

    if let Some(ratio) = layout.primary_width_ratio
        && !(ratio > 0.0 && ratio <= 1.0)
    {
        errors.push(ValidationError::InvalidWidthRatio(ratio));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> RawConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        let config = parse("config_version = 1");
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn empty_room_rejected() {
        let config = parse(
            r#"
            config_version = 1
            [room]
            workstations = 0
            consoles = 0
            "#,
        );

        let errors = validate_config(&config);
        assert!(matches!(errors.as_slice(), [ValidationError::EmptyRoom]));
    }

    #[test]
    fn oversized_room_rejected() {
        let config = parse(
            r#"
            config_version = 1
            [room]
            workstations = 4294967295
            consoles = 1
            "#,
        );

        let errors = validate_config(&config);
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::TooManyDevices(4_294_967_296)]
        ));

        let config = parse(
            r#"
            config_version = 1
            [room]
            workstations = 1024
            consoles = 1
            "#,
        );
        assert!(matches!(
            validate_config(&config).as_slice(),
            [ValidationError::TooManyDevices(1025)]
        ));

        let config = parse(
            r#"
            config_version = 1
            [room]
            workstations = 1000
            consoles = 24
            "#,
        );
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn slot_order_errors_collected() {
        let config = parse(
            r#"
            config_version = 1
            [room]
            workstations = 3
            consoles = 0
            slot_order = [0, 2, 2, 9]
            "#,
        );

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownDevice(0))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownDevice(9))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateSlotOrder(2))));
    }

    #[test]
    fn layout_metrics_checked() {
        let config = parse(
            r#"
            config_version = 1
            [layout]
            icon_size = 0.0
            margin = -1.0
            primary_width_ratio = 1.5
            "#,
        );

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
    }
}
