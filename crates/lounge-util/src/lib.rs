//! Shared utilities for the lounge service
//!
//! This crate provides:
//! - ID types (DeviceId, MemberId)
//! - Time utilities (mock-able wall clock, duration formatting)
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
