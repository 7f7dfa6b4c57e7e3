//! Protocol types for the lounge service
//!
//! This crate defines the data shared between the service and its clients:
//! - Devices, sessions, log entries and members
//! - Commands (requests from clients) and responses
//! - Events (service -> clients)

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
