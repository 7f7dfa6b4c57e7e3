//! The lounge service
//!
//! Owns the occupancy engine and the room layout, and serves the JSON-line
//! command protocol. All state changes happen on one task, one command at
//! a time.

mod service;

pub use service::*;
