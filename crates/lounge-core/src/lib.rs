//! Core of the lounge service
//!
//! This crate contains:
//! - The occupancy engine (check-in, check-out, queue, assignment, switch)
//! - The usage journal that feeds the daily log
//! - The refresh signal for presentation code
//! - The room layout (slot mapping, geometry, drag protocol)

mod device;
mod engine;
mod error;
mod events;
mod geometry;
mod journal;
mod layout;
mod refresh;
mod session;
mod slots;

pub use device::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use geometry::*;
pub use journal::*;
pub use layout::*;
pub use refresh::*;
pub use session::*;
pub use slots::*;
