//! Bus master abstraction
//!
//! Every device driver talks to its chip through a [`SpiMaster`]. One bus
//! carries several chip-select lines, so the master is told which line a
//! transaction targets.

mod shared;
mod traits;

pub use shared::*;
pub use traits::{ChipSelect, SpiMaster};
