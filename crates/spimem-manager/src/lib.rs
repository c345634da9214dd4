//! spimem-manager - Registry of detected serial memory devices
//!
//! The [`Manager`] owns the chip-select list and the table of detected
//! devices. It hands out [`DeviceHandle`]s and records which entries are
//! leased, so that at most one handle exists per detected device.
//!
//! # Example
//!
//! ```ignore
//! use spimem_core::bus::SharedBus;
//! use spimem_core::chip::DeviceFamily;
//! use spimem_manager::Manager;
//!
//! let mut mgr = Manager::new(SharedBus::new(bus));
//! mgr.scan(&[5, 6, 7]);
//! if let Some(mut dev) = mgr.open_preferred(DeviceFamily::Psram) {
//!     dev.write(0, b"hello")?;
//!     mgr.release(dev);
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

mod handle;
mod pool;
mod registry;

pub use handle::{Device, DeviceHandle};
pub use pool::DevicePool;
pub use registry::{Manager, ManagerConfig, MAX_CS_LINES, MAX_DEVICES};
