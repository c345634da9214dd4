//! spimem-core - Core library for serial memory chips sharing one SPI bus
//!
//! This crate identifies and drives three families of serial memory that
//! can sit behind the chip-select lines of a single bus:
//!
//! - **NOR flash** - linear reads, 256-byte page program, 4 KiB sector erase
//! - **SPI-NAND** - every access goes through the on-chip page cache
//! - **PSRAM** - raw reads and writes, nothing to erase
//!
//! All three are exposed through the [`device::MemDevice`] trait so that
//! higher layers never special-case a family by name.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable [`bus::SharedBus`] (reference-counted bus sharing)
//!
//! # Example
//!
//! ```ignore
//! use spimem_core::{probe, bus::SpiMaster};
//!
//! fn show<M: SpiMaster>(master: &mut M) {
//!     let opts = probe::ProbeOptions::default();
//!     if let Some(info) = probe::identify(master, 5, &[5, 6], &opts) {
//!         println!("{} {} on CS {}", info.vendor_name, info.family, info.chip_select);
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod chip;
pub mod device;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod spi;

pub use error::{Error, Result};
