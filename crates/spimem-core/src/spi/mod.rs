//! SPI types and command structures
//!
//! This module provides types for representing single-I/O SPI
//! transactions and the opcodes of the supported memory families.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::SpiCommand;
