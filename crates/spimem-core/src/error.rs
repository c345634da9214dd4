//! Error types for spimem-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// The shared bus is already borrowed by another transaction
    BusBusy,

    // Device errors
    /// No device answered on the chip-select line
    DeviceNotFound,
    /// The registry entry is already leased to another handle
    DeviceReserved,
    /// Index does not refer to a detected device
    InvalidIndex,

    // Operation errors
    /// A busy/ready bit did not clear in time
    Timeout,
    /// Write enable latch did not set after WREN
    WriteEnableFailed,
    /// Device reported a program failure
    ProgramFailed {
        /// Address of the page that failed
        addr: u32,
    },
    /// Device reported an erase failure
    EraseFailed {
        /// Address of the erase unit that failed
        addr: u32,
    },
    /// The device family has no erase operation
    EraseUnsupported,

    // Address/size errors
    /// Address range lies beyond the device capacity
    AddressOutOfBounds,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::BusBusy => write!(f, "bus is busy"),
            Self::DeviceNotFound => write!(f, "no device found"),
            Self::DeviceReserved => write!(f, "device is already in use"),
            Self::InvalidIndex => write!(f, "invalid device index"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::WriteEnableFailed => write!(f, "write enable latch not set"),
            Self::ProgramFailed { addr } => {
                write!(f, "program failed at address 0x{:08X}", addr)
            }
            Self::EraseFailed { addr } => write!(f, "erase failed at address 0x{:08X}", addr),
            Self::EraseUnsupported => write!(f, "device has no erase operation"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
