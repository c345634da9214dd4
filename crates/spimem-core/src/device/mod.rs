//! Device abstraction over the three memory families
//!
//! [`MemDevice`] is the one contract the filesystem and applications use.
//! The drivers in this module implement it for NOR, SPI-NAND and PSRAM.

mod nand;
mod nor;
mod psram;

pub use nand::NandDevice;
pub use nor::NorDevice;
pub use psram::PsramDevice;

use crate::bus::ChipSelect;
use crate::chip::DeviceFamily;
use crate::error::{Error, Result};

/// Value of an erased byte on flash
pub const ERASED_VALUE: u8 = 0xFF;

/// Type-erased view of a serial memory chip
///
/// Addresses are byte offsets from the start of the chip. Every operation
/// is synchronous and either completes, times out or fails.
pub trait MemDevice {
    /// Memory family of this device
    fn family(&self) -> DeviceFamily;

    /// Chip-select line this device is bound to
    fn chip_select(&self) -> ChipSelect;

    /// Usable capacity in bytes
    fn capacity(&self) -> u64;

    /// Program/burst page size in bytes
    fn page_size(&self) -> u32;

    /// Minimum erase granularity, 0 if the device has no erase
    fn erase_unit_size(&self) -> u32;

    /// Read `buf.len()` bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `addr`
    ///
    /// Flash devices only clear bits; the target must already be erased
    /// for the result to equal `data`.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase every erase unit overlapping `[addr, addr + len)`
    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()>;

    /// Returns true if `[addr, addr + len)` lies inside the device
    fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        (addr as u64) + (len as u64) <= self.capacity()
    }
}

impl<D: MemDevice + ?Sized> MemDevice for &mut D {
    fn family(&self) -> DeviceFamily {
        (**self).family()
    }

    fn chip_select(&self) -> ChipSelect {
        (**self).chip_select()
    }

    fn capacity(&self) -> u64 {
        (**self).capacity()
    }

    fn page_size(&self) -> u32 {
        (**self).page_size()
    }

    fn erase_unit_size(&self) -> u32 {
        (**self).erase_unit_size()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write(addr, data)
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        (**self).erase_range(addr, len)
    }
}

/// Round `value` down to a multiple of `unit` (which must be non-zero)
pub const fn align_down(value: u32, unit: u32) -> u32 {
    value - (value % unit)
}

/// Round `value` up to a multiple of `unit` (which must be non-zero)
pub const fn align_up(value: u32, unit: u32) -> u32 {
    let rem = value % unit;
    if rem == 0 {
        value
    } else {
        value + (unit - rem)
    }
}

/// Reject ranges that leave the device before touching the bus
pub(crate) fn check_range<D: MemDevice + ?Sized>(dev: &D, addr: u32, len: usize) -> Result<()> {
    if dev.is_valid_range(addr, len) {
        Ok(())
    } else {
        Err(Error::AddressOutOfBounds)
    }
}

/// Clamp a detected capacity to what the driver can address
pub(crate) fn clamp_capacity(capacity: u64, limit: u32) -> u64 {
    if capacity > limit as u64 {
        log::warn!(
            "capacity {} exceeds addressable {} bytes, clamping",
            capacity,
            limit
        );
        limit as u64
    } else {
        capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_helpers() {
        assert_eq!(align_down(0x1234, 0x1000), 0x1000);
        assert_eq!(align_up(0x1234, 0x1000), 0x2000);
        assert_eq!(align_up(0x2000, 0x1000), 0x2000);
        assert_eq!(align_up(0, 4096), 0);
    }
}
