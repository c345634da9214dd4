//! PSRAM driver

use super::{check_range, clamp_capacity, MemDevice};
use crate::bus::{ChipSelect, SpiMaster};
use crate::chip::{DeviceFamily, DeviceInfo};
use crate::error::{Error, Result};
use crate::protocol::psram;
use crate::spi::AddressWidth;

/// Serial PSRAM bound to one chip-select line
pub struct PsramDevice<M> {
    master: M,
    cs: ChipSelect,
    capacity: u64,
}

impl<M: SpiMaster> PsramDevice<M> {
    /// Create a driver for a probed device
    pub fn new(master: M, info: &DeviceInfo) -> Self {
        Self::with_capacity(master, info.chip_select, info.capacity_bytes)
    }

    /// Create a driver with an explicit capacity
    pub fn with_capacity(master: M, cs: ChipSelect, capacity: u64) -> Self {
        Self {
            master,
            cs,
            capacity: clamp_capacity(capacity, AddressWidth::ThreeByte.max_size()),
        }
    }

    /// Give the bus master back
    pub fn into_inner(self) -> M {
        self.master
    }
}

impl<M: SpiMaster> MemDevice for PsramDevice<M> {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Psram
    }

    fn chip_select(&self) -> ChipSelect {
        self.cs
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn page_size(&self) -> u32 {
        psram::PAGE_SIZE
    }

    fn erase_unit_size(&self) -> u32 {
        0
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        check_range(&*self, addr, buf.len())?;
        psram::read(&mut self.master, self.cs, addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        check_range(&*self, addr, data.len())?;
        psram::write(&mut self.master, self.cs, addr, data)
    }

    fn erase_range(&mut self, _addr: u32, _len: u32) -> Result<()> {
        Err(Error::EraseUnsupported)
    }
}
