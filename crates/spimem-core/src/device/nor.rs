//! NOR flash driver

use super::{align_down, align_up, check_range, clamp_capacity, MemDevice};
use crate::bus::{ChipSelect, SpiMaster};
use crate::chip::{DeviceFamily, DeviceInfo};
use crate::error::Result;
use crate::protocol::nor;
use crate::spi::AddressWidth;

/// Serial NOR flash bound to one chip-select line
///
/// Writes are split at 256-byte page boundaries; erases work on 4 KiB
/// sectors.
pub struct NorDevice<M> {
    master: M,
    cs: ChipSelect,
    capacity: u64,
}

impl<M: SpiMaster> NorDevice<M> {
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

impl<M: SpiMaster> MemDevice for NorDevice<M> {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Nor
    }

    fn chip_select(&self) -> ChipSelect {
        self.cs
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn page_size(&self) -> u32 {
        nor::PAGE_SIZE
    }

    fn erase_unit_size(&self) -> u32 {
        nor::SECTOR_SIZE
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        check_range(&*self, addr, buf.len())?;
        nor::read(&mut self.master, self.cs, addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        check_range(&*self, addr, data.len())?;

        let limit = self.master.max_write_len().max(1) as u32;
        let mut offset = 0usize;
        while offset < data.len() {
            let at = addr + offset as u32;
            let page_left = nor::PAGE_SIZE - (at % nor::PAGE_SIZE);
            let n = page_left.min(limit).min((data.len() - offset) as u32) as usize;
            nor::program_page(&mut self.master, self.cs, at, &data[offset..offset + n])?;
            offset += n;
        }
        Ok(())
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let start = align_down(addr, nor::SECTOR_SIZE);
        let end = align_up(addr.saturating_add(len), nor::SECTOR_SIZE);
        check_range(&*self, start, (end - start) as usize)?;

        let mut at = start;
        while at < end {
            nor::sector_erase(&mut self.master, self.cs, at)?;
            at += nor::SECTOR_SIZE;
        }
        Ok(())
    }
}
