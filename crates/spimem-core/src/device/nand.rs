//! SPI-NAND driver
//!
//! Read, write and erase all go through the page cache. The geometry is
//! fixed when the driver is created.

use super::{align_down, align_up, check_range, MemDevice};
use crate::bus::{ChipSelect, SpiMaster};
use crate::chip::{DeviceFamily, DeviceInfo, NandGeometry};
use crate::error::Result;
use crate::protocol::nand;

/// SPI-NAND flash bound to one chip-select line
pub struct NandDevice<M> {
    master: M,
    cs: ChipSelect,
    capacity: u64,
    geometry: NandGeometry,
}

impl<M: SpiMaster> NandDevice<M> {
    /// Create a driver for a probed device and clear block protection
    pub fn open(master: M, info: &DeviceInfo) -> Result<Self> {
        Self::with_geometry(master, info.chip_select, info.capacity_bytes, info.nand_geometry())
    }

    /// Create a driver with an explicit geometry and clear block protection
    pub fn with_geometry(
        mut master: M,
        cs: ChipSelect,
        capacity: u64,
        geometry: NandGeometry,
    ) -> Result<Self> {
        nand::unprotect_all(&mut master, cs)?;
        log::debug!(
            "SPI-NAND on CS {}: {} byte pages, {} spare, {} pages/block",
            cs,
            geometry.page_size,
            geometry.spare_size,
            geometry.pages_per_block
        );
        Ok(Self {
            master,
            cs,
            capacity: capacity.min(u32::MAX as u64),
            geometry,
        })
    }

    /// Array geometry
    pub fn geometry(&self) -> NandGeometry {
        self.geometry
    }

    /// Give the bus master back
    pub fn into_inner(self) -> M {
        self.master
    }
}

impl<M: SpiMaster> MemDevice for NandDevice<M> {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::SpiNand
    }

    fn chip_select(&self) -> ChipSelect {
        self.cs
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn page_size(&self) -> u32 {
        self.geometry.page_size
    }

    fn erase_unit_size(&self) -> u32 {
        self.geometry.block_size()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        check_range(&*self, addr, buf.len())?;

        let page = self.geometry.page_size;
        let chunk = self.master.max_read_len().max(1);
        let mut offset = 0usize;
        while offset < buf.len() {
            let at = addr + offset as u32;
            let column = at % page;
            let n = ((page - column) as usize).min(buf.len() - offset);

            nand::page_read_to_cache(&mut self.master, self.cs, at / page)?;
            let mut col = column;
            for piece in buf[offset..offset + n].chunks_mut(chunk) {
                let len = piece.len() as u32;
                nand::read_from_cache(&mut self.master, self.cs, col, piece)?;
                col += len;
            }
            offset += n;
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        check_range(&*self, addr, data.len())?;

        let page = self.geometry.page_size;
        let mut offset = 0usize;
        while offset < data.len() {
            let at = addr + offset as u32;
            let column = at % page;
            let n = ((page - column) as usize).min(data.len() - offset);

            nand::program_load(&mut self.master, self.cs, column, &data[offset..offset + n])?;
            nand::program_execute(&mut self.master, self.cs, at / page, at - column)?;
            offset += n;
        }
        Ok(())
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let block = self.geometry.block_size();
        let start = align_down(addr, block);
        let end = align_up(addr.saturating_add(len), block);
        check_range(&*self, start, (end - start) as usize)?;

        let mut at = start;
        while at < end {
            let row = at / self.geometry.page_size;
            nand::block_erase(&mut self.master, self.cs, row, at)?;
            at += block;
        }
        Ok(())
    }
}
