//! SPI-NAND protocol (Macronix MX35LF style)
//!
//! Every array access goes through the on-chip page cache:
//!
//! - read: PAGE READ (row) -> wait -> READ FROM CACHE (column, 1 dummy byte)
//! - write: WREN -> PROGRAM LOAD (column, data) -> PROGRAM EXECUTE (row) -> wait
//! - erase: WREN -> BLOCK ERASE (row) -> wait
//!
//! The row address is the page index, the column is the byte offset
//! inside the page.

use bitflags::bitflags;

use super::max_polls;
use crate::bus::{ChipSelect, SpiMaster};
use crate::error::{Error, Result};
use crate::spi::{opcodes, SpiCommand};

bitflags! {
    /// Status feature register (0xC0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NandStatus: u8 {
        /// Operation in progress
        const OIP    = 1 << 0;
        /// Write enable latch
        const WEL    = 1 << 1;
        /// Erase failed
        const E_FAIL = 1 << 2;
        /// Program failed
        const P_FAIL = 1 << 3;
    }
}

/// Timeout after reset
pub const RESET_TIMEOUT_US: u32 = 50_000;
/// Timeout for a page-to-cache load
pub const READ_TIMEOUT_US: u32 = 2_000;
/// Timeout for a program execute
pub const PROGRAM_TIMEOUT_US: u32 = 6_000;
/// Timeout for a block erase
pub const ERASE_TIMEOUT_US: u32 = 120_000;

/// Poll spacing for status reads
const POLL_DELAY_US: u32 = 50;

/// Issue the device reset command
pub fn reset<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::NAND_RESET);
    master.execute(cs, &mut cmd)
}

/// Read a feature register
pub fn get_feature<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect, reg: u8) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::get_feature(opcodes::NAND_GET_FEATURE, reg, &mut buf);
    master.execute(cs, &mut cmd)?;
    Ok(buf[0])
}

/// Write a feature register
pub fn set_feature<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    reg: u8,
    value: u8,
) -> Result<()> {
    let data = [value];
    let mut cmd = SpiCommand::set_feature(opcodes::NAND_SET_FEATURE, reg, &data);
    master.execute(cs, &mut cmd)
}

/// Read the status feature register
pub fn read_status<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<NandStatus> {
    get_feature(master, cs, opcodes::NAND_FEAT_STATUS).map(NandStatus::from_bits_retain)
}

/// Wait for OIP to clear, returning the final status
pub fn wait_ready<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    timeout_us: u32,
) -> Result<NandStatus> {
    for _ in 0..max_polls(POLL_DELAY_US, timeout_us) {
        let status = read_status(master, cs)?;
        if !status.contains(NandStatus::OIP) {
            return Ok(status);
        }
        master.delay_us(POLL_DELAY_US);
    }
    Err(Error::Timeout)
}

/// Read identification with the primary opcode
///
/// Returns the raw response: dummy byte, manufacturer, device 1, device 2.
pub fn read_id<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<[u8; 4]> {
    let mut buf = [0u8; 4];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(cs, &mut cmd)?;
    Ok(buf)
}

/// Read identification with the legacy opcode
///
/// Returns the raw response: dummy byte, fixed zero, device 1, device 2.
pub fn read_id_legacy<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<[u8; 4]> {
    let mut buf = [0u8; 4];
    let mut cmd = SpiCommand::read_reg(opcodes::NAND_RDID_LEGACY, &mut buf);
    master.execute(cs, &mut cmd)?;
    Ok(buf)
}

/// Send WREN
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(cs, &mut cmd)
}

/// Load a page from the array into the cache and wait for completion
pub fn page_read_to_cache<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    row: u32,
) -> Result<()> {
    let mut cmd = SpiCommand::addr_3b(opcodes::NAND_PAGE_READ, row);
    master.execute(cs, &mut cmd)?;
    wait_ready(master, cs, READ_TIMEOUT_US).map(|_| ())
}

/// Read bytes out of the cache starting at `column`
pub fn read_from_cache<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    column: u32,
    buf: &mut [u8],
) -> Result<()> {
    let mut cmd = SpiCommand::read_2b(opcodes::NAND_READ_CACHE, column, buf).with_dummy_cycles(8);
    master.execute(cs, &mut cmd)
}

/// Load `data` into the cache at `column`
pub fn program_load<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    column: u32,
    data: &[u8],
) -> Result<()> {
    write_enable(master, cs)?;
    let mut cmd = SpiCommand::write_2b(opcodes::NAND_PROGRAM_LOAD, column, data);
    master.execute(cs, &mut cmd)
}

/// Commit the cache to the array row and check the program-fail bit
pub fn program_execute<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    row: u32,
    page_addr: u32,
) -> Result<()> {
    let mut cmd = SpiCommand::addr_3b(opcodes::NAND_PROGRAM_EXEC, row);
    master.execute(cs, &mut cmd)?;
    let status = wait_ready(master, cs, PROGRAM_TIMEOUT_US)?;
    if status.contains(NandStatus::P_FAIL) {
        return Err(Error::ProgramFailed { addr: page_addr });
    }
    Ok(())
}

/// Erase the block containing `row` and check the erase-fail bit
pub fn block_erase<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    row: u32,
    block_addr: u32,
) -> Result<()> {
    write_enable(master, cs)?;
    let mut cmd = SpiCommand::addr_3b(opcodes::NAND_BLOCK_ERASE, row);
    master.execute(cs, &mut cmd)?;
    let status = wait_ready(master, cs, ERASE_TIMEOUT_US)?;
    if status.contains(NandStatus::E_FAIL) {
        return Err(Error::EraseFailed { addr: block_addr });
    }
    Ok(())
}

/// Clear all block protection bits
pub fn unprotect_all<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<()> {
    set_feature(master, cs, opcodes::NAND_FEAT_PROTECTION, 0x00)
}
