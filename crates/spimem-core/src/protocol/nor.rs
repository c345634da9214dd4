//! Serial NOR flash protocol
//!
//! Single I/O, 3-byte addressing only.
//!
//! Timeouts:
//! * Write enable latch: 50 ms
//! * Page program: 10 ms
//! * 4 KiB sector erase: 4 s

use super::max_polls;
use crate::bus::{ChipSelect, SpiMaster};
use crate::error::{Error, Result};
use crate::spi::{opcodes, SpiCommand};

/// Page program granularity
pub const PAGE_SIZE: u32 = 256;
/// Sector erase granularity
pub const SECTOR_SIZE: u32 = 4096;

/// Timeout for the write enable latch to set
pub const WEL_TIMEOUT_US: u32 = 50_000;
/// Timeout for a page program
pub const PROGRAM_TIMEOUT_US: u32 = 10_000;
/// Timeout for a 4 KiB sector erase
pub const ERASE_TIMEOUT_US: u32 = 4_000_000;

/// Read the JEDEC ID (manufacturer, memory type, capacity code)
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<[u8; 3]> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(cs, &mut cmd)?;
    Ok(buf)
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(cs, &mut cmd)?;
    Ok(buf[0])
}

/// Send WREN and wait for the write enable latch to set
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(cs, &mut cmd)?;

    for _ in 0..max_polls(100, WEL_TIMEOUT_US) {
        if read_status1(master, cs)? & opcodes::SR1_WEL != 0 {
            return Ok(());
        }
        master.delay_us(100);
    }
    Err(Error::WriteEnableFailed)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// # Arguments
/// * `poll_delay_us` - Delay in microseconds between status register polls
/// * `timeout_us` - Maximum time to wait before returning Error::Timeout
pub fn wait_ready<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    for _ in 0..max_polls(poll_delay_us, timeout_us) {
        let status = read_status1(master, cs)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        if poll_delay_us > 0 {
            master.delay_us(poll_delay_us);
        }
    }

    Err(Error::Timeout)
}

/// Read data using the READ (0x03) command
///
/// Splits the transfer according to the master's read limit.
pub fn read<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    let chunk = master.max_read_len().max(1);
    let mut offset = 0usize;
    for piece in buf.chunks_mut(chunk) {
        let len = piece.len();
        let mut cmd = SpiCommand::read_3b(opcodes::READ, addr + offset as u32, piece);
        master.execute(cs, &mut cmd)?;
        offset += len;
    }
    Ok(())
}

/// Program up to one page (must not cross a page boundary)
pub fn program_page<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    write_enable(master, cs)?;
    let mut cmd = SpiCommand::write_3b(opcodes::PP, addr, data);
    master.execute(cs, &mut cmd)?;
    // Page programs take ~1 ms, poll every 100 us
    wait_ready(master, cs, 100, PROGRAM_TIMEOUT_US)
}

/// Erase the 4 KiB sector containing `addr`
pub fn sector_erase<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    addr: u32,
) -> Result<()> {
    write_enable(master, cs)?;
    let mut cmd = SpiCommand::addr_3b(opcodes::SE_20, addr);
    master.execute(cs, &mut cmd)?;
    // Sector erases take tens of ms, poll every 1 ms
    wait_ready(master, cs, 1_000, ERASE_TIMEOUT_US)
}
