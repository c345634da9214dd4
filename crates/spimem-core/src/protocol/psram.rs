//! Serial PSRAM protocol
//!
//! PSRAM has no erase and no busy state; writes overwrite in place.

use crate::bus::{ChipSelect, SpiMaster};
use crate::error::Result;
use crate::spi::{opcodes, SpiCommand};

/// Linear burst page size
pub const PAGE_SIZE: u32 = 1024;

/// Number of identification bytes read during probing
pub const ID_LEN: usize = 8;

/// Bring the device to a known state before reading its ID
///
/// Exit quad mode, reset enable, reset. The caller picks the clock; the
/// reset sequence is only reliable at low speed.
pub fn reset_sequence<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::PSRAM_EXIT_QUAD);
    master.execute(cs, &mut cmd)?;
    master.delay_us(5);

    let mut cmd = SpiCommand::simple(opcodes::PSRAM_RSTEN);
    master.execute(cs, &mut cmd)?;
    master.delay_us(5);

    let mut cmd = SpiCommand::simple(opcodes::PSRAM_RST);
    master.execute(cs, &mut cmd)?;
    master.delay_us(1_000);
    Ok(())
}

/// Read the raw identification bytes
pub fn read_id<M: SpiMaster + ?Sized>(master: &mut M, cs: ChipSelect) -> Result<[u8; ID_LEN]> {
    let mut buf = [0u8; ID_LEN];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(cs, &mut cmd)?;
    Ok(buf)
}

/// Read data, split by the master's read limit
pub fn read<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    let chunk = master.max_read_len().max(1);
    let mut offset = 0u32;
    for piece in buf.chunks_mut(chunk) {
        let len = piece.len() as u32;
        let mut cmd = SpiCommand::read_3b(opcodes::READ, addr + offset, piece);
        master.execute(cs, &mut cmd)?;
        offset += len;
    }
    Ok(())
}

/// Write data, split at page boundaries and by the master's write limit
pub fn write<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    let limit = master.max_write_len().max(1) as u32;
    let mut offset = 0usize;
    while offset < data.len() {
        let at = addr + offset as u32;
        let page_left = PAGE_SIZE - (at % PAGE_SIZE);
        let n = page_left.min(limit).min((data.len() - offset) as u32) as usize;
        let mut cmd = SpiCommand::write_3b(opcodes::PP, at, &data[offset..offset + n]);
        master.execute(cs, &mut cmd)?;
        offset += n;
    }
    Ok(())
}
