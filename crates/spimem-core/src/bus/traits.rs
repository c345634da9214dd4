//! Bus master trait definitions

use crate::error::Result;
use crate::spi::SpiCommand;

/// Identifier of a chip-select line (usually the GPIO number)
pub type ChipSelect = u8;

/// SPI bus master shared by several chip-select lines
///
/// The transport is not reentrant: a transaction runs to completion
/// before the next one starts. Only single I/O is used.
pub trait SpiMaster {
    /// Get the maximum number of bytes that can be read in a single transaction
    fn max_read_len(&self) -> usize;

    /// Get the maximum number of bytes that can be written in a single transaction
    fn max_write_len(&self) -> usize;

    /// Execute a single SPI command on the given chip-select line
    ///
    /// The line is asserted for the whole transaction and released
    /// afterwards:
    /// - `opcode`: The SPI command opcode
    /// - `address`: Optional address (with width)
    /// - `dummy_cycles`: Number of dummy clock cycles after address
    /// - `write_data`: Data to write after the header
    /// - `read_buf`: Buffer to read data into
    fn execute(&mut self, cs: ChipSelect, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Drive a chip-select line high (inactive)
    fn deselect(&mut self, cs: ChipSelect);

    /// Set the clock used for subsequent transactions
    fn set_clock_hz(&mut self, hz: u32);

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<M: SpiMaster + ?Sized> SpiMaster for &mut M {
    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn execute(&mut self, cs: ChipSelect, cmd: &mut SpiCommand<'_>) -> Result<()> {
        (**self).execute(cs, cmd)
    }

    fn deselect(&mut self, cs: ChipSelect) {
        (**self).deselect(cs)
    }

    fn set_clock_hz(&mut self, hz: u32) {
        (**self).set_clock_hz(hz)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
