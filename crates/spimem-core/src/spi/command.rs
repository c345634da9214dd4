//! SPI command structure

use super::AddressWidth;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
///
/// On the wire a transaction is: opcode, address bytes (if any), dummy
/// bytes, `write_data`, then `read_buf.len()` bytes clocked in.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Number of dummy cycles after address
    pub dummy_cycles: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    fn with_address(opcode: u8, width: AddressWidth, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a simple command with no address or data (e.g., WREN, reset)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create a SPI-NAND get-feature command (1-byte register address)
    pub fn get_feature(opcode: u8, reg: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::with_address(opcode, AddressWidth::OneByte, reg as u32)
        }
    }

    /// Create a SPI-NAND set-feature command (1-byte register address)
    pub fn set_feature(opcode: u8, reg: u8, value: &'a [u8]) -> Self {
        Self {
            write_data: value,
            ..Self::with_address(opcode, AddressWidth::OneByte, reg as u32)
        }
    }

    /// Create a cache read command with a 2-byte column address
    pub fn read_2b(opcode: u8, column: u32, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::with_address(opcode, AddressWidth::TwoByte, column)
        }
    }

    /// Create a cache load command with a 2-byte column address
    pub fn write_2b(opcode: u8, column: u32, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::with_address(opcode, AddressWidth::TwoByte, column)
        }
    }

    /// Create a read command with 3-byte address (e.g., READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::with_address(opcode, AddressWidth::ThreeByte, addr)
        }
    }

    /// Create a write command with 3-byte address (e.g., PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::with_address(opcode, AddressWidth::ThreeByte, addr)
        }
    }

    /// Create a command carrying only a 3-byte address
    ///
    /// Used for sector erase on NOR and for row-addressed SPI-NAND
    /// commands (page read, program execute, block erase).
    pub fn addr_3b(opcode: u8, addr: u32) -> Self {
        Self::with_address(opcode, AddressWidth::ThreeByte, addr)
    }

    /// Set the number of dummy cycles
    pub fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Number of dummy bytes clocked after the address (single I/O)
    pub fn dummy_bytes(&self) -> usize {
        (self.dummy_cycles as usize) / 8
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Encode opcode, address and dummy bytes into `buf`
    ///
    /// Returns the number of header bytes written. `buf` must hold at
    /// least [`header_len()`](Self::header_len) bytes.
    pub fn encode_header(&self, buf: &mut [u8]) -> usize {
        buf[0] = self.opcode;
        let mut len = 1;
        if let Some(addr) = self.address {
            let n = self.address_width.bytes() as usize;
            self.address_width.encode(addr, &mut buf[len..len + n]);
            len += n;
        }
        for b in &mut buf[len..len + self.dummy_bytes()] {
            *b = 0;
        }
        len + self.dummy_bytes()
    }

    /// Length of the opcode/address/dummy header
    pub fn header_len(&self) -> usize {
        let addr = if self.address.is_some() {
            self.address_width.bytes() as usize
        } else {
            0
        };
        1 + addr + self.dummy_bytes()
    }

    /// Calculate the total number of bytes to transfer
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_read_header() {
        let mut data = [0u8; 16];
        let cmd = SpiCommand::read_2b(0x03, 0x0123, &mut data).with_dummy_cycles(8);
        let mut hdr = [0xAAu8; 8];
        let n = cmd.encode_header(&mut hdr);
        assert_eq!(n, 4);
        assert_eq!(&hdr[..4], &[0x03, 0x01, 0x23, 0x00]);
        assert_eq!(cmd.total_bytes(), 20);
    }

    #[test]
    fn test_feature_header() {
        let mut status = [0u8; 1];
        let cmd = SpiCommand::get_feature(0x0F, 0xC0, &mut status);
        let mut hdr = [0u8; 4];
        assert_eq!(cmd.encode_header(&mut hdr), 2);
        assert_eq!(&hdr[..2], &[0x0F, 0xC0]);
        assert!(cmd.has_read());
        assert!(!cmd.has_write());
    }

    #[test]
    fn test_simple_has_no_phases() {
        let cmd = SpiCommand::simple(0x06);
        assert!(!cmd.has_address());
        assert_eq!(cmd.total_bytes(), 1);
    }
}
