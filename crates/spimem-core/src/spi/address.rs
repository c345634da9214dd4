//! Address width types

/// Address width for SPI commands
///
/// Besides the usual 3- and 4-byte memory addresses, SPI-NAND uses a
/// 1-byte feature register address and a 2-byte cache column address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 1-byte address (SPI-NAND feature register)
    OneByte,
    /// 2-byte address (SPI-NAND cache column)
    TwoByte,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
    /// 4-byte (32-bit) address - supports up to 4 GiB
    FourByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::OneByte => 1,
            Self::TwoByte => 2,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::OneByte => 0x100,
            Self::TwoByte => 0x1_0000,
            Self::ThreeByte => 16 * 1024 * 1024, // 16 MiB
            Self::FourByte => u32::MAX,          // ~4 GiB
        }
    }

    /// Encode an address into bytes, most significant byte first
    ///
    /// `buf` must hold at least [`bytes()`](Self::bytes) bytes.
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        let n = self.bytes() as usize;
        for (i, b) in buf[..n].iter_mut().enumerate() {
            *b = (address >> (8 * (n - 1 - i))) as u8;
        }
    }

    /// Decode big-endian address bytes back into a value
    pub fn decode(&self, buf: &[u8]) -> u32 {
        buf[..self.bytes() as usize]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_widths() {
        let mut buf = [0u8; 4];
        AddressWidth::ThreeByte.encode(0x12_3456, &mut buf);
        assert_eq!(&buf[..3], &[0x12, 0x34, 0x56]);

        AddressWidth::TwoByte.encode(0x0800, &mut buf);
        assert_eq!(&buf[..2], &[0x08, 0x00]);

        AddressWidth::OneByte.encode(0xC0, &mut buf);
        assert_eq!(buf[0], 0xC0);
    }

    #[test]
    fn test_decode_matches_encode() {
        let mut buf = [0u8; 4];
        AddressWidth::FourByte.encode(0xDEAD_BEEF, &mut buf);
        assert_eq!(AddressWidth::FourByte.decode(&buf), 0xDEAD_BEEF);
        assert_eq!(AddressWidth::None.decode(&buf), 0);
    }
}
