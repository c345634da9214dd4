//! Manufacturer allow-lists and density tables

use super::NandGeometry;

/// Known NOR manufacturers (JEDEC bank 1)
pub const NOR_VENDORS: &[(u8, &str)] = &[
    (0xEF, "Winbond"),
    (0xC2, "Macronix"),
    (0xC8, "GigaDevice"),
    (0x20, "Micron/Numonyx"),
    (0x1F, "Adesto/Atmel"),
    (0x9D, "ISSI"),
    (0x85, "Puya"),
    (0x68, "BOYA"),
];

/// Known PSRAM manufacturers
pub const PSRAM_VENDORS: &[(u8, &str)] = &[
    (0x0D, "AP Memory"),
    (0x5D, "Zentel"),
    (0x5E, "Zbit/Zentel"),
];

/// Macronix, the only SPI-NAND manufacturer with a density table
pub const NAND_MFR_MACRONIX: u8 = 0xC2;

/// AP Memory manufacturer byte
pub const PSRAM_MFR_APMEMORY: u8 = 0x0D;

/// One row of the SPI-NAND density table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandDensity {
    /// Device code (first device ID byte)
    pub device_id: u8,
    /// Total main-area capacity in bytes
    pub total_bytes: u64,
    /// Main bytes per page
    pub page_size: u32,
    /// Spare bytes per page
    pub spare_size: u32,
    /// Part family hint
    pub part: &'static str,
}

impl NandDensity {
    /// Geometry implied by this density entry
    pub const fn geometry(&self) -> NandGeometry {
        NandGeometry {
            page_size: self.page_size,
            spare_size: self.spare_size,
            pages_per_block: 64,
        }
    }
}

const MIB: u64 = 1024 * 1024;

/// Macronix MX35LF density table
pub const NAND_DENSITIES: &[NandDensity] = &[
    NandDensity {
        device_id: 0x12,
        total_bytes: 128 * MIB,
        page_size: 2048,
        spare_size: 64,
        part: "MX35LF1GE4AB (1 Gbit)",
    },
    NandDensity {
        device_id: 0x22,
        total_bytes: 256 * MIB,
        page_size: 2048,
        spare_size: 64,
        part: "MX35LF2GE4AD (2 Gbit)",
    },
    NandDensity {
        device_id: 0x26,
        total_bytes: 256 * MIB,
        page_size: 2048,
        spare_size: 64,
        part: "MX35LF2G24AD (2 Gbit)",
    },
    NandDensity {
        device_id: 0x2C,
        total_bytes: 512 * MIB,
        page_size: 4096,
        spare_size: 128,
        part: "MX35LF4GE4AD (4 Gbit)",
    },
    NandDensity {
        device_id: 0x37,
        total_bytes: 512 * MIB,
        page_size: 4096,
        spare_size: 128,
        part: "MX35LF4G24AD (4 Gbit)",
    },
];

/// AP Memory density by KGD byte: (code, bytes, hint)
const APM_DENSITIES: &[(u8, u64, &str)] = &[
    (0x5C, 4 * MIB, "APM 32 Mbit (4 MiB)"),
    (0x5D, 8 * MIB, "APM 64 Mbit (8 MiB)"),
    (0x5E, 16 * MIB, "APM 128 Mbit (16 MiB)"),
];

/// Hint used for AP Memory parts with an unknown KGD byte
pub const APM_UNKNOWN_HINT: &str = "APM (unknown density)";

fn lookup(table: &[(u8, &'static str)], id: u8) -> Option<&'static str> {
    table.iter().find(|(v, _)| *v == id).map(|(_, name)| *name)
}

/// Name of a NOR manufacturer, if it is on the allow-list
pub fn nor_vendor_name(id: u8) -> Option<&'static str> {
    lookup(NOR_VENDORS, id)
}

/// Name of a PSRAM manufacturer, if it is on the allow-list
pub fn psram_vendor_name(id: u8) -> Option<&'static str> {
    lookup(PSRAM_VENDORS, id)
}

/// Returns true if `id` is a known PSRAM manufacturer byte
pub fn is_psram_vendor(id: u8) -> bool {
    psram_vendor_name(id).is_some()
}

/// Best-effort vendor name across all families
pub fn vendor_name(id: u8) -> &'static str {
    match id {
        NAND_MFR_MACRONIX => "Macronix",
        _ => nor_vendor_name(id)
            .or_else(|| psram_vendor_name(id))
            .unwrap_or("Unknown"),
    }
}

/// Look up a SPI-NAND density by device code
pub fn nand_density(device_id: u8) -> Option<&'static NandDensity> {
    NAND_DENSITIES.iter().find(|d| d.device_id == device_id)
}

/// Decode a NOR JEDEC capacity code (`1 << code` bytes)
pub fn nor_capacity(code: u8) -> Option<u64> {
    if code < 32 {
        Some(1u64 << code)
    } else {
        None
    }
}

/// Decode PSRAM density for a vendor/KGD pair
///
/// Returns `(bytes, part hint)`. Only AP Memory publishes a table; other
/// vendors decode to 0 bytes.
pub fn psram_density(vendor: u8, kgd: u8) -> (u64, Option<&'static str>) {
    if vendor != PSRAM_MFR_APMEMORY {
        return (0, None);
    }
    APM_DENSITIES
        .iter()
        .find(|(code, _, _)| *code == kgd)
        .map(|&(_, bytes, hint)| (bytes, Some(hint)))
        .unwrap_or((0, Some(APM_UNKNOWN_HINT)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nor_allow_list() {
        assert_eq!(nor_vendor_name(0xEF), Some("Winbond"));
        assert_eq!(nor_vendor_name(0x68), Some("BOYA"));
        assert_eq!(nor_vendor_name(0x0D), None);
    }

    #[test]
    fn test_nor_capacity_code() {
        assert_eq!(nor_capacity(0x18), Some(16 * MIB));
        assert_eq!(nor_capacity(31), Some(1 << 31));
        assert_eq!(nor_capacity(32), None);
    }

    #[test]
    fn test_nand_density_table() {
        let d = nand_density(0x26).unwrap();
        assert_eq!(d.total_bytes, 256 * MIB);
        assert_eq!(d.geometry().block_size(), 128 * 1024);

        let d = nand_density(0x37).unwrap();
        assert_eq!(d.page_size, 4096);
        assert_eq!(d.spare_size, 128);
        assert!(nand_density(0x99).is_none());
    }

    #[test]
    fn test_psram_density() {
        assert_eq!(
            psram_density(0x0D, 0x5D),
            (8 * MIB, Some("APM 64 Mbit (8 MiB)"))
        );
        assert_eq!(psram_density(0x0D, 0x42), (0, Some(APM_UNKNOWN_HINT)));
        assert_eq!(psram_density(0x5E, 0x5D), (0, None));
    }

    #[test]
    fn test_vendor_name_fallback() {
        assert_eq!(vendor_name(0xC2), "Macronix");
        assert_eq!(vendor_name(0x0D), "AP Memory");
        assert_eq!(vendor_name(0x42), "Unknown");
    }
}
