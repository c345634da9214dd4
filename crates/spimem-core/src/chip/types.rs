//! Device type definitions

use core::fmt;

use crate::bus::ChipSelect;

/// Memory family of a detected device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceFamily {
    /// Family could not be determined
    #[default]
    Unknown,
    /// Serial NOR flash
    Nor,
    /// SPI-NAND flash
    SpiNand,
    /// Serial PSRAM
    Psram,
}

impl DeviceFamily {
    /// Short human readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Nor => "NOR",
            Self::SpiNand => "SPI-NAND",
            Self::Psram => "PSRAM",
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SPI-NAND array geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandGeometry {
    /// Main area bytes per page
    pub page_size: u32,
    /// Spare (OOB) bytes per page
    pub spare_size: u32,
    /// Pages per erase block
    pub pages_per_block: u32,
}

impl NandGeometry {
    /// Default geometry for 1-2 Gbit parts
    pub const SMALL_PAGE: Self = Self {
        page_size: 2048,
        spare_size: 64,
        pages_per_block: 64,
    };

    /// Geometry for 4 Gbit parts with 4 KiB pages
    pub const LARGE_PAGE: Self = Self {
        page_size: 4096,
        spare_size: 128,
        pages_per_block: 64,
    };

    /// Size of one erase block in bytes
    pub const fn block_size(&self) -> u32 {
        self.page_size * self.pages_per_block
    }

    /// Pick a geometry from the total capacity when no table entry is known
    pub const fn for_capacity(capacity: u64) -> Self {
        if capacity >= 512 * 1024 * 1024 {
            Self::LARGE_PAGE
        } else {
            Self::SMALL_PAGE
        }
    }
}

/// Maximum number of raw identification bytes kept per device
pub const MAX_ID_LEN: usize = 8;

/// Normalized result of a successful probe
///
/// Immutable once produced; a rescan replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Detected family
    pub family: DeviceFamily,
    /// Chip-select line the device answers on
    pub chip_select: ChipSelect,
    /// Raw identification bytes (normalized for PSRAM)
    pub id: heapless::Vec<u8, MAX_ID_LEN>,
    /// Manufacturer / vendor byte
    pub vendor_id: u8,
    /// Decoded capacity (0 when the density code is unknown)
    pub capacity_bytes: u64,
    /// First family-specific density byte
    ///
    /// NAND: device ID 1, NOR: memory type, PSRAM: KGD byte.
    pub did1: u8,
    /// Second family-specific density byte
    ///
    /// NAND: device ID 2, NOR: capacity code, PSRAM: first EID byte.
    pub did2: u8,
    /// Vendor name ("Unknown" when not in the tables)
    pub vendor_name: &'static str,
    /// Part hint, if the ID decodes to a known part
    pub part_hint: Option<&'static str>,
}

impl DeviceInfo {
    /// Create an info record with the raw ID bytes copied in
    pub fn new(family: DeviceFamily, chip_select: ChipSelect, id: &[u8]) -> Self {
        let len = id.len().min(MAX_ID_LEN);
        let mut raw = heapless::Vec::new();
        // Cannot fail, the slice is clamped to the capacity
        let _ = raw.extend_from_slice(&id[..len]);
        Self {
            family,
            chip_select,
            id: raw,
            vendor_id: 0,
            capacity_bytes: 0,
            did1: 0,
            did2: 0,
            vendor_name: "Unknown",
            part_hint: None,
        }
    }

    /// NAND geometry implied by the detected density
    ///
    /// Only meaningful for [`DeviceFamily::SpiNand`].
    pub fn nand_geometry(&self) -> NandGeometry {
        crate::chip::vendors::nand_density(self.did1)
            .map(|d| d.geometry())
            .unwrap_or_else(|| NandGeometry::for_capacity(self.capacity_bytes))
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CS {}: {} {} (0x{:02X}), {} bytes",
            self.chip_select, self.vendor_name, self.family, self.vendor_id, self.capacity_bytes
        )?;
        if let Some(hint) = self.part_hint {
            write!(f, " [{}]", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_for_capacity() {
        assert_eq!(
            NandGeometry::for_capacity(128 * 1024 * 1024),
            NandGeometry::SMALL_PAGE
        );
        assert_eq!(
            NandGeometry::for_capacity(512 * 1024 * 1024),
            NandGeometry::LARGE_PAGE
        );
        assert_eq!(NandGeometry::SMALL_PAGE.block_size(), 128 * 1024);
    }

    #[test]
    fn test_info_clamps_id() {
        let info = DeviceInfo::new(DeviceFamily::Psram, 3, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(info.id.len(), MAX_ID_LEN);
        assert_eq!(info.vendor_name, "Unknown");
    }

    #[test]
    fn test_nand_geometry_from_device_code() {
        let mut info = DeviceInfo::new(DeviceFamily::SpiNand, 1, &[]);
        info.did1 = 0x2C;
        assert_eq!(info.nand_geometry(), NandGeometry::LARGE_PAGE);
        info.did1 = 0x12;
        assert_eq!(info.nand_geometry(), NandGeometry::SMALL_PAGE);
    }
}
