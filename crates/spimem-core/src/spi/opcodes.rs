//! Opcodes of the supported memory families
//!
//! NOR and PSRAM share the classic single-I/O read/write opcodes; SPI-NAND
//! reuses some of the same values with different framing.

// ============================================================================
// Shared
// ============================================================================

/// Read identification
pub const RDID: u8 = 0x9F;
/// Write enable
pub const WREN: u8 = 0x06;
/// Read data
pub const READ: u8 = 0x03;
/// Page program / write
pub const PP: u8 = 0x02;

// ============================================================================
// NOR flash
// ============================================================================

/// Read status register 1
pub const RDSR: u8 = 0x05;
/// Sector erase (4 KiB)
pub const SE_20: u8 = 0x20;

/// Write In Progress bit
pub const SR1_WIP: u8 = 1 << 0;
/// Write Enable Latch bit
pub const SR1_WEL: u8 = 1 << 1;

// ============================================================================
// SPI-NAND
// ============================================================================

/// Device reset
pub const NAND_RESET: u8 = 0xFF;
/// Legacy read identification
pub const NAND_RDID_LEGACY: u8 = 0x90;
/// Get feature register
pub const NAND_GET_FEATURE: u8 = 0x0F;
/// Set feature register
pub const NAND_SET_FEATURE: u8 = 0x1F;
/// Page read to cache
pub const NAND_PAGE_READ: u8 = 0x13;
/// Read from cache
pub const NAND_READ_CACHE: u8 = 0x03;
/// Program load (into cache)
pub const NAND_PROGRAM_LOAD: u8 = 0x02;
/// Program execute (cache to array)
pub const NAND_PROGRAM_EXEC: u8 = 0x10;
/// Block erase
pub const NAND_BLOCK_ERASE: u8 = 0xD8;

/// Block protection feature register
pub const NAND_FEAT_PROTECTION: u8 = 0xA0;
/// Configuration feature register
pub const NAND_FEAT_CONFIG: u8 = 0xB0;
/// Status feature register
pub const NAND_FEAT_STATUS: u8 = 0xC0;

// ============================================================================
// PSRAM
// ============================================================================

/// Exit quad mode
pub const PSRAM_EXIT_QUAD: u8 = 0xF5;
/// Reset enable
pub const PSRAM_RSTEN: u8 = 0x66;
/// Reset
pub const PSRAM_RST: u8 = 0x99;
