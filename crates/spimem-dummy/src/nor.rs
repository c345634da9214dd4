//! Emulated serial NOR flash

use spimem_core::spi::{opcodes, SpiCommand};

use crate::memory::SparseMemory;
use crate::Faults;

/// Configuration for the dummy NOR flash
#[derive(Debug, Clone)]
pub struct DummyNorConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC memory type
    pub memory_type: u8,
    /// JEDEC capacity code (size is `1 << code`)
    pub capacity_code: u8,
}

impl DummyNorConfig {
    /// Winbond W25Q128 (16 MiB)
    pub fn w25q128() -> Self {
        Self {
            manufacturer_id: 0xEF,
            memory_type: 0x40,
            capacity_code: 0x18,
        }
    }

    /// Macronix MX25L6433F (8 MiB)
    pub fn mx25l6433f() -> Self {
        Self {
            manufacturer_id: 0xC2,
            memory_type: 0x20,
            capacity_code: 0x17,
        }
    }

    /// Array size in bytes
    pub fn size(&self) -> usize {
        1usize << self.capacity_code
    }
}

impl Default for DummyNorConfig {
    fn default() -> Self {
        Self::w25q128()
    }
}

const PAGE: usize = 256;

/// Emulated NOR flash
#[derive(Debug, Clone)]
pub struct DummyNor {
    config: DummyNorConfig,
    data: SparseMemory,
    write_enabled: bool,
    /// Injected faults
    pub faults: Faults,
}

impl DummyNor {
    /// Create an erased flash with the given configuration
    pub fn new(config: DummyNorConfig) -> Self {
        let data = SparseMemory::new(config.size(), 0xFF);
        Self {
            config,
            data,
            write_enabled: false,
            faults: Faults::default(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyNorConfig {
        &self.config
    }

    /// Backing array
    pub fn memory(&self) -> &SparseMemory {
        &self.data
    }

    /// Mutable backing array
    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.data
    }

    fn status(&self) -> u8 {
        let mut sr = 0;
        if self.write_enabled {
            sr |= opcodes::SR1_WEL;
        }
        if self.faults.stuck_busy {
            sr |= opcodes::SR1_WIP;
        }
        sr
    }

    fn page_program(&mut self, addr: usize, data: &[u8]) {
        if !self.write_enabled || self.faults.program_fail {
            self.write_enabled = false;
            return;
        }
        // Programming wraps within the 256-byte page
        let base = addr & !(PAGE - 1);
        for (i, &b) in data.iter().enumerate() {
            let at = base + ((addr + i) % PAGE);
            self.data.program(at, &[b]);
        }
        self.write_enabled = false;
    }

    fn erase(&mut self, addr: usize, size: usize) {
        if !self.write_enabled || self.faults.erase_fail {
            self.write_enabled = false;
            return;
        }
        self.data.fill(addr & !(size - 1), size, 0xFF);
        self.write_enabled = false;
    }

    pub(crate) fn execute(&mut self, cmd: &mut SpiCommand<'_>) {
        let addr = cmd.address.unwrap_or(0) as usize;
        match cmd.opcode {
            opcodes::RDID => {
                let id = [
                    self.config.manufacturer_id,
                    self.config.memory_type,
                    self.config.capacity_code,
                ];
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = id.get(i).copied().unwrap_or(0);
                }
            }
            opcodes::RDSR => {
                let sr = self.status();
                cmd.read_buf.fill(sr);
            }
            opcodes::WREN => self.write_enabled = true,
            0x04 => self.write_enabled = false,
            opcodes::READ => self.data.read(addr, cmd.read_buf),
            opcodes::PP => self.page_program(addr, cmd.write_data),
            opcodes::SE_20 => self.erase(addr, 4 * 1024),
            0x52 => self.erase(addr, 32 * 1024),
            0xD8 => self.erase(addr, 64 * 1024),
            0x60 | 0xC7 => {
                let size = self.data.size();
                self.erase(0, size);
            }
            0x66 | 0x99 => {}
            other => {
                log::trace!("dummy NOR: ignoring opcode 0x{:02X}", other);
                cmd.read_buf.fill(0xFF);
            }
        }
    }
}
