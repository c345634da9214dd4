//! Emulated serial PSRAM

use spimem_core::spi::{opcodes, SpiCommand};

use crate::memory::SparseMemory;

/// Configuration for the dummy PSRAM
#[derive(Debug, Clone)]
pub struct DummyPsramConfig {
    /// Manufacturer ID
    pub manufacturer_id: u8,
    /// Known-good-die / density byte
    pub kgd: u8,
    /// Extended ID bytes following the KGD byte
    pub eid: [u8; 6],
    /// Zero bytes clocked out before the manufacturer ID
    pub id_padding: usize,
    /// Array size in bytes
    pub size: usize,
    /// ID reads return garbage until a reset has been seen
    pub needs_reset: bool,
}

impl DummyPsramConfig {
    /// AP Memory APS6404 (8 MiB), ID behind a 3-byte address phase
    pub fn aps6404() -> Self {
        Self {
            manufacturer_id: 0x0D,
            kgd: 0x5D,
            eid: [0x52, 0x26, 0x10, 0x4A, 0x99, 0x37],
            id_padding: 3,
            size: 8 * 1024 * 1024,
            needs_reset: false,
        }
    }

    /// AP Memory APS1604 (4 MiB)
    pub fn aps1604() -> Self {
        Self {
            kgd: 0x5C,
            size: 4 * 1024 * 1024,
            ..Self::aps6404()
        }
    }

    /// Override the number of leading zero bytes in the ID
    pub fn with_id_padding(mut self, padding: usize) -> Self {
        self.id_padding = padding;
        self
    }
}

impl Default for DummyPsramConfig {
    fn default() -> Self {
        Self::aps6404()
    }
}

/// Emulated PSRAM
#[derive(Debug, Clone)]
pub struct DummyPsram {
    config: DummyPsramConfig,
    data: SparseMemory,
    reset_enabled: bool,
    needs_reset: bool,
    resets: u32,
}

impl DummyPsram {
    /// Create a PSRAM with the given configuration
    ///
    /// Contents start out as 0xFF so erased-value checks behave like flash.
    pub fn new(config: DummyPsramConfig) -> Self {
        let data = SparseMemory::new(config.size, 0xFF);
        let needs_reset = config.needs_reset;
        Self {
            config,
            data,
            reset_enabled: false,
            needs_reset,
            resets: 0,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyPsramConfig {
        &self.config
    }

    /// Number of completed reset sequences
    pub fn reset_count(&self) -> u32 {
        self.resets
    }

    /// Backing array
    pub fn memory(&self) -> &SparseMemory {
        &self.data
    }

    /// Mutable backing array
    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.data
    }

    fn id_stream(&self) -> [u8; 16] {
        let mut stream = [0u8; 16];
        let pad = self.config.id_padding.min(8);
        stream[pad] = self.config.manufacturer_id;
        stream[pad + 1] = self.config.kgd;
        stream[pad + 2..pad + 8].copy_from_slice(&self.config.eid);
        stream
    }

    pub(crate) fn execute(&mut self, cmd: &mut SpiCommand<'_>) {
        let addr = cmd.address.unwrap_or(0) as usize;
        let arm_reset = cmd.opcode == opcodes::PSRAM_RSTEN;

        match cmd.opcode {
            opcodes::RDID => {
                if self.needs_reset {
                    cmd.read_buf.fill(0xFF);
                } else {
                    let stream = self.id_stream();
                    for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                        *b = stream.get(i).copied().unwrap_or(0);
                    }
                }
            }
            opcodes::READ | 0x0B => self.data.read(addr, cmd.read_buf),
            opcodes::PP => self.data.write(addr, cmd.write_data),
            opcodes::PSRAM_RSTEN | opcodes::PSRAM_EXIT_QUAD => {}
            opcodes::PSRAM_RST => {
                if self.reset_enabled {
                    self.resets += 1;
                    self.needs_reset = false;
                }
            }
            other => {
                log::trace!("dummy PSRAM: ignoring opcode 0x{:02X}", other);
                cmd.read_buf.fill(0xFF);
            }
        }

        self.reset_enabled = arm_reset;
    }
}
