//! Emulated SPI-NAND flash (Macronix MX35LF style)

use spimem_core::chip::vendors;
use spimem_core::chip::NandGeometry;
use spimem_core::protocol::nand::NandStatus;
use spimem_core::spi::{opcodes, SpiCommand};

use crate::memory::SparseMemory;
use crate::Faults;

/// Block protection bits set at power-up
const POWER_UP_PROTECTION: u8 = 0x38;

/// Configuration for the dummy SPI-NAND
#[derive(Debug, Clone)]
pub struct DummyNandConfig {
    /// First device ID byte (density code)
    pub device_id: u8,
    /// Second device ID byte
    pub device_id2: u8,
    /// Only answer the legacy (0x90) ID command
    pub legacy_id_only: bool,
}

impl DummyNandConfig {
    /// Macronix MX35LF1GE4AB (128 MiB, 2 KiB pages)
    pub fn mx35lf1ge4ab() -> Self {
        Self {
            device_id: 0x12,
            device_id2: 0x07,
            legacy_id_only: false,
        }
    }

    /// Macronix MX35LF2GE4AD (256 MiB, 2 KiB pages)
    pub fn mx35lf2ge4ad() -> Self {
        Self {
            device_id: 0x26,
            device_id2: 0x03,
            legacy_id_only: false,
        }
    }

    /// Macronix MX35LF4GE4AD (512 MiB, 4 KiB pages)
    pub fn mx35lf4ge4ad() -> Self {
        Self {
            device_id: 0x37,
            device_id2: 0x03,
            legacy_id_only: false,
        }
    }

    fn geometry_and_size(&self) -> (NandGeometry, usize) {
        match vendors::nand_density(self.device_id) {
            Some(d) => (d.geometry(), d.total_bytes as usize),
            None => (NandGeometry::SMALL_PAGE, 128 * 1024 * 1024),
        }
    }
}

impl Default for DummyNandConfig {
    fn default() -> Self {
        Self::mx35lf1ge4ab()
    }
}

/// Emulated SPI-NAND
#[derive(Debug, Clone)]
pub struct DummyNand {
    config: DummyNandConfig,
    geometry: NandGeometry,
    data: SparseMemory,
    cache: Vec<u8>,
    status: NandStatus,
    protection: u8,
    feature_config: u8,
    /// Injected faults
    pub faults: Faults,
}

impl DummyNand {
    /// Create an erased device with the given configuration
    pub fn new(config: DummyNandConfig) -> Self {
        let (geometry, size) = config.geometry_and_size();
        let cache_len = (geometry.page_size + geometry.spare_size) as usize;
        Self {
            config,
            geometry,
            data: SparseMemory::new(size, 0xFF),
            cache: vec![0xFF; cache_len],
            status: NandStatus::empty(),
            protection: POWER_UP_PROTECTION,
            feature_config: 0,
            faults: Faults::default(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyNandConfig {
        &self.config
    }

    /// Array geometry
    pub fn geometry(&self) -> NandGeometry {
        self.geometry
    }

    /// Current block protection register
    pub fn protection(&self) -> u8 {
        self.protection
    }

    /// Backing array (main area only)
    pub fn memory(&self) -> &SparseMemory {
        &self.data
    }

    /// Mutable backing array
    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.data
    }

    fn page_offset(&self, row: u32) -> usize {
        row as usize * self.geometry.page_size as usize
    }

    fn get_feature(&self, reg: u8) -> u8 {
        match reg {
            opcodes::NAND_FEAT_STATUS => {
                let mut status = self.status;
                if self.faults.stuck_busy {
                    status |= NandStatus::OIP;
                }
                status.bits()
            }
            opcodes::NAND_FEAT_PROTECTION => self.protection,
            opcodes::NAND_FEAT_CONFIG => self.feature_config,
            _ => 0x00,
        }
    }

    fn set_feature(&mut self, reg: u8, value: u8) {
        match reg {
            opcodes::NAND_FEAT_PROTECTION => self.protection = value,
            opcodes::NAND_FEAT_CONFIG => self.feature_config = value,
            _ => {}
        }
    }

    fn page_read(&mut self, row: u32) {
        let page = self.geometry.page_size as usize;
        let offset = self.page_offset(row);
        self.data.read(offset, &mut self.cache[..page]);
        self.cache[page..].fill(0xFF);
    }

    fn read_cache(&self, column: usize, buf: &mut [u8]) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.cache.get(column + i).copied().unwrap_or(0xFF);
        }
    }

    fn program_load(&mut self, column: usize, data: &[u8]) {
        self.cache.fill(0xFF);
        for (i, &b) in data.iter().enumerate() {
            if let Some(slot) = self.cache.get_mut(column + i) {
                *slot = b;
            }
        }
    }

    fn program_execute(&mut self, row: u32) {
        self.status.remove(NandStatus::P_FAIL);
        if !self.status.contains(NandStatus::WEL)
            || self.protection != 0
            || self.faults.program_fail
        {
            self.status.insert(NandStatus::P_FAIL);
        } else {
            let page = self.geometry.page_size as usize;
            let offset = self.page_offset(row);
            let cache = self.cache[..page].to_vec();
            self.data.program(offset, &cache);
        }
        self.status.remove(NandStatus::WEL);
    }

    fn block_erase(&mut self, row: u32) {
        self.status.remove(NandStatus::E_FAIL);
        if !self.status.contains(NandStatus::WEL)
            || self.protection != 0
            || self.faults.erase_fail
        {
            self.status.insert(NandStatus::E_FAIL);
        } else {
            let block = self.geometry.block_size() as usize;
            let offset = self.page_offset(row) / block * block;
            self.data.fill(offset, block, 0xFF);
        }
        self.status.remove(NandStatus::WEL);
    }

    pub(crate) fn execute(&mut self, cmd: &mut SpiCommand<'_>) {
        let addr = cmd.address.unwrap_or(0);
        match cmd.opcode {
            opcodes::NAND_RESET => {
                self.status = NandStatus::empty();
                self.cache.fill(0xFF);
            }
            opcodes::NAND_GET_FEATURE => {
                let value = self.get_feature(addr as u8);
                cmd.read_buf.fill(value);
            }
            opcodes::NAND_SET_FEATURE => {
                if let Some(&value) = cmd.write_data.first() {
                    self.set_feature(addr as u8, value);
                }
            }
            opcodes::RDID => {
                if self.config.legacy_id_only {
                    cmd.read_buf.fill(0xFF);
                } else {
                    let id = [
                        0x00,
                        vendors::NAND_MFR_MACRONIX,
                        self.config.device_id,
                        self.config.device_id2,
                    ];
                    for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                        *b = id.get(i).copied().unwrap_or(0);
                    }
                }
            }
            opcodes::NAND_RDID_LEGACY => {
                let id = [0x00, 0x00, self.config.device_id, self.config.device_id2];
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = id.get(i).copied().unwrap_or(0);
                }
            }
            opcodes::WREN => self.status.insert(NandStatus::WEL),
            0x04 => self.status.remove(NandStatus::WEL),
            opcodes::NAND_PAGE_READ => self.page_read(addr),
            opcodes::NAND_READ_CACHE => self.read_cache(addr as usize, cmd.read_buf),
            opcodes::NAND_PROGRAM_LOAD => self.program_load(addr as usize, cmd.write_data),
            opcodes::NAND_PROGRAM_EXEC => self.program_execute(addr),
            opcodes::NAND_BLOCK_ERASE => self.block_erase(addr),
            other => {
                log::trace!("dummy NAND: ignoring opcode 0x{:02X}", other);
                cmd.read_buf.fill(0xFF);
            }
        }
    }
}
