//! spimem-dummy - In-memory serial memory emulator for testing
//!
//! This crate provides a dummy bus master with several chip-select lines,
//! each of which can carry an emulated NOR flash, SPI-NAND or PSRAM. It's
//! useful for testing and development without real hardware.
//!
//! Lines without a chip read back as 0xFF (pulled-up MISO). A line can be
//! held asserted to emulate a transaction left open; while it is, every
//! other line reads back zeros.

mod memory;
mod nand;
mod nor;
mod psram;

pub use memory::SparseMemory;
pub use nand::{DummyNand, DummyNandConfig};
pub use nor::{DummyNor, DummyNorConfig};
pub use psram::{DummyPsram, DummyPsramConfig};

use spimem_core::bus::{ChipSelect, SpiMaster};
use spimem_core::error::Result;
use spimem_core::spi::SpiCommand;

/// Faults that can be injected into flash models
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Busy bit never clears
    pub stuck_busy: bool,
    /// Program operations fail (NAND sets P_FAIL, NOR silently ignores)
    pub program_fail: bool,
    /// Erase operations fail (NAND sets E_FAIL, NOR silently ignores)
    pub erase_fail: bool,
}

/// One emulated chip
#[derive(Debug, Clone)]
pub enum DummyChip {
    /// NOR flash
    Nor(DummyNor),
    /// SPI-NAND flash
    Nand(DummyNand),
    /// PSRAM
    Psram(DummyPsram),
}

impl DummyChip {
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) {
        match self {
            Self::Nor(chip) => chip.execute(cmd),
            Self::Nand(chip) => chip.execute(cmd),
            Self::Psram(chip) => chip.execute(cmd),
        }
    }

    /// Backing array of the chip
    pub fn memory(&self) -> &SparseMemory {
        match self {
            Self::Nor(chip) => chip.memory(),
            Self::Nand(chip) => chip.memory(),
            Self::Psram(chip) => chip.memory(),
        }
    }

    /// Mutable backing array of the chip
    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        match self {
            Self::Nor(chip) => chip.memory_mut(),
            Self::Nand(chip) => chip.memory_mut(),
            Self::Psram(chip) => chip.memory_mut(),
        }
    }

    /// Fault injection settings (PSRAM has none)
    pub fn faults_mut(&mut self) -> Option<&mut Faults> {
        match self {
            Self::Nor(chip) => Some(&mut chip.faults),
            Self::Nand(chip) => Some(&mut chip.faults),
            Self::Psram(_) => None,
        }
    }
}

impl From<DummyNor> for DummyChip {
    fn from(chip: DummyNor) -> Self {
        Self::Nor(chip)
    }
}

impl From<DummyNand> for DummyChip {
    fn from(chip: DummyNand) -> Self {
        Self::Nand(chip)
    }
}

impl From<DummyPsram> for DummyChip {
    fn from(chip: DummyPsram) -> Self {
        Self::Psram(chip)
    }
}

/// Record of one executed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// Chip-select line
    pub cs: ChipSelect,
    /// Opcode byte
    pub opcode: u8,
    /// Address, if any
    pub address: Option<u32>,
    /// Bus clock at the time of the transaction
    pub clock_hz: u32,
    /// Bytes written after the header
    pub write_len: usize,
    /// Bytes read
    pub read_len: usize,
}

struct Line {
    cs: ChipSelect,
    chip: Option<DummyChip>,
    held: bool,
}

/// Dummy bus master
///
/// Emulates one SPI bus with any number of chip-select lines.
pub struct DummyBus {
    lines: Vec<Line>,
    clock_hz: u32,
    max_read: usize,
    max_write: usize,
    elapsed_us: u64,
    log: Vec<Transaction>,
}

impl Default for DummyBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBus {
    /// Create a bus with no chips attached
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            clock_hz: 1_000_000,
            max_read: 4096,
            max_write: 4096,
            elapsed_us: 0,
            log: Vec::new(),
        }
    }

    /// Attach a chip to a chip-select line, replacing any previous one
    pub fn attach(&mut self, cs: ChipSelect, chip: impl Into<DummyChip>) -> &mut Self {
        let chip = chip.into();
        match self.lines.iter_mut().find(|l| l.cs == cs) {
            Some(line) => line.chip = Some(chip),
            None => self.lines.push(Line {
                cs,
                chip: Some(chip),
                held: false,
            }),
        }
        self
    }

    /// Builder form of [`attach`](Self::attach)
    pub fn with_chip(mut self, cs: ChipSelect, chip: impl Into<DummyChip>) -> Self {
        self.attach(cs, chip);
        self
    }

    /// Remove the chip from a line
    pub fn detach(&mut self, cs: ChipSelect) -> Option<DummyChip> {
        self.lines
            .iter_mut()
            .find(|l| l.cs == cs)
            .and_then(|l| l.chip.take())
    }

    /// Override the per-transaction size limits
    pub fn with_limits(mut self, max_read: usize, max_write: usize) -> Self {
        self.max_read = max_read;
        self.max_write = max_write;
        self
    }

    /// Chip attached to a line
    pub fn chip(&self, cs: ChipSelect) -> Option<&DummyChip> {
        self.lines
            .iter()
            .find(|l| l.cs == cs)
            .and_then(|l| l.chip.as_ref())
    }

    /// Mutable chip attached to a line
    pub fn chip_mut(&mut self, cs: ChipSelect) -> Option<&mut DummyChip> {
        self.lines
            .iter_mut()
            .find(|l| l.cs == cs)
            .and_then(|l| l.chip.as_mut())
    }

    /// Leave a chip-select line asserted until it is deselected
    pub fn hold_asserted(&mut self, cs: ChipSelect) {
        match self.lines.iter_mut().find(|l| l.cs == cs) {
            Some(line) => line.held = true,
            None => self.lines.push(Line {
                cs,
                chip: None,
                held: true,
            }),
        }
    }

    /// Current bus clock
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Total time spent in `delay_us`
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// All transactions executed so far
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Opcodes sent to one line, in order
    pub fn opcodes(&self, cs: ChipSelect) -> Vec<u8> {
        self.log
            .iter()
            .filter(|t| t.cs == cs)
            .map(|t| t.opcode)
            .collect()
    }

    /// Forget the transaction history
    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl SpiMaster for DummyBus {
    fn max_read_len(&self) -> usize {
        self.max_read
    }

    fn max_write_len(&self) -> usize {
        self.max_write
    }

    fn execute(&mut self, cs: ChipSelect, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.log.push(Transaction {
            cs,
            opcode: cmd.opcode,
            address: cmd.address,
            clock_hz: self.clock_hz,
            write_len: cmd.write_data.len(),
            read_len: cmd.read_buf.len(),
        });

        if self.lines.iter().any(|l| l.held && l.cs != cs) {
            log::trace!("dummy bus: contention on CS {}", cs);
            cmd.read_buf.fill(0x00);
            return Ok(());
        }

        match self
            .lines
            .iter_mut()
            .find(|l| l.cs == cs)
            .and_then(|l| l.chip.as_mut())
        {
            Some(chip) => chip.execute(cmd),
            None => cmd.read_buf.fill(0xFF),
        }
        Ok(())
    }

    fn deselect(&mut self, cs: ChipSelect) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.cs == cs) {
            line.held = false;
        }
    }

    fn set_clock_hz(&mut self, hz: u32) {
        self.clock_hz = hz;
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spimem_core::bus::SharedBus;
    use spimem_core::chip::{DeviceFamily, NandGeometry};
    use spimem_core::device::{MemDevice, NandDevice, NorDevice, PsramDevice};
    use spimem_core::probe::{self, ProbeOptions};
    use spimem_core::protocol::{nand as nand_proto, nor as nor_proto};
    use spimem_core::spi::opcodes;
    use spimem_core::Error;

    const MIB: u64 = 1024 * 1024;

    fn nor_bus() -> DummyBus {
        DummyBus::new().with_chip(1, DummyNor::new(DummyNorConfig::w25q128()))
    }

    fn nand_bus() -> DummyBus {
        DummyBus::new().with_chip(2, DummyNand::new(DummyNandConfig::mx35lf1ge4ab()))
    }

    fn psram_bus() -> DummyBus {
        DummyBus::new().with_chip(3, DummyPsram::new(DummyPsramConfig::aps6404()))
    }

    fn mixed_bus() -> DummyBus {
        DummyBus::new()
            .with_chip(1, DummyNor::new(DummyNorConfig::w25q128()))
            .with_chip(2, DummyNand::new(DummyNandConfig::mx35lf1ge4ab()))
            .with_chip(3, DummyPsram::new(DummyPsramConfig::aps6404()))
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_read_jedec_id() {
        let mut bus = nor_bus();
        let id = nor_proto::read_jedec_id(&mut bus, 1).unwrap();
        assert_eq!(id, [0xEF, 0x40, 0x18]);
    }

    #[test]
    fn test_nor_program_respects_page_boundary() {
        let mut bus = nor_bus();
        let mut dev = NorDevice::with_capacity(&mut bus, 1, 16 * MIB);
        let data = pattern(300, 1);
        dev.write(0x10F0, &data).unwrap();

        let mut buf = vec![0u8; 300];
        dev.read(0x10F0, &mut buf).unwrap();
        assert_eq!(buf, data);

        // One WREN/PP/RDSR group per page touched
        let programs = bus.opcodes(1).iter().filter(|&&op| op == opcodes::PP).count();
        assert_eq!(programs, 3);
    }

    #[test]
    fn test_nor_erase_range_rounds_to_sectors() {
        let mut bus = nor_bus();
        let mut dev = NorDevice::with_capacity(&mut bus, 1, 16 * MIB);
        dev.write(0x0FFF, &[0x00, 0x00]).unwrap();
        dev.write(0x2000, &[0x00]).unwrap();

        dev.erase_range(0x1010, 10).unwrap();

        let mut buf = [0u8; 2];
        dev.read(0x0FFF, &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0xFF]);
        dev.read(0x2000, &mut buf[..1]).unwrap();
        assert_eq!(buf[0], 0x00);
    }

    #[test]
    fn test_nor_rejects_out_of_bounds_before_bus() {
        let mut bus = nor_bus();
        {
            let mut dev = NorDevice::with_capacity(&mut bus, 1, 16 * MIB);
            assert_eq!(
                dev.write(16 * 1024 * 1024 - 1, &[0, 0]),
                Err(Error::AddressOutOfBounds)
            );
        }
        assert!(bus.transactions().is_empty());
    }

    #[test]
    fn test_nor_timeout_when_busy() {
        let mut bus = nor_bus();
        bus.chip_mut(1).unwrap().faults_mut().unwrap().stuck_busy = true;
        let mut dev = NorDevice::with_capacity(&mut bus, 1, 16 * MIB);
        assert_eq!(dev.write(0, &[0x12]), Err(Error::Timeout));
    }

    #[test]
    fn test_nand_open_clears_protection() {
        let mut bus = nand_bus();
        let geometry = NandGeometry::SMALL_PAGE;
        let dev = NandDevice::with_geometry(&mut bus, 2, 128 * MIB, geometry).unwrap();
        assert_eq!(dev.erase_unit_size(), 128 * 1024);
        assert_eq!(dev.page_size(), 2048);
        drop(dev);

        match bus.chip(2).unwrap() {
            DummyChip::Nand(chip) => assert_eq!(chip.protection(), 0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_nand_round_trip_across_pages() {
        let mut bus = nand_bus();
        let mut dev =
            NandDevice::with_geometry(&mut bus, 2, 128 * MIB, NandGeometry::SMALL_PAGE).unwrap();
        let data = pattern(5000, 3);
        dev.write(2048 - 100, &data).unwrap();

        let mut buf = vec![0u8; 5000];
        dev.read(2048 - 100, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_nand_erase_block() {
        let mut bus = nand_bus();
        let mut dev =
            NandDevice::with_geometry(&mut bus, 2, 128 * MIB, NandGeometry::SMALL_PAGE).unwrap();
        dev.write(0x20000, &[0x00; 16]).unwrap();
        dev.erase_range(0x20005, 1).unwrap();

        let mut buf = [0u8; 16];
        dev.read(0x20000, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_nand_program_fail_aborts() {
        let mut bus = nand_bus();
        bus.chip_mut(2).unwrap().faults_mut().unwrap().program_fail = true;
        let mut dev =
            NandDevice::with_geometry(&mut bus, 2, 128 * MIB, NandGeometry::SMALL_PAGE).unwrap();
        assert_eq!(
            dev.write(4096 + 10, &[0u8; 4096]),
            Err(Error::ProgramFailed { addr: 4096 })
        );
        drop(dev);

        let execs = bus
            .opcodes(2)
            .iter()
            .filter(|&&op| op == opcodes::NAND_PROGRAM_EXEC)
            .count();
        assert_eq!(execs, 1);
    }

    #[test]
    fn test_nand_erase_fail_reported() {
        let mut bus = nand_bus();
        bus.chip_mut(2).unwrap().faults_mut().unwrap().erase_fail = true;
        let mut dev =
            NandDevice::with_geometry(&mut bus, 2, 128 * MIB, NandGeometry::SMALL_PAGE).unwrap();
        assert_eq!(
            dev.erase_range(0x40000, 0x40000),
            Err(Error::EraseFailed { addr: 0x40000 })
        );
    }

    #[test]
    fn test_nand_status_timeout() {
        let mut bus = nand_bus();
        bus.chip_mut(2).unwrap().faults_mut().unwrap().stuck_busy = true;
        assert_eq!(
            nand_proto::page_read_to_cache(&mut bus, 2, 0),
            Err(Error::Timeout)
        );
    }

    #[test]
    fn test_psram_has_no_erase() {
        let mut bus = psram_bus();
        let mut dev = PsramDevice::with_capacity(&mut bus, 3, 8 * MIB);
        assert_eq!(dev.erase_unit_size(), 0);
        assert_eq!(dev.erase_range(0, 16), Err(Error::EraseUnsupported));

        dev.write(100, &[0x00, 0x11]).unwrap();
        dev.write(100, &[0xAA, 0xBB]).unwrap();
        let mut buf = [0u8; 2];
        dev.read(100, &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);
    }

    #[test]
    fn test_round_trip_every_family() {
        let bus = SharedBus::new(mixed_bus());
        let mut devices: Vec<Box<dyn MemDevice>> = vec![
            Box::new(NorDevice::with_capacity(bus.clone(), 1, 16 * MIB)),
            Box::new(
                NandDevice::with_geometry(bus.clone(), 2, 128 * MIB, NandGeometry::SMALL_PAGE)
                    .unwrap(),
            ),
            Box::new(PsramDevice::with_capacity(bus.clone(), 3, 8 * MIB)),
        ];

        for dev in devices.iter_mut() {
            let capacity = dev.capacity() as u32;
            for (addr, len) in [(0u32, 1usize), (0x1234, 700), (capacity - 300, 300)] {
                let data = pattern(len, addr as u8);
                dev.write(addr, &data).unwrap();
                let mut buf = vec![0u8; len];
                dev.read(addr, &mut buf).unwrap();
                assert_eq!(buf, data, "{} at 0x{:X}", dev.family(), addr);
            }
        }
    }

    #[test]
    fn test_shared_bus_reports_reentrancy() {
        let bus = SharedBus::new(nor_bus());
        let _guard = bus.borrow_mut();
        let mut dev = NorDevice::with_capacity(bus.clone(), 1, 16 * MIB);
        let mut buf = [0u8; 4];
        assert_eq!(dev.read(0, &mut buf), Err(Error::BusBusy));
    }

    #[test]
    fn test_identify_each_family() {
        let mut bus = mixed_bus();
        let opts = ProbeOptions::default();
        let known = [1, 2, 3];

        let nor = probe::identify(&mut bus, 1, &known, &opts).unwrap();
        assert_eq!(nor.family, DeviceFamily::Nor);
        assert_eq!(nor.capacity_bytes, 16 * MIB);
        assert_eq!(nor.vendor_name, "Winbond");

        let nand = probe::identify(&mut bus, 2, &known, &opts).unwrap();
        assert_eq!(nand.family, DeviceFamily::SpiNand);
        assert_eq!(nand.capacity_bytes, 128 * MIB);
        assert_eq!(nand.vendor_id, 0xC2);

        let psram = probe::identify(&mut bus, 3, &known, &opts).unwrap();
        assert_eq!(psram.family, DeviceFamily::Psram);
        assert_eq!(psram.capacity_bytes, 8 * MIB);
        assert_eq!(psram.id[0], 0x0D);
        assert_eq!(psram.part_hint, Some("APM 64 Mbit (8 MiB)"));

        assert!(probe::identify(&mut bus, 9, &known, &opts).is_none());
        assert_eq!(bus.clock_hz(), opts.clock_hz);
    }

    #[test]
    fn test_identify_is_deterministic_and_isolated() {
        let mut bus = mixed_bus();
        let opts = ProbeOptions::default();
        let known = [1, 2, 3];

        let first = probe::identify(&mut bus, 3, &known, &opts).unwrap();
        for _ in 0..3 {
            let nor = probe::identify(&mut bus, 1, &known, &opts).unwrap();
            assert_eq!(nor.family, DeviceFamily::Nor);
            let again = probe::identify(&mut bus, 3, &known, &opts).unwrap();
            assert_eq!(again.family, first.family);
            assert_eq!(again.capacity_bytes, first.capacity_bytes);
        }
    }

    #[test]
    fn test_identify_macronix_nor_not_taken_for_nand() {
        let mut bus = DummyBus::new().with_chip(4, DummyNor::new(DummyNorConfig::mx25l6433f()));
        let info = probe::identify(&mut bus, 4, &[4], &ProbeOptions::default()).unwrap();
        assert_eq!(info.family, DeviceFamily::Nor);
        assert_eq!(info.capacity_bytes, 8 * MIB);
    }

    #[test]
    fn test_nand_probe_runs_slow_and_falls_back_to_legacy_id() {
        let config = DummyNandConfig {
            legacy_id_only: true,
            ..DummyNandConfig::mx35lf2ge4ad()
        };
        let mut bus = DummyBus::new().with_chip(2, DummyNand::new(config));
        let info = probe::identify(&mut bus, 2, &[2], &ProbeOptions::default()).unwrap();
        assert_eq!(info.family, DeviceFamily::SpiNand);
        assert_eq!(info.capacity_bytes, 256 * MIB);

        let reset = bus
            .transactions()
            .iter()
            .find(|t| t.opcode == opcodes::NAND_RESET)
            .unwrap();
        assert!(reset.clock_hz <= probe::NAND_PROBE_CLOCK_HZ);
    }

    #[test]
    fn test_psram_padding_normalized() {
        let config = DummyPsramConfig::aps6404().with_id_padding(2);
        let mut bus = DummyBus::new().with_chip(3, DummyPsram::new(config));
        let info = probe::identify(&mut bus, 3, &[3], &ProbeOptions::default()).unwrap();
        assert_eq!(&info.id[..2], &[0x0D, 0x5D]);
        assert_eq!(info.capacity_bytes, 8 * MIB);
    }

    #[test]
    fn test_psram_reset_skipped_when_preserving() {
        let mut bus = psram_bus();
        let opts = ProbeOptions {
            preserve_psram: true,
            ..ProbeOptions::default()
        };
        let info = probe::identify(&mut bus, 3, &[3], &opts).unwrap();
        assert_eq!(info.family, DeviceFamily::Psram);
        match bus.chip(3).unwrap() {
            DummyChip::Psram(chip) => assert_eq!(chip.reset_count(), 0),
            _ => unreachable!(),
        }

        probe::identify(&mut bus, 3, &[3], &ProbeOptions::default()).unwrap();
        match bus.chip(3).unwrap() {
            DummyChip::Psram(chip) => assert_eq!(chip.reset_count(), 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_psram_needing_reset_only_found_after_reset() {
        let config = DummyPsramConfig {
            needs_reset: true,
            ..DummyPsramConfig::aps6404()
        };
        let mut bus = DummyBus::new().with_chip(3, DummyPsram::new(config));
        let preserve = ProbeOptions {
            preserve_psram: true,
            ..ProbeOptions::default()
        };
        assert!(probe::identify(&mut bus, 3, &[3], &preserve).is_none());
        assert!(probe::identify(&mut bus, 3, &[3], &ProbeOptions::default()).is_some());
    }

    #[test]
    fn test_identify_releases_lines_left_asserted() {
        let mut bus = mixed_bus();
        let opts = ProbeOptions::default();

        bus.hold_asserted(3);
        assert!(probe::identify(&mut bus, 1, &[], &opts).is_none());

        bus.hold_asserted(3);
        let info = probe::identify(&mut bus, 1, &[1, 2, 3], &opts).unwrap();
        assert_eq!(info.family, DeviceFamily::Nor);
    }
}
