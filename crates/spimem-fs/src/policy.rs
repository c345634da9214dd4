//! Erase-aware writes
//!
//! Flash can only clear bits, so a write onto programmed bytes needs an
//! erase first. [`write_with_policy`] decides when to erase:
//!
//! - devices without an erase unit are written directly
//! - an all-0xFF payload becomes an erase of the aligned superset, nothing
//!   is programmed
//! - in the directory region the target must already be erased; erasing
//!   there would take earlier records with it
//! - in the data region the aligned superset is erased first if needed
//!
//! Both allocation styles of the filesystem go through this one function.

use spimem_core::device::{align_down, align_up, MemDevice, ERASED_VALUE};

use crate::error::{FsError, Result};

/// Default directory region size
pub const DEFAULT_DIR_SIZE: u32 = 64 * 1024;

/// Allocation unit on devices without an erase unit
pub const DEFAULT_ALIGNMENT: u32 = 4096;

const SCAN_CHUNK: usize = 256;

/// Address map of a formatted device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Size of the directory log, which starts at address 0
    pub dir_size: u32,
    /// Device erase unit, 0 if the device has no erase
    pub erase_unit: u32,
    /// Slot and data alignment
    pub unit: u32,
    /// Usable bytes, clamped to 32-bit addressing
    pub capacity: u32,
}

impl Layout {
    /// Derive the layout for a device
    ///
    /// The directory keeps at least `dir_size` bytes and grows to a whole
    /// number of erase units so data erases never reach it.
    pub fn for_device<D: MemDevice + ?Sized>(dev: &D, dir_size: u32, alignment: u32) -> Self {
        let erase_unit = dev.erase_unit_size();
        let (dir_size, unit) = if erase_unit == 0 {
            (dir_size, alignment.max(1))
        } else {
            (align_up(dir_size.max(erase_unit), erase_unit), erase_unit)
        };
        Self {
            dir_size,
            erase_unit,
            unit,
            capacity: dev.capacity().min(u32::MAX as u64) as u32,
        }
    }

    /// First byte of the data region
    pub fn data_start(&self) -> u32 {
        self.dir_size
    }

    /// Number of record slots in the directory
    pub fn dir_slots(&self) -> u32 {
        self.dir_size / crate::record::RECORD_SIZE as u32
    }

    /// Returns true if the device needs erases before reprogramming
    pub fn is_erasable(&self) -> bool {
        self.erase_unit != 0
    }

    /// Returns true if `addr` lies in the directory region
    pub fn in_directory(&self, addr: u32) -> bool {
        addr < self.dir_size
    }

    fn erase_span(&self, addr: u32, len: usize) -> (u32, u32) {
        let start = align_down(addr, self.erase_unit);
        let end = align_up(addr.saturating_add(len as u32), self.erase_unit);
        (start, end - start)
    }
}

/// Returns true if every byte of `[addr, addr + len)` reads as 0xFF
pub fn is_erased<D: MemDevice + ?Sized>(dev: &mut D, addr: u32, len: usize) -> Result<bool> {
    let mut buf = [0u8; SCAN_CHUNK];
    let mut pos = 0;
    while pos < len {
        let n = SCAN_CHUNK.min(len - pos);
        dev.read(addr + pos as u32, &mut buf[..n])?;
        if buf[..n].iter().any(|&b| b != ERASED_VALUE) {
            return Ok(false);
        }
        pos += n;
    }
    Ok(true)
}

/// Write `data` at `addr`, erasing first where the device needs it
pub fn write_with_policy<D: MemDevice + ?Sized>(
    dev: &mut D,
    layout: &Layout,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    if !dev.is_valid_range(addr, data.len()) {
        return Err(FsError::NoSpace);
    }
    if !layout.is_erasable() {
        dev.write(addr, data)?;
        return Ok(());
    }

    if data.iter().all(|&b| b == ERASED_VALUE) {
        let (start, len) = layout.erase_span(addr, data.len());
        log::trace!("0xFF payload at 0x{:08X}, erasing 0x{:08X}+{}", addr, start, len);
        dev.erase_range(start, len)?;
        return Ok(());
    }

    if !is_erased(dev, addr, data.len())? {
        if layout.in_directory(addr) {
            log::warn!("directory bytes at 0x{:08X} are not erased", addr);
            return Err(FsError::DirectoryNotErased);
        }
        let (start, len) = layout.erase_span(addr, data.len());
        log::debug!("erasing 0x{:08X}+{} before program", start, len);
        dev.erase_range(start, len)?;
    }
    dev.write(addr, data)?;
    Ok(())
}

/// Bring `[addr, addr + len)` to 0xFF
///
/// Erase-capable devices erase the aligned superset; others are written
/// with 0xFF.
pub fn fill_erased<D: MemDevice + ?Sized>(
    dev: &mut D,
    layout: &Layout,
    addr: u32,
    len: u32,
) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    if layout.is_erasable() {
        let (start, span) = layout.erase_span(addr, len as usize);
        dev.erase_range(start, span)?;
        return Ok(());
    }
    let fill = [ERASED_VALUE; SCAN_CHUNK];
    let end = addr + len;
    let mut pos = addr;
    while pos < end {
        let n = (end - pos).min(SCAN_CHUNK as u32);
        dev.write(pos, &fill[..n as usize])?;
        pos += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spimem_core::bus::SharedBus;
    use spimem_core::device::{NorDevice, PsramDevice};
    use spimem_core::spi::opcodes;
    use spimem_dummy::{DummyBus, DummyNor, DummyNorConfig, DummyPsram, DummyPsramConfig};

    fn nor() -> (SharedBus<DummyBus>, NorDevice<SharedBus<DummyBus>>) {
        let bus = SharedBus::new(
            DummyBus::new().with_chip(1, DummyNor::new(DummyNorConfig::w25q128())),
        );
        let dev = NorDevice::with_capacity(bus.clone(), 1, 16 * 1024 * 1024);
        (bus, dev)
    }

    fn layout(dev: &impl MemDevice) -> Layout {
        Layout::for_device(dev, DEFAULT_DIR_SIZE, DEFAULT_ALIGNMENT)
    }

    #[test]
    fn test_layout_per_family() {
        let (_bus, dev) = nor();
        let l = layout(&dev);
        assert_eq!((l.dir_size, l.unit, l.erase_unit), (0x10000, 4096, 4096));
        assert_eq!(l.dir_slots(), 2048);

        let bus = SharedBus::new(
            DummyBus::new().with_chip(2, DummyPsram::new(DummyPsramConfig::aps6404())),
        );
        let psram = PsramDevice::with_capacity(bus, 2, 8 * 1024 * 1024);
        let l = layout(&psram);
        assert_eq!((l.dir_size, l.unit, l.erase_unit), (0x10000, 4096, 0));
    }

    #[test]
    fn test_erased_payload_only_erases() {
        let (bus, mut dev) = nor();
        let l = layout(&dev);
        dev.write(0x20010, &[0x00; 16]).unwrap();
        bus.borrow_mut().clear_log();

        write_with_policy(&mut dev, &l, 0x20010, &[0xFF; 32]).unwrap();
        let ops = bus.borrow().opcodes(1);
        assert!(ops.contains(&opcodes::SE_20));
        assert!(!ops.contains(&opcodes::PP));

        let mut buf = [0u8; 4096];
        dev.read(0x20000, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_directory_refuses_programmed_bytes() {
        let (bus, mut dev) = nor();
        let l = layout(&dev);
        dev.write(0x40, &[0x12; 32]).unwrap();
        let before = bus.borrow().chip(1).unwrap().memory().to_image();
        bus.borrow_mut().clear_log();

        let res = write_with_policy(&mut dev, &l, 0x40, &[0x34; 32]);
        assert_eq!(res, Err(FsError::DirectoryNotErased));
        let ops = bus.borrow().opcodes(1);
        assert!(!ops.contains(&opcodes::SE_20));
        assert!(!ops.contains(&opcodes::PP));
        assert_eq!(bus.borrow().chip(1).unwrap().memory().to_image(), before);
    }

    #[test]
    fn test_data_region_erases_then_programs() {
        let (_bus, mut dev) = nor();
        let l = layout(&dev);
        dev.write(0x11000, &[0x00; 8]).unwrap();
        dev.write(0x11800, &[0x5A; 4]).unwrap();

        write_with_policy(&mut dev, &l, 0x11000, &[0xA5; 8]).unwrap();
        let mut buf = [0u8; 8];
        dev.read(0x11000, &mut buf).unwrap();
        assert_eq!(buf, [0xA5; 8]);
        // Same erase unit, wiped along with the target
        dev.read(0x11800, &mut buf[..4]).unwrap();
        assert_eq!(&buf[..4], &[0xFF; 4]);
    }

    #[test]
    fn test_fill_erased_without_erase_unit() {
        let bus = SharedBus::new(
            DummyBus::new().with_chip(2, DummyPsram::new(DummyPsramConfig::aps6404())),
        );
        let mut dev = PsramDevice::with_capacity(bus, 2, 8 * 1024 * 1024);
        let l = layout(&dev);
        dev.write(0x100, &[0u8; 600]).unwrap();
        fill_erased(&mut dev, &l, 0x100, 600).unwrap();
        assert!(is_erased(&mut dev, 0x100, 600).unwrap());
    }
}
