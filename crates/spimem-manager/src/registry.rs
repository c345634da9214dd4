//! Device registry
//!
//! Probes chip-select lines, keeps the detected set and tracks which
//! entries are leased to a handle. A lease is purely logical: nothing
//! stops code that bypasses the registry from talking to a leased device.

use spimem_core::bus::{ChipSelect, SpiMaster};
use spimem_core::chip::{DeviceFamily, DeviceInfo};
use spimem_core::device::MemDevice;
use spimem_core::error::{Error, Result};
use spimem_core::probe::{self, ProbeOptions, DEFAULT_PROBE_CLOCK_HZ};

use crate::handle::DeviceHandle;

/// Maximum number of detected devices
pub const MAX_DEVICES: usize = 16;
/// Maximum number of chip-select lines
pub const MAX_CS_LINES: usize = 16;

/// Priority used by [`Manager::open_auto`]
const AUTO_ORDER: [DeviceFamily; 3] = [DeviceFamily::Psram, DeviceFamily::Nor, DeviceFamily::SpiNand];

/// Registry tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Clock used while probing
    pub probe_clock_hz: u32,
    /// Do not reset PSRAM while probing, so its contents survive
    pub preserve_psram: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            probe_clock_hz: DEFAULT_PROBE_CLOCK_HZ,
            preserve_psram: false,
        }
    }
}

/// Registry of detected devices on one bus
///
/// The bus master is cloned into every handle, so `M` is usually a cheap
/// shared reference such as [`SharedBus`](spimem_core::bus::SharedBus).
pub struct Manager<M> {
    master: M,
    config: ManagerConfig,
    cs_list: heapless::Vec<ChipSelect, MAX_CS_LINES>,
    detected: heapless::Vec<DeviceInfo, MAX_DEVICES>,
    /// Per-entry scan generation, parallel to `detected`
    generations: heapless::Vec<u32, MAX_DEVICES>,
    next_generation: u32,
    leased: heapless::Vec<usize, MAX_DEVICES>,
}

impl<M: SpiMaster + Clone> Manager<M> {
    /// Create a registry with default settings
    pub fn new(master: M) -> Self {
        Self::with_config(master, ManagerConfig::default())
    }

    /// Create a registry with explicit settings
    pub fn with_config(master: M, config: ManagerConfig) -> Self {
        Self {
            master,
            config,
            cs_list: heapless::Vec::new(),
            detected: heapless::Vec::new(),
            generations: heapless::Vec::new(),
            next_generation: 1,
            leased: heapless::Vec::new(),
        }
    }

    /// Current settings
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Enable or disable content-preserving PSRAM probing
    pub fn set_preserve_psram(&mut self, preserve: bool) {
        self.config.preserve_psram = preserve;
    }

    /// The bus master the registry probes with
    pub fn master(&self) -> &M {
        &self.master
    }

    // ------------------------------------------------------------------
    // Chip-select list
    // ------------------------------------------------------------------

    /// Replace the chip-select list
    ///
    /// Duplicates are dropped; lines beyond [`MAX_CS_LINES`] are ignored.
    /// Returns the number of lines stored.
    pub fn set_cs_list(&mut self, lines: &[ChipSelect]) -> usize {
        self.cs_list.clear();
        for &cs in lines {
            self.add_cs(cs);
        }
        self.cs_list.len()
    }

    /// Add one chip-select line, returns false if full or already present
    pub fn add_cs(&mut self, cs: ChipSelect) -> bool {
        if self.cs_list.contains(&cs) {
            return false;
        }
        if self.cs_list.push(cs).is_err() {
            log::warn!("chip-select list full, ignoring CS {}", cs);
            return false;
        }
        true
    }

    /// Forget all chip-select lines
    pub fn clear_cs_list(&mut self) {
        self.cs_list.clear();
    }

    /// Known chip-select lines
    pub fn cs_list(&self) -> &[ChipSelect] {
        &self.cs_list
    }

    // ------------------------------------------------------------------
    // Probing
    // ------------------------------------------------------------------

    fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            clock_hz: self.config.probe_clock_hz,
            preserve_psram: self.config.preserve_psram,
        }
    }

    /// Identify the device on one line without touching the table
    pub fn identify(&mut self, cs: ChipSelect) -> Option<DeviceInfo> {
        let opts = self.probe_options();
        probe::identify(&mut self.master, cs, &self.cs_list, &opts)
    }

    /// Replace the chip-select list and probe every line
    ///
    /// Returns the number of devices found.
    pub fn scan(&mut self, lines: &[ChipSelect]) -> usize {
        self.set_cs_list(lines);
        self.rescan()
    }

    /// Probe every known line again
    ///
    /// The detected set is replaced wholesale and every lease is dropped;
    /// handles opened before the rescan are orphaned.
    pub fn rescan(&mut self) -> usize {
        if !self.leased.is_empty() {
            log::warn!("rescan drops {} outstanding lease(s)", self.leased.len());
        }
        self.detected.clear();
        self.generations.clear();
        self.leased.clear();

        let lines = self.cs_list.clone();
        for &cs in lines.iter() {
            let Some(info) = self.identify(cs) else {
                continue;
            };
            log::info!("Found {}", info);
            if self.push_entry(info).is_none() {
                log::warn!("device table full, ignoring CS {}", cs);
                break;
            }
        }
        self.detected.len()
    }

    /// Probe a single line and update only its entry
    ///
    /// The line is added to the chip-select list if needed. A previous
    /// entry for the line is replaced (and its lease dropped), or removed
    /// if nothing answers any more. Returns the entry index.
    pub fn scan_single(&mut self, cs: ChipSelect) -> Option<usize> {
        self.add_cs(cs);
        let found = self.identify(cs);
        let existing = self.detected.iter().position(|d| d.chip_select == cs);

        match (found, existing) {
            (Some(info), Some(index)) => {
                log::info!("Found {}", info);
                self.unreserve_index(index);
                self.detected[index] = info;
                self.generations[index] = self.bump_generation();
                Some(index)
            }
            (Some(info), None) => {
                log::info!("Found {}", info);
                self.push_entry(info)
            }
            (None, Some(index)) => {
                self.remove_entry(index);
                None
            }
            (None, None) => None,
        }
    }

    fn bump_generation(&mut self) -> u32 {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1).max(1);
        generation
    }

    fn push_entry(&mut self, info: DeviceInfo) -> Option<usize> {
        self.detected.push(info).ok()?;
        let generation = self.bump_generation();
        // Same capacity as `detected`
        let _ = self.generations.push(generation);
        Some(self.detected.len() - 1)
    }

    fn remove_entry(&mut self, index: usize) {
        self.detected.remove(index);
        self.generations.remove(index);
        self.leased.retain(|&i| i != index);
        for i in self.leased.iter_mut() {
            if *i > index {
                *i -= 1;
            }
        }
    }

    // ------------------------------------------------------------------
    // Detected table
    // ------------------------------------------------------------------

    /// Number of detected devices
    pub fn len(&self) -> usize {
        self.detected.len()
    }

    /// Returns true if no device was detected
    pub fn is_empty(&self) -> bool {
        self.detected.is_empty()
    }

    /// All detected devices, in scan order
    pub fn detected(&self) -> &[DeviceInfo] {
        &self.detected
    }

    /// Info for one entry
    pub fn info(&self, index: usize) -> Option<&DeviceInfo> {
        self.detected.get(index)
    }

    /// Scan generation of an entry
    ///
    /// Changes whenever the entry is replaced by a rescan or by
    /// [`scan_single`](Self::scan_single), so a lease taken on the old
    /// entry can be told apart from one taken on the new one.
    pub fn generation(&self, index: usize) -> Option<u32> {
        self.generations.get(index).copied()
    }

    /// Index of the `occurrence`-th device of a family
    ///
    /// With `require_unreserved`, leased entries are skipped and not
    /// counted.
    pub fn find_index_by_family(
        &self,
        family: DeviceFamily,
        occurrence: usize,
        require_unreserved: bool,
    ) -> Option<usize> {
        self.detected
            .iter()
            .enumerate()
            .filter(|(i, d)| d.family == family && !(require_unreserved && self.is_reserved(*i)))
            .nth(occurrence)
            .map(|(i, _)| i)
    }

    /// Index of the entry for a (chip-select, family) pair
    pub fn find_index(&self, cs: ChipSelect, family: DeviceFamily) -> Option<usize> {
        self.detected
            .iter()
            .position(|d| d.chip_select == cs && d.family == family)
    }

    // ------------------------------------------------------------------
    // Reservations
    // ------------------------------------------------------------------

    /// Returns true if the entry is leased
    pub fn is_reserved(&self, index: usize) -> bool {
        self.leased.contains(&index)
    }

    /// Lease an entry without opening it
    pub fn reserve_index(&mut self, index: usize) -> Result<()> {
        if index >= self.detected.len() {
            return Err(Error::InvalidIndex);
        }
        if self.is_reserved(index) {
            return Err(Error::DeviceReserved);
        }
        // Cannot overflow: one slot per detected entry
        self.leased.push(index).map_err(|_| Error::DeviceReserved)
    }

    /// Drop the lease on an entry, returns false if it was not leased
    pub fn unreserve_index(&mut self, index: usize) -> bool {
        let before = self.leased.len();
        self.leased.retain(|&i| i != index);
        self.leased.len() != before
    }

    /// Number of leased entries
    pub fn reserved_count(&self) -> usize {
        self.leased.len()
    }

    // ------------------------------------------------------------------
    // Opening
    // ------------------------------------------------------------------

    /// Open an entry, leasing it
    ///
    /// Fails with [`Error::DeviceReserved`] if the entry is already
    /// leased. If the driver cannot be initialised the lease is rolled back.
    pub fn open_by_index(&mut self, index: usize) -> Result<DeviceHandle<M>> {
        self.reserve_index(index)?;
        match self.open_leased(index) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.unreserve_index(index);
                log::warn!("failed to open device {}: {}", index, e);
                Err(e)
            }
        }
    }

    /// Build a handle for an entry that is already leased by the caller
    pub(crate) fn open_leased(&self, index: usize) -> Result<DeviceHandle<M>> {
        let info = self.detected.get(index).ok_or(Error::InvalidIndex)?;
        DeviceHandle::open(self.master.clone(), info, Some(self.generations[index]))
    }

    /// Open the `occurrence`-th device of a family, whether leased or not
    ///
    /// Fails if that entry is leased.
    pub fn open_by_family(
        &mut self,
        family: DeviceFamily,
        occurrence: usize,
    ) -> Result<DeviceHandle<M>> {
        let index = self
            .find_index_by_family(family, occurrence, false)
            .ok_or(Error::DeviceNotFound)?;
        self.open_by_index(index)
    }

    /// Open the first unleased device of a family
    ///
    /// Returns `None` if every device of the family is in use; the caller
    /// decides whether to retry.
    pub fn open_preferred(&mut self, family: DeviceFamily) -> Option<DeviceHandle<M>> {
        let index = self.find_index_by_family(family, 0, true)?;
        self.open_by_index(index).ok()
    }

    /// Open the first unleased device, preferring PSRAM, then NOR, then SPI-NAND
    pub fn open_auto(&mut self) -> Option<DeviceHandle<M>> {
        AUTO_ORDER
            .iter()
            .find_map(|&family| self.open_preferred(family))
    }

    /// Open the device on one line
    ///
    /// A tracked entry is leased as usual and refused if already leased.
    /// An untracked line is identified on the spot and returned as an
    /// ephemeral handle that carries no lease.
    pub fn open_single(&mut self, cs: ChipSelect) -> Result<DeviceHandle<M>> {
        if let Some(index) = self.detected.iter().position(|d| d.chip_select == cs) {
            return self.open_by_index(index);
        }

        let info = self.identify(cs).ok_or(Error::DeviceNotFound)?;
        log::debug!("ephemeral open of {}", info);
        DeviceHandle::open(self.master.clone(), &info, None)
    }

    /// Give a handle back
    ///
    /// Returns true if a lease was dropped. Ephemeral handles, and handles
    /// orphaned by a rescan, are simply discarded.
    pub fn release(&mut self, handle: DeviceHandle<M>) -> bool {
        let Some(generation) = handle.lease_generation() else {
            return false;
        };
        let cs = handle.chip_select();
        let family = handle.family();
        drop(handle);

        match self.find_index(cs, family) {
            Some(index) if self.generations[index] == generation => self.unreserve_index(index),
            Some(_) => {
                log::debug!("stale handle for CS {} discarded", cs);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spimem_core::bus::SharedBus;
    use spimem_dummy::{
        DummyBus, DummyNand, DummyNandConfig, DummyNor, DummyNorConfig, DummyPsram,
        DummyPsramConfig,
    };

    fn manager() -> Manager<SharedBus<DummyBus>> {
        let bus = DummyBus::new()
            .with_chip(1, DummyNor::new(DummyNorConfig::w25q128()))
            .with_chip(2, DummyNor::new(DummyNorConfig::mx25l6433f()))
            .with_chip(3, DummyNand::new(DummyNandConfig::mx35lf1ge4ab()))
            .with_chip(4, DummyPsram::new(DummyPsramConfig::aps6404()));
        let mut mgr = Manager::new(SharedBus::new(bus));
        assert_eq!(mgr.scan(&[1, 2, 3, 4, 5]), 4);
        mgr
    }

    #[test]
    fn test_scan_keeps_only_detected_lines() {
        let mgr = manager();
        let families: Vec<_> = mgr.detected().iter().map(|d| d.family).collect();
        assert_eq!(
            families,
            [
                DeviceFamily::Nor,
                DeviceFamily::Nor,
                DeviceFamily::SpiNand,
                DeviceFamily::Psram
            ]
        );
        assert_eq!(mgr.cs_list(), &[1, 2, 3, 4, 5]);
        assert_eq!(mgr.reserved_count(), 0);
    }

    #[test]
    fn test_open_preferred_is_exclusive() {
        let mut mgr = manager();
        let a = mgr.open_preferred(DeviceFamily::Nor).unwrap();
        let b = mgr.open_preferred(DeviceFamily::Nor).unwrap();
        assert_ne!(a.chip_select(), b.chip_select());
        assert!(mgr.open_preferred(DeviceFamily::Nor).is_none());

        assert!(mgr.release(a));
        let c = mgr.open_preferred(DeviceFamily::Nor).unwrap();
        assert_eq!(c.chip_select(), 1);
        assert!(mgr.open_preferred(DeviceFamily::Nor).is_none());
        drop(b);
    }

    #[test]
    fn test_single_device_family_refuses_second_open() {
        let mut mgr = manager();
        let psram = mgr.open_preferred(DeviceFamily::Psram).unwrap();
        assert_eq!(psram.family(), DeviceFamily::Psram);
        assert!(mgr.open_preferred(DeviceFamily::Psram).is_none());
        mgr.release(psram);
        assert!(mgr.open_preferred(DeviceFamily::Psram).is_some());
    }

    #[test]
    fn test_open_auto_priority() {
        let mut mgr = manager();
        let first = mgr.open_auto().unwrap();
        assert_eq!(first.family(), DeviceFamily::Psram);
        let second = mgr.open_auto().unwrap();
        assert_eq!(second.family(), DeviceFamily::Nor);
        let third = mgr.open_auto().unwrap();
        assert_eq!(third.family(), DeviceFamily::Nor);
        let fourth = mgr.open_auto().unwrap();
        assert_eq!(fourth.family(), DeviceFamily::SpiNand);
        assert!(mgr.open_auto().is_none());
        assert_eq!(mgr.reserved_count(), 4);
    }

    #[test]
    fn test_reservation_observable_without_handles() {
        let mut mgr = manager();
        let index = mgr.find_index_by_family(DeviceFamily::SpiNand, 0, true).unwrap();
        mgr.reserve_index(index).unwrap();
        assert!(mgr.is_reserved(index));
        assert_eq!(mgr.reserve_index(index), Err(Error::DeviceReserved));
        assert!(mgr.open_preferred(DeviceFamily::SpiNand).is_none());
        assert!(matches!(
            mgr.open_by_index(index),
            Err(Error::DeviceReserved)
        ));
        assert!(mgr.unreserve_index(index));
        assert!(!mgr.unreserve_index(index));
        assert_eq!(mgr.reserve_index(99), Err(Error::InvalidIndex));
    }

    #[test]
    fn test_find_index_by_family_occurrence() {
        let mut mgr = manager();
        assert_eq!(mgr.find_index_by_family(DeviceFamily::Nor, 1, false), Some(1));
        mgr.reserve_index(0).unwrap();
        assert_eq!(mgr.find_index_by_family(DeviceFamily::Nor, 0, true), Some(1));
        assert_eq!(mgr.find_index_by_family(DeviceFamily::Nor, 1, true), None);
        assert!(matches!(
            mgr.open_by_family(DeviceFamily::Nor, 0),
            Err(Error::DeviceReserved)
        ));
        assert!(mgr.open_by_family(DeviceFamily::Nor, 1).is_ok());
    }

    #[test]
    fn test_rescan_orphans_handles() {
        let mut mgr = manager();
        let handle = mgr.open_preferred(DeviceFamily::Psram).unwrap();
        assert_eq!(mgr.rescan(), 4);
        assert_eq!(mgr.reserved_count(), 0);

        // The new entry is free; the old handle's release is a no-op
        let fresh = mgr.open_preferred(DeviceFamily::Psram).unwrap();
        assert!(mgr.release(fresh));
        assert!(!mgr.release(handle));
    }

    #[test]
    fn test_orphaned_release_keeps_fresh_lease() {
        let mut mgr = manager();
        let orphan = mgr.open_preferred(DeviceFamily::Psram).unwrap();
        mgr.rescan();
        let fresh = mgr.open_preferred(DeviceFamily::Psram).unwrap();

        assert!(!mgr.release(orphan));
        assert!(mgr.open_preferred(DeviceFamily::Psram).is_none());
        assert_eq!(mgr.reserved_count(), 1);
        assert!(mgr.release(fresh));
        assert!(mgr.open_preferred(DeviceFamily::Psram).is_some());
    }

    #[test]
    fn test_scan_single_replacement_orphans_handle() {
        let mut mgr = manager();
        let old = mgr.open_single(4).unwrap();
        let index = mgr.scan_single(4).unwrap();
        assert!(!mgr.is_reserved(index));

        let fresh = mgr.open_by_index(index).unwrap();
        assert_ne!(old.lease_generation(), fresh.lease_generation());
        assert!(!mgr.release(old));
        assert!(mgr.is_reserved(index));
        assert!(mgr.release(fresh));
    }

    #[test]
    fn test_open_single_tracked_and_ephemeral() {
        let mut mgr = manager();
        let tracked = mgr.open_single(1).unwrap();
        assert!(tracked.is_leased());
        assert!(matches!(mgr.open_single(1), Err(Error::DeviceReserved)));

        mgr.master()
            .borrow_mut()
            .attach(7, DummyNor::new(DummyNorConfig::w25q128()));
        let ephemeral = mgr.open_single(7).unwrap();
        assert!(!ephemeral.is_leased());
        assert_eq!(mgr.len(), 4);
        assert!(!mgr.release(ephemeral));
        assert!(mgr.release(tracked));

        assert!(matches!(mgr.open_single(9), Err(Error::DeviceNotFound)));
    }

    #[test]
    fn test_scan_single_updates_one_entry() {
        let mut mgr = manager();
        mgr.master()
            .borrow_mut()
            .attach(6, DummyPsram::new(DummyPsramConfig::aps1604()));
        let index = mgr.scan_single(6).unwrap();
        assert_eq!(index, 4);
        assert_eq!(mgr.info(index).unwrap().capacity_bytes, 4 * 1024 * 1024);
        assert!(mgr.cs_list().contains(&6));

        // Removing a device drops its entry and shifts later leases
        mgr.reserve_index(4).unwrap();
        mgr.master().borrow_mut().detach(3);
        assert_eq!(mgr.scan_single(3), None);
        assert_eq!(mgr.len(), 4);
        assert!(mgr.is_reserved(3));
        assert_eq!(mgr.info(3).unwrap().chip_select, 6);
    }

    #[test]
    fn test_failed_open_rolls_back_lease() {
        let mut mgr = manager();
        let index = mgr.find_index_by_family(DeviceFamily::SpiNand, 0, false).unwrap();

        // NAND drivers clear block protection on open; a busy bus fails that
        let bus = mgr.master().clone();
        let guard = bus.borrow_mut();
        assert!(matches!(mgr.open_by_index(index), Err(Error::BusBusy)));
        assert!(!mgr.is_reserved(index));
        drop(guard);

        assert!(mgr.open_by_index(index).is_ok());
        assert!(mgr.is_reserved(index));
    }

    #[test]
    fn test_preserve_psram_flag_reaches_probe() {
        let mut mgr = manager();
        mgr.set_preserve_psram(true);
        mgr.rescan();
        let bus = mgr.master().borrow();
        match bus.chip(4).unwrap() {
            spimem_dummy::DummyChip::Psram(chip) => assert_eq!(chip.reset_count(), 1),
            _ => unreachable!(),
        }
    }
}
