//! Device identification
//!
//! One chip-select line is probed with three family-specific attempts, in
//! an order chosen so that none of them false-triggers on another family:
//!
//! 1. SPI-NAND (reset, wait, read ID, legacy ID fallback)
//! 2. NOR (JEDEC ID against the manufacturer allow-list)
//! 3. PSRAM (optional reset sequence, 8-byte ID, zero-padding normalization)
//!
//! A line on which nothing answers yields `None`; that does not prove the
//! line is unconnected.

use crate::bus::{ChipSelect, SpiMaster};
use crate::chip::vendors;
use crate::chip::{DeviceFamily, DeviceInfo};
use crate::protocol::{nand, nor, psram};

/// Highest clock used while probing for SPI-NAND
pub const NAND_PROBE_CLOCK_HZ: u32 = 1_000_000;

/// Default probe clock
pub const DEFAULT_PROBE_CLOCK_HZ: u32 = 8_000_000;

/// Settle time after a NAND reset
const NAND_RESET_SETTLE_US: u32 = 2_000;

/// Probe configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Bus clock for the NOR/PSRAM attempts
    pub clock_hz: u32,
    /// Skip the PSRAM reset sequence so RAM contents survive the probe
    pub preserve_psram: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_PROBE_CLOCK_HZ,
            preserve_psram: false,
        }
    }
}

/// Identify the device on `cs`
///
/// Every line in `known_cs` (and `cs` itself) is driven high first so a
/// line left asserted by an earlier transaction cannot contend with the
/// probe. The bus clock is restored to `opts.clock_hz` afterwards.
pub fn identify<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    known_cs: &[ChipSelect],
    opts: &ProbeOptions,
) -> Option<DeviceInfo> {
    for &line in known_cs {
        master.deselect(line);
    }
    master.deselect(cs);

    let found = probe_nand(master, cs, opts)
        .or_else(|| probe_nor(master, cs, opts))
        .or_else(|| probe_psram(master, cs, opts));

    master.set_clock_hz(opts.clock_hz);

    match &found {
        Some(info) => log::debug!("probe: {}", info),
        None => log::debug!("probe: nothing recognised on CS {}", cs),
    }
    found
}

/// Try to identify a SPI-NAND device
pub fn probe_nand<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    opts: &ProbeOptions,
) -> Option<DeviceInfo> {
    master.set_clock_hz(opts.clock_hz.min(NAND_PROBE_CLOCK_HZ));

    nand::reset(master, cs).ok()?;
    master.delay_us(NAND_RESET_SETTLE_US);
    if nand::wait_ready(master, cs, nand::RESET_TIMEOUT_US).is_err() {
        log::trace!("CS {}: no NAND ready status after reset", cs);
    }

    let raw = nand::read_id(master, cs).ok()?;
    let (mut mid, mut did1, mut did2) = (raw[1], raw[2], raw[3]);
    log::trace!("CS {}: NAND ID {:02X?}", cs, raw);

    if mid == 0x00 || mid == 0xFF {
        let legacy = nand::read_id_legacy(master, cs).ok()?;
        log::trace!("CS {}: NAND legacy ID {:02X?}", cs, legacy);
        if legacy[2] != 0x00 && legacy[2] != 0xFF {
            mid = vendors::NAND_MFR_MACRONIX;
            did1 = legacy[2];
            did2 = legacy[3];
        }
    }

    if mid != vendors::NAND_MFR_MACRONIX {
        return None;
    }
    let density = vendors::nand_density(did1)?;

    let mut info = DeviceInfo::new(DeviceFamily::SpiNand, cs, &[mid, did1, did2]);
    info.vendor_id = mid;
    info.did1 = did1;
    info.did2 = did2;
    info.capacity_bytes = density.total_bytes;
    info.vendor_name = vendors::vendor_name(mid);
    info.part_hint = Some(density.part);
    Some(info)
}

/// Try to identify a NOR flash
pub fn probe_nor<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    opts: &ProbeOptions,
) -> Option<DeviceInfo> {
    master.set_clock_hz(opts.clock_hz);

    let id = nor::read_jedec_id(master, cs).ok()?;
    if id == [0xFF; 3] || id == [0x00; 3] {
        return None;
    }

    let Some(vendor) = vendors::nor_vendor_name(id[0]) else {
        log::trace!("CS {}: JEDEC {:02X?} is not a known NOR vendor", cs, id);
        return None;
    };
    let capacity = vendors::nor_capacity(id[2])?;

    let mut info = DeviceInfo::new(DeviceFamily::Nor, cs, &id);
    info.vendor_id = id[0];
    info.did1 = id[1];
    info.did2 = id[2];
    info.capacity_bytes = capacity;
    info.vendor_name = vendor;
    Some(info)
}

/// Try to identify a PSRAM
pub fn probe_psram<M: SpiMaster + ?Sized>(
    master: &mut M,
    cs: ChipSelect,
    opts: &ProbeOptions,
) -> Option<DeviceInfo> {
    if !opts.preserve_psram {
        master.set_clock_hz(opts.clock_hz / 2);
        let reset = psram::reset_sequence(master, cs);
        master.set_clock_hz(opts.clock_hz);
        reset.ok()?;
    }

    let raw = psram::read_id(master, cs).ok()?;
    let id = normalize_psram_id(raw);
    log::trace!("CS {}: PSRAM ID {:02X?} -> {:02X?}", cs, raw, id);

    let vendor = vendors::psram_vendor_name(id[0])?;
    let (capacity, hint) = vendors::psram_density(id[0], id[1]);

    let mut info = DeviceInfo::new(DeviceFamily::Psram, cs, &id);
    info.vendor_id = id[0];
    info.did1 = id[1];
    info.did2 = id[2];
    info.capacity_bytes = capacity;
    info.vendor_name = vendor;
    info.part_hint = hint;
    Some(info)
}

/// Move a zero-padded PSRAM vendor byte to index 0
///
/// Some parts clock out up to three zero bytes before the manufacturer
/// ID. If one of the first four bytes is a known PSRAM vendor preceded
/// only by zeros, the array is shifted left and the tail zero-filled.
/// Anything else is returned unchanged.
pub fn normalize_psram_id(raw: [u8; psram::ID_LEN]) -> [u8; psram::ID_LEN] {
    let Some(pos) = (0..4).find(|&i| vendors::is_psram_vendor(raw[i])) else {
        return raw;
    };
    if pos == 0 || raw[..pos].iter().any(|&b| b != 0) {
        return raw;
    }

    let mut id = [0u8; psram::ID_LEN];
    id[..psram::ID_LEN - pos].copy_from_slice(&raw[pos..]);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_two_byte_padding() {
        let raw = [0x00, 0x00, 0x0D, 0x5D, 0, 0, 0, 0];
        let id = normalize_psram_id(raw);
        assert_eq!(id, [0x0D, 0x5D, 0, 0, 0, 0, 0, 0]);
        assert_eq!(vendors::psram_density(id[0], id[1]).0, 8 * 1024 * 1024);
    }

    #[test]
    fn test_normalize_keeps_aligned_id() {
        let raw = [0x0D, 0x5D, 0x12, 0x34, 0, 0, 0, 0];
        assert_eq!(normalize_psram_id(raw), raw);
    }

    #[test]
    fn test_normalize_shifts_tail() {
        let raw = [0x00, 0x00, 0x00, 0x0D, 0x5E, 0xAA, 0xBB, 0xCC];
        assert_eq!(
            normalize_psram_id(raw),
            [0x0D, 0x5E, 0xAA, 0xBB, 0xCC, 0, 0, 0]
        );
    }

    #[test]
    fn test_normalize_rejects_non_zero_prefix() {
        let raw = [0x00, 0x42, 0x0D, 0x5D, 0, 0, 0, 0];
        assert_eq!(normalize_psram_id(raw), raw);
    }

    #[test]
    fn test_normalize_ignores_late_vendor_byte() {
        let raw = [0x00, 0x00, 0x00, 0x00, 0x0D, 0x5D, 0, 0];
        assert_eq!(normalize_psram_id(raw), raw);
    }
}
