//! CLI command implementations
//!
//! Every file command opens one device through the registry, wraps it in
//! a [`SimpleFs`], runs, and gives the device back.

pub mod files;
mod progress;
mod scan;

pub use scan::cmd_scan;

use spimem_core::bus::SharedBus;
use spimem_dummy::DummyBus;
use spimem_fs::SimpleFs;
use spimem_manager::{DeviceHandle, Manager};

use crate::cli::FamilyArg;
use crate::error::{CliError, Result};

/// The shared emulated bus
pub type Bus = SharedBus<DummyBus>;

/// Device handle on the emulated bus
pub type Handle = DeviceHandle<Bus>;

/// Filesystem over a device handle
pub type Fs = SimpleFs<Handle>;

/// Lease the first free device of the requested family
pub fn open_device(mgr: &mut Manager<Bus>, family: FamilyArg) -> Result<Handle> {
    let handle = match family.family() {
        Some(f) => mgr.open_preferred(f),
        None => mgr.open_auto(),
    };
    handle.ok_or_else(|| CliError::NoDevice(format!("{:?}", family).to_lowercase()))
}

/// Run `f` on a filesystem over a freshly opened device
///
/// With `mount`, the directory is mounted (and formatted if empty) first.
/// The device is released whether or not `f` succeeds.
pub fn with_fs<T>(
    mgr: &mut Manager<Bus>,
    family: FamilyArg,
    mount: bool,
    f: impl FnOnce(&mut Fs) -> Result<T>,
) -> Result<T> {
    let handle = open_device(mgr, family)?;
    log::debug!("using {}", handle.info());
    let mut fs = SimpleFs::new(handle);

    let result = if mount {
        fs.mount(true).map_err(CliError::from).and_then(|()| f(&mut fs))
    } else {
        f(&mut fs)
    };
    mgr.release(fs.into_inner());
    result
}
