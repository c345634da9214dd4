//! DeviceHandle - an opened device plus the info it was probed with

use spimem_core::bus::{ChipSelect, SpiMaster};
use spimem_core::chip::{DeviceFamily, DeviceInfo};
use spimem_core::device::{MemDevice, NandDevice, NorDevice, PsramDevice};
use spimem_core::error::{Error, Result};

/// Closed set of device drivers
pub enum Device<M> {
    /// NOR flash
    Nor(NorDevice<M>),
    /// SPI-NAND flash
    Nand(NandDevice<M>),
    /// PSRAM
    Psram(PsramDevice<M>),
}

impl<M: SpiMaster> Device<M> {
    /// Build the driver matching a probed device
    ///
    /// SPI-NAND drivers clear block protection here, which can fail.
    pub fn open(master: M, info: &DeviceInfo) -> Result<Self> {
        match info.family {
            DeviceFamily::Nor => Ok(Self::Nor(NorDevice::new(master, info))),
            DeviceFamily::SpiNand => NandDevice::open(master, info).map(Self::Nand),
            DeviceFamily::Psram => Ok(Self::Psram(PsramDevice::new(master, info))),
            DeviceFamily::Unknown => Err(Error::DeviceNotFound),
        }
    }

    fn inner(&self) -> &dyn MemDevice {
        match self {
            Self::Nor(dev) => dev,
            Self::Nand(dev) => dev,
            Self::Psram(dev) => dev,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MemDevice {
        match self {
            Self::Nor(dev) => dev,
            Self::Nand(dev) => dev,
            Self::Psram(dev) => dev,
        }
    }
}

impl<M: SpiMaster> MemDevice for Device<M> {
    fn family(&self) -> DeviceFamily {
        self.inner().family()
    }

    fn chip_select(&self) -> ChipSelect {
        self.inner().chip_select()
    }

    fn capacity(&self) -> u64 {
        self.inner().capacity()
    }

    fn page_size(&self) -> u32 {
        self.inner().page_size()
    }

    fn erase_unit_size(&self) -> u32 {
        self.inner().erase_unit_size()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.inner_mut().read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.inner_mut().write(addr, data)
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        self.inner_mut().erase_range(addr, len)
    }
}

/// An opened device
///
/// Handles obtained from the registry carry a lease on their entry and
/// must be given back with [`Manager::release`](crate::Manager::release).
/// Ephemeral handles (see [`Manager::open_single`](crate::Manager::open_single))
/// carry no lease.
pub struct DeviceHandle<M> {
    device: Device<M>,
    info: DeviceInfo,
    lease: Option<u32>,
}

impl<M: SpiMaster> DeviceHandle<M> {
    pub(crate) fn open(master: M, info: &DeviceInfo, lease: Option<u32>) -> Result<Self> {
        Ok(Self {
            device: Device::open(master, info)?,
            info: info.clone(),
            lease,
        })
    }

    /// Probe result this handle was opened from
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Returns true if this handle holds a registry lease
    pub fn is_leased(&self) -> bool {
        self.lease.is_some()
    }

    /// Scan generation of the entry this handle's lease was taken on
    pub fn lease_generation(&self) -> Option<u32> {
        self.lease
    }

    /// Get the underlying driver
    pub fn device(&self) -> &Device<M> {
        &self.device
    }

    /// Get the underlying driver mutably
    pub fn device_mut(&mut self) -> &mut Device<M> {
        &mut self.device
    }
}

impl<M: SpiMaster> MemDevice for DeviceHandle<M> {
    fn family(&self) -> DeviceFamily {
        self.device.family()
    }

    fn chip_select(&self) -> ChipSelect {
        self.device.chip_select()
    }

    fn capacity(&self) -> u64 {
        self.device.capacity()
    }

    fn page_size(&self) -> u32 {
        self.device.page_size()
    }

    fn erase_unit_size(&self) -> u32 {
        self.device.erase_unit_size()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.device.read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.device.write(addr, data)
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        self.device.erase_range(addr, len)
    }
}
