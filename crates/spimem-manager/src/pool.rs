//! Batches of devices taken from the registry at one instant
//!
//! A pool remembers each member by (chip-select, family) because registry
//! indices move when entries are rescanned. Members the pool leased stay
//! leased while the pool holds them; opening such a member hands the lease
//! to the handle and closing it hands the lease back. A member whose entry
//! was replaced by a rescan no longer counts as pool-leased.

use spimem_core::bus::SpiMaster;
use spimem_core::chip::{DeviceFamily, DeviceInfo};
use spimem_core::device::MemDevice;
use spimem_core::error::{Error, Result};

use crate::handle::DeviceHandle;
use crate::registry::{Manager, MAX_DEVICES};

#[derive(Debug, Clone)]
struct Member {
    info: DeviceInfo,
    generation: u32,
    pool_leased: bool,
    open: bool,
}

/// Snapshot of registry entries
#[derive(Debug, Clone, Default)]
pub struct DevicePool {
    members: heapless::Vec<Member, MAX_DEVICES>,
}

impl DevicePool {
    /// Take every detected device
    ///
    /// With `reserve`, each entry that is not already leased is leased to
    /// the pool.
    pub fn create_all<M: SpiMaster + Clone>(mgr: &mut Manager<M>, reserve: bool) -> Self {
        Self::create(mgr, None, reserve)
    }

    /// Take every detected device of one family
    pub fn create_by_family<M: SpiMaster + Clone>(
        mgr: &mut Manager<M>,
        family: DeviceFamily,
        reserve: bool,
    ) -> Self {
        Self::create(mgr, Some(family), reserve)
    }

    fn create<M: SpiMaster + Clone>(
        mgr: &mut Manager<M>,
        family: Option<DeviceFamily>,
        reserve: bool,
    ) -> Self {
        let mut pool = Self::default();
        for index in 0..mgr.len() {
            let (Some(info), Some(generation)) = (mgr.info(index).cloned(), mgr.generation(index))
            else {
                continue;
            };
            if family.is_some_and(|f| f != info.family) {
                continue;
            }
            let pool_leased = reserve && mgr.reserve_index(index).is_ok();
            // Cannot overflow: the pool is no larger than the registry
            let _ = pool.members.push(Member {
                info,
                generation,
                pool_leased,
                open: false,
            });
        }
        log::debug!("device pool with {} member(s)", pool.members.len());
        pool
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the pool has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Probe info of a member as it was when the pool was created
    pub fn info(&self, i: usize) -> Option<&DeviceInfo> {
        self.members.get(i).map(|m| &m.info)
    }

    /// Returns true if the pool itself holds the lease on a member
    pub fn is_pool_leased(&self, i: usize) -> bool {
        self.members.get(i).is_some_and(|m| m.pool_leased)
    }

    /// Open one member
    ///
    /// Pool-leased members are opened under the pool's lease; other
    /// members go through [`Manager::open_by_index`] and fail if someone
    /// else holds them.
    pub fn open_at<M: SpiMaster + Clone>(
        &mut self,
        mgr: &mut Manager<M>,
        i: usize,
    ) -> Result<DeviceHandle<M>> {
        let member = self.members.get_mut(i).ok_or(Error::InvalidIndex)?;
        let index = mgr
            .find_index(member.info.chip_select, member.info.family)
            .ok_or(Error::DeviceNotFound)?;

        let current = mgr.generation(index) == Some(member.generation);
        if member.pool_leased && !(current && mgr.is_reserved(index)) {
            // A rescan dropped every lease, including ours
            log::debug!("pool lost its lease on CS {}", member.info.chip_select);
            member.pool_leased = false;
        }

        if member.pool_leased {
            if member.open {
                return Err(Error::DeviceReserved);
            }
            let handle = mgr.open_leased(index)?;
            member.open = true;
            Ok(handle)
        } else {
            mgr.open_by_index(index)
        }
    }

    /// Close a member previously opened with [`open_at`](Self::open_at)
    ///
    /// For pool-leased members the lease returns to the pool; otherwise the
    /// handle is released to the registry. Returns true if a lease changed
    /// hands.
    pub fn close_at<M: SpiMaster + Clone>(
        &mut self,
        mgr: &mut Manager<M>,
        i: usize,
        handle: DeviceHandle<M>,
    ) -> bool {
        match self.members.get_mut(i) {
            Some(member)
                if member.pool_leased
                    && member.open
                    && member.info.chip_select == handle.chip_select()
                    && member.info.family == handle.family()
                    && handle.lease_generation() == Some(member.generation) =>
            {
                member.open = false;
                true
            }
            _ => mgr.release(handle),
        }
    }

    /// Give every lease the pool still holds back to the registry
    ///
    /// Members that are currently open keep their lease on the handle,
    /// which must then be released with [`Manager::release`].
    pub fn release_all<M: SpiMaster + Clone>(&mut self, mgr: &mut Manager<M>) -> usize {
        let mut released = 0;
        for member in self.members.iter_mut().filter(|m| m.pool_leased) {
            member.pool_leased = false;
            if member.open {
                member.open = false;
                continue;
            }
            if let Some(index) = mgr.find_index(member.info.chip_select, member.info.family) {
                if mgr.generation(index) == Some(member.generation) && mgr.unreserve_index(index) {
                    released += 1;
                }
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spimem_core::bus::SharedBus;
    use spimem_dummy::{DummyBus, DummyNor, DummyNorConfig, DummyPsram, DummyPsramConfig};

    fn manager() -> Manager<SharedBus<DummyBus>> {
        let bus = DummyBus::new()
            .with_chip(1, DummyNor::new(DummyNorConfig::w25q128()))
            .with_chip(2, DummyPsram::new(DummyPsramConfig::aps6404()))
            .with_chip(3, DummyPsram::new(DummyPsramConfig::aps1604()));
        let mut mgr = Manager::new(SharedBus::new(bus));
        mgr.scan(&[1, 2, 3]);
        mgr
    }

    #[test]
    fn test_pool_reserves_members() {
        let mut mgr = manager();
        let pool = DevicePool::create_by_family(&mut mgr, DeviceFamily::Psram, true);
        assert_eq!(pool.len(), 2);
        assert!(pool.is_pool_leased(0) && pool.is_pool_leased(1));
        assert!(mgr.open_preferred(DeviceFamily::Psram).is_none());
        assert!(mgr.open_preferred(DeviceFamily::Nor).is_some());
    }

    #[test]
    fn test_open_pool_leased_member() {
        let mut mgr = manager();
        let mut pool = DevicePool::create_all(&mut mgr, true);

        let handle = pool.open_at(&mut mgr, 1).unwrap();
        assert_eq!(handle.chip_select(), 2);
        assert!(matches!(pool.open_at(&mut mgr, 1), Err(Error::DeviceReserved)));

        assert!(pool.close_at(&mut mgr, 1, handle));
        assert!(mgr.is_reserved(1));
        assert!(pool.open_at(&mut mgr, 1).is_ok());
    }

    #[test]
    fn test_unleased_member_uses_registry() {
        let mut mgr = manager();
        let taken = mgr.open_preferred(DeviceFamily::Nor).unwrap();
        let mut pool = DevicePool::create_all(&mut mgr, true);
        assert!(!pool.is_pool_leased(0));
        assert!(matches!(pool.open_at(&mut mgr, 0), Err(Error::DeviceReserved)));

        mgr.release(taken);
        let handle = pool.open_at(&mut mgr, 0).unwrap();
        assert!(mgr.is_reserved(0));
        assert!(pool.close_at(&mut mgr, 0, handle));
        assert!(!mgr.is_reserved(0));
    }

    #[test]
    fn test_release_all_returns_leases() {
        let mut mgr = manager();
        let mut pool = DevicePool::create_all(&mut mgr, true);
        let open = pool.open_at(&mut mgr, 2).unwrap();

        assert_eq!(pool.release_all(&mut mgr), 2);
        assert_eq!(mgr.reserved_count(), 1);
        assert!(mgr.release(open));
        assert_eq!(mgr.reserved_count(), 0);
    }

    #[test]
    fn test_stale_pool_keeps_hands_off_new_leases() {
        let mut mgr = manager();
        let mut pool = DevicePool::create_by_family(&mut mgr, DeviceFamily::Psram, true);
        mgr.rescan();
        let fresh = mgr.open_preferred(DeviceFamily::Psram).unwrap();
        assert_eq!(fresh.chip_select(), 2);

        assert_eq!(pool.release_all(&mut mgr), 0);
        assert!(mgr.is_reserved(1));
        assert!(matches!(pool.open_at(&mut mgr, 0), Err(Error::DeviceReserved)));
        assert!(mgr.release(fresh));
    }

    #[test]
    fn test_members_resolve_after_rescan() {
        let mut mgr = manager();
        let mut pool = DevicePool::create_by_family(&mut mgr, DeviceFamily::Psram, true);
        mgr.master().borrow_mut().detach(2);
        mgr.rescan();

        assert!(matches!(pool.open_at(&mut mgr, 0), Err(Error::DeviceNotFound)));
        let handle = pool.open_at(&mut mgr, 1).unwrap();
        assert_eq!(handle.chip_select(), 3);
        assert!(!pool.is_pool_leased(1));
        assert!(mgr.release(handle));
    }
}
