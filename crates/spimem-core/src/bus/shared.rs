//! Sharing one bus master between several device handles
//!
//! Device handles each own a clone of the bus. The clones borrow the
//! underlying master for exactly one call, so a reentrant access shows up
//! as [`Error::BusBusy`] rather than a panic.

use core::cell::RefCell;

use super::{ChipSelect, SpiMaster};
use crate::error::{Error, Result};
use crate::spi::SpiCommand;

/// Borrowed access through a `RefCell`, usable without an allocator
impl<M: SpiMaster> SpiMaster for &RefCell<M> {
    fn max_read_len(&self) -> usize {
        self.try_borrow().map(|m| m.max_read_len()).unwrap_or(1)
    }

    fn max_write_len(&self) -> usize {
        self.try_borrow().map(|m| m.max_write_len()).unwrap_or(1)
    }

    fn execute(&mut self, cs: ChipSelect, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.try_borrow_mut()
            .map_err(|_| Error::BusBusy)?
            .execute(cs, cmd)
    }

    fn deselect(&mut self, cs: ChipSelect) {
        if let Ok(mut m) = self.try_borrow_mut() {
            m.deselect(cs);
        }
    }

    fn set_clock_hz(&mut self, hz: u32) {
        if let Ok(mut m) = self.try_borrow_mut() {
            m.set_clock_hz(hz);
        }
    }

    fn delay_us(&mut self, us: u32) {
        if let Ok(mut m) = self.try_borrow_mut() {
            m.delay_us(us);
        }
    }
}

#[cfg(feature = "alloc")]
pub use rc::SharedBus;

#[cfg(feature = "alloc")]
mod rc {
    use alloc::rc::Rc;
    use core::cell::{Ref, RefCell, RefMut};

    use super::*;

    /// Reference-counted handle to a bus master
    ///
    /// Cloning is cheap; every clone drives the same transport.
    pub struct SharedBus<M> {
        inner: Rc<RefCell<M>>,
    }

    impl<M> SharedBus<M> {
        /// Wrap a bus master for sharing
        pub fn new(master: M) -> Self {
            Self {
                inner: Rc::new(RefCell::new(master)),
            }
        }

        /// Borrow the underlying master
        ///
        /// Panics if a transaction is in flight.
        pub fn borrow(&self) -> Ref<'_, M> {
            self.inner.borrow()
        }

        /// Mutably borrow the underlying master
        ///
        /// Panics if a transaction is in flight.
        pub fn borrow_mut(&self) -> RefMut<'_, M> {
            self.inner.borrow_mut()
        }
    }

    impl<M> Clone for SharedBus<M> {
        fn clone(&self) -> Self {
            Self {
                inner: Rc::clone(&self.inner),
            }
        }
    }

    impl<M: SpiMaster> SpiMaster for SharedBus<M> {
        fn max_read_len(&self) -> usize {
            (&*self.inner).max_read_len()
        }

        fn max_write_len(&self) -> usize {
            (&*self.inner).max_write_len()
        }

        fn execute(&mut self, cs: ChipSelect, cmd: &mut SpiCommand<'_>) -> Result<()> {
            (&*self.inner).execute(cs, cmd)
        }

        fn deselect(&mut self, cs: ChipSelect) {
            (&*self.inner).deselect(cs)
        }

        fn set_clock_hz(&mut self, hz: u32) {
            (&*self.inner).set_clock_hz(hz)
        }

        fn delay_us(&mut self, us: u32) {
            (&*self.inner).delay_us(us)
        }
    }
}
