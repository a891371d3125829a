use crate::SimHost;
use embedded_hal::delay::DelayNs;
use log::warn;
use onewire_slave::OneWireSlave;
use std::{cell::RefCell, rc::Rc};

/// [`DelayNs`] over the virtual clock of a [`SimHost`].
///
/// Waiting runs the bus: timers that expire during the delay fire as usual.
/// [`DelayNs`] has no way to fail, so a bus error hit while waiting is kept
/// on the host and returned by the next [`SimMaster`](crate::SimMaster)
/// operation, or by [`SimHost::take_fault`].
pub struct SimDelay<S> {
    bus: Rc<RefCell<SimHost<S>>>,
}

impl<S> SimDelay<S> {
    pub(crate) fn new(bus: Rc<RefCell<SimHost<S>>>) -> Self {
        Self { bus }
    }
}

impl<S: OneWireSlave> DelayNs for SimDelay<S> {
    fn delay_ns(&mut self, ns: u32) {
        let mut bus = self.bus.borrow_mut();
        if let Err(e) = bus.advance_ns(ns as u64) {
            warn!("delay: {e}");
            bus.latch_fault(e);
        }
    }
}
