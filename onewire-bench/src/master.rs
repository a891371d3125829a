use crate::{BenchError, OneWire, OneWireError, OneWireResult, OneWireStatus, SimDelay, SimHost};
use log::trace;
use onewire_slave::{Level, OneWireSlave};
use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

/// Standard-speed slot timing of the simulated master, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterTiming {
    /// Reset pulse width.
    pub reset_low_us: u32,
    /// Time after the reset release at which a low line counts as a short.
    pub short_check_us: u32,
    /// Time after the reset release at which presence is sampled.
    pub presence_sample_us: u32,
    /// Wait after the presence sample before the next slot.
    pub reset_recovery_us: u32,
    /// Low time of a write-1 slot.
    pub write_one_low_us: u32,
    /// Low time of a write-0 slot.
    pub write_zero_low_us: u32,
    /// Low time that opens a read slot.
    pub read_low_us: u32,
    /// Sample point of a read slot, from the start of the slot.
    pub read_sample_us: u32,
    /// Full slot length, recovery included.
    pub slot_us: u32,
}

impl Default for MasterTiming {
    fn default() -> Self {
        Self {
            reset_low_us: 500,
            short_check_us: 2,
            presence_sample_us: 70,
            reset_recovery_us: 430,
            write_one_low_us: 6,
            write_zero_low_us: 60,
            read_low_us: 3,
            read_sample_us: 12,
            slot_us: 70,
        }
    }
}

/// Line state observed during a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetStatus {
    presence: bool,
    short: bool,
}

impl OneWireStatus for ResetStatus {
    fn presence(&self) -> bool {
        self.presence
    }

    fn shortcircuit(&self) -> bool {
        self.short
    }
}

/// A bit-banging 1-Wire master on a [`SimHost`].
///
/// The host is shared with the [`SimDelay`] handles created by
/// [`SimMaster::delay`], so a driver can hold the bus and a delay at the
/// same time while both move the same virtual clock.
pub struct SimMaster<S> {
    bus: Rc<RefCell<SimHost<S>>>,
    timing: MasterTiming,
}

impl<S: OneWireSlave> SimMaster<S> {
    /// Creates a master with standard-speed timing.
    pub fn new(host: SimHost<S>) -> Self {
        Self {
            bus: Rc::new(RefCell::new(host)),
            timing: MasterTiming::default(),
        }
    }

    /// Replace the slot timing.
    pub fn with_timing(mut self, timing: MasterTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Slot timing in effect.
    pub fn timing(&self) -> &MasterTiming {
        &self.timing
    }

    /// Borrow the simulated bus.
    pub fn host(&self) -> Ref<'_, SimHost<S>> {
        self.bus.borrow()
    }

    /// Mutably borrow the simulated bus.
    pub fn host_mut(&self) -> RefMut<'_, SimHost<S>> {
        self.bus.borrow_mut()
    }

    /// Borrow the bus for a bus operation, failing with any error a
    /// [`SimDelay`] left behind.
    fn bus(&self) -> Result<RefMut<'_, SimHost<S>>, BenchError> {
        let mut bus = self.bus.borrow_mut();
        match bus.take_fault() {
            Some(fault) => Err(fault),
            None => Ok(bus),
        }
    }

    /// A delay that advances this master's bus.
    pub fn delay(&self) -> SimDelay<S> {
        SimDelay::new(self.bus.clone())
    }

    /// Hold the line low for `low_us`, release it, then idle for `idle_us`.
    pub fn pulse(&mut self, low_us: u32, idle_us: u32) -> Result<(), BenchError> {
        let mut bus = self.bus()?;
        bus.set_master(true)?;
        bus.advance_us(low_us)?;
        bus.set_master(false)?;
        bus.advance_us(idle_us)
    }

    /// Let the bus run for `micros` without touching the line.
    pub fn idle(&mut self, micros: u32) -> Result<(), BenchError> {
        self.bus()?.advance_us(micros)
    }
}

impl<S: OneWireSlave> OneWire for SimMaster<S> {
    type Status = ResetStatus;
    type BusError = BenchError;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        let t = self.timing;
        let mut bus = self.bus()?;
        if bus.level() == Level::Low {
            return Err(OneWireError::BusInUse);
        }
        bus.set_master(true)?;
        bus.advance_us(t.reset_low_us)?;
        bus.set_master(false)?;
        bus.advance_us(t.short_check_us)?;
        let short = bus.level() == Level::Low;
        bus.advance_us(t.presence_sample_us.saturating_sub(t.short_check_us))?;
        let presence = bus.level() == Level::Low;
        bus.advance_us(t.reset_recovery_us)?;
        trace!("master: reset, presence {presence}, short {short}");
        if short {
            Err(OneWireError::ShortCircuit)
        } else if !presence {
            Err(OneWireError::NoDevicePresent)
        } else {
            Ok(ResetStatus { presence, short })
        }
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        trace!("master: write 0x{byte:02x}");
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 != 0)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0;
        for i in 0..8 {
            byte |= (self.read_bit()? as u8) << i;
        }
        trace!("master: read 0x{byte:02x}");
        Ok(byte)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        let t = self.timing;
        let low = if bit {
            t.write_one_low_us
        } else {
            t.write_zero_low_us
        };
        self.pulse(low, t.slot_us.saturating_sub(low))?;
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        let t = self.timing;
        let mut bus = self.bus()?;
        bus.set_master(true)?;
        bus.advance_us(t.read_low_us)?;
        bus.set_master(false)?;
        bus.advance_us(t.read_sample_us.saturating_sub(t.read_low_us))?;
        let bit = bus.level().is_high();
        bus.advance_us(t.slot_us.saturating_sub(t.read_sample_us))?;
        Ok(bit)
    }
}
