use crate::{OneWire, OneWireError, OneWireStatus};
use core::cmp::Ordering;
use log::trace;
use onewire_slave::{
    OneWireCrc,
    consts::{ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_SEARCH_CMD},
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// ROM command that starts a [`OneWireSearch`] pass.
pub enum OneWireSearchKind {
    /// Every device takes part.
    Normal = ONEWIRE_SEARCH_CMD,
    /// Only devices with their alarm flag set take part.
    Alarmed = ONEWIRE_CONDITIONAL_SEARCH_CMD,
}

/// Master side of the 1-Wire ROM search.
///
/// Each call to [`OneWireSearch::next`] walks the binary tree of ROM codes
/// once, taking the 0 branch at new discrepancies and the 1 branch at the
/// deepest 0 branch of the previous pass, so devices come out in ascending
/// bus order.
pub struct OneWireSearch<'a, T> {
    onewire: &'a mut T,
    kind: OneWireSearchKind,
    family: u8,
    /// ROM of the previous pass, bit 0 first on the wire.
    path: u64,
    /// 1-based position of the deepest 0 branch still to revisit, 0 if none.
    fork: u8,
    done: bool,
}

impl<'a, T> OneWireSearch<'a, T> {
    /// Creates a search over every device on the bus.
    ///
    /// # Arguments
    /// * `onewire` - The bus to search.
    /// * `kind` - Normal search or search for devices in alarm state.
    pub fn new(onewire: &'a mut T, kind: OneWireSearchKind) -> Self {
        Self::with_family(onewire, kind, 0)
    }

    /// Creates a search that only reports devices of one family.
    ///
    /// # Arguments
    /// * `onewire` - The bus to search.
    /// * `kind` - Normal search or search for devices in alarm state.
    /// * `family` - Family code to look for, `0` for any.
    pub fn with_family(onewire: &'a mut T, kind: OneWireSearchKind, family: u8) -> Self {
        let mut search = Self {
            onewire,
            kind,
            family,
            path: 0,
            fork: 0,
            done: false,
        };
        search.restart();
        search
    }

    /// Starts over. With a family set, the first pass follows the family
    /// code and then the lowest serial below it.
    fn restart(&mut self) {
        self.done = false;
        self.path = self.family as u64;
        self.fork = if self.family != 0 { 64 } else { 0 };
    }
}

impl<T: OneWire> OneWireSearch<'_, T> {
    /// Finds the next device on the bus.
    ///
    /// Implements the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    /// Call repeatedly until it returns `None`; a bus without (alarmed)
    /// devices also yields `None`.
    ///
    /// # Returns
    /// The ROM code in bus order:
    ///
    /// | Bit | Description |
    /// |-----|-------------|
    /// | 0-7 | Family code (e.g., 0x28 for DS18B20) |
    /// | 8-55 | Serial number, first byte lowest |
    /// | 56-63 | CRC-8 (`0b1_0001_1001` poly) |
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<u64>, OneWireError<T::BusError>> {
        if self.done {
            return Ok(None);
        }
        match self.onewire.reset() {
            Ok(status) if status.shortcircuit() => return Err(OneWireError::ShortCircuit),
            Ok(_) => {}
            Err(OneWireError::NoDevicePresent) => return Ok(None),
            Err(e) => return Err(e),
        }
        self.onewire.write_byte(self.kind as u8)?;

        let mut rom = 0u64;
        let mut fork = 0;
        for position in 1..=64u8 {
            let mask = 1u64 << (position - 1);
            let preferred = match position.cmp(&self.fork) {
                Ordering::Less => self.path & mask != 0,
                Ordering::Equal => true,
                Ordering::Greater => false,
            };
            let Some((taken, discrepancy)) = self.step(preferred)? else {
                trace!("search: nobody left at bit {position}");
                self.restart();
                return Ok(None);
            };
            if discrepancy && !taken {
                fork = position;
            }
            if taken {
                rom |= mask;
            }
        }
        self.path = rom;
        self.fork = fork;
        self.done = fork == 0;

        let bytes = rom.to_le_bytes();
        if bytes[0] == 0 {
            self.restart();
            return Ok(None);
        }
        if !OneWireCrc::validate(&bytes) {
            return Err(OneWireError::InvalidCrc);
        }
        if self.family != 0 && bytes[0] != self.family {
            // past the last device of the family
            self.done = true;
            return Ok(None);
        }
        Ok(Some(rom))
    }

    /// One search position: id bit, complement bit, then the branch.
    ///
    /// Returns the branch taken and whether both branches had devices, or
    /// `None` when no device answered.
    fn step(&mut self, preferred: bool) -> Result<Option<(bool, bool)>, OneWireError<T::BusError>> {
        let (id, complement, send) = match self.onewire.read_triplet(preferred) {
            Ok((id, complement, _)) => (id, complement, false),
            Err(OneWireError::Unimplemented) => {
                let id = self.onewire.read_bit()?;
                (id, self.onewire.read_bit()?, true)
            }
            Err(e) => return Err(e),
        };
        let (taken, discrepancy) = match (id, complement) {
            (true, true) => return Ok(None),
            (false, false) => (preferred, true),
            (id, _) => (id, false),
        };
        if send {
            self.onewire.write_bit(taken)?;
        }
        Ok(Some((taken, discrepancy)))
    }

    /// Checks whether the device with `rom` is on the bus.
    ///
    /// Restarts the search: a following [next](OneWireSearch::next) begins a
    /// new pass.
    pub fn verify(&mut self, rom: u64) -> Result<bool, OneWireError<T::BusError>> {
        self.done = false;
        self.path = rom;
        self.fork = 64;
        let found = self.next()?;
        self.restart();
        Ok(found == Some(rom))
    }
}
