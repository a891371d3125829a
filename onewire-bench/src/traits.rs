use crate::{OneWireError, OneWireResult};
use onewire_slave::consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD};

/// Outcome of a reset pulse.
pub trait OneWireStatus {
    /// At least one device answered with a presence pulse.
    fn presence(&self) -> bool;
    /// The line was shorted to ground.
    fn shortcircuit(&self) -> bool;
}

/// Master side of a 1-Wire bus: reset pulses and time slots.
///
/// Drivers such as [`OneWireSearch`](crate::OneWireSearch) and
/// [`Ds18x20Group`](crate::Ds18x20Group) are written against this trait
/// only; [`SimMaster`](crate::SimMaster) implements it on the simulated bus.
pub trait OneWire {
    /// What a reset reports about the bus.
    type Status: OneWireStatus;
    /// Failure of the transport underneath the slots.
    type BusError;

    /// Sends a reset pulse and samples for presence.
    ///
    /// # Errors
    /// [`OneWireError::NoDevicePresent`] when nobody answers,
    /// [`OneWireError::ShortCircuit`] when the line never comes back high.
    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError>;

    /// Writes a byte, least significant bit first.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError>;

    /// Reads a byte, least significant bit first.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError>;

    /// Writes one bit in one write slot.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Reads one bit in one read slot.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Generates the three slots of one search step: two read slots, then a
    /// write slot carrying the chosen direction.
    ///
    /// The direction is `direction` when both read slots return 0, the id
    /// bit otherwise. Returns `(id_bit, complement_bit, direction_taken)`.
    ///
    /// Buses without a dedicated triplet primitive keep the default, and
    /// [`OneWireSearch`](crate::OneWireSearch) falls back to single slots.
    fn read_triplet(&mut self, _direction: bool) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        Err(OneWireError::Unimplemented)
    }

    /// Resets the bus and selects devices for a function command.
    ///
    /// `Some(rom)` sends Match ROM followed by the ROM in bus order, `None`
    /// sends Skip ROM so every device listens.
    fn address(&mut self, rom: Option<u64>) -> OneWireResult<(), Self::BusError> {
        self.reset()?;
        match rom {
            Some(rom) => {
                self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
                rom.to_le_bytes()
                    .into_iter()
                    .try_for_each(|b| self.write_byte(b))
            }
            None => self.write_byte(ONEWIRE_SKIP_ROM_CMD),
        }
    }
}
