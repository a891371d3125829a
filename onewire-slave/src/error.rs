use core::fmt;

/// Error code attached to bit and byte notifications.
///
/// The signaling layer recovers from every violation by restarting the
/// protocol, so these codes are reserved; a notification carrying one makes
/// the receiving layer reset itself.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// The line was not at the level the slot required.
    UnexpectedBitState = 0x8000,
    /// The slot did not complete in time.
    WaitedTooLong = 0x8001,
}

impl SlotError {
    /// Numeric code of the error.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::UnexpectedBitState => write!(f, "unexpected bit state (0x{:04x})", self.code()),
            SlotError::WaitedTooLong => write!(f, "waited too long (0x{:04x})", self.code()),
        }
    }
}

/// Protocol violations detected by the state machines.
///
/// None of these travel up as errors: the detecting machine logs the
/// violation and resets to idle, and the master is expected to retry with a
/// fresh reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// A line change the current state does not allow.
    UnexpectedTransition,
    /// A timer fired in a state that does not expect it.
    UnexpectedExpiry,
    /// A ROM bit from the master differs from the device identity.
    IdentityMismatch,
    /// A ROM or function command byte that is not in the dispatch table.
    UnrecognizedCommand,
    /// Alarm search stopped because the device is not in alarm.
    AlarmGated,
    /// A bit or byte notification carried an error code.
    Slot(SlotError),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnexpectedTransition => f.write_str("unexpected line transition"),
            Violation::UnexpectedExpiry => f.write_str("unexpected timer expiry"),
            Violation::IdentityMismatch => f.write_str("identity mismatch"),
            Violation::UnrecognizedCommand => f.write_str("unrecognized command"),
            Violation::AlarmGated => f.write_str("alarm search on a device without alarm"),
            Violation::Slot(e) => write!(f, "slot error: {e}"),
        }
    }
}

impl From<SlotError> for Violation {
    fn from(value: SlotError) -> Self {
        Self::Slot(value)
    }
}
