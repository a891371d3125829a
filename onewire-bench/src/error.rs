use core::fmt;

/// One wire communication error type.
#[derive(Debug)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying bus.
    Other(E),
    /// No device answered the reset pulse.
    NoDevicePresent,
    /// The line was already low when the master wanted to start a reset.
    BusInUse,
    /// The line stayed low right after the master released it.
    ShortCircuit,
    /// The operation is not implemented by this bus, such as reading a triplet.
    Unimplemented,
    /// A ROM or scratchpad read back with a bad CRC.
    InvalidCrc,
    /// The ROM carries a family code the driver does not know.
    UnknownFamily(u8),
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}

impl<E: fmt::Display> fmt::Display for OneWireError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OneWireError::Other(e) => write!(f, "bus error: {e}"),
            OneWireError::NoDevicePresent => f.write_str("no device present"),
            OneWireError::BusInUse => f.write_str("bus in use"),
            OneWireError::ShortCircuit => f.write_str("short circuit on the bus"),
            OneWireError::Unimplemented => f.write_str("operation not implemented"),
            OneWireError::InvalidCrc => f.write_str("invalid CRC"),
            OneWireError::UnknownFamily(code) => write!(f, "unknown family code 0x{code:02x}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for OneWireError<E> {}

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;

/// Failures of the simulated bus itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchError {
    /// The slaves kept producing events without the clock moving on.
    EventLimit {
        /// Simulated time at which the limit was hit (ns).
        at_ns: u64,
    },
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::EventLimit { at_ns } => {
                write!(f, "event limit exceeded at {at_ns} ns")
            }
        }
    }
}

impl std::error::Error for BenchError {}
