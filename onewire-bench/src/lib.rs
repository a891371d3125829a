#![deny(missing_docs)]
//! # onewire-bench
//! A discrete-event 1-Wire bus for exercising emulated slaves without hardware.
//!
//! [`SimHost`] keeps a virtual clock, a wired-AND line and the timers of every
//! attached [`OneWireSlave`](onewire_slave::OneWireSlave). [`SimMaster`] drives
//! that line with standard-speed slots and implements the master-side
//! [`OneWire`] trait, so the usual master tooling runs unchanged on top of it:
//! the ROM search in [`OneWireSearch`], the [`Ds18x20Group`] sensor driver, and
//! [`SimDelay`] as the [`DelayNs`](embedded_hal::delay::DelayNs) that moves the
//! virtual clock. [`Waveform`] provides time-varying temperatures for the
//! emulated sensors.

mod delay;
mod driver;
mod error;
mod host;
mod master;
mod search;
mod traits;
mod waveform;

pub use delay::SimDelay;
pub use driver::{
    Ds18x20Group, copy_scratchpad, read_power_supply, read_rom, read_scratchpad, recall_eeprom,
    write_scratchpad,
};
pub use error::{BenchError, OneWireError, OneWireResult};
pub use host::{Driver, Edge, SimHost, TieBreak};
pub use master::{MasterTiming, ResetStatus, SimMaster};
pub use search::{OneWireSearch, OneWireSearchKind};
pub use traits::{OneWire, OneWireStatus};
pub use waveform::Waveform;
