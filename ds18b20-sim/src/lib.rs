#![no_std]
#![deny(missing_docs)]
//! # ds18b20-sim
//! A no-std emulation of the DS18x20 family of 1-Wire temperature sensors
//! (DS18S20, DS1822, DS18B20), built on the slave engines of [`onewire_slave`].
//!
//! [`Ds18b20`] implements [`OneWireSlave`](onewire_slave::OneWireSlave): a host
//! forwards line changes and timer expiries, and the device answers with
//! presence pulses, ROM commands (Search, Alarm Search, Read, Match, Skip) and
//! function commands (Convert T, Write/Read/Copy Scratchpad, Recall E²,
//! Read Power Supply). Readings come from any [`TemperatureSource`].
//!
//! Devices are configured with [`Ds18b20Builder`]:
//! ```ignore
//! let sensor = Ds18b20Builder::new(Family::Ds18b20)
//!     .with_id([0x9d, 0x87, 0x67, 0x99, 0xc4, 0xf7])
//!     .with_thresholds(30, 10)
//!     .build(Temperature::lit("21.5"))?;
//! ```

mod commands;
mod device;
mod error;
mod family;
mod rom;
mod scratchpad;
mod source;
pub use commands::{Command, Phase, Step, StepInput};
pub use device::{Ds18b20, Ds18b20Builder, Mode};
pub use error::Ds18b20Error;
pub use family::Family;
pub use rom::Rom;
pub use scratchpad::{
    Config, Eeprom, MAX_TEMPERATURE, MIN_TEMPERATURE, POWER_ON_TEMPERATURE, ReadoutResolution,
    SCRATCHPAD_LEN, Scratchpad, decode_temperature,
};
pub use source::{Temperature, TemperatureSource};
