#![no_std]
#![deny(missing_docs)]
//! # onewire-slave
//! A no-std implementation of the slave side of the 1-Wire protocol.
//!
//! The crate emulates a 1-Wire device one line transition at a time. A host
//! (an interrupt handler, a simulator) owns the line and two one-shot timers,
//! and forwards every level change and every timer expiry into the device
//! through the [OneWireSlave] trait. The device answers through the
//! [OneWireHost] it receives with each stimulus.
//!
//! Layers, bottom-up:
//! - [StateTable]: dense `(state, event) -> handler` routing; unhandled pairs reset.
//! - [SignalingEngine]: reset/presence detection, master write slots and
//!   master read slots at standard speed, with a watchdog for forced resets.
//! - [ByteReceiver] and [ByteSender]: assemble and emit bytes LSB-first.
//!
//! Command processing for a concrete device lives in the device crate.
//! [OneWireCrc] computes the Dallas/Maxim CRC-8 used by ROM codes and
//! scratchpads.

mod byte;
pub mod consts;
mod error;
mod signaling;
mod sm;
mod traits;
mod utils;
pub use byte::{ByteContext, ByteEvent, ByteInput, ByteReceiver, ByteSender, ByteState};
pub use error::{SlotError, Violation};
pub use signaling::{SignalEvent, SignalInput, SignalState, SignalingContext, SignalingEngine};
pub use sm::{Code, StateTable};
pub use traits::{Drive, Level, OneWireHost, OneWireSlave, TimerId};
pub use utils::OneWireCrc;
