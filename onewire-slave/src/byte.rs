//! Byte assembly on top of the signaling engine, least significant bit first.

use crate::{
    SlotError,
    signaling::SignalingContext,
    sm::{Code, StateTable},
};
use log::{debug, trace};

/// States of a byte engine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteState {
    /// Accumulating or emitting bits.
    Running,
    /// Not in use; bit notifications are unexpected.
    Done,
}

impl Code for ByteState {
    const COUNT: usize = 2;
    fn code(self) -> usize {
        self as usize
    }
}

/// Bit notifications a byte engine consumes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteInput {
    /// A master write slot was sampled.
    BitReceived,
    /// A master read slot was answered.
    BitSent,
}

impl Code for ByteInput {
    const COUNT: usize = 2;
    fn code(self) -> usize {
        self as usize
    }
}

/// Byte-level completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteEvent {
    /// Eight bits were received from the master.
    Received(Result<u8, SlotError>),
    /// Eight bits were sent to the master.
    Sent(Result<u8, SlotError>),
}

/// Assembly state of one byte engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteContext {
    state: ByteState,
    index: u8,
    byte: u8,
}

impl Default for ByteContext {
    fn default() -> Self {
        Self {
            state: ByteState::Done,
            index: 0,
            byte: 0,
        }
    }
}

impl ByteContext {
    /// Current state.
    pub fn state(&self) -> ByteState {
        self.state
    }

    /// Index of the next bit, `0..8`.
    pub fn index(&self) -> u8 {
        self.index
    }

    fn restart(&mut self, byte: u8) {
        self.state = ByteState::Running;
        self.index = 0;
        self.byte = byte;
    }

    fn abort(&mut self) {
        self.state = ByteState::Done;
        self.index = 0;
        self.byte = 0;
    }

    fn current_bit(&self) -> bool {
        (self.byte >> self.index) & 1 != 0
    }
}

type ByteHandler =
    fn(&mut ByteContext, &mut SignalingContext, Result<bool, SlotError>) -> Option<ByteEvent>;

type ByteTable = StateTable<ByteState, ByteInput, ByteHandler, 2, 2>;

fn push(
    table: &ByteTable,
    ctx: &mut ByteContext,
    sig: &mut SignalingContext,
    input: ByteInput,
    bit: Result<bool, SlotError>,
) -> Option<ByteEvent> {
    table.push(
        ctx.state,
        input,
        (ctx, sig),
        |handler, (ctx, sig)| handler(ctx, sig, bit),
        |(ctx, _)| {
            ctx.abort();
            None
        },
    )
}

/// Receives one byte through eight master write slots.
pub struct ByteReceiver {
    ctx: ByteContext,
    table: ByteTable,
}

impl Default for ByteReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteReceiver {
    /// Creates an idle receiver.
    pub fn new() -> Self {
        Self {
            ctx: ByteContext::default(),
            table: ByteTable::new("byte-rx").on(
                ByteState::Running,
                ByteInput::BitReceived,
                on_bit_received,
            ),
        }
    }

    /// Assembly state.
    pub fn context(&self) -> &ByteContext {
        &self.ctx
    }

    /// Starts receiving a byte; the master writes next.
    pub fn start(&mut self, sig: &mut SignalingContext) {
        self.ctx.restart(0);
        sig.expect_master_write();
    }

    /// Takes the receiver out of use.
    pub fn abort(&mut self) {
        self.ctx.abort();
    }

    /// Feeds one received bit. Returns the byte once eight bits are in.
    ///
    /// After a completed byte the receiver stays running from bit 0, so
    /// consecutive bytes need no restart.
    pub fn on_bit_received(
        &mut self,
        sig: &mut SignalingContext,
        bit: Result<bool, SlotError>,
    ) -> Option<ByteEvent> {
        push(&self.table, &mut self.ctx, sig, ByteInput::BitReceived, bit)
    }
}

fn on_bit_received(
    ctx: &mut ByteContext,
    _sig: &mut SignalingContext,
    bit: Result<bool, SlotError>,
) -> Option<ByteEvent> {
    let bit = match bit {
        Ok(bit) => bit,
        Err(e) => {
            debug!("byte-rx: {e} at bit {}", ctx.index);
            ctx.abort();
            return Some(ByteEvent::Received(Err(e)));
        }
    };
    ctx.byte |= (bit as u8) << ctx.index;
    ctx.index += 1;
    if ctx.index < 8 {
        return None;
    }
    let byte = ctx.byte;
    trace!("byte-rx: 0x{byte:02x}");
    ctx.restart(0);
    Some(ByteEvent::Received(Ok(byte)))
}

/// Sends one byte through eight master read slots.
pub struct ByteSender {
    ctx: ByteContext,
    table: ByteTable,
}

impl Default for ByteSender {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSender {
    /// Creates an idle sender.
    pub fn new() -> Self {
        Self {
            ctx: ByteContext::default(),
            table: ByteTable::new("byte-tx").on(ByteState::Running, ByteInput::BitSent, on_bit_sent),
        }
    }

    /// Emission state.
    pub fn context(&self) -> &ByteContext {
        &self.ctx
    }

    /// Starts sending `byte`; the master reads next.
    pub fn start(&mut self, sig: &mut SignalingContext, byte: u8) {
        self.ctx.restart(byte);
        sig.expect_master_read(self.ctx.current_bit());
    }

    /// Takes the sender out of use.
    pub fn abort(&mut self) {
        self.ctx.abort();
    }

    /// Notes one answered read slot and publishes the following bit.
    /// Returns the byte once all eight bits went out.
    pub fn on_bit_sent(
        &mut self,
        sig: &mut SignalingContext,
        bit: Result<bool, SlotError>,
    ) -> Option<ByteEvent> {
        push(&self.table, &mut self.ctx, sig, ByteInput::BitSent, bit)
    }
}

fn on_bit_sent(
    ctx: &mut ByteContext,
    sig: &mut SignalingContext,
    bit: Result<bool, SlotError>,
) -> Option<ByteEvent> {
    if let Err(e) = bit {
        debug!("byte-tx: {e} at bit {}", ctx.index);
        ctx.abort();
        return Some(ByteEvent::Sent(Err(e)));
    }
    ctx.index += 1;
    if ctx.index < 8 {
        sig.set_bit(ctx.current_bit());
        return None;
    }
    let byte = ctx.byte;
    trace!("byte-tx: 0x{byte:02x}");
    ctx.restart(0);
    Some(ByteEvent::Sent(Ok(byte)))
}
