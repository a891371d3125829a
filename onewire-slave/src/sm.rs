//! Table-driven `(state, event) -> handler` routing shared by every state
//! machine of the slave.

use core::{fmt::Debug, marker::PhantomData};

/// A densely enumerated state or event.
pub trait Code: Copy + Debug {
    /// Number of distinct values.
    const COUNT: usize;

    /// Index of this value in `0..COUNT`.
    fn code(self) -> usize;
}

/// Routing table of one state machine.
///
/// Every `(state, event)` pair owns one cell of a `NS x NE` array, so keys
/// never collide. The table is filled once when the owning machine is
/// built and is read-only afterwards; handlers change the machine's current
/// state, the table never does.
pub struct StateTable<S, E, H, const NS: usize, const NE: usize> {
    name: &'static str,
    entries: [[Option<H>; NE]; NS],
    _codes: PhantomData<(S, E)>,
}

impl<S: Code, E: Code, H: Copy, const NS: usize, const NE: usize> StateTable<S, E, H, NS, NE> {
    /// Creates an empty table.
    pub fn new(name: &'static str) -> Self {
        debug_assert!(S::COUNT == NS && E::COUNT == NE, "table dimensions do not match codes");
        Self {
            name,
            entries: [[None; NE]; NS],
            _codes: PhantomData,
        }
    }

    /// Registers `handler` for `event` arriving in `state`.
    pub fn on(mut self, state: S, event: E, handler: H) -> Self {
        self.entries[state.code()][event.code()] = Some(handler);
        self
    }

    /// Name of the machine, used in traces.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Handler registered for the pair, if any.
    pub fn handler(&self, state: S, event: E) -> Option<H> {
        self.entries
            .get(state.code())
            .and_then(|row| row.get(event.code()))
            .copied()
            .flatten()
    }

    /// Routes `event` arriving in `state`.
    ///
    /// Calls `invoke` with the registered handler and `ctx`. When the pair is
    /// unhandled, calls `reset` with `ctx` instead and nothing else: any
    /// unexpected event aborts the current operation.
    pub fn push<C, T>(
        &self,
        state: S,
        event: E,
        ctx: C,
        invoke: impl FnOnce(H, C) -> T,
        reset: impl FnOnce(C) -> T,
    ) -> T {
        match self.handler(state, event) {
            Some(handler) => {
                log::trace!("{}: {:?}[{:?}]", self.name, state, event);
                invoke(handler, ctx)
            }
            None => {
                log::debug!(
                    "{}: unhandled event {:?} in state {:?}, resetting",
                    self.name,
                    event,
                    state
                );
                reset(ctx)
            }
        }
    }
}
