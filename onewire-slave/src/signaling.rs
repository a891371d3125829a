//! Bit-level 1-Wire slave signaling: reset/presence, master write slots and
//! master read slots, plus the forced-reset watchdog.

use crate::{
    Drive, Level, OneWireHost, SlotError, TimerId, Violation,
    consts::{
        PR_DUR_BUS_JITTER_NS, PR_DUR_FORCED_RESET, PR_DUR_READ_INIT, PR_DUR_READ_SLOT,
        PR_DUR_RESET, PR_DUR_RESET_MASTER_RELEASE, PR_DUR_RESET_PULL_PRESENCE,
        PR_DUR_RESET_SLOT_END, PR_DUR_SAMPLE_WAIT, PR_DUR_WRITE_SLOT_END,
    },
    sm::{Code, StateTable},
};
use log::{debug, trace};

/// States of the signaling machine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// Idle, waiting for the master to pull the line low.
    ResetInit,
    /// Master holds the reset pulse.
    ResetWaitRelease,
    /// Master released; waiting before the presence pulse.
    ResetWaitPresence,
    /// Driving the presence pulse.
    ResetPullPresence,
    /// Presence released; reset slot ends on release or timeout.
    ResetDone,
    /// Waiting for the master to open a write slot.
    MasterWriteInit,
    /// Write slot open, waiting for the sample point.
    MasterWriteWaitSample,
    /// Bit sampled, waiting for the end of the slot.
    MasterWriteSlotEnd,
    /// Slot ended with the line still low; waiting for the release.
    MasterWriteDone,
    /// Waiting for the master to open a read slot.
    MasterReadInit,
    /// Read slot open, waiting before driving the bit.
    MasterReadWaitSample,
    /// Holding a `0` on the line.
    MasterReadSlotEnd,
    /// Bit delivered, waiting for the line to return high.
    MasterReadDone,
}

impl Code for SignalState {
    const COUNT: usize = 13;
    fn code(self) -> usize {
        self as usize
    }
}

/// Stimuli the signaling machine reacts to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalInput {
    /// Line level changed.
    LineChange,
    /// The slot timer expired.
    SlotTimer,
    /// The forced-reset watchdog expired.
    WatchdogTimer,
}

impl Code for SignalInput {
    const COUNT: usize = 3;
    fn code(self) -> usize {
        self as usize
    }
}

/// Notifications raised to the owner of the signaling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// A complete reset/presence cycle finished; the master writes next.
    ResetComplete,
    /// The watchdog saw the line low for too long.
    ForcedReset,
    /// The device sampled one master write slot.
    BitReceived(Result<bool, SlotError>),
    /// The device answered one master read slot.
    BitSent(Result<bool, SlotError>),
}

/// Mutable state of one bus endpoint.
#[derive(Debug, Clone)]
pub struct SignalingContext {
    state: SignalState,
    bit: bool,
    reset_time: u64,
    slot_start: u64,
    reset_timer_fired: bool,
}

impl Default for SignalingContext {
    fn default() -> Self {
        Self {
            state: SignalState::ResetInit,
            bit: false,
            reset_time: 0,
            slot_start: 0,
            reset_timer_fired: false,
        }
    }
}

impl SignalingContext {
    /// Current state.
    pub fn state(&self) -> SignalState {
        self.state
    }

    /// Pending bit: the next bit to send, or the last bit sampled.
    pub fn bit(&self) -> bool {
        self.bit
    }

    /// Replace the pending bit without changing state.
    pub fn set_bit(&mut self, bit: bool) {
        self.bit = bit;
    }

    /// Expect the master to write the next bit.
    pub fn expect_master_write(&mut self) {
        self.state = SignalState::MasterWriteInit;
    }

    /// Expect the master to read the next bit, answering with `bit`.
    pub fn expect_master_read(&mut self, bit: bool) {
        self.bit = bit;
        self.state = SignalState::MasterReadInit;
    }

    /// Back to [`SignalState::ResetInit`]: line released, both timers disarmed.
    pub fn reset(&mut self, host: &mut dyn OneWireHost) {
        trace!("signaling: resetting state from {:?}", self.state);
        *self = Self::default();
        host.drive(Drive::Release);
        host.cancel(TimerId::Slot);
        host.cancel(TimerId::Watchdog);
    }

    fn violation(&mut self, host: &mut dyn OneWireHost, violation: Violation) {
        debug!("signaling: {} in {:?}, resetting", violation, self.state);
        self.reset(host);
    }
}

fn micros(us: u32) -> u64 {
    us as u64 * 1_000
}

fn elapsed_us(host: &dyn OneWireHost, since: u64) -> u32 {
    (host.now_ns().saturating_sub(since) / 1_000) as u32
}

/// `true` when less than `nominal_us` (minus the jitter allowance) passed since `start`.
fn too_early(host: &dyn OneWireHost, start: u64, nominal_us: u32) -> bool {
    host.now_ns() + PR_DUR_BUS_JITTER_NS < start + micros(nominal_us)
}

type SignalHandler =
    fn(&mut SignalingContext, &mut dyn OneWireHost, Level) -> Option<SignalEvent>;

type SignalTable = StateTable<SignalState, SignalInput, SignalHandler, 13, 3>;

/// The signaling state machine of one bus endpoint.
pub struct SignalingEngine {
    ctx: SignalingContext,
    table: SignalTable,
}

impl Default for SignalingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingEngine {
    /// Creates an engine in [`SignalState::ResetInit`].
    pub fn new() -> Self {
        Self {
            ctx: SignalingContext::default(),
            table: signal_table(),
        }
    }

    /// Signaling context.
    pub fn context(&self) -> &SignalingContext {
        &self.ctx
    }

    /// Mutable signaling context, for the layers that steer the next slot.
    pub fn context_mut(&mut self) -> &mut SignalingContext {
        &mut self.ctx
    }

    /// Current state.
    pub fn state(&self) -> SignalState {
        self.ctx.state
    }

    /// Restart the protocol.
    pub fn reset(&mut self, host: &mut dyn OneWireHost) {
        self.ctx.reset(host);
    }

    /// Handle a line change.
    ///
    /// Every transition disarms the watchdog, and every transition to low
    /// re-arms it, whichever state is active.
    pub fn on_line_change(
        &mut self,
        host: &mut dyn OneWireHost,
        level: Level,
    ) -> Option<SignalEvent> {
        host.cancel(TimerId::Watchdog);
        if level == Level::Low {
            host.arm(TimerId::Watchdog, PR_DUR_FORCED_RESET);
        }
        self.push(host, SignalInput::LineChange, level)
    }

    /// Handle a timer expiry.
    pub fn on_timer_expired(
        &mut self,
        host: &mut dyn OneWireHost,
        timer: TimerId,
    ) -> Option<SignalEvent> {
        let input = match timer {
            TimerId::Slot => SignalInput::SlotTimer,
            TimerId::Watchdog => SignalInput::WatchdogTimer,
        };
        let level = host.sample();
        self.push(host, input, level)
    }

    fn push(
        &mut self,
        host: &mut dyn OneWireHost,
        input: SignalInput,
        level: Level,
    ) -> Option<SignalEvent> {
        let violation = match input {
            SignalInput::LineChange => Violation::UnexpectedTransition,
            _ => Violation::UnexpectedExpiry,
        };
        self.table.push(
            self.ctx.state,
            input,
            (&mut self.ctx, host),
            |handler, (ctx, host)| handler(ctx, host, level),
            |(ctx, host)| {
                ctx.violation(host, violation);
                None
            },
        )
    }
}

fn signal_table() -> SignalTable {
    use SignalInput::*;
    use SignalState::*;
    SignalTable::new("signaling")
        .on(ResetInit, LineChange, on_reset_init_line)
        .on(ResetInit, WatchdogTimer, on_ignored)
        .on(ResetWaitRelease, LineChange, on_reset_wait_release_line)
        .on(ResetWaitRelease, SlotTimer, on_reset_wait_release_timer)
        .on(ResetWaitRelease, WatchdogTimer, on_ignored)
        .on(ResetWaitPresence, LineChange, on_ignored)
        .on(ResetWaitPresence, SlotTimer, on_reset_wait_presence_timer)
        .on(ResetWaitPresence, WatchdogTimer, on_forced_reset)
        .on(ResetPullPresence, LineChange, on_ignored)
        .on(ResetPullPresence, SlotTimer, on_reset_pull_presence_timer)
        .on(ResetPullPresence, WatchdogTimer, on_forced_reset)
        .on(ResetDone, LineChange, on_reset_done_line)
        .on(ResetDone, SlotTimer, on_reset_done_timer)
        .on(ResetDone, WatchdogTimer, on_forced_reset)
        .on(MasterWriteInit, LineChange, on_write_init_line)
        .on(MasterWriteInit, WatchdogTimer, on_forced_reset)
        .on(MasterWriteWaitSample, LineChange, on_write_wait_sample_line)
        .on(MasterWriteWaitSample, SlotTimer, on_write_wait_sample_timer)
        .on(MasterWriteWaitSample, WatchdogTimer, on_forced_reset)
        .on(MasterWriteSlotEnd, LineChange, on_write_slot_end_line)
        .on(MasterWriteSlotEnd, SlotTimer, on_write_slot_end_timer)
        .on(MasterWriteSlotEnd, WatchdogTimer, on_forced_reset)
        .on(MasterWriteDone, LineChange, on_write_done_line)
        .on(MasterWriteDone, WatchdogTimer, on_forced_reset)
        .on(MasterReadInit, LineChange, on_read_init_line)
        .on(MasterReadInit, WatchdogTimer, on_forced_reset)
        .on(MasterReadWaitSample, LineChange, on_read_wait_sample_line)
        .on(MasterReadWaitSample, SlotTimer, on_read_wait_sample_timer)
        .on(MasterReadWaitSample, WatchdogTimer, on_forced_reset)
        .on(MasterReadSlotEnd, LineChange, on_read_slot_end_line)
        .on(MasterReadSlotEnd, SlotTimer, on_read_slot_end_timer)
        .on(MasterReadSlotEnd, WatchdogTimer, on_forced_reset)
        .on(MasterReadDone, LineChange, on_read_done_line)
        .on(MasterReadDone, WatchdogTimer, on_forced_reset)
}

fn on_ignored(
    ctx: &mut SignalingContext,
    _host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    trace!("signaling: ignoring event in {:?} (line {:?})", ctx.state, level);
    None
}

// The watchdog wins over whatever slot was in progress: the line has been
// low for longer than any slot, so the master is resetting the bus. The
// low edge already happened, so the reset resumes at the release wait.
fn on_forced_reset(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    _level: Level,
) -> Option<SignalEvent> {
    debug!("signaling: forced reset detected in {:?}", ctx.state);
    ctx.reset(host);
    ctx.state = SignalState::ResetWaitRelease;
    ctx.reset_time = host.now_ns().saturating_sub(micros(PR_DUR_FORCED_RESET));
    ctx.reset_timer_fired = true;
    Some(SignalEvent::ForcedReset)
}

// --------------- reset ---------------

fn on_reset_init_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::High {
        trace!("signaling: L->H while idle, ignoring");
        return None;
    }
    ctx.reset_time = host.now_ns();
    ctx.reset_timer_fired = false;
    host.arm(TimerId::Slot, PR_DUR_RESET);
    ctx.state = SignalState::ResetWaitRelease;
    None
}

fn on_reset_wait_release_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        trace!("signaling: H->L while waiting for reset release, ignoring");
        return None;
    }
    host.cancel(TimerId::Slot);
    if !ctx.reset_timer_fired && too_early(host, ctx.reset_time, PR_DUR_RESET) {
        debug!(
            "signaling: reset released after {}us",
            elapsed_us(host, ctx.reset_time)
        );
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    ctx.state = SignalState::ResetWaitPresence;
    host.arm(TimerId::Slot, PR_DUR_RESET_MASTER_RELEASE);
    None
}

fn on_reset_wait_release_timer(
    ctx: &mut SignalingContext,
    _host: &mut dyn OneWireHost,
    _level: Level,
) -> Option<SignalEvent> {
    ctx.reset_timer_fired = true;
    None
}

fn on_reset_wait_presence_timer(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    _level: Level,
) -> Option<SignalEvent> {
    ctx.state = SignalState::ResetPullPresence;
    host.drive(Drive::Low);
    host.arm(TimerId::Slot, PR_DUR_RESET_PULL_PRESENCE);
    None
}

fn on_reset_pull_presence_timer(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    _level: Level,
) -> Option<SignalEvent> {
    host.drive(Drive::Release);
    ctx.state = SignalState::ResetDone;
    host.arm(TimerId::Slot, PR_DUR_RESET_SLOT_END);
    None
}

fn on_reset_done_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    host.cancel(TimerId::Slot);
    reset_complete(ctx)
}

fn on_reset_done_timer(
    ctx: &mut SignalingContext,
    _host: &mut dyn OneWireHost,
    _level: Level,
) -> Option<SignalEvent> {
    reset_complete(ctx)
}

// the master writes the first command; the owner may steer elsewhere
fn reset_complete(ctx: &mut SignalingContext) -> Option<SignalEvent> {
    ctx.state = SignalState::MasterWriteInit;
    Some(SignalEvent::ResetComplete)
}

// --------------- master write slot ---------------

fn on_write_init_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::High {
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    ctx.state = SignalState::MasterWriteWaitSample;
    ctx.slot_start = host.now_ns();
    host.arm(TimerId::Slot, PR_DUR_SAMPLE_WAIT);
    None
}

fn on_write_wait_sample_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    // master releasing early: a `1` is being written
    None
}

fn on_write_wait_sample_timer(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    ctx.bit = level.is_high();
    host.arm(TimerId::Slot, PR_DUR_WRITE_SLOT_END - PR_DUR_SAMPLE_WAIT);
    ctx.state = SignalState::MasterWriteSlotEnd;
    None
}

fn on_write_slot_end_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        ctx.violation(host, Violation::UnexpectedTransition);
    }
    None
}

fn on_write_slot_end_timer(
    ctx: &mut SignalingContext,
    _host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        ctx.state = SignalState::MasterWriteDone;
        return None;
    }
    ctx.state = SignalState::MasterWriteInit;
    Some(SignalEvent::BitReceived(Ok(ctx.bit)))
}

fn on_write_done_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    ctx.state = SignalState::MasterWriteInit;
    Some(SignalEvent::BitReceived(Ok(ctx.bit)))
}

// --------------- master read slot ---------------

fn on_read_init_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::High {
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    ctx.state = SignalState::MasterReadWaitSample;
    ctx.slot_start = host.now_ns();
    host.arm(TimerId::Slot, PR_DUR_READ_INIT);
    None
}

fn drive_bit(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if !ctx.bit {
        host.drive(Drive::Low);
        let remaining = PR_DUR_READ_SLOT.saturating_sub(elapsed_us(host, ctx.slot_start));
        host.arm(TimerId::Slot, remaining.max(1));
        ctx.state = SignalState::MasterReadSlotEnd;
        return None;
    }
    if level == Level::High {
        // master already let go, nothing more will happen in this slot
        ctx.state = SignalState::MasterReadInit;
        return Some(SignalEvent::BitSent(Ok(true)));
    }
    ctx.state = SignalState::MasterReadDone;
    None
}

fn on_read_wait_sample_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    host.cancel(TimerId::Slot);
    drive_bit(ctx, host, level)
}

fn on_read_wait_sample_timer(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    drive_bit(ctx, host, level)
}

fn on_read_slot_end_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level.is_high() != ctx.bit {
        ctx.violation(host, Violation::UnexpectedTransition);
    }
    None
}

fn on_read_slot_end_timer(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    _level: Level,
) -> Option<SignalEvent> {
    ctx.state = SignalState::MasterReadDone;
    if !ctx.bit {
        host.drive(Drive::Release);
    }
    None
}

fn on_read_done_line(
    ctx: &mut SignalingContext,
    host: &mut dyn OneWireHost,
    level: Level,
) -> Option<SignalEvent> {
    if level == Level::Low {
        ctx.violation(host, Violation::UnexpectedTransition);
        return None;
    }
    ctx.state = SignalState::MasterReadInit;
    Some(SignalEvent::BitSent(Ok(ctx.bit)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Host double: the test sets the line level and the clock, the engine
    /// leaves a record of what it drove and armed.
    #[derive(Debug, Default)]
    pub(crate) struct MockHost {
        pub now: u64,
        pub level: Option<Level>,
        pub driven: Option<Drive>,
        pub slot: Option<u32>,
        pub watchdog: Option<u32>,
    }

    impl MockHost {
        pub fn at_us(&mut self, us: u64) -> &mut Self {
            self.now = us * 1_000;
            self
        }
    }

    impl OneWireHost for MockHost {
        fn now_ns(&self) -> u64 {
            self.now
        }
        fn drive(&mut self, drive: Drive) {
            self.driven = Some(drive);
        }
        fn sample(&self) -> Level {
            self.level.unwrap_or(Level::High)
        }
        fn arm(&mut self, timer: TimerId, micros: u32) {
            match timer {
                TimerId::Slot => self.slot = Some(micros),
                TimerId::Watchdog => self.watchdog = Some(micros),
            }
        }
        fn cancel(&mut self, timer: TimerId) {
            match timer {
                TimerId::Slot => self.slot = None,
                TimerId::Watchdog => self.watchdog = None,
            }
        }
    }

    fn line(sig: &mut SignalingEngine, host: &mut MockHost, level: Level) -> Option<SignalEvent> {
        host.level = Some(level);
        sig.on_line_change(host, level)
    }

    fn slot(sig: &mut SignalingEngine, host: &mut MockHost) -> Option<SignalEvent> {
        host.slot = None;
        sig.on_timer_expired(host, TimerId::Slot)
    }

    /// Runs a complete reset cycle starting at t = 0.
    pub(crate) fn complete_reset(sig: &mut SignalingEngine, host: &mut MockHost) {
        host.at_us(0);
        line(sig, host, Level::Low);
        host.at_us(480);
        slot(sig, host);
        host.at_us(490);
        line(sig, host, Level::High);
        host.at_us(520);
        slot(sig, host);
        line(sig, host, Level::Low);
        host.at_us(640);
        slot(sig, host);
        assert_eq!(line(sig, host, Level::High), Some(SignalEvent::ResetComplete));
    }

    #[test]
    fn valid_reset_drives_presence() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        host.at_us(0);
        assert_eq!(line(&mut sig, &mut host, Level::Low), None);
        assert_eq!(sig.state(), SignalState::ResetWaitRelease);
        assert_eq!(host.slot, Some(PR_DUR_RESET));
        assert_eq!(host.watchdog, Some(PR_DUR_FORCED_RESET));

        host.at_us(480);
        assert_eq!(slot(&mut sig, &mut host), None);
        host.at_us(500);
        line(&mut sig, &mut host, Level::High);
        assert_eq!(sig.state(), SignalState::ResetWaitPresence);
        assert_eq!(host.slot, Some(PR_DUR_RESET_MASTER_RELEASE));
        assert_eq!(host.watchdog, None);

        host.at_us(530);
        slot(&mut sig, &mut host);
        assert_eq!(sig.state(), SignalState::ResetPullPresence);
        assert_eq!(host.driven, Some(Drive::Low));
        assert_eq!(host.slot, Some(PR_DUR_RESET_PULL_PRESENCE));

        host.at_us(650);
        slot(&mut sig, &mut host);
        assert_eq!(sig.state(), SignalState::ResetDone);
        assert_eq!(host.driven, Some(Drive::Release));
        assert_eq!(host.slot, Some(PR_DUR_RESET_SLOT_END));

        // no echo of the release: the end-of-slot timer completes the reset
        host.at_us(979);
        assert_eq!(slot(&mut sig, &mut host), Some(SignalEvent::ResetComplete));
        assert_eq!(sig.state(), SignalState::MasterWriteInit);
    }

    #[test]
    fn release_echo_completes_reset_and_disarms_slot() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);
        assert_eq!(sig.state(), SignalState::MasterWriteInit);
        assert_eq!(host.slot, None);
        assert_eq!(host.watchdog, None);
    }

    #[test]
    fn early_release_returns_to_reset_init() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        host.at_us(0);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(400);
        line(&mut sig, &mut host, Level::High);
        assert_eq!(sig.state(), SignalState::ResetInit);
        assert_eq!(host.slot, None);
        assert_eq!(host.watchdog, None);
        assert_eq!(host.driven, Some(Drive::Release));
    }

    #[test]
    fn release_within_jitter_is_accepted() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        host.at_us(10);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(489);
        line(&mut sig, &mut host, Level::High);
        assert_eq!(sig.state(), SignalState::ResetWaitPresence);
    }

    #[test]
    fn write_one_slot() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);

        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        assert_eq!(host.slot, Some(PR_DUR_SAMPLE_WAIT));
        host.at_us(1006);
        assert_eq!(line(&mut sig, &mut host, Level::High), None);
        host.at_us(1015);
        assert_eq!(slot(&mut sig, &mut host), None);
        assert_eq!(sig.state(), SignalState::MasterWriteSlotEnd);
        host.at_us(1045);
        assert_eq!(
            slot(&mut sig, &mut host),
            Some(SignalEvent::BitReceived(Ok(true)))
        );
        assert_eq!(sig.state(), SignalState::MasterWriteInit);
    }

    #[test]
    fn write_zero_slot() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);

        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(1015);
        slot(&mut sig, &mut host);
        host.at_us(1045);
        assert_eq!(slot(&mut sig, &mut host), None);
        assert_eq!(sig.state(), SignalState::MasterWriteDone);
        host.at_us(1060);
        assert_eq!(
            line(&mut sig, &mut host, Level::High),
            Some(SignalEvent::BitReceived(Ok(false)))
        );
    }

    #[test]
    fn read_zero_slot() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);
        sig.context_mut().expect_master_read(false);

        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        assert_eq!(host.slot, Some(PR_DUR_READ_INIT));
        host.at_us(1001);
        slot(&mut sig, &mut host);
        assert_eq!(host.driven, Some(Drive::Low));
        assert_eq!(host.slot, Some(PR_DUR_READ_SLOT - 1));
        assert_eq!(sig.state(), SignalState::MasterReadSlotEnd);
        host.at_us(1015);
        slot(&mut sig, &mut host);
        assert_eq!(host.driven, Some(Drive::Release));
        assert_eq!(
            line(&mut sig, &mut host, Level::High),
            Some(SignalEvent::BitSent(Ok(false)))
        );
        assert_eq!(sig.state(), SignalState::MasterReadInit);
    }

    #[test]
    fn read_one_slot() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);
        sig.context_mut().expect_master_read(true);

        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(1001);
        slot(&mut sig, &mut host);
        assert_eq!(sig.state(), SignalState::MasterReadDone);
        host.at_us(1003);
        assert_eq!(
            line(&mut sig, &mut host, Level::High),
            Some(SignalEvent::BitSent(Ok(true)))
        );
    }

    #[test]
    fn read_one_with_early_master_release() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);
        sig.context_mut().expect_master_read(true);

        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        assert_eq!(
            line(&mut sig, &mut host, Level::High),
            Some(SignalEvent::BitSent(Ok(true)))
        );
        assert_eq!(host.slot, None);
    }

    #[test]
    fn watchdog_forces_reset_mid_slot() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);

        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(1015);
        slot(&mut sig, &mut host);
        host.at_us(1045);
        slot(&mut sig, &mut host);
        assert_eq!(sig.state(), SignalState::MasterWriteDone);

        host.at_us(1485);
        host.watchdog = None;
        assert_eq!(
            sig.on_timer_expired(&mut host, TimerId::Watchdog),
            Some(SignalEvent::ForcedReset)
        );
        assert_eq!(sig.state(), SignalState::ResetWaitRelease);

        // the release that ends the forced reset is accepted straight away
        host.at_us(1500);
        line(&mut sig, &mut host, Level::High);
        assert_eq!(sig.state(), SignalState::ResetWaitPresence);
    }

    #[test]
    fn watchdog_ignored_while_master_holds_reset() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        host.at_us(0);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(480);
        slot(&mut sig, &mut host);
        host.at_us(485);
        host.watchdog = None;
        assert_eq!(sig.on_timer_expired(&mut host, TimerId::Watchdog), None);
        assert_eq!(sig.state(), SignalState::ResetWaitRelease);
        assert_eq!(host.driven, None);

        host.at_us(600);
        line(&mut sig, &mut host, Level::High);
        assert_eq!(sig.state(), SignalState::ResetWaitPresence);
        host.at_us(630);
        slot(&mut sig, &mut host);
        assert_eq!(sig.state(), SignalState::ResetPullPresence);
        assert_eq!(host.driven, Some(Drive::Low));
    }

    #[test]
    fn watchdog_during_read_zero_releases_and_resets() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);
        sig.context_mut().expect_master_read(false);

        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(1001);
        slot(&mut sig, &mut host);
        assert_eq!(sig.state(), SignalState::MasterReadSlotEnd);
        assert_eq!(host.driven, Some(Drive::Low));

        host.at_us(1485);
        host.watchdog = None;
        assert_eq!(
            sig.on_timer_expired(&mut host, TimerId::Watchdog),
            Some(SignalEvent::ForcedReset)
        );
        assert_eq!(sig.state(), SignalState::ResetWaitRelease);
        assert_eq!(host.driven, Some(Drive::Release));
        assert_eq!(host.slot, None);
    }

    #[test]
    fn unexpected_slot_timer_resets() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);
        host.at_us(2000);
        assert_eq!(slot(&mut sig, &mut host), None);
        assert_eq!(sig.state(), SignalState::ResetInit);
    }

    #[test]
    fn low_while_holding_a_one_resets() {
        let mut sig = SignalingEngine::new();
        let mut host = MockHost::default();
        complete_reset(&mut sig, &mut host);
        host.at_us(1000);
        line(&mut sig, &mut host, Level::Low);
        host.at_us(1005);
        line(&mut sig, &mut host, Level::Low);
        assert_eq!(sig.state(), SignalState::ResetInit);
    }
}
