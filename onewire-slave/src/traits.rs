/// Sampled level of the 1-Wire line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Line pulled to ground by at least one participant.
    Low,
    /// Line released and held high by the pull-up.
    High,
}

impl Level {
    /// `true` for [`Level::High`].
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value { Level::High } else { Level::Low }
    }
}

impl From<Level> for bool {
    fn from(value: Level) -> Self {
        value.is_high()
    }
}

/// What a participant does with its end of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// Pull the line to ground.
    Low,
    /// Let go of the line; the pull-up takes it high unless someone else drives it.
    Release,
}

/// The two one-shot timers a slave may have armed at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    /// Drives the active protocol phase.
    Slot,
    /// Detects a sustained low level (forced reset).
    Watchdog,
}

/// Services a slave needs from the environment that hosts it.
///
/// The host owns the clock, the timers and the line. A slave receives the
/// host by reference with every stimulus and never keeps it.
///
/// Line changes caused by [`OneWireHost::drive`] must not be delivered back
/// into the slave while it is still handling the current stimulus; they are
/// queued and delivered afterwards, strictly one at a time.
pub trait OneWireHost {
    /// Monotonic time in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Drive the line low or release it.
    fn drive(&mut self, drive: Drive);

    /// Current level of the line.
    fn sample(&self) -> Level;

    /// Arm (or re-arm) a one-shot timer that expires `micros` from now.
    fn arm(&mut self, timer: TimerId, micros: u32);

    /// Disarm a timer. Disarming an idle timer does nothing.
    fn cancel(&mut self, timer: TimerId);
}

/// Inbound interface of an emulated 1-Wire slave.
pub trait OneWireSlave {
    /// Bring the slave to its idle state: line released, timers disarmed.
    fn power_on(&mut self, host: &mut dyn OneWireHost);

    /// The line changed to `level`.
    fn on_line_change(&mut self, host: &mut dyn OneWireHost, level: Level);

    /// A previously armed timer expired.
    fn on_timer_expired(&mut self, host: &mut dyn OneWireHost, timer: TimerId);
}
