//! Discrete-event host for emulated slaves.
//!
//! The host owns a virtual clock, the bus line and every slave attached to
//! it. Each slave gets its own pair of one-shot timers and its own drive
//! state; the line is the wired-AND of the master and all slaves, pulled up
//! when nobody drives it. Edges are queued and delivered one at a time after
//! the stimulus that caused them returns.

use crate::BenchError;
use log::trace;
use onewire_slave::{Drive, Level, OneWireHost, OneWireSlave, TimerId};
use std::collections::VecDeque;

/// Events one call may process before the bus is declared runaway.
pub(crate) const EVENT_LIMIT: usize = 100_000;

/// Order of a timer expiry and a master edge scheduled for the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Timers due at the instant of a master edge fire before it.
    #[default]
    TimersFirst,
    /// The master edge is delivered first; timers due at that instant fire after it.
    LineFirst,
}

/// Who caused a line edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// The bus master.
    Master,
    /// The slave at this index.
    Slave(usize),
}

/// One recorded edge of the bus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Simulated time of the edge (ns).
    pub at_ns: u64,
    /// Level after the edge.
    pub level: Level,
    /// Participant whose drive change caused the edge.
    pub by: Driver,
}

#[derive(Debug, Default)]
struct Port {
    low: bool,
    slot: Option<u64>,
    watchdog: Option<u64>,
}

impl Port {
    fn timer(&mut self, timer: TimerId) -> &mut Option<u64> {
        match timer {
            TimerId::Slot => &mut self.slot,
            TimerId::Watchdog => &mut self.watchdog,
        }
    }
}

/// What one slave sees of the bus while it handles a stimulus.
struct PortHost<'a> {
    now: u64,
    others_low: bool,
    port: &'a mut Port,
}

impl OneWireHost for PortHost<'_> {
    fn now_ns(&self) -> u64 {
        self.now
    }

    fn drive(&mut self, drive: Drive) {
        self.port.low = drive == Drive::Low;
    }

    fn sample(&self) -> Level {
        Level::from(!(self.others_low || self.port.low))
    }

    fn arm(&mut self, timer: TimerId, micros: u32) {
        *self.port.timer(timer) = Some(self.now + micros as u64 * 1_000);
    }

    fn cancel(&mut self, timer: TimerId) {
        *self.port.timer(timer) = None;
    }
}

/// Simulated 1-Wire bus with its slaves.
pub struct SimHost<S> {
    now: u64,
    master_low: bool,
    level: Level,
    slaves: Vec<S>,
    ports: Vec<Port>,
    pending: VecDeque<(usize, Level)>,
    tie_break: TieBreak,
    trace: Option<Vec<Edge>>,
    fault: Option<BenchError>,
}

impl<S> Default for SimHost<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SimHost<S> {
    /// An idle bus at time zero with nothing attached.
    pub fn new() -> Self {
        Self {
            now: 0,
            master_low: false,
            level: Level::High,
            slaves: Vec::new(),
            ports: Vec::new(),
            pending: VecDeque::new(),
            tie_break: TieBreak::default(),
            trace: None,
            fault: None,
        }
    }

    /// Set how simultaneous timer expiries and master edges are ordered.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Record every line edge.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    /// Takes the error a [`SimDelay`](crate::SimDelay) ran into, if any.
    pub fn take_fault(&mut self) -> Option<BenchError> {
        self.fault.take()
    }

    /// Keeps the first error until someone takes it.
    pub(crate) fn latch_fault(&mut self, fault: BenchError) {
        self.fault.get_or_insert(fault);
    }

    /// Current simulated time (ns).
    pub fn now_ns(&self) -> u64 {
        self.now
    }

    /// Current line level.
    pub fn level(&self) -> Level {
        Level::from(!(self.master_low || self.ports.iter().any(|p| p.low)))
    }

    /// Ordering rule in effect.
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Recorded edges, oldest first. Empty unless tracing was enabled.
    pub fn trace(&self) -> &[Edge] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Forget the recorded edges.
    pub fn clear_trace(&mut self) {
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
    }

    /// Attached slaves, in attachment order.
    pub fn slaves(&self) -> &[S] {
        &self.slaves
    }

    /// Slave at `index`.
    pub fn slave(&self, index: usize) -> Option<&S> {
        self.slaves.get(index)
    }

    /// Mutable slave at `index`.
    pub fn slave_mut(&mut self, index: usize) -> Option<&mut S> {
        self.slaves.get_mut(index)
    }

    /// Deadline of a timer of the slave at `index`, if armed.
    pub fn armed(&self, index: usize, timer: TimerId) -> Option<u64> {
        let port = self.ports.get(index)?;
        match timer {
            TimerId::Slot => port.slot,
            TimerId::Watchdog => port.watchdog,
        }
    }

    fn record(&mut self, by: Driver) {
        let level = self.level();
        if level == self.level {
            return;
        }
        self.level = level;
        trace!("bus: {:?} at {} ns by {:?}", level, self.now, by);
        if let Some(trace) = &mut self.trace {
            trace.push(Edge {
                at_ns: self.now,
                level,
                by,
            });
        }
        self.pending.extend((0..self.ports.len()).map(|index| (index, level)));
    }

    fn next_timer(&self, until_ns: u64) -> Option<(usize, TimerId, u64)> {
        let inclusive = self.tie_break == TieBreak::TimersFirst;
        self.ports
            .iter()
            .enumerate()
            .flat_map(|(index, port)| {
                [
                    (index, TimerId::Slot, port.slot),
                    (index, TimerId::Watchdog, port.watchdog),
                ]
            })
            .filter_map(|(index, timer, at)| at.map(|at| (index, timer, at)))
            .filter(|&(_, _, at)| if inclusive { at <= until_ns } else { at < until_ns })
            .min_by_key(|&(_, _, at)| at)
    }

    fn spend(&self, budget: &mut usize) -> Result<(), BenchError> {
        *budget = budget
            .checked_sub(1)
            .ok_or(BenchError::EventLimit { at_ns: self.now })?;
        Ok(())
    }
}

impl<S: OneWireSlave> SimHost<S> {
    /// Attach a slave, power it on, and return its index.
    pub fn attach(&mut self, slave: S) -> Result<usize, BenchError> {
        self.slaves.push(slave);
        self.ports.push(Port::default());
        let index = self.slaves.len() - 1;
        self.stimulate(index, |slave, host| slave.power_on(host));
        let mut budget = EVENT_LIMIT;
        self.deliver(&mut budget)?;
        Ok(index)
    }

    /// Pull the line low (`true`) or release it (`false`) from the master side.
    pub fn set_master(&mut self, low: bool) -> Result<(), BenchError> {
        if self.master_low == low {
            return Ok(());
        }
        self.master_low = low;
        self.record(Driver::Master);
        let mut budget = EVENT_LIMIT;
        self.deliver(&mut budget)
    }

    /// Run the bus up to `until_ns`, firing due timers in order.
    ///
    /// A timer that expires exactly at `until_ns` fires now under
    /// [`TieBreak::TimersFirst`] and on the next call under
    /// [`TieBreak::LineFirst`].
    pub fn advance_to(&mut self, until_ns: u64) -> Result<(), BenchError> {
        let mut budget = EVENT_LIMIT;
        self.deliver(&mut budget)?;
        while let Some((index, timer, at)) = self.next_timer(until_ns) {
            self.spend(&mut budget)?;
            self.now = self.now.max(at);
            *self.ports[index].timer(timer) = None;
            self.stimulate(index, |slave, host| slave.on_timer_expired(host, timer));
            self.deliver(&mut budget)?;
        }
        self.now = self.now.max(until_ns);
        Ok(())
    }

    /// Run the bus for `micros` microseconds.
    pub fn advance_us(&mut self, micros: u32) -> Result<(), BenchError> {
        self.advance_to(self.now + micros as u64 * 1_000)
    }

    /// Run the bus for `nanos` nanoseconds.
    pub fn advance_ns(&mut self, nanos: u64) -> Result<(), BenchError> {
        self.advance_to(self.now + nanos)
    }

    fn stimulate(&mut self, index: usize, f: impl FnOnce(&mut S, &mut dyn OneWireHost)) {
        let others_low = self.master_low
            || self
                .ports
                .iter()
                .enumerate()
                .any(|(i, port)| i != index && port.low);
        let mut host = PortHost {
            now: self.now,
            others_low,
            port: &mut self.ports[index],
        };
        f(&mut self.slaves[index], &mut host);
        self.record(Driver::Slave(index));
    }

    fn deliver(&mut self, budget: &mut usize) -> Result<(), BenchError> {
        while let Some((index, level)) = self.pending.pop_front() {
            self.spend(budget)?;
            self.stimulate(index, |slave, host| slave.on_line_change(host, level));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Slave that echoes every low edge with a 10 µs pulse of its own.
    #[derive(Default)]
    struct Stretcher {
        seen: Vec<(u64, Level)>,
        fired: Vec<(u64, TimerId)>,
    }

    impl OneWireSlave for Stretcher {
        fn power_on(&mut self, host: &mut dyn OneWireHost) {
            host.drive(Drive::Release);
        }

        fn on_line_change(&mut self, host: &mut dyn OneWireHost, level: Level) {
            self.seen.push((host.now_ns(), level));
            if level == Level::Low && self.fired.is_empty() {
                host.arm(TimerId::Slot, 10);
            }
        }

        fn on_timer_expired(&mut self, host: &mut dyn OneWireHost, timer: TimerId) {
            self.fired.push((host.now_ns(), timer));
            match timer {
                TimerId::Slot => {
                    host.drive(Drive::Low);
                    host.arm(TimerId::Watchdog, 10);
                }
                TimerId::Watchdog => host.drive(Drive::Release),
            }
        }
    }

    #[test]
    fn wired_and_and_trace() {
        let mut bus = SimHost::new().with_trace();
        bus.attach(Stretcher::default()).unwrap();
        bus.set_master(true).unwrap();
        bus.advance_us(5).unwrap();
        bus.set_master(false).unwrap();
        assert_eq!(bus.level(), Level::High);
        bus.advance_us(30).unwrap();
        let trace: Vec<_> = bus.trace().iter().map(|e| (e.at_ns, e.level, e.by)).collect();
        assert_eq!(
            trace,
            vec![
                (0, Level::Low, Driver::Master),
                (5_000, Level::High, Driver::Master),
                (10_000, Level::Low, Driver::Slave(0)),
                (20_000, Level::High, Driver::Slave(0)),
            ]
        );
        // the slave hears its own edges too
        assert_eq!(bus.slave(0).unwrap().seen.len(), 4);
    }

    #[test]
    fn master_low_masks_slave_release() {
        let mut bus = SimHost::new().with_trace();
        bus.attach(Stretcher::default()).unwrap();
        bus.set_master(true).unwrap();
        bus.advance_us(15).unwrap();
        // slave pulled at 10 µs while the line was already low
        assert_eq!(bus.trace().len(), 1);
        bus.advance_us(10).unwrap();
        assert_eq!(bus.level(), Level::Low);
        bus.set_master(false).unwrap();
        assert_eq!(bus.level(), Level::High);
    }

    #[test]
    fn tie_break_orders_simultaneous_events() {
        for (tie_break, fired_before_edge) in [(TieBreak::TimersFirst, 1), (TieBreak::LineFirst, 0)] {
            let mut bus = SimHost::new().with_tie_break(tie_break);
            bus.attach(Stretcher::default()).unwrap();
            bus.set_master(true).unwrap();
            bus.advance_us(10).unwrap();
            assert_eq!(bus.slave(0).unwrap().fired.len(), fired_before_edge);
            bus.set_master(false).unwrap();
            bus.advance_us(1).unwrap();
            assert_eq!(bus.slave(0).unwrap().fired.len(), 1);
            assert_eq!(bus.slave(0).unwrap().fired[0], (10_000, TimerId::Slot));
        }
    }

    /// Slave that re-arms a zero-length chain forever.
    struct Spinner;

    impl OneWireSlave for Spinner {
        fn power_on(&mut self, _host: &mut dyn OneWireHost) {}

        fn on_line_change(&mut self, host: &mut dyn OneWireHost, level: Level) {
            let drive = if level == Level::Low { Drive::Release } else { Drive::Low };
            host.drive(drive);
        }

        fn on_timer_expired(&mut self, _host: &mut dyn OneWireHost, _timer: TimerId) {}
    }

    #[test]
    fn oscillating_slave_hits_event_limit() {
        let mut bus = SimHost::new();
        bus.attach(Spinner).unwrap();
        bus.set_master(true).unwrap();
        assert_eq!(
            bus.set_master(false),
            Err(BenchError::EventLimit { at_ns: 0 })
        );
    }
}
