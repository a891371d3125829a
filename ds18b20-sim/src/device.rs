use crate::{
    Ds18b20Error, Family, ReadoutResolution, Rom, Scratchpad, TemperatureSource,
    commands::{
        Command, DispatchTable, Op, Phase, Step, StepInput, StepTable, dispatch_table, step_table,
    },
    scratchpad::{Config, Eeprom},
};
use log::{debug, trace};
use onewire_slave::{
    ByteEvent, ByteReceiver, ByteSender, Level, OneWireHost, OneWireSlave, SignalEvent,
    SignalState, SignalingEngine, SlotError, TimerId, Violation,
};

/// How bit notifications from the signaling engine are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Bits go to the active command one at a time.
    Bit,
    /// Bits are assembled into bytes first.
    Byte,
}

/// Everything command handlers may touch.
pub(crate) struct Core<T> {
    pub(crate) family: Family,
    pub(crate) rom: Rom,
    pub(crate) parasite: bool,
    pub(crate) source: T,
    pub(crate) eeprom: Eeprom,
    pub(crate) scratchpad: Scratchpad,
    pub(crate) alarm: bool,
    pub(crate) signaling: SignalingEngine,
    pub(crate) rx: ByteReceiver,
    pub(crate) tx: ByteSender,
    pub(crate) mode: Mode,
    pub(crate) phase: Phase,
    pub(crate) op: Option<Op>,
}

impl<T: TemperatureSource> Core<T> {
    /// Drops the command layer without touching the bus.
    pub(crate) fn clear_command(&mut self) {
        self.phase = Phase::Idle;
        self.op = None;
        self.mode = Mode::Byte;
        self.rx.abort();
        self.tx.abort();
    }

    /// Back to idle: command layer dropped, signaling restarted.
    pub(crate) fn idle(&mut self, host: &mut dyn OneWireHost) {
        self.clear_command();
        self.signaling.reset(host);
    }

    pub(crate) fn violation(&mut self, host: &mut dyn OneWireHost, violation: Violation) {
        debug!(
            "ds18x20 {}: {} in {:?} ({:?}), back to idle",
            self.rom, violation, self.phase, self.op
        );
        self.idle(host);
    }

    pub(crate) fn finish(&mut self, host: &mut dyn OneWireHost) {
        trace!("ds18x20 {}: {:?} complete", self.rom, self.op);
        self.idle(host);
    }

    /// Waits for a command byte.
    pub(crate) fn await_command(&mut self, phase: Phase) {
        self.phase = phase;
        self.op = None;
        self.tx.abort();
        self.receive_byte();
    }

    pub(crate) fn run(&mut self, op: Op) {
        self.phase = Phase::Executing;
        self.op = Some(op);
    }

    pub(crate) fn send_bit(&mut self, bit: bool) {
        self.mode = Mode::Bit;
        self.signaling.context_mut().expect_master_read(bit);
    }

    pub(crate) fn receive_bit(&mut self) {
        self.mode = Mode::Bit;
        self.signaling.context_mut().expect_master_write();
    }

    pub(crate) fn send_byte(&mut self, byte: u8) {
        self.mode = Mode::Byte;
        self.tx.start(self.signaling.context_mut(), byte);
    }

    pub(crate) fn receive_byte(&mut self) {
        self.mode = Mode::Byte;
        self.rx.start(self.signaling.context_mut());
    }

    pub(crate) fn send_status(&mut self, bit: bool) {
        self.run(Op::PowerStatus);
        self.send_bit(bit);
    }

    /// Samples the temperature source into the scratchpad and refreshes the alarm flag.
    pub(crate) fn convert(&mut self, now_ns: u64) {
        let temperature = self.source.temperature_at(now_ns);
        self.scratchpad.set_temperature(temperature);
        self.alarm = self.scratchpad.alarm();
        debug!(
            "ds18x20 {}: converted {} -> {} (alarm: {})",
            self.rom,
            temperature,
            self.scratchpad.temperature(),
            self.alarm
        );
    }
}

/// An emulated DS18x20 temperature sensor.
///
/// Feed it line changes and timer expiries through [`OneWireSlave`]; it
/// answers resets with a presence pulse and serves ROM and function
/// commands.
pub struct Ds18b20<T> {
    pub(crate) core: Core<T>,
    dispatch: DispatchTable<T>,
    steps: StepTable<T>,
}

impl<T: TemperatureSource> Ds18b20<T> {
    fn new(family: Family, rom: Rom, parasite: bool, eeprom: Eeprom, source: T) -> Self {
        let scratchpad = Scratchpad::new(family, &eeprom);
        let alarm = scratchpad.alarm();
        Self {
            core: Core {
                family,
                rom,
                parasite,
                source,
                eeprom,
                scratchpad,
                alarm,
                signaling: SignalingEngine::new(),
                rx: ByteReceiver::new(),
                tx: ByteSender::new(),
                mode: Mode::Byte,
                phase: Phase::Idle,
                op: None,
            },
            dispatch: dispatch_table(),
            steps: step_table(),
        }
    }

    /// Device family.
    pub fn family(&self) -> Family {
        self.core.family
    }

    /// ROM code.
    pub fn rom(&self) -> &Rom {
        &self.core.rom
    }

    /// `true` for a parasite-powered device.
    pub fn is_parasite(&self) -> bool {
        self.core.parasite
    }

    /// Scratchpad content.
    pub fn scratchpad(&self) -> &Scratchpad {
        &self.core.scratchpad
    }

    /// EEPROM content.
    pub fn eeprom(&self) -> &Eeprom {
        &self.core.eeprom
    }

    /// Alarm flag as of the last conversion.
    pub fn alarm(&self) -> bool {
        self.core.alarm
    }

    /// The temperature source.
    pub fn source(&self) -> &T {
        &self.core.source
    }

    /// Mutable access to the temperature source.
    pub fn source_mut(&mut self) -> &mut T {
        &mut self.core.source
    }

    /// Transaction phase.
    pub fn phase(&self) -> Phase {
        self.core.phase
    }

    /// State of the running command, if any.
    pub fn step(&self) -> Option<Step> {
        self.core.op.map(|op| op.step())
    }

    /// Bit or byte mode.
    pub fn mode(&self) -> Mode {
        self.core.mode
    }

    /// State of the signaling engine.
    pub fn signal_state(&self) -> SignalState {
        self.core.signaling.state()
    }

    fn on_signal(&mut self, host: &mut dyn OneWireHost, event: SignalEvent) {
        trace!("ds18x20 {}: {:?} in {:?} mode", self.core.rom, event, self.core.mode);
        match event {
            SignalEvent::ResetComplete => self.core.await_command(Phase::RomCommand),
            SignalEvent::ForcedReset => self.core.clear_command(),
            SignalEvent::BitReceived(bit) => match self.core.mode {
                Mode::Byte => {
                    let core = &mut self.core;
                    if let Some(event) = core.rx.on_bit_received(core.signaling.context_mut(), bit) {
                        self.on_byte(host, event);
                    }
                }
                Mode::Bit => self.on_bit(host, StepInput::BitReceived, bit),
            },
            SignalEvent::BitSent(bit) => match self.core.mode {
                Mode::Byte => {
                    let core = &mut self.core;
                    if let Some(event) = core.tx.on_bit_sent(core.signaling.context_mut(), bit) {
                        self.on_byte(host, event);
                    }
                }
                Mode::Bit => self.on_bit(host, StepInput::BitSent, bit),
            },
        }
    }

    fn on_bit(&mut self, host: &mut dyn OneWireHost, input: StepInput, bit: Result<bool, SlotError>) {
        match bit {
            Ok(bit) => self.step_command(host, input, bit as u8),
            Err(e) => self.core.violation(host, e.into()),
        }
    }

    fn on_byte(&mut self, host: &mut dyn OneWireHost, event: ByteEvent) {
        match event {
            ByteEvent::Received(Ok(byte)) if self.core.phase == Phase::Executing => {
                self.step_command(host, StepInput::ByteReceived, byte)
            }
            ByteEvent::Received(Ok(byte)) => self.dispatch_command(host, byte),
            ByteEvent::Sent(Ok(byte)) => self.step_command(host, StepInput::ByteSent, byte),
            ByteEvent::Received(Err(e)) | ByteEvent::Sent(Err(e)) => {
                self.core.violation(host, e.into())
            }
        }
    }

    pub(crate) fn dispatch_command(&mut self, host: &mut dyn OneWireHost, byte: u8) {
        let Ok(command) = Command::try_from(byte) else {
            debug!("ds18x20 {}: unknown command 0x{byte:02x}", self.core.rom);
            return self.core.violation(host, Violation::UnrecognizedCommand);
        };
        debug!("ds18x20 {}: {:?} in {:?}", self.core.rom, command, self.core.phase);
        self.dispatch.push(
            self.core.phase,
            command,
            (&mut self.core, host),
            |handler, (core, host)| handler(core, host),
            |(core, host)| core.violation(host, Violation::UnrecognizedCommand),
        );
    }

    fn step_command(&mut self, host: &mut dyn OneWireHost, input: StepInput, value: u8) {
        let Some(step) = self.step() else {
            return self.core.violation(host, Violation::UnexpectedTransition);
        };
        self.steps.push(
            step,
            input,
            (&mut self.core, host),
            |handler, (core, host)| handler(core, host, value),
            |(core, host)| core.violation(host, Violation::UnexpectedTransition),
        );
    }
}

impl<T: TemperatureSource> OneWireSlave for Ds18b20<T> {
    fn power_on(&mut self, host: &mut dyn OneWireHost) {
        let core = &mut self.core;
        core.scratchpad = Scratchpad::new(core.family, &core.eeprom);
        core.alarm = core.scratchpad.alarm();
        core.idle(host);
        debug!(
            "ds18x20 {}: powered on as {} ({} power)",
            core.rom,
            core.family,
            if core.parasite { "parasite" } else { "external" }
        );
    }

    fn on_line_change(&mut self, host: &mut dyn OneWireHost, level: Level) {
        if let Some(event) = self.core.signaling.on_line_change(host, level) {
            self.on_signal(host, event);
        }
    }

    fn on_timer_expired(&mut self, host: &mut dyn OneWireHost, timer: TimerId) {
        if let Some(event) = self.core.signaling.on_timer_expired(host, timer) {
            self.on_signal(host, event);
        }
    }
}

const DEFAULT_ID: [u8; 6] = [0x9d, 0x87, 0x67, 0x99, 0xc4, 0xf7];

/// Builder for creating a [`Ds18b20`] instance with custom configuration.
#[derive(Debug, Clone)]
pub struct Ds18b20Builder {
    family: Family,
    id: [u8; 6],
    rom: Option<Rom>,
    parasite: bool,
    eeprom: Eeprom,
}

impl Default for Ds18b20Builder {
    fn default() -> Self {
        Self::new(Family::Ds18b20)
    }
}

impl Ds18b20Builder {
    /// Starts a device of the given family with default ID and EEPROM.
    pub fn new(family: Family) -> Self {
        Self {
            family,
            id: DEFAULT_ID,
            rom: None,
            parasite: false,
            eeprom: Eeprom::default(),
        }
    }

    /// Starts a device from a complete ROM code, taking the family from it.
    pub fn from_rom(rom: Rom) -> Result<Self, Ds18b20Error> {
        let family = Family::try_from(rom.family_code())?;
        Ok(Self::new(family).with_rom(rom))
    }

    /// Sets the six ID bytes; the CRC is computed.
    pub fn with_id(mut self, id: [u8; 6]) -> Self {
        self.id = id;
        self.rom = None;
        self
    }

    /// Sets the complete ROM code.
    pub fn with_rom(mut self, rom: Rom) -> Self {
        self.rom = Some(rom);
        self
    }

    /// Selects parasite power instead of an external supply.
    pub fn with_parasite_power(mut self, parasite: bool) -> Self {
        self.parasite = parasite;
        self
    }

    /// Sets the alarm thresholds stored in EEPROM.
    pub fn with_thresholds(mut self, th: i8, tl: i8) -> Self {
        self.eeprom.th = th;
        self.eeprom.tl = tl;
        self
    }

    /// Sets the resolution stored in EEPROM. Ignored by DS18S20 devices.
    pub fn with_resolution(mut self, resolution: ReadoutResolution) -> Self {
        self.eeprom.config = Config::from(resolution);
        self
    }

    /// Replaces the whole EEPROM content.
    pub fn with_eeprom(mut self, eeprom: Eeprom) -> Self {
        self.eeprom = eeprom;
        self
    }

    /// Builds the device around `source`. The device is idle; the host
    /// should still call [`OneWireSlave::power_on`] before driving the line.
    pub fn build<T: TemperatureSource>(self, source: T) -> Result<Ds18b20<T>, Ds18b20Error> {
        let rom = self.rom.unwrap_or_else(|| Rom::new(self.family, self.id));
        if rom.family_code() != self.family.code() {
            return Err(Ds18b20Error::FamilyMismatch {
                expected: self.family.code(),
                found: rom.family_code(),
            });
        }
        let mut eeprom = self.eeprom;
        if !self.family.has_config() {
            eeprom.config = Config::new();
        }
        Ok(Ds18b20::new(self.family, rom, self.parasite, eeprom, source))
    }
}
