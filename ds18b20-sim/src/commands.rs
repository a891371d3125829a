//! ROM and function command dispatch, and the sub-state-machines that carry
//! out each command.

use crate::{TemperatureSource, device::Core};
use onewire_slave::{
    Code, OneWireHost, StateTable, Violation,
    consts::{
        DS18X20_COPY_SCRATCH, DS18X20_READ_POWERMODE, DS18X20_READ_SCRATCH, DS18X20_RECALL_EEPROM,
        DS18X20_START_CONV, DS18X20_WRITE_SCRATCH, ONEWIRE_CONDITIONAL_SEARCH_CMD,
        ONEWIRE_MATCH_ROM_CMD, ONEWIRE_READ_ROM_CMD, ONEWIRE_SEARCH_CMD, ONEWIRE_SKIP_ROM_CMD,
    },
};

/// Every command byte a DS18x20 understands.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Search ROM (`0xF0`).
    SearchRom,
    /// Read ROM (`0x33`).
    ReadRom,
    /// Match ROM (`0x55`).
    MatchRom,
    /// Skip ROM (`0xCC`).
    SkipRom,
    /// Alarm Search (`0xEC`).
    AlarmSearch,
    /// Convert T (`0x44`).
    ConvertT,
    /// Write Scratchpad (`0x4E`).
    WriteScratchpad,
    /// Read Scratchpad (`0xBE`).
    ReadScratchpad,
    /// Copy Scratchpad (`0x48`).
    CopyScratchpad,
    /// Recall E² (`0xB8`).
    RecallEeprom,
    /// Read Power Supply (`0xB4`).
    ReadPowerSupply,
}

impl Code for Command {
    const COUNT: usize = 11;
    fn code(self) -> usize {
        self as usize
    }
}

impl Command {
    /// The byte on the wire.
    pub const fn opcode(self) -> u8 {
        use Command::*;
        match self {
            SearchRom => ONEWIRE_SEARCH_CMD,
            ReadRom => ONEWIRE_READ_ROM_CMD,
            MatchRom => ONEWIRE_MATCH_ROM_CMD,
            SkipRom => ONEWIRE_SKIP_ROM_CMD,
            AlarmSearch => ONEWIRE_CONDITIONAL_SEARCH_CMD,
            ConvertT => DS18X20_START_CONV,
            WriteScratchpad => DS18X20_WRITE_SCRATCH,
            ReadScratchpad => DS18X20_READ_SCRATCH,
            CopyScratchpad => DS18X20_COPY_SCRATCH,
            RecallEeprom => DS18X20_RECALL_EEPROM,
            ReadPowerSupply => DS18X20_READ_POWERMODE,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Command::*;
        Ok(match value {
            ONEWIRE_SEARCH_CMD => SearchRom,
            ONEWIRE_READ_ROM_CMD => ReadRom,
            ONEWIRE_MATCH_ROM_CMD => MatchRom,
            ONEWIRE_SKIP_ROM_CMD => SkipRom,
            ONEWIRE_CONDITIONAL_SEARCH_CMD => AlarmSearch,
            DS18X20_START_CONV => ConvertT,
            DS18X20_WRITE_SCRATCH => WriteScratchpad,
            DS18X20_READ_SCRATCH => ReadScratchpad,
            DS18X20_COPY_SCRATCH => CopyScratchpad,
            DS18X20_RECALL_EEPROM => RecallEeprom,
            DS18X20_READ_POWERMODE => ReadPowerSupply,
            other => return Err(other),
        })
    }
}

/// Where the device is in a transaction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a reset.
    Idle,
    /// Reset done, the next byte is a ROM command.
    RomCommand,
    /// Device addressed, the next byte is a function command.
    FunctionCommand,
    /// A command sub-state-machine is running.
    Executing,
}

impl Code for Phase {
    const COUNT: usize = 4;
    fn code(self) -> usize {
        self as usize
    }
}

/// States of the command sub-state-machines.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Search: sending the ROM bit.
    SearchSendBit,
    /// Search: sending its complement.
    SearchSendComplement,
    /// Search: receiving the direction chosen by the master.
    SearchReceiveBit,
    /// Match ROM: receiving and comparing one ROM bit.
    MatchReceiveBit,
    /// Write Scratchpad: receiving TH, TL, CONFIG.
    WriteScratchpadReceiveByte,
    /// Read ROM / Read Scratchpad: sending bytes.
    TransmitSendByte,
    /// Sending a single power or completion status bit.
    PowerSendBit,
}

impl Code for Step {
    const COUNT: usize = 7;
    fn code(self) -> usize {
        self as usize
    }
}

/// Completions a sub-state-machine reacts to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepInput {
    /// One bit sent in bit mode.
    BitSent,
    /// One bit received in bit mode.
    BitReceived,
    /// One byte sent in byte mode.
    ByteSent,
    /// One byte received in byte mode.
    ByteReceived,
}

impl Code for StepInput {
    const COUNT: usize = 4;
    fn code(self) -> usize {
        self as usize
    }
}

/// Byte source of a transmitting command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Rom,
    Scratchpad,
}

/// The active command and its private state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Search { step: Step, index: usize, alarm: bool },
    Match { index: usize },
    WriteScratchpad { index: usize },
    Transmit { source: Source, index: usize },
    PowerStatus,
}

impl Op {
    pub(crate) fn step(&self) -> Step {
        match self {
            Op::Search { step, .. } => *step,
            Op::Match { .. } => Step::MatchReceiveBit,
            Op::WriteScratchpad { .. } => Step::WriteScratchpadReceiveByte,
            Op::Transmit { .. } => Step::TransmitSendByte,
            Op::PowerStatus => Step::PowerSendBit,
        }
    }
}

const ROM_BITS: usize = 64;

pub(crate) type DispatchHandler<T> = fn(&mut Core<T>, &mut dyn OneWireHost);

pub(crate) type DispatchTable<T> = StateTable<Phase, Command, DispatchHandler<T>, 4, 11>;

pub(crate) type StepHandler<T> = fn(&mut Core<T>, &mut dyn OneWireHost, u8);

pub(crate) type StepTable<T> = StateTable<Step, StepInput, StepHandler<T>, 7, 4>;

pub(crate) fn dispatch_table<T: TemperatureSource>() -> DispatchTable<T> {
    use Command::*;
    use Phase::*;
    DispatchTable::new("dispatch")
        .on(RomCommand, SearchRom, on_search_rom::<T>)
        .on(RomCommand, AlarmSearch, on_alarm_search::<T>)
        .on(RomCommand, ReadRom, on_read_rom::<T>)
        .on(RomCommand, MatchRom, on_match_rom::<T>)
        .on(RomCommand, SkipRom, on_skip_rom::<T>)
        .on(FunctionCommand, ConvertT, on_convert::<T>)
        .on(FunctionCommand, WriteScratchpad, on_write_scratchpad::<T>)
        .on(FunctionCommand, ReadScratchpad, on_read_scratchpad::<T>)
        .on(FunctionCommand, CopyScratchpad, on_copy_scratchpad::<T>)
        .on(FunctionCommand, RecallEeprom, on_recall::<T>)
        .on(FunctionCommand, ReadPowerSupply, on_read_power::<T>)
}

pub(crate) fn step_table<T: TemperatureSource>() -> StepTable<T> {
    use Step::*;
    use StepInput::*;
    StepTable::new("command")
        .on(SearchSendBit, BitSent, on_search_bit_sent::<T>)
        .on(SearchSendComplement, BitSent, on_search_complement_sent::<T>)
        .on(SearchReceiveBit, BitReceived, on_search_direction::<T>)
        .on(MatchReceiveBit, BitReceived, on_match_bit::<T>)
        .on(WriteScratchpadReceiveByte, ByteReceived, on_scratchpad_byte::<T>)
        .on(TransmitSendByte, ByteSent, on_byte_sent::<T>)
        .on(PowerSendBit, BitSent, on_status_sent::<T>)
}

// --------------- ROM commands ---------------

fn on_search_rom<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    start_search(core, false);
}

fn on_alarm_search<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    start_search(core, true);
}

fn start_search<T: TemperatureSource>(core: &mut Core<T>, alarm: bool) {
    core.run(Op::Search {
        step: Step::SearchSendBit,
        index: 0,
        alarm,
    });
    core.send_bit(core.rom.bit(0));
}

fn on_read_rom<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    core.run(Op::Transmit {
        source: Source::Rom,
        index: 0,
    });
    core.send_byte(core.rom.bytes()[0]);
}

fn on_match_rom<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    core.run(Op::Match { index: 0 });
    core.receive_bit();
}

fn on_skip_rom<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    core.await_command(Phase::FunctionCommand);
}

// --------------- function commands ---------------

fn on_convert<T: TemperatureSource>(core: &mut Core<T>, host: &mut dyn OneWireHost) {
    core.convert(host.now_ns());
    // a parasite-powered sensor is busy converting and cannot answer
    if core.parasite {
        core.finish(host);
    } else {
        core.send_status(true);
    }
}

fn on_write_scratchpad<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    core.run(Op::WriteScratchpad { index: 0 });
    core.receive_byte();
}

fn on_read_scratchpad<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    core.run(Op::Transmit {
        source: Source::Scratchpad,
        index: 0,
    });
    core.send_byte(core.scratchpad.bytes()[0]);
}

fn on_copy_scratchpad<T: TemperatureSource>(core: &mut Core<T>, host: &mut dyn OneWireHost) {
    core.eeprom = core.scratchpad.to_eeprom();
    log::debug!("ds18x20: EEPROM <- {:?}", core.eeprom);
    if core.parasite {
        core.finish(host);
    } else {
        core.send_status(true);
    }
}

fn on_recall<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    core.scratchpad.recall(&core.eeprom);
    core.send_status(true);
}

fn on_read_power<T: TemperatureSource>(core: &mut Core<T>, _host: &mut dyn OneWireHost) {
    core.send_status(!core.parasite);
}

// --------------- sub-state-machines ---------------

fn on_search_bit_sent<T: TemperatureSource>(core: &mut Core<T>, host: &mut dyn OneWireHost, _: u8) {
    let Some(Op::Search { index, alarm, .. }) = core.op else {
        return core.violation(host, Violation::UnexpectedTransition);
    };
    core.op = Some(Op::Search {
        step: Step::SearchSendComplement,
        index,
        alarm,
    });
    core.send_bit(!core.rom.bit(index));
}

fn on_search_complement_sent<T: TemperatureSource>(
    core: &mut Core<T>,
    host: &mut dyn OneWireHost,
    _: u8,
) {
    let Some(Op::Search { index, alarm, .. }) = core.op else {
        return core.violation(host, Violation::UnexpectedTransition);
    };
    core.op = Some(Op::Search {
        step: Step::SearchReceiveBit,
        index,
        alarm,
    });
    core.receive_bit();
}

fn on_search_direction<T: TemperatureSource>(
    core: &mut Core<T>,
    host: &mut dyn OneWireHost,
    bit: u8,
) {
    let Some(Op::Search { index, alarm, .. }) = core.op else {
        return core.violation(host, Violation::UnexpectedTransition);
    };
    // alarm gating happens once the first triple is through
    if alarm && index == 0 && !core.alarm {
        return core.violation(host, Violation::AlarmGated);
    }
    if (bit != 0) != core.rom.bit(index) {
        return core.violation(host, Violation::IdentityMismatch);
    }
    let index = index + 1;
    if index == ROM_BITS {
        log::debug!("ds18x20: search complete for {}", core.rom);
        return core.finish(host);
    }
    core.op = Some(Op::Search {
        step: Step::SearchSendBit,
        index,
        alarm,
    });
    core.send_bit(core.rom.bit(index));
}

fn on_match_bit<T: TemperatureSource>(core: &mut Core<T>, host: &mut dyn OneWireHost, bit: u8) {
    let Some(Op::Match { index }) = core.op else {
        return core.violation(host, Violation::UnexpectedTransition);
    };
    if (bit != 0) != core.rom.bit(index) {
        return core.violation(host, Violation::IdentityMismatch);
    }
    if index + 1 == ROM_BITS {
        core.await_command(Phase::FunctionCommand);
    } else {
        core.op = Some(Op::Match { index: index + 1 });
    }
}

fn on_scratchpad_byte<T: TemperatureSource>(
    core: &mut Core<T>,
    host: &mut dyn OneWireHost,
    byte: u8,
) {
    let Some(Op::WriteScratchpad { index }) = core.op else {
        return core.violation(host, Violation::UnexpectedTransition);
    };
    core.scratchpad.write(index, byte);
    if index + 1 >= core.family.write_len() {
        log::debug!("ds18x20: scratchpad {:02x?}", core.scratchpad.bytes());
        core.finish(host);
    } else {
        core.op = Some(Op::WriteScratchpad { index: index + 1 });
    }
}

fn on_byte_sent<T: TemperatureSource>(core: &mut Core<T>, host: &mut dyn OneWireHost, _: u8) {
    let Some(Op::Transmit { source, index }) = core.op else {
        return core.violation(host, Violation::UnexpectedTransition);
    };
    let index = index + 1;
    let next = match source {
        Source::Rom => core.rom.bytes().get(index),
        Source::Scratchpad => core.scratchpad.bytes().get(index),
    };
    match next.copied() {
        Some(byte) => {
            core.op = Some(Op::Transmit { source, index });
            core.send_byte(byte);
        }
        None => core.finish(host),
    }
}

fn on_status_sent<T: TemperatureSource>(core: &mut Core<T>, host: &mut dyn OneWireHost, _: u8) {
    core.finish(host);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ds18b20, Ds18b20Builder, Family, Temperature};
    use onewire_slave::{Drive, Level, TimerId};

    /// Host that keeps the clock still and ignores the line.
    struct Quiet;

    impl OneWireHost for Quiet {
        fn now_ns(&self) -> u64 {
            0
        }
        fn drive(&mut self, _: Drive) {}
        fn sample(&self) -> Level {
            Level::High
        }
        fn arm(&mut self, _: TimerId, _: u32) {}
        fn cancel(&mut self, _: TimerId) {}
    }

    fn sensor(family: Family, parasite: bool) -> Ds18b20<Temperature> {
        Ds18b20Builder::new(family)
            .with_id([1, 2, 3, 4, 5, 6])
            .with_parasite_power(parasite)
            .build(Temperature::lit("21.5"))
            .unwrap()
    }

    fn assert_idle(dev: &Ds18b20<Temperature>) {
        assert_eq!(dev.core.phase, Phase::Idle);
        assert_eq!(dev.core.op, None);
    }

    #[test]
    fn opcodes_round_trip() {
        use Command::*;
        for command in [
            SearchRom,
            ReadRom,
            MatchRom,
            SkipRom,
            AlarmSearch,
            ConvertT,
            WriteScratchpad,
            ReadScratchpad,
            CopyScratchpad,
            RecallEeprom,
            ReadPowerSupply,
        ] {
            assert_eq!(Command::try_from(command.opcode()), Ok(command));
        }
        assert_eq!(Command::try_from(0x69), Err(0x69));
    }

    #[test]
    fn ops_map_to_steps() {
        let op = Op::Search {
            step: Step::SearchReceiveBit,
            index: 3,
            alarm: false,
        };
        assert_eq!(op.step(), Step::SearchReceiveBit);
        assert_eq!(Op::Match { index: 0 }.step(), Step::MatchReceiveBit);
        assert_eq!(Op::PowerStatus.step(), Step::PowerSendBit);
    }

    #[test]
    fn search_walks_send_complement_receive() {
        let mut dev = sensor(Family::Ds18b20, false);
        let core = &mut dev.core;
        start_search(core, false);
        assert_eq!(core.op.map(|op| op.step()), Some(Step::SearchSendBit));
        assert_eq!(core.signaling.context().bit(), core.rom.bit(0));

        on_search_bit_sent(core, &mut Quiet, 0);
        assert_eq!(core.op.map(|op| op.step()), Some(Step::SearchSendComplement));
        assert_eq!(core.signaling.context().bit(), !core.rom.bit(0));

        on_search_complement_sent(core, &mut Quiet, 0);
        assert_eq!(core.op.map(|op| op.step()), Some(Step::SearchReceiveBit));

        let bit = core.rom.bit(0) as u8;
        on_search_direction(core, &mut Quiet, bit);
        assert_eq!(
            core.op,
            Some(Op::Search {
                step: Step::SearchSendBit,
                index: 1,
                alarm: false,
            })
        );
        assert_eq!(core.signaling.context().bit(), core.rom.bit(1));

        // the master took the other branch
        on_search_bit_sent(core, &mut Quiet, 0);
        on_search_complement_sent(core, &mut Quiet, 0);
        let other = !core.rom.bit(1) as u8;
        on_search_direction(core, &mut Quiet, other);
        assert_idle(&dev);
    }

    #[test]
    fn alarm_search_needs_alarm_after_first_triple() {
        for alarm in [false, true] {
            let mut dev = sensor(Family::Ds18b20, false);
            let core = &mut dev.core;
            core.alarm = alarm;
            start_search(core, true);
            on_search_bit_sent(core, &mut Quiet, 0);
            on_search_complement_sent(core, &mut Quiet, 0);
            let bit = core.rom.bit(0) as u8;
            on_search_direction(core, &mut Quiet, bit);
            if alarm {
                assert_eq!(core.op.map(|op| op.step()), Some(Step::SearchSendBit));
                assert_eq!(core.phase, Phase::Executing);
            } else {
                assert_idle(&dev);
            }
        }
    }

    #[test]
    fn match_counts_all_64_bits() {
        let mut dev = sensor(Family::Ds18b20, false);
        let core = &mut dev.core;
        on_match_rom(core, &mut Quiet);
        for index in 0..ROM_BITS {
            assert_eq!(core.op, Some(Op::Match { index }));
            assert_eq!(core.phase, Phase::Executing);
            let bit = core.rom.bit(index) as u8;
            on_match_bit(core, &mut Quiet, bit);
        }
        assert_eq!(core.phase, Phase::FunctionCommand);
        assert_eq!(core.op, None);
    }

    #[test]
    fn read_rom_transmits_eight_bytes() {
        let mut dev = sensor(Family::Ds1822, false);
        let core = &mut dev.core;
        on_read_rom(core, &mut Quiet);
        for index in 0..8 {
            assert_eq!(
                core.op,
                Some(Op::Transmit {
                    source: Source::Rom,
                    index,
                })
            );
            on_byte_sent(core, &mut Quiet, 0);
        }
        assert_idle(&dev);
    }

    #[test]
    fn write_scratchpad_length_follows_family() {
        for (family, len) in [
            (Family::Ds18s20, 2),
            (Family::Ds1822, 3),
            (Family::Ds18b20, 3),
        ] {
            assert_eq!(family.write_len(), len);
            let mut dev = sensor(family, false);
            let core = &mut dev.core;
            on_write_scratchpad(core, &mut Quiet);
            for index in 0..len {
                assert_eq!(core.op, Some(Op::WriteScratchpad { index }), "{family:?}");
                assert_eq!(core.phase, Phase::Executing);
                on_scratchpad_byte(core, &mut Quiet, 0x11 * (index as u8 + 1));
            }
            assert_idle(&dev);
            assert_eq!(dev.core.scratchpad.bytes()[2], 0x11);
            assert_eq!(dev.core.scratchpad.bytes()[3], 0x22);
        }
    }

    #[test]
    fn unknown_function_opcode_goes_idle() {
        let mut dev = sensor(Family::Ds18b20, false);
        dev.core.await_command(Phase::FunctionCommand);
        dev.dispatch_command(&mut Quiet, 0x69);
        assert_idle(&dev);

        // a ROM command is not a function command either
        dev.core.await_command(Phase::FunctionCommand);
        dev.dispatch_command(&mut Quiet, Command::SearchRom.opcode());
        assert_idle(&dev);

        dev.core.await_command(Phase::FunctionCommand);
        dev.dispatch_command(&mut Quiet, Command::ReadScratchpad.opcode());
        assert_eq!(dev.core.phase, Phase::Executing);
    }

    #[test]
    fn function_opcode_rejected_as_rom_command() {
        let mut dev = sensor(Family::Ds18b20, false);
        dev.core.await_command(Phase::RomCommand);
        dev.dispatch_command(&mut Quiet, Command::ConvertT.opcode());
        assert_idle(&dev);
    }

    #[test]
    fn status_bits_follow_power_mode() {
        for parasite in [false, true] {
            let mut dev = sensor(Family::Ds18b20, parasite);
            let core = &mut dev.core;

            on_read_power(core, &mut Quiet);
            assert_eq!(core.op, Some(Op::PowerStatus));
            assert_eq!(core.signaling.context().bit(), !parasite);
            on_status_sent(core, &mut Quiet, 0);
            assert_eq!(core.phase, Phase::Idle);

            on_recall(core, &mut Quiet);
            assert_eq!(core.op, Some(Op::PowerStatus));
            assert!(core.signaling.context().bit());
            on_status_sent(core, &mut Quiet, 0);
            assert_eq!(core.phase, Phase::Idle);

            on_convert(core, &mut Quiet);
            if parasite {
                assert_eq!(core.op, None);
            } else {
                assert_eq!(core.op, Some(Op::PowerStatus));
                assert!(core.signaling.context().bit());
            }

            core.clear_command();
            on_copy_scratchpad(core, &mut Quiet);
            if parasite {
                assert_eq!(core.op, None);
            } else {
                assert_eq!(core.op, Some(Op::PowerStatus));
                assert!(core.signaling.context().bit());
            }
        }
    }
}
