use crate::{Family, Temperature};
use bitfield_struct::bitfield;
use onewire_slave::OneWireCrc;

/// Scratchpad length in bytes, CRC included.
pub const SCRATCHPAD_LEN: usize = 9;

pub(crate) const TEMP_LSB: usize = 0;
pub(crate) const TEMP_MSB: usize = 1;
pub(crate) const TH: usize = 2;
pub(crate) const TL: usize = 3;
pub(crate) const CONFIG: usize = 4;
pub(crate) const RESERVED: usize = 5;
pub(crate) const COUNT_REMAIN: usize = 6;
pub(crate) const COUNT_PER_C: usize = 7;
pub(crate) const CRC: usize = 8;

/// Temperature register content after power-up.
pub const POWER_ON_TEMPERATURE: Temperature = Temperature::from_bits(85 << 4);

/// Lowest temperature the sensor reports.
pub const MIN_TEMPERATURE: Temperature = Temperature::from_bits(-55 << 4);

/// Highest temperature the sensor reports.
pub const MAX_TEMPERATURE: Temperature = Temperature::from_bits(125 << 4);

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
/// Conversion resolution, as the full CONFIG register value.
pub enum ReadoutResolution {
    /// 0.5 °C
    Resolution9bit = 0x1f,
    /// 0.25 °C
    Resolution10bit = 0x3f,
    /// 0.125 °C
    Resolution11bit = 0x5f,
    /// 0.0625 °C
    #[default]
    Resolution12bit = 0x7f,
}

impl ReadoutResolution {
    /// Worst-case conversion time.
    pub const fn conversion_time_us(&self) -> u32 {
        use ReadoutResolution::*;
        match self {
            Resolution9bit => 93750,
            Resolution10bit => 187500,
            Resolution11bit => 375000,
            Resolution12bit => 750000,
        }
    }

    /// Mask of the raw 12-bit reading; undefined low bits read as zero.
    pub const fn mask(&self) -> i16 {
        use ReadoutResolution::*;
        match self {
            Resolution9bit => !0b111,
            Resolution10bit => !0b11,
            Resolution11bit => !0b1,
            Resolution12bit => !0,
        }
    }

    /// Value of the `R1:R0` bits.
    pub const fn into_bits(self) -> u8 {
        (self as u8 >> 5) & 0b11
    }

    /// Resolution from the `R1:R0` bits.
    pub const fn from_bits(value: u8) -> Self {
        use ReadoutResolution::*;
        match value & 0b11 {
            0 => Resolution9bit,
            1 => Resolution10bit,
            2 => Resolution11bit,
            _ => Resolution12bit,
        }
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
/// # Configuration register
///
/// Only the `R1:R0` resolution bits are writable. Bits 4:0 always read
/// as 1 and bit 7 always reads as 0, so a written value is normalized with
/// [`Config::from_written`] before it lands in the scratchpad.
pub struct Config {
    /// Reserved, reads as `0b11111`.
    #[bits(5, default = 0x1f)]
    pub reserved: u8,
    /// Conversion resolution.
    #[bits(2, default = ReadoutResolution::Resolution12bit)]
    pub resolution: ReadoutResolution,
    #[bits(1)]
    __: u8,
}

impl Config {
    /// Keeps only the resolution bits of a byte written by the master.
    pub fn from_written(byte: u8) -> Self {
        Self::new().with_resolution(Self::from_bits(byte).resolution())
    }
}

impl From<ReadoutResolution> for Config {
    fn from(value: ReadoutResolution) -> Self {
        Self::new().with_resolution(value)
    }
}

/// Non-volatile copy of the alarm thresholds and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eeprom {
    /// High alarm threshold (°C).
    pub th: i8,
    /// Low alarm threshold (°C).
    pub tl: i8,
    /// Configuration register. Not stored by DS18S20 devices.
    pub config: Config,
}

impl Default for Eeprom {
    fn default() -> Self {
        Self {
            th: 0x4b,
            tl: 0x46,
            config: Config::new(),
        }
    }
}

/// The volatile register file of a DS18x20.
///
/// Every mutation recomputes the trailing CRC byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scratchpad {
    family: Family,
    bytes: [u8; SCRATCHPAD_LEN],
}

impl Scratchpad {
    /// Power-up content: 85 °C and the thresholds recalled from `eeprom`.
    pub fn new(family: Family, eeprom: &Eeprom) -> Self {
        let mut bytes = [0; SCRATCHPAD_LEN];
        bytes[CONFIG] = 0xff;
        bytes[RESERVED] = 0xff;
        bytes[COUNT_REMAIN] = 0x0c;
        bytes[COUNT_PER_C] = 0x10;
        let mut pad = Self { family, bytes };
        pad.recall(eeprom);
        pad.set_temperature(POWER_ON_TEMPERATURE);
        pad
    }

    /// Family the layout follows.
    pub fn family(&self) -> Family {
        self.family
    }

    /// All nine bytes, CRC last.
    pub fn bytes(&self) -> &[u8; SCRATCHPAD_LEN] {
        &self.bytes
    }

    /// High alarm threshold.
    pub fn th(&self) -> i8 {
        self.bytes[TH] as i8
    }

    /// Low alarm threshold.
    pub fn tl(&self) -> i8 {
        self.bytes[TL] as i8
    }

    /// Configuration register; DS18S20 devices report the 12-bit default.
    pub fn config(&self) -> Config {
        if self.family.has_config() {
            Config::from_bits(self.bytes[CONFIG])
        } else {
            Config::new()
        }
    }

    /// Stores a new reading encoded for the family and the configured
    /// resolution. Values outside the sensor range saturate.
    pub fn set_temperature(&mut self, temperature: Temperature) {
        let raw = temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE).to_bits();
        let (register, count_remain) = match self.family {
            Family::Ds18s20 => (raw >> 3, (12 - (raw & 0xf)).clamp(0, 16) as u8),
            Family::Ds1822 | Family::Ds18b20 => {
                (raw & self.config().resolution().mask(), self.bytes[COUNT_REMAIN])
            }
        };
        let [lsb, msb] = register.to_le_bytes();
        self.bytes[TEMP_LSB] = lsb;
        self.bytes[TEMP_MSB] = msb;
        self.bytes[COUNT_REMAIN] = count_remain;
        self.update_crc();
    }

    /// Decodes the temperature register.
    ///
    /// DS18S20 readings use the extended formula
    /// `TEMP_READ - 0.25 + (COUNT_PER_C - COUNT_REMAIN) / COUNT_PER_C`.
    pub fn temperature(&self) -> Temperature {
        decode_temperature(self.family, &self.bytes)
    }

    /// Writes the `index`-th byte of a Write-Scratchpad transfer (TH, TL,
    /// CONFIG). Returns `false` for an index the family does not accept.
    pub fn write(&mut self, index: usize, byte: u8) -> bool {
        if index >= self.family.write_len() {
            return false;
        }
        match index {
            0 => self.bytes[TH] = byte,
            1 => self.bytes[TL] = byte,
            _ => self.bytes[CONFIG] = Config::from_written(byte).into_bits(),
        }
        self.update_crc();
        true
    }

    /// Copies the EEPROM bytes into the scratchpad.
    pub fn recall(&mut self, eeprom: &Eeprom) {
        self.bytes[TH] = eeprom.th as u8;
        self.bytes[TL] = eeprom.tl as u8;
        if self.family.has_config() {
            self.bytes[CONFIG] = eeprom.config.into_bits();
        }
        self.update_crc();
    }

    /// The bytes Copy-Scratchpad stores in EEPROM.
    pub fn to_eeprom(&self) -> Eeprom {
        Eeprom {
            th: self.th(),
            tl: self.tl(),
            config: self.config(),
        }
    }

    /// `true` when the integer part of the reading is at or beyond a threshold.
    pub fn alarm(&self) -> bool {
        let whole = self.temperature().to_bits() >> 4;
        whole <= self.tl() as i16 || whole >= self.th() as i16
    }

    fn update_crc(&mut self) {
        self.bytes[CRC] = OneWireCrc::compute(&self.bytes[..CRC]);
    }
}

/// Decodes the temperature in a scratchpad read from a device of `family`.
pub fn decode_temperature(family: Family, bytes: &[u8; SCRATCHPAD_LEN]) -> Temperature {
    let register = i16::from_le_bytes([bytes[TEMP_LSB], bytes[TEMP_MSB]]);
    match family {
        Family::Ds1822 | Family::Ds18b20 => Temperature::from_bits(register),
        Family::Ds18s20 => {
            let per_c = bytes[COUNT_PER_C] as i16;
            let remain = bytes[COUNT_REMAIN] as i16;
            let whole = register >> 1;
            if per_c == 0 {
                return Temperature::from_bits(register << 3);
            }
            Temperature::from_bits((whole << 4) - 4 + ((per_c - remain) << 4) / per_c)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_layouts() {
        let b20 = Scratchpad::new(Family::Ds18b20, &Eeprom::default());
        assert_eq!(
            b20.bytes(),
            &[0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0x1c]
        );
        let s20 = Scratchpad::new(Family::Ds18s20, &Eeprom::default());
        assert_eq!(
            s20.bytes(),
            &[0xaa, 0x00, 0x4b, 0x46, 0xff, 0xff, 0x0c, 0x10, 0x87]
        );
        assert_eq!(s20.temperature(), POWER_ON_TEMPERATURE);
    }

    #[test]
    fn resolution_truncates_reading() {
        let t = Temperature::lit("25.0625");
        let mut pad = Scratchpad::new(Family::Ds18b20, &Eeprom::default());
        pad.set_temperature(t);
        assert_eq!(pad.temperature(), t);
        assert!(pad.write(2, ReadoutResolution::Resolution9bit as u8));
        pad.set_temperature(t);
        assert_eq!(pad.temperature(), Temperature::lit("25"));
        pad.set_temperature(Temperature::lit("-10.125"));
        assert_eq!(pad.bytes()[..2], [0x58, 0xff]);
    }

    #[test]
    fn ds18s20_extended_reading() {
        let mut pad = Scratchpad::new(Family::Ds18s20, &Eeprom::default());
        pad.set_temperature(Temperature::lit("25.0625"));
        assert_eq!(pad.bytes()[TEMP_LSB], 50);
        assert_eq!(pad.bytes()[COUNT_REMAIN], 11);
        assert_eq!(pad.temperature(), Temperature::lit("25.0625"));
        pad.set_temperature(Temperature::lit("-0.5"));
        assert_eq!(pad.bytes()[..2], [0xff, 0xff]);
    }

    #[test]
    fn mutation_changes_only_crc() {
        let mut pad = Scratchpad::new(Family::Ds18b20, &Eeprom::default());
        let before = *pad.bytes();
        assert!(pad.write(0, 0x30));
        let after = pad.bytes();
        assert_eq!(after[TH], 0x30);
        for i in [TEMP_LSB, TEMP_MSB, TL, CONFIG, RESERVED, COUNT_REMAIN, COUNT_PER_C] {
            assert_eq!(before[i], after[i]);
        }
        assert_ne!(before[CRC], after[CRC]);
        assert!(OneWireCrc::validate(after));
    }

    #[test]
    fn config_write_keeps_only_resolution() {
        let mut pad = Scratchpad::new(Family::Ds1822, &Eeprom::default());
        assert!(pad.write(2, 0x00));
        assert_eq!(pad.bytes()[CONFIG], 0x1f);
        assert!(pad.write(2, 0xff));
        assert_eq!(pad.bytes()[CONFIG], 0x7f);
        assert_eq!(pad.config().resolution(), ReadoutResolution::Resolution12bit);
    }

    #[test]
    fn config_compares_by_value() {
        use ReadoutResolution::*;
        for resolution in [Resolution9bit, Resolution10bit, Resolution11bit, Resolution12bit] {
            let written = Config::from_written(resolution as u8);
            assert_eq!(written, Config::from(resolution));
            assert_eq!(written.into_bits(), resolution as u8);
        }
        assert_ne!(Config::from(Resolution9bit), Config::new());
        let eeprom = Eeprom {
            config: Config::from(Resolution10bit),
            ..Default::default()
        };
        assert_ne!(eeprom, Eeprom::default());
        assert_eq!(eeprom, Eeprom { config: Config::from_written(0xbf), ..eeprom });
    }

    #[test]
    fn ds18s20_accepts_two_bytes() {
        let mut pad = Scratchpad::new(Family::Ds18s20, &Eeprom::default());
        assert!(pad.write(1, 0x10));
        assert!(!pad.write(2, 0x1f));
        assert_eq!(pad.bytes()[CONFIG], 0xff);
    }

    #[test]
    fn alarm_thresholds() {
        let eeprom = Eeprom {
            th: 30,
            tl: 10,
            ..Default::default()
        };
        let mut pad = Scratchpad::new(Family::Ds18b20, &eeprom);
        assert!(pad.alarm());
        pad.set_temperature(Temperature::lit("20"));
        assert!(!pad.alarm());
        pad.set_temperature(Temperature::lit("10.5"));
        assert!(pad.alarm());
        pad.set_temperature(Temperature::lit("29.9375"));
        assert!(!pad.alarm());
        pad.set_temperature(Temperature::lit("30"));
        assert!(pad.alarm());
    }

    #[test]
    fn recall_restores_thresholds() {
        let mut pad = Scratchpad::new(Family::Ds18b20, &Eeprom::default());
        let saved = pad.to_eeprom();
        pad.write(0, 1);
        pad.write(1, 2);
        pad.recall(&saved);
        assert_eq!(pad.to_eeprom(), saved);
        assert!(OneWireCrc::validate(pad.bytes()));
    }
}
