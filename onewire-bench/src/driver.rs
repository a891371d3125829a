use crate::{OneWire, OneWireError, OneWireResult, OneWireSearch, OneWireSearchKind};
use core::iter::zip;
use ds18b20_sim::{Family, ReadoutResolution, SCRATCHPAD_LEN, Temperature, decode_temperature};
use embedded_hal::delay::DelayNs;
use log::debug;
use onewire_slave::{
    OneWireCrc,
    consts::{
        DS18X20_COPY_SCRATCH, DS18X20_READ_POWERMODE, DS18X20_READ_SCRATCH,
        DS18X20_RECALL_EEPROM, DS18X20_START_CONV, DS18X20_WRITE_SCRATCH, ONEWIRE_READ_ROM_CMD,
    },
};

/// EEPROM write time after Copy Scratchpad.
const COPY_SCRATCH_DELAY_US: u32 = 10_000;

/// Master-side driver for up to `N` DS18x20 sensors sharing one bus.
///
/// Sensors are found with [`Ds18x20Group::enumerate`], which also writes the
/// alarm thresholds and resolution into every scratchpad. Conversions are
/// started on all sensors at once and read back one ROM at a time.
#[derive(Debug)]
pub struct Ds18x20Group<const N: usize> {
    devices: usize,
    roms: [u64; N],
    families: [Family; N],
    temps: [Temperature; N],
    family: Option<Family>,
    resolution: ReadoutResolution,
    low: i8,
    high: i8,
}

impl<const N: usize> Default for Ds18x20Group<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Ds18x20Group<N> {
    fn new() -> Self {
        Self {
            devices: 0,
            roms: [0; N],
            families: [Family::Ds18b20; N],
            temps: [Temperature::ZERO; N],
            family: None,
            resolution: ReadoutResolution::default(),
            low: -40,
            high: 85,
        }
    }

    /// Only enumerate sensors of this family.
    pub fn with_family(mut self, family: Family) -> Self {
        self.family = Some(family);
        self
    }

    /// Resolution written during enumeration.
    pub fn with_resolution(mut self, resolution: ReadoutResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Low alarm threshold written during enumeration.
    pub fn with_t_low(mut self, temp: i8) -> Self {
        self.low = temp;
        self
    }

    /// High alarm threshold written during enumeration.
    pub fn with_t_high(mut self, temp: i8) -> Self {
        self.high = temp;
        self
    }

    /// ROMs found by the last enumeration.
    pub fn roms(&self) -> &[u64] {
        &self.roms[..self.devices]
    }

    /// Temperatures from the last [`Ds18x20Group::read_temperatures`].
    pub fn temperatures(&self) -> &[Temperature] {
        &self.temps[..self.devices]
    }

    /// Search the bus for DS18x20 sensors and configure them.
    ///
    /// # Returns
    /// The number of sensors found, at most `N`.
    pub fn enumerate<O: OneWire>(&mut self, bus: &mut O) -> OneWireResult<usize, O::BusError> {
        self.devices = 0;
        let mut search = match self.family {
            Some(family) => {
                OneWireSearch::with_family(bus, OneWireSearchKind::Normal, family.code())
            }
            None => OneWireSearch::new(bus, OneWireSearchKind::Normal),
        };
        while let Some(rom) = search.next()? {
            let Ok(family) = Family::try_from(rom as u8) else {
                debug!("group: skipping {rom:016x}, not a DS18x20");
                continue;
            };
            self.roms[self.devices] = rom;
            self.families[self.devices] = family;
            self.devices += 1;
            if self.devices == N {
                break;
            }
        }
        if self.devices == 0 {
            return Ok(0);
        }
        // DS18S20 stops listening after TH and TL
        bus.address(None)?;
        bus.write_byte(DS18X20_WRITE_SCRATCH)?;
        bus.write_byte(self.high as _)?;
        bus.write_byte(self.low as _)?;
        bus.write_byte(self.resolution as _)?;
        Ok(self.devices)
    }

    /// Start a conversion on every sensor and wait for the slowest one.
    pub fn trigger_temperature_conversion<O: OneWire, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
    ) -> OneWireResult<(), O::BusError> {
        bus.address(None)?;
        bus.write_byte(DS18X20_START_CONV)?;
        delay.delay_us(self.resolution.conversion_time_us());
        Ok(())
    }

    /// Read the scratchpad of every enumerated sensor.
    ///
    /// # Arguments
    /// * `crc` - Fail with [`OneWireError::InvalidCrc`] when a scratchpad
    ///   does not check out.
    pub fn read_temperatures<O: OneWire>(
        &mut self,
        bus: &mut O,
        crc: bool,
    ) -> OneWireResult<&[Temperature], O::BusError> {
        for ((rom, family), temp) in zip(
            zip(&self.roms[..self.devices], &self.families[..self.devices]),
            self.temps[..self.devices].iter_mut(),
        ) {
            let buf = read_raw(bus, Some(*rom))?;
            if crc && !OneWireCrc::validate(&buf) {
                return Err(OneWireError::InvalidCrc);
            }
            *temp = decode_temperature(*family, &buf);
        }
        Ok(&self.temps[..self.devices])
    }

    /// Read one sensor, checking the scratchpad CRC.
    pub fn read_temperature<O: OneWire>(
        &self,
        bus: &mut O,
        rom: u64,
    ) -> OneWireResult<Temperature, O::BusError> {
        let family =
            Family::try_from(rom as u8).map_err(|_| OneWireError::UnknownFamily(rom as u8))?;
        let buf = read_scratchpad(bus, Some(rom))?;
        Ok(decode_temperature(family, &buf))
    }
}

/// Read the ROM of the only device on the bus, checking its CRC.
pub fn read_rom<O: OneWire>(bus: &mut O) -> OneWireResult<u64, O::BusError> {
    bus.reset()?;
    bus.write_byte(ONEWIRE_READ_ROM_CMD)?;
    let mut rom = [0; 8];
    for b in rom.iter_mut() {
        *b = bus.read_byte()?;
    }
    if !OneWireCrc::validate(&rom) {
        return Err(OneWireError::InvalidCrc);
    }
    Ok(u64::from_le_bytes(rom))
}

fn read_raw<O: OneWire>(
    bus: &mut O,
    rom: Option<u64>,
) -> OneWireResult<[u8; SCRATCHPAD_LEN], O::BusError> {
    bus.address(rom)?;
    bus.write_byte(DS18X20_READ_SCRATCH)?;
    let mut buf = [0; SCRATCHPAD_LEN];
    for b in buf.iter_mut() {
        *b = bus.read_byte()?;
    }
    Ok(buf)
}

/// Read a whole scratchpad and check its CRC.
///
/// `None` addresses the only device on the bus with Skip ROM.
pub fn read_scratchpad<O: OneWire>(
    bus: &mut O,
    rom: Option<u64>,
) -> OneWireResult<[u8; SCRATCHPAD_LEN], O::BusError> {
    let buf = read_raw(bus, rom)?;
    if !OneWireCrc::validate(&buf) {
        return Err(OneWireError::InvalidCrc);
    }
    Ok(buf)
}

/// Write TH, TL and, when `config` is given, the CONFIG byte.
pub fn write_scratchpad<O: OneWire>(
    bus: &mut O,
    rom: Option<u64>,
    th: i8,
    tl: i8,
    config: Option<u8>,
) -> OneWireResult<(), O::BusError> {
    bus.address(rom)?;
    bus.write_byte(DS18X20_WRITE_SCRATCH)?;
    bus.write_byte(th as _)?;
    bus.write_byte(tl as _)?;
    if let Some(config) = config {
        bus.write_byte(config)?;
    }
    Ok(())
}

/// Copy TH, TL and CONFIG into EEPROM and wait out the write.
pub fn copy_scratchpad<O: OneWire, D: DelayNs>(
    bus: &mut O,
    rom: Option<u64>,
    delay: &mut D,
) -> OneWireResult<(), O::BusError> {
    bus.address(rom)?;
    bus.write_byte(DS18X20_COPY_SCRATCH)?;
    delay.delay_us(COPY_SCRATCH_DELAY_US);
    Ok(())
}

/// Recall EEPROM into the scratchpad.
///
/// # Returns
/// The status bit the device sends when the recall is done.
pub fn recall_eeprom<O: OneWire>(bus: &mut O, rom: Option<u64>) -> OneWireResult<bool, O::BusError> {
    bus.address(rom)?;
    bus.write_byte(DS18X20_RECALL_EEPROM)?;
    bus.read_bit()
}

/// `true` when the addressed devices are externally powered.
pub fn read_power_supply<O: OneWire>(bus: &mut O, rom: Option<u64>) -> OneWireResult<bool, O::BusError> {
    bus.address(rom)?;
    bus.write_byte(DS18X20_READ_POWERMODE)?;
    bus.read_bit()
}
