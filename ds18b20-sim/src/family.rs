use crate::Ds18b20Error;

/// Supported DS18x20 family codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// DS18S20: 9-bit readings extended with COUNT_REMAIN, no CONFIG register.
    Ds18s20 = 0x10,
    /// DS1822: 12-bit readings, configurable resolution.
    Ds1822 = 0x22,
    /// DS18B20: 12-bit readings, configurable resolution.
    Ds18b20 = 0x28,
}

impl Family {
    /// The family code, first byte of every ROM of this family.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Number of bytes Write-Scratchpad accepts (TH, TL and, if present, CONFIG).
    pub const fn write_len(self) -> usize {
        match self {
            Family::Ds18s20 => 2,
            Family::Ds1822 | Family::Ds18b20 => 3,
        }
    }

    /// Number of scratchpad bytes mirrored in EEPROM.
    pub const fn shadow_len(self) -> usize {
        self.write_len()
    }

    /// `true` if the family has a CONFIG register with resolution bits.
    pub const fn has_config(self) -> bool {
        !matches!(self, Family::Ds18s20)
    }

    /// Part name.
    pub const fn name(self) -> &'static str {
        match self {
            Family::Ds18s20 => "DS18S20",
            Family::Ds1822 => "DS1822",
            Family::Ds18b20 => "DS18B20",
        }
    }
}

impl TryFrom<u8> for Family {
    type Error = Ds18b20Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x10 => Ok(Family::Ds18s20),
            0x22 => Ok(Family::Ds1822),
            0x28 => Ok(Family::Ds18b20),
            other => Err(Ds18b20Error::UnknownFamily(other)),
        }
    }
}

impl core::fmt::Display for Family {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (0x{:02x})", self.name(), self.code())
    }
}
