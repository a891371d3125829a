use crate::{Ds18b20Error, Family};
use core::{fmt, str::FromStr};
use onewire_slave::OneWireCrc;

/// 64-bit ROM code in bus order: family code, six ID bytes, CRC-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rom([u8; 8]);

impl Rom {
    /// Builds a ROM code from a family and six ID bytes, computing the CRC.
    pub fn new(family: Family, id: [u8; 6]) -> Self {
        let mut bytes = [0; 8];
        bytes[0] = family.code();
        bytes[1..7].copy_from_slice(&id);
        bytes[7] = OneWireCrc::compute(&bytes[..7]);
        Self(bytes)
    }

    /// Takes eight bytes in bus order, checking the trailing CRC.
    pub fn from_bytes(bytes: [u8; 8]) -> Result<Self, Ds18b20Error> {
        if OneWireCrc::validate(&bytes) {
            Ok(Self(bytes))
        } else {
            Err(Ds18b20Error::InvalidCrc)
        }
    }

    /// The eight bytes in bus order.
    pub fn bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Family code.
    pub fn family_code(&self) -> u8 {
        self.0[0]
    }

    /// The six ID bytes.
    pub fn id(&self) -> [u8; 6] {
        let mut id = [0; 6];
        id.copy_from_slice(&self.0[1..7]);
        id
    }

    /// Trailing CRC byte.
    pub fn crc(&self) -> u8 {
        self.0[7]
    }

    /// Bit `n` (`0..64`) in transmission order, least significant bit of
    /// the family code first.
    pub fn bit(&self, n: usize) -> bool {
        (self.0[n / 8] >> (n % 8)) & 1 != 0
    }

    /// The ROM as a little-endian integer, as 1-Wire masters store it.
    pub fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }
}

impl TryFrom<u64> for Rom {
    type Error = Ds18b20Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_bytes(value.to_le_bytes())
    }
}

impl From<Rom> for u64 {
    fn from(value: Rom) -> Self {
        value.to_u64()
    }
}

/// Parses the printed form: 16 hex digits, CRC byte first, family code last.
impl FromStr for Rom {
    type Err = Ds18b20Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Ds18b20Error::MalformedRom);
        }
        let value = u64::from_str_radix(s, 16).map_err(|_| Ds18b20Error::MalformedRom)?;
        Self::try_from(value)
    }
}

impl fmt::Display for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.to_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_computed() {
        let rom = Rom::new(Family::Ds18b20, [1, 2, 3, 4, 5, 6]);
        assert_eq!(rom.bytes(), &[0x28, 1, 2, 3, 4, 5, 6, 0x9e]);
        assert!(OneWireCrc::validate(rom.bytes()));
    }

    #[test]
    fn random_identities_carry_valid_crc() {
        for _ in 0..64 {
            let rom = Rom::new(Family::Ds1822, rand::random());
            assert_eq!(OneWireCrc::compute(&rom.bytes()[..7]), rom.crc());
            assert_eq!(Rom::try_from(rom.to_u64()), Ok(rom));
        }
    }

    #[test]
    fn printed_form() {
        let rom: Rom = "C50316623C4BFF28".parse().unwrap();
        assert_eq!(rom.bytes(), &[0x28, 0xff, 0x4b, 0x3c, 0x62, 0x16, 0x03, 0xc5]);
        assert_eq!(rom.family_code(), 0x28);
        let mut buf = [0u8; 16];
        let mut w = Buf(&mut buf, 0);
        core::fmt::write(&mut w, format_args!("{rom}")).unwrap();
        assert_eq!(&buf, b"C50316623C4BFF28");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("C50316623C4BFF29".parse::<Rom>(), Err(Ds18b20Error::InvalidCrc));
        assert_eq!("C50316623C4BFF2".parse::<Rom>(), Err(Ds18b20Error::MalformedRom));
        assert_eq!("+50316623C4BFF28".parse::<Rom>(), Err(Ds18b20Error::MalformedRom));
    }

    #[test]
    fn bits_are_lsb_first() {
        let rom = Rom::new(Family::Ds18s20, [0; 6]);
        // 0x10
        assert!(!rom.bit(0));
        assert!(rom.bit(4));
        assert!(!rom.bit(8));
    }

    struct Buf<'a>(&'a mut [u8], usize);

    impl core::fmt::Write for Buf<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let end = self.1 + s.len();
            self.0
                .get_mut(self.1..end)
                .ok_or(core::fmt::Error)?
                .copy_from_slice(s.as_bytes());
            self.1 = end;
            Ok(())
        }
    }
}
