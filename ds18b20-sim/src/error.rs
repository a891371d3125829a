use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while configuring an emulated sensor.
pub enum Ds18b20Error {
    /// The family code is not one of the supported DS18x20 families.
    UnknownFamily(u8),
    /// The ROM code does not end with a valid CRC-8.
    InvalidCrc,
    /// A printed ROM code is not 16 hexadecimal digits.
    MalformedRom,
    /// The ROM code belongs to a different family than the one requested.
    FamilyMismatch {
        /// Family the device was built for.
        expected: u8,
        /// Family code found in the ROM.
        found: u8,
    },
}

impl fmt::Display for Ds18b20Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ds18b20Error::UnknownFamily(code) => write!(f, "unknown family code 0x{code:02x}"),
            Ds18b20Error::InvalidCrc => f.write_str("invalid ROM CRC"),
            Ds18b20Error::MalformedRom => f.write_str("ROM code must be 16 hexadecimal digits"),
            Ds18b20Error::FamilyMismatch { expected, found } => write!(
                f,
                "ROM family 0x{found:02x} does not match device family 0x{expected:02x}"
            ),
        }
    }
}

impl core::error::Error for Ds18b20Error {}
