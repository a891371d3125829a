/// Calculate CRC-8 used in 1-Wire communications.
///
/// The polynomial is `X^8 + X^5 + X^4 + 1` (Dallas/Maxim), processed LSB
/// first. With the `crc-table` feature the update runs on two 16-entry
/// nibble tables instead of eight shift/xor rounds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OneWireCrc(u8);

#[cfg(feature = "crc-table")]
const CRC_LOW_NIBBLE: [u8; 16] = [
    0x00, 0x5e, 0xbc, 0xe2, 0x61, 0x3f, 0xdd, 0x83, 0xc2, 0x9c, 0x7e, 0x20, 0xa3, 0xfd, 0x1f, 0x41,
];

#[cfg(feature = "crc-table")]
const CRC_HIGH_NIBBLE: [u8; 16] = [
    0x00, 0x9d, 0x23, 0xbe, 0x46, 0xdb, 0x65, 0xf8, 0x8c, 0x11, 0xaf, 0x32, 0xca, 0x57, 0xe9, 0x74,
];

impl OneWireCrc {
    /// Get the current CRC value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Update the CRC with the incoming byte.
    #[cfg(feature = "crc-table")]
    pub fn update(&mut self, byte: u8) {
        let crc = self.0 ^ byte;
        self.0 = CRC_LOW_NIBBLE[(crc & 0x0f) as usize] ^ CRC_HIGH_NIBBLE[(crc >> 4) as usize];
    }

    /// Update the CRC with the incoming byte.
    #[cfg(not(feature = "crc-table"))]
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0 ^ byte;
        for _ in 0..8 {
            if crc & 0x1 == 0x1 {
                crc = (crc >> 1) ^ 0x8c;
            } else {
                crc >>= 1;
            }
        }
        self.0 = crc;
    }

    /// CRC of a whole sequence of bytes.
    pub fn compute(sequence: &[u8]) -> u8 {
        let mut crc = OneWireCrc(0);
        for &byte in sequence.iter() {
            crc.update(byte);
        }
        crc.0
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        // running the CRC over its own value yields zero
        !sequence.is_empty() && Self::compute(sequence) == 0x0
    }
}
