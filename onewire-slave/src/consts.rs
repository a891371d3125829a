//! Command codes and standard-speed slot timing for 1-Wire slaves.

/// Command to search for devices on the 1-Wire bus
pub const ONEWIRE_SEARCH_CMD: u8 = 0xf0;

/// Command to read the ROM of the only device on the bus
pub const ONEWIRE_READ_ROM_CMD: u8 = 0x33;

/// Command to match a specific ROM address in 1-Wire communication (non-overdrive mode)
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// Command to skip ROM address in 1-Wire communication (non-overdrive mode)
pub const ONEWIRE_SKIP_ROM_CMD: u8 = 0xcc;

/// Command to search for devices in alarm state on the 1-Wire bus
pub const ONEWIRE_CONDITIONAL_SEARCH_CMD: u8 = 0xec;

/// Start a temperature conversion.
pub const DS18X20_START_CONV: u8 = 0x44;

/// Write TH, TL (and CONFIG on 12-bit families) into the scratchpad.
pub const DS18X20_WRITE_SCRATCH: u8 = 0x4e;

/// Read the whole scratchpad, CRC last.
pub const DS18X20_READ_SCRATCH: u8 = 0xbe;

/// Copy TH, TL (and CONFIG) from the scratchpad into EEPROM.
pub const DS18X20_COPY_SCRATCH: u8 = 0x48;

/// Recall TH, TL (and CONFIG) from EEPROM into the scratchpad.
pub const DS18X20_RECALL_EEPROM: u8 = 0xb8;

/// Read the power supply mode in a single read slot.
pub const DS18X20_READ_POWERMODE: u8 = 0xb4;

/// Master reset pulse, minimum duration (µs).
pub const PR_DUR_RESET: u32 = 480;

/// Low time after which the watchdog declares a forced reset (µs).
pub const PR_DUR_FORCED_RESET: u32 = 485;

/// Wait between master release and the presence pulse (µs).
pub const PR_DUR_RESET_MASTER_RELEASE: u32 = 30;

/// Width of the presence pulse (µs).
pub const PR_DUR_RESET_PULL_PRESENCE: u32 = 120;

/// Time from presence release to the end of the reset slot (µs).
pub const PR_DUR_RESET_SLOT_END: u32 = 329;

/// Sample point of a master write slot, from slot start (µs).
pub const PR_DUR_SAMPLE_WAIT: u32 = 15;

/// End of a master write slot, from slot start (µs).
pub const PR_DUR_WRITE_SLOT_END: u32 = 45;

/// Delay between the master pull-down and driving a read bit (µs).
pub const PR_DUR_READ_INIT: u32 = 1;

/// Point in a read slot where a driven `0` is released, from slot start (µs).
pub const PR_DUR_READ_SLOT: u32 = 15;

/// Tolerated bus jitter (ns).
pub const PR_DUR_BUS_JITTER_NS: u64 = 2_000;
