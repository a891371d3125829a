use clap::{Parser, ValueEnum};
use ds18b20_sim::{Ds18b20Builder, Family, ReadoutResolution, Rom, Temperature};
use embedded_hal::delay::DelayNs;
use log::LevelFilter;
use onewire_bench::{Ds18x20Group, OneWire, OneWireStatus, SimHost, SimMaster, Waveform};
use std::time::Duration;

/// Run an emulated DS18x20 on a simulated 1-Wire bus
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Family of the sensor: ds18s20, ds1822, ds18b20 or a family code (e.g. 0x28)
    #[arg(short, long, default_value = "ds18b20", value_parser = parse_family)]
    family: Family,
    /// ROM in printed form (16 hex digits, CRC first); random if omitted
    #[arg(short, long, value_parser = parse_rom)]
    rom: Option<Rom>,
    /// Temperature in °C for the fixed waveform
    #[arg(short, long, default_value = "25", value_parser = parse_temperature)]
    temperature: Temperature,
    /// Shape of the temperature over simulated time
    #[arg(short, long, value_enum, default_value_t = Shape::Fixed)]
    waveform: Shape,
    /// Lowest temperature of a periodic waveform
    #[arg(long, default_value = "20", value_parser = parse_temperature)]
    min: Temperature,
    /// Highest temperature of a periodic waveform
    #[arg(long, default_value = "30", value_parser = parse_temperature)]
    max: Temperature,
    /// Period of a periodic waveform in milliseconds
    #[arg(long, default_value_t = 10_000)]
    period_ms: u64,
    /// Sensor runs on parasite power
    #[arg(long)]
    parasite: bool,
    /// Number of readings to take
    #[arg(short, long, default_value_t = 5)]
    count: usize,
    /// Trace the signaling and byte layers
    #[arg(long)]
    ow_debug: bool,
    /// Trace the device layer
    #[arg(long)]
    gen_debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Shape {
    Fixed,
    Square,
    Sine,
    Triangle,
}

fn parse_family(s: &str) -> Result<Family, String> {
    let code = match s.to_ascii_lowercase().as_str() {
        "ds18s20" | "ds1820" => return Ok(Family::Ds18s20),
        "ds1822" => return Ok(Family::Ds1822),
        "ds18b20" => return Ok(Family::Ds18b20),
        other => {
            let digits = other.trim_start_matches("0x");
            u8::from_str_radix(digits, 16).map_err(|e| format!("{s}: {e}"))?
        }
    };
    Family::try_from(code).map_err(|e| e.to_string())
}

fn parse_rom(s: &str) -> Result<Rom, String> {
    s.parse().map_err(|e: ds18b20_sim::Ds18b20Error| e.to_string())
}

fn parse_temperature(s: &str) -> Result<Temperature, String> {
    s.parse::<Temperature>().map_err(|e| format!("{s}: {e}"))
}

impl Args {
    fn waveform(&self) -> Waveform {
        let period = Duration::from_millis(self.period_ms);
        let (min, max) = (self.min, self.max);
        match self.waveform {
            Shape::Fixed => Waveform::Fixed(self.temperature),
            Shape::Square => Waveform::Square { min, max, period },
            Shape::Sine => Waveform::Sine { min, max, period },
            Shape::Triangle => Waveform::Triangle { min, max, period },
        }
    }
}

fn main() {
    // Parse command line arguments
    let args = Args::parse();
    // Initialize the logger
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.ow_debug {
        logger.filter_module("onewire_slave", LevelFilter::Trace);
    }
    if args.gen_debug {
        logger.filter_module("ds18b20_sim", LevelFilter::Trace);
    }
    logger.init();
    // Build the sensor
    let builder = match args.rom {
        Some(rom) => Ds18b20Builder::from_rom(rom).expect("Unsupported family in ROM"),
        None => Ds18b20Builder::new(args.family).with_id(rand::random()),
    };
    let sensor = builder
        .with_parasite_power(args.parasite)
        .build(args.waveform())
        .expect("Failed to build sensor");
    log::info!(
        "Sensor {} ROM {}{}",
        sensor.family(),
        sensor.rom(),
        if sensor.is_parasite() { ", parasite power" } else { "" }
    );
    // Put it on a simulated bus
    let mut host = SimHost::new();
    host.attach(sensor).expect("Failed to attach sensor");
    let mut bus = SimMaster::new(host);
    let mut delay = bus.delay();
    let status = bus.reset().expect("No presence pulse");
    log::debug!("Presence: {}", status.presence());
    // Enumerate devices on the 1-Wire bus
    let mut group = Ds18x20Group::<1>::default()
        .with_resolution(ReadoutResolution::Resolution12bit)
        .with_t_low(-40)
        .with_t_high(85);
    let devices = group.enumerate(&mut bus).expect("Failed to enumerate devices");
    log::info!("Found {} devices", devices);
    for _ in 0..args.count {
        // Trigger temperature conversion
        group
            .trigger_temperature_conversion(&mut bus, &mut delay)
            .expect("Failed to trigger temperature conversion");
        let now_ns = bus.host().now_ns();
        // Read temperatures from the sensors
        for (rom, temp) in group
            .roms()
            .to_vec()
            .into_iter()
            .zip(group.read_temperatures(&mut bus, true).expect("Failed to read temperatures"))
        {
            log::info!(
                "t = {:.3} s, ROM: {:016x}, Temperature: {}",
                now_ns as f64 / 1e9,
                rom,
                temp
            );
        }
        delay.delay_ms(1000);
    }
}
