use ds18b20_sim::{MAX_TEMPERATURE, MIN_TEMPERATURE, Temperature, TemperatureSource};
use std::{f64::consts::TAU, time::Duration};

/// A temperature that follows a periodic shape over simulated time.
///
/// Every shape except [`Waveform::Fixed`] starts a period at `min`
/// (the sine at the midpoint, rising). Readings saturate into the
/// −55…+125 °C range of the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// Constant reading.
    Fixed(Temperature),
    /// `min` for the first half of each period, `max` for the second.
    Square {
        /// Low level.
        min: Temperature,
        /// High level.
        max: Temperature,
        /// Period of the wave.
        period: Duration,
    },
    /// Sinusoid between `min` and `max`.
    Sine {
        /// Trough.
        min: Temperature,
        /// Crest.
        max: Temperature,
        /// Period of the wave.
        period: Duration,
    },
    /// Linear ramp from `min` to `max` and back.
    Triangle {
        /// Trough.
        min: Temperature,
        /// Crest.
        max: Temperature,
        /// Period of the wave.
        period: Duration,
    },
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Fixed(Temperature::from_bits(25 << 4))
    }
}

fn phase(now_ns: u64, period: Duration) -> f64 {
    let period = period.as_nanos();
    if period == 0 {
        return 0.0;
    }
    (now_ns as u128 % period) as f64 / period as f64
}

impl TemperatureSource for Waveform {
    fn temperature_at(&self, now_ns: u64) -> Temperature {
        let value = match *self {
            Waveform::Fixed(t) => t,
            Waveform::Square { min, max, period } => {
                if phase(now_ns, period) < 0.5 {
                    min
                } else {
                    max
                }
            }
            Waveform::Sine { min, max, period } => {
                let (min, max) = (min.to_num::<f64>(), max.to_num::<f64>());
                let mid = (min + max) / 2.0;
                let amplitude = (max - min) / 2.0;
                Temperature::saturating_from_num(
                    mid + amplitude * (TAU * phase(now_ns, period)).sin(),
                )
            }
            Waveform::Triangle { min, max, period } => {
                let (min, max) = (min.to_num::<f64>(), max.to_num::<f64>());
                let phase = phase(now_ns, period);
                let rise = if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 };
                Temperature::saturating_from_num(min + (max - min) * rise)
            }
        };
        value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
    }
}
