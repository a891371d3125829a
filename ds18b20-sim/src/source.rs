use fixed::types::I12F4;

/// Temperature in °C, in the 12.4 fixed-point format of the sensor register.
pub type Temperature = I12F4;

/// Where a conversion takes its reading from.
///
/// Queried with the host clock at the instant of every Convert-T command.
pub trait TemperatureSource {
    /// The temperature at `now_ns` on the host clock.
    fn temperature_at(&self, now_ns: u64) -> Temperature;
}

impl TemperatureSource for Temperature {
    fn temperature_at(&self, _now_ns: u64) -> Temperature {
        *self
    }
}

impl<T: TemperatureSource + ?Sized> TemperatureSource for &T {
    fn temperature_at(&self, now_ns: u64) -> Temperature {
        (**self).temperature_at(now_ns)
    }
}
