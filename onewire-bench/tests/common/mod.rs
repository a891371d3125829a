#![allow(dead_code)]

use ds18b20_sim::{Ds18b20, Ds18b20Builder, Family, Temperature};
use onewire_bench::{SimHost, SimMaster, TieBreak};

pub type Sensor = Ds18b20<Temperature>;

pub fn t(value: &str) -> Temperature {
    value.parse().unwrap()
}

pub fn sensor(family: Family, temperature: &str) -> Sensor {
    Ds18b20Builder::new(family)
        .with_id([0x11, 0x22, 0x33, 0x44, 0x55, 0x66])
        .build(t(temperature))
        .unwrap()
}

pub fn bench(sensors: impl IntoIterator<Item = Sensor>) -> SimMaster<Sensor> {
    bench_with(TieBreak::TimersFirst, sensors)
}

pub fn bench_with(
    tie_break: TieBreak,
    sensors: impl IntoIterator<Item = Sensor>,
) -> SimMaster<Sensor> {
    let mut host = SimHost::new().with_trace().with_tie_break(tie_break);
    for sensor in sensors {
        host.attach(sensor).unwrap();
    }
    SimMaster::new(host)
}
