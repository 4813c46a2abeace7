//! Sensor-configuration words.

use crate::bits::BitArray;

/// The sensors a unit is configured with, decoded from the two 16-bit
/// configuration words carried by both the `$C` header line and each binary
/// flight header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sensors {
    pub voltage: bool,
    pub num_exhaust_gas_temperature: u32,
    pub num_cylinder_head_temperature: u32,
    pub oil_temperature: bool,
    pub turbine_inlet_temperature_1: bool,
    pub turbine_inlet_temperature_2: bool,
    pub compressor_discharge_temperature: bool,
    pub induction_air_temperature: bool,
    pub outside_air_temperature: bool,
    pub rpm: bool,
    pub fuel_flow: bool,
    pub manifold_pressure: bool,
}

/// Decode the two sensor words, `low` word first.
///
/// Bits 1, 28, 29, and 31 are unknown.
pub fn parse(low: u16, high: u16) -> Sensors {
    let mut mask = BitArray::new(4);
    mask.set_word(0, low);
    mask.set_word(2, high);

    let mut sensors = Sensors {
        voltage: mask.test_bit(0),
        num_cylinder_head_temperature: mask.count_bits(2, 10),
        num_exhaust_gas_temperature: mask.count_bits(11, 19),
        manifold_pressure: mask.test_bit(30),
        ..Sensors::default()
    };
    for bit in 20..28 {
        if !mask.test_bit(bit) {
            continue;
        }
        match bit {
            20 => sensors.oil_temperature = true,
            21 => sensors.turbine_inlet_temperature_1 = true,
            22 => sensors.turbine_inlet_temperature_2 = true,
            23 => sensors.compressor_discharge_temperature = true,
            24 => sensors.induction_air_temperature = true,
            25 => sensors.outside_air_temperature = true,
            26 => sensors.rpm = true,
            27 => sensors.fuel_flow = true,
            _ => unreachable!(),
        }
    }
    sensors
}
