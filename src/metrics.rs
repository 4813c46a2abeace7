//! The metric catalogue and the version-gated decode table.
//!
//! Each [`Metric`] ties one or two decode-mask bit positions to a path into
//! the output record. The catalogue is the heart of the format: which bits a
//! unit emits depends on its model and firmware, captured here as a one-hot
//! version selector gating each entry.

use crate::Error;
use crate::metadata::Metadata;

/// EDM < 900 without a protocol header.
pub const V1: u8 = 0x01;
/// EDM 760.
pub const V2: u8 = 0x02;
/// EDM >= 900, older firmware.
pub const V3: u8 = 0x04;
/// EDM >= 900 with newer firmware, or EDM < 900 with a protocol header.
pub const V4: u8 = 0x08;
/// EDM 960.
pub const V5: u8 = 0x10;

/// Sentinel path of a slot observed in sample files but not yet understood.
pub const UNSUPPORTED: &str = "";

const DEFAULT_VALUE: f32 = 240.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFactor {
    /// Divide the accumulated value by ten.
    Ten,
    /// Divide by ten only when fuel flow is measured in gallons per hour.
    TenIfGph,
}

/// One decodable quantity: its decode-mask bit position(s), the output path
/// it accumulates into, and the versions it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub version_mask: u8,
    /// Decode-mask bit signalling a signed 8-bit delta to the low byte.
    pub low_byte_bit: u8,
    /// Decode-mask bit signalling a delta to the high byte (`delta << 8`),
    /// signed by the low-byte bit's sign flag.
    pub high_byte_bit: Option<u8>,
    pub path: &'static str,
    pub scale_factor: Option<ScaleFactor>,
}

impl Metric {
    pub const fn new(
        version_mask: u8,
        low_byte_bit: u8,
        high_byte_bit: Option<u8>,
        path: &'static str,
        scale_factor: Option<ScaleFactor>,
    ) -> Self {
        Self {
            version_mask,
            low_byte_bit,
            high_byte_bit,
            path,
            scale_factor,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        self.path == UNSUPPORTED
    }

    /// Whether `bit` is this metric's high-byte position (as opposed to the
    /// low).
    pub fn is_high_byte_bit(&self, bit: u8) -> bool {
        self.high_byte_bit == Some(bit)
    }

    pub fn scale(&self, metadata: &Metadata, value: f32) -> f32 {
        match self.scale_factor {
            None => value,
            Some(ScaleFactor::TenIfGph) if !metadata.is_gallons_per_hour() => value,
            Some(_) => value / 10.0,
        }
    }

    /// The value an untouched field accumulates from, mid-scale of the
    /// hardware's sign-centered 8-bit encoding.
    pub fn default_value(&self, metadata: &Metadata) -> f32 {
        // sic. One exception to the rule.
        if self.path == "engine[0].horsepower" {
            0.0
        } else {
            self.scale(metadata, DEFAULT_VALUE)
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unsupported() {
            write!(f, "unsupported metric at bit {}", self.low_byte_bit)
        } else {
            f.write_str(self.path)
        }
    }
}

const fn m(versions: u8, low: u8, path: &'static str) -> Metric {
    Metric::new(versions, low, None, path, None)
}

const fn mh(versions: u8, low: u8, high: u8, path: &'static str) -> Metric {
    Metric::new(versions, low, Some(high), path, None)
}

const fn ms(versions: u8, low: u8, path: &'static str, scale: ScaleFactor) -> Metric {
    Metric::new(versions, low, None, path, Some(scale))
}

const fn mhs(versions: u8, low: u8, high: u8, path: &'static str, scale: ScaleFactor) -> Metric {
    Metric::new(versions, low, Some(high), path, Some(scale))
}

use ScaleFactor::{Ten, TenIfGph};

/// The full catalogue. The tuples are transcribed from captured sample files
/// and are not a place for creativity.
pub static CATALOGUE: &[Metric] = &[
    // bytes 0 and 6
    mh(V1 | V2 | V3 | V4 | V5, 0, 48, "engine[0].exhaust_gas_temperature[0]"),
    mh(V1 | V2 | V3 | V4 | V5, 1, 49, "engine[0].exhaust_gas_temperature[1]"),
    mh(V1 | V2 | V3 | V4 | V5, 2, 50, "engine[0].exhaust_gas_temperature[2]"),
    mh(V1 | V2 | V3 | V4 | V5, 3, 51, "engine[0].exhaust_gas_temperature[3]"),
    mh(V1 | V2 | V3 | V4 | V5, 4, 52, "engine[0].exhaust_gas_temperature[4]"),
    mh(V1 | V2 | V3 | V4 | V5, 5, 53, "engine[0].exhaust_gas_temperature[5]"),
    mh(V1 | V2 | V3 | V4 | V5, 6, 54, "engine[0].turbine_inlet_temperature[0]"),
    mh(V1 | V2 | V3 | V4 | V5, 7, 55, "engine[0].turbine_inlet_temperature[1]"),
    // byte 1
    m(V1 | V2 | V3 | V4 | V5, 8, "engine[0].cylinder_head_temperature[0]"),
    m(V1 | V2 | V3 | V4 | V5, 9, "engine[0].cylinder_head_temperature[1]"),
    m(V1 | V2 | V3 | V4 | V5, 10, "engine[0].cylinder_head_temperature[2]"),
    m(V1 | V2 | V3 | V4 | V5, 11, "engine[0].cylinder_head_temperature[3]"),
    m(V1 | V2 | V3 | V4 | V5, 12, "engine[0].cylinder_head_temperature[4]"),
    m(V1 | V2 | V3 | V4 | V5, 13, "engine[0].cylinder_head_temperature[5]"),
    m(V1 | V2 | V3 | V4 | V5, 14, "engine[0].cylinder_head_temperature_cooling_rate"),
    m(V1 | V2 | V3 | V4 | V5, 15, "engine[0].oil_temperature"),
    // byte 2
    m(V1 | V2 | V3 | V4 | V5, 16, "mark"),
    m(V1 | V3 | V4 | V5, 17, "engine[0].oil_pressure"),
    m(V1 | V2 | V3 | V4 | V5, 18, "engine[0].compressor_discharge_temperature"),
    m(V1 | V3 | V4 | V5, 19, "engine[0].induction_air_temperature"),
    ms(V2, 19, "engine[1].manifold_pressure", Ten),
    ms(V1 | V2 | V3 | V4 | V5, 20, "voltage[0]", Ten),
    m(V1 | V2 | V3 | V4 | V5, 21, "outside_air_temperature"),
    ms(V1 | V2 | V3 | V4 | V5, 22, "engine[0].fuel_used[0]", TenIfGph),
    ms(V1 | V2 | V3 | V4 | V5, 23, "engine[0].fuel_flow[0]", TenIfGph),
    // bytes 3 and 7
    mh(V1 | V3 | V4, 24, 56, "engine[0].exhaust_gas_temperature[6]"),
    mh(V2 | V5, 24, 56, "engine[1].exhaust_gas_temperature[0]"),
    mh(V1 | V3 | V4, 25, 57, "engine[0].exhaust_gas_temperature[7]"),
    mh(V2 | V5, 25, 57, "engine[1].exhaust_gas_temperature[1]"),
    mh(V1 | V3 | V4, 26, 58, "engine[0].exhaust_gas_temperature[8]"),
    mh(V2 | V5, 26, 58, "engine[1].exhaust_gas_temperature[2]"),
    m(V1 | V3 | V4, 27, "engine[0].cylinder_head_temperature[6]"),
    mh(V2 | V5, 27, 59, "engine[1].exhaust_gas_temperature[3]"),
    m(V1 | V3 | V4, 28, "engine[0].cylinder_head_temperature[7]"),
    mh(V2 | V5, 28, 60, "engine[1].exhaust_gas_temperature[4]"),
    m(V1 | V3 | V4, 29, "engine[0].cylinder_head_temperature[8]"),
    mh(V2 | V5, 29, 61, "engine[1].exhaust_gas_temperature[5]"),
    m(V1 | V3 | V4, 30, "engine[0].horsepower"),
    mh(V2 | V5, 30, 62, "engine[1].turbine_inlet_temperature[0]"),
    mh(V2 | V5, 31, 63, "engine[1].turbine_inlet_temperature[1]"),
    // byte 4
    m(V2 | V5, 32, "engine[1].cylinder_head_temperature[0]"),
    m(V2 | V5, 33, "engine[1].cylinder_head_temperature[1]"),
    m(V2 | V5, 34, "engine[1].cylinder_head_temperature[2]"),
    m(V2 | V5, 35, "engine[1].cylinder_head_temperature[3]"),
    m(V2 | V5, 36, "engine[1].cylinder_head_temperature[4]"),
    m(V2 | V5, 37, "engine[1].cylinder_head_temperature[5]"),
    m(V2 | V5, 38, "engine[1].cylinder_head_temperature_cooling_rate"),
    m(V2 | V5, 39, "engine[1].oil_temperature"),
    // byte 5
    ms(V1 | V2 | V3 | V4 | V5, 40, "engine[0].manifold_pressure", Ten),
    mh(V1 | V2 | V3 | V4 | V5, 41, 42, "engine[0].rpm"),
    mh(V2 | V5, 43, 44, "engine[1].rpm"),
    m(V4, 44, "engine[0].hydraulic_pressure[1]"),
    m(V2 | V5, 45, "engine[1].compressor_discharge_temperature"),
    m(V4, 45, "engine[0].hydraulic_pressure[0]"),
    ms(V2 | V5, 46, "engine[1].fuel_used[0]", TenIfGph),
    ms(V4, 46, "engine[0].fuel_flow[1]", TenIfGph),
    ms(V4, 47, "engine[0].fuel_used[1]", TenIfGph),
    ms(V2 | V5, 47, "engine[1].fuel_flow[0]", TenIfGph),
    // byte 8
    m(V3 | V4 | V5, 64, "amperage[0]"),
    ms(V3 | V4 | V5, 65, "voltage[1]", Ten),
    m(V3 | V4 | V5, 66, "amperage[1]"),
    ms(V3 | V4, 67, "engine[1].fuel_level[0]", TenIfGph),
    ms(V5, 67, "engine[0].fuel_level[0]", TenIfGph),
    ms(V3 | V4, 68, "engine[0].fuel_level[0]", TenIfGph),
    ms(V5, 68, "engine[0].fuel_level[1]", TenIfGph),
    ms(V3 | V4 | V5, 69, "engine[0].fuel_pressure", Ten),
    m(V5, 70, "engine[0].horsepower"),
    ms(V4, 71, UNSUPPORTED, TenIfGph), // left aux level ?
    ms(V5, 71, "engine[0].fuel_level[2]", TenIfGph),
    // byte 9
    mhs(V4 | V5, 72, 76, UNSUPPORTED, Ten), // left ng ?
    mh(V4 | V5, 73, 77, UNSUPPORTED),       // left np ?
    m(V4 | V5, 74, "engine[0].torque"),
    m(V4 | V5, 75, UNSUPPORTED), // left itt, but no high byte ?
    mhs(V4 | V5, 78, 79, "engine[0].hours", Ten),
    // byte 10
    ms(V4, 84, UNSUPPORTED, TenIfGph), // right aux level ?
    // byte 11
    ms(V5, 88, "engine[1].manifold_pressure", Ten),
    m(V5, 89, "engine[1].horsepower"),
    m(V5, 90, "engine[1].induction_air_temperature"),
    ms(V5, 91, "engine[1].fuel_level[0]", TenIfGph),
    ms(V5, 92, "engine[1].fuel_level[1]", TenIfGph),
    ms(V5, 93, "engine[1].fuel_pressure", Ten),
    ms(V5, 94, "engine[1].oil_pressure", Ten),
    ms(V5, 95, "engine[1].fuel_level[2]", TenIfGph),
    // byte 12
    mhs(V5, 96, 100, UNSUPPORTED, Ten), // right ng ?
    mh(V5, 97, 101, UNSUPPORTED),       // right np ?
    m(V5, 98, "engine[1].torque"),
    m(V5, 99, UNSUPPORTED), // right itt, but no high byte ?
    mhs(V5, 102, 103, "engine[1].hours", Ten),
    // byte 13
    mh(V5, 104, 108, "engine[0].exhaust_gas_temperature[6]"),
    mh(V5, 105, 109, "engine[0].exhaust_gas_temperature[7]"),
    mh(V5, 106, 110, "engine[0].exhaust_gas_temperature[8]"),
    ms(V5, 107, "engine[1].fuel_flow[1]", TenIfGph),
    m(V5, 111, "engine[0].hydraulic_pressure[0]"),
    // byte 14
    mh(V5, 112, 116, "engine[1].exhaust_gas_temperature[6]"),
    mh(V5, 113, 117, "engine[1].exhaust_gas_temperature[7]"),
    mh(V5, 114, 118, "engine[1].exhaust_gas_temperature[6]"),
    ms(V5, 115, "engine[1].fuel_flow[1]", TenIfGph),
    m(V5, 119, "engine[1].hydraulic_pressure[0]"),
    // byte 15
    m(V5, 120, "engine[0].cylinder_head_temperature[6]"),
    m(V5, 121, "engine[0].cylinder_head_temperature[7]"),
    m(V5, 122, "engine[0].cylinder_head_temperature[8]"),
    m(V5, 123, "engine[0].hydraulic_pressure[1]"),
    m(V5, 124, "engine[1].cylinder_head_temperature[6]"),
    m(V5, 125, "engine[1].cylinder_head_temperature[7]"),
    m(V5, 126, "engine[1].cylinder_head_temperature[8]"),
    m(V5, 127, "engine[1].hydraulic_pressure[1]"),
];

/// The one-hot version tag for a unit, from its model and firmware identity.
/// The first matching rule wins.
pub fn version_selector(metadata: &Metadata) -> u8 {
    if metadata.is_model_number(760) {
        V2
    } else if metadata.is_model_number(960) {
        V5
    } else if metadata.is_model_number_at_least(900) {
        if metadata.is_firmware_version_at_least(108) {
            V4
        } else {
            V3
        }
    } else if metadata.has_protocol_header() {
        V4
    } else {
        V1
    }
}

/// The decode-mask-bit to metric map for one unit, built once per file.
pub struct MetricTable {
    by_bit: [Option<&'static Metric>; 128],
}

impl MetricTable {
    /// Build the table for the unit described by `metadata`.
    pub fn for_metadata(metadata: &Metadata) -> Result<Self, Error> {
        Self::build(CATALOGUE, version_selector(metadata))
    }

    /// Build a table from a catalogue slice, admitting the metrics whose
    /// version mask intersects `selector`. Fails if two admitted metrics
    /// claim the same bit position; that is a catalogue bug, not a data
    /// error.
    pub fn build(catalogue: &'static [Metric], selector: u8) -> Result<Self, Error> {
        let mut by_bit = [None; 128];
        let mut claim = |bit: u8, metric: &'static Metric| match by_bit[bit as usize] {
            Some(_) => Err(Error::MetricCollision { bit }),
            None => {
                by_bit[bit as usize] = Some(metric);
                Ok(())
            }
        };
        for metric in catalogue {
            if metric.version_mask & selector == 0 {
                continue;
            }
            claim(metric.low_byte_bit, metric)?;
            if let Some(high) = metric.high_byte_bit {
                claim(high, metric)?;
            }
        }
        Ok(Self { by_bit })
    }

    /// The metric claiming decode bit `bit`, if any.
    pub fn metric(&self, bit: u8) -> Option<&'static Metric> {
        self.by_bit[bit as usize]
    }
}
