//! The textual header section: configuration, identity, and the flight
//! directory.
//!
//! A download begins with a sequence of `$`-prefixed, comma-separated lines,
//! each closed by `*` and a two-digit XOR checksum, e.g.
//! `$C,830,63741,6193,1552,290,38,300,1*4C`. The `L` line terminates the
//! section; the binary flight segments follow immediately after its CRLF.

use std::io::Read;

use chrono::{TimeZone, Utc};

use crate::sensors::{self, Sensors};
use crate::stream::JpiStream;
use crate::Error;

const MAX_NUM_HEADER_LINES: usize = 128;
const MAX_HEADER_LINE_LENGTH: usize = 128;

/// Everything the textual header section describes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Metadata {
    pub registration: String,
    pub alarm_thresholds: Option<AlarmThresholds>,
    pub features: Features,
    pub fuel: Fuel,
    pub protocol_version: Option<u32>,
    /// When the download was taken, seconds since the Unix epoch.
    pub download_timestamp: Option<i64>,
    /// Flights contained in the file, in file order, with unique numbers.
    pub flight_directory: Vec<FlightDirectoryEntry>,
    /// Length of the header section in bytes; the first flight begins here.
    pub length: usize,
    pub parse_warning: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlarmThresholds {
    pub max_volts: f32,
    pub min_volts: f32,
    pub max_exhaust_gas_temperature_difference: i32,
    pub max_cylinder_head_temperature: i32,
    pub max_cylinder_head_temperature_cooling_rate: i32,
    pub max_exhaust_gas_temperature: i32,
    pub max_oil_temperature: i32,
    pub min_oil_temperature: i32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Features {
    pub model_number: u32,
    pub firmware_version: u32,
    pub build_number: u32,
    pub beta_number: u32,
    pub sensors: Sensors,
    pub engine_temperature_unit: TemperatureUnit,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Fuel {
    pub fuel_flow_units: FuelFlowUnits,
    pub full_quantity: i32,
    pub warning_quantity: i32,
    pub k_factor_1: i32,
    pub k_factor_2: i32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FuelFlowUnits {
    #[default]
    Gph,
    Pph,
    Lph,
    Kph,
}

impl FuelFlowUnits {
    fn from_header(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Gph),
            1 => Some(Self::Pph),
            2 => Some(Self::Lph),
            3 => Some(Self::Kph),
            _ => None,
        }
    }
}

/// One `$D` line: a flight number and its segment length in 16-bit words.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlightDirectoryEntry {
    pub flight_number: u16,
    pub length_words: u32,
}

impl Metadata {
    pub fn has_protocol_header(&self) -> bool {
        self.protocol_version.is_some()
    }

    pub fn has_extra_flight_header_configuration(&self) -> bool {
        self.has_protocol_header() || self.is_model_number_at_least(900)
    }

    pub fn decode_mask_is_single_byte(&self) -> bool {
        !self.has_protocol_header() && !self.is_model_number_at_least(900)
    }

    pub fn is_model_number(&self, model_number: u32) -> bool {
        self.features.model_number == model_number
    }

    pub fn is_model_number_at_least(&self, model_number: u32) -> bool {
        self.features.model_number >= model_number
    }

    pub fn is_firmware_version_at_least(&self, version: u32) -> bool {
        self.features.firmware_version >= version
    }

    pub fn is_build_number_at_least(&self, build_number: u32) -> bool {
        self.features.build_number >= build_number
    }

    pub fn is_twin_engine(&self) -> bool {
        self.is_model_number(760) || self.is_model_number(960)
    }

    pub fn is_gallons_per_hour(&self) -> bool {
        self.fuel.fuel_flow_units == FuelFlowUnits::Gph
    }

    /// The directory entry following `flight_number`, if any.
    pub fn next_flight_number(&self, flight_number: u16) -> Option<u16> {
        let index = self
            .flight_directory
            .iter()
            .position(|e| e.flight_number == flight_number)?;
        Some(self.flight_directory.get(index + 1)?.flight_number)
    }

    pub fn is_last_flight(&self, flight_number: u16) -> bool {
        self.flight_directory
            .last()
            .is_some_and(|e| e.flight_number == flight_number)
    }
}

/// Parse the header section, leaving the stream counter reset at its start
/// so that [`Metadata::length`] is the offset of the first flight.
pub fn parse<R: Read>(stream: &mut JpiStream<R>) -> Result<Metadata, Error> {
    stream.reset_counter();
    let mut metadata = Metadata::default();
    for _ in 0..MAX_NUM_HEADER_LINES {
        let line = read_line(stream)?;
        let items = split_checked(&line, &mut metadata.parse_warning)?;
        if !apply_line(&items, &mut metadata)? {
            metadata.length = stream.counter();
            return Ok(metadata);
        }
    }
    Err(Error::Header("too many header lines".into()))
}

/// Read up to the next CRLF, exclusive.
fn read_line<R: Read>(stream: &mut JpiStream<R>) -> Result<String, Error> {
    let mut line = String::new();
    while line.len() < MAX_HEADER_LINE_LENGTH {
        line.push(stream.read_u8()? as char);
        if let Some(body) = line.strip_suffix("\r\n") {
            return Ok(body.to_string());
        }
    }
    Err(Error::Header(format!("header line too long: {line}")))
}

/// Validate the `$…*XX` framing and XOR checksum, returning the
/// comma-separated items of the body. A checksum mismatch is recorded as a
/// warning, not a failure.
fn split_checked(line: &str, warnings: &mut Vec<String>) -> Result<Vec<String>, Error> {
    let Some((body, checksum)) = line.split_once('*') else {
        Err(Error::Header(format!(
            "expected a checksum denoted with * in line {line}"
        )))?
    };
    let Some(body) = body.strip_prefix('$') else {
        Err(Error::Header(format!(
            "expected line {line} to begin with $"
        )))?
    };
    let actual = u8::from_str_radix(checksum.trim(), 16)
        .map_err(|e| Error::Header(format!("checksum byte malformed: {e} in line {line}")))?;
    let computed = body.bytes().fold(0u8, |acc, b| acc ^ b);
    if computed != actual {
        warnings.push(format!(
            "Checksum mismatch actual {actual:02X} vs expected {computed:02X}: [{body}]"
        ));
    }
    Ok(body.split(',').map(|item| item.trim().to_string()).collect())
}

/// Decode one header line into the metadata. Returns false once the
/// terminating `L` line has been seen.
fn apply_line(items: &[String], metadata: &mut Metadata) -> Result<bool, Error> {
    let mut parts = items.iter().map(String::as_str);
    let Some(prefix) = parts.next() else {
        return Ok(true);
    };
    match prefix {
        "A" => metadata.alarm_thresholds = Some(parse_alarm_thresholds(&mut parts)?),
        "C" => metadata.features = parse_features(&mut parts)?,
        "D" => metadata.flight_directory.push(FlightDirectoryEntry {
            flight_number: number(parts.next())?,
            length_words: number(parts.next())?,
        }),
        "F" => metadata.fuel = parse_fuel(&mut parts)?,
        "L" => return Ok(false),
        "P" => metadata.protocol_version = Some(number(parts.next())?),
        "T" => metadata.download_timestamp = Some(parse_download_timestamp(&mut parts)?),
        "U" => {
            metadata.registration = parts
                .next()
                .unwrap_or_default()
                .replace('_', " ")
                .trim()
                .to_string();
        }
        // E (alarm enables), H, I, and W are recognized but carry nothing we
        // decode yet.
        _ => {}
    }
    Ok(true)
}

fn number<T: std::str::FromStr>(part: Option<&str>) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    let part = part.ok_or_else(|| Error::Header("header line truncated".into()))?;
    part.parse()
        .map_err(|e| Error::Header(format!("malformed number {part}: {e}")))
}

fn parse_alarm_thresholds<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
) -> Result<AlarmThresholds, Error> {
    Ok(AlarmThresholds {
        max_volts: number::<f32>(parts.next())? / 10.0,
        min_volts: number::<f32>(parts.next())? / 10.0,
        max_exhaust_gas_temperature_difference: number(parts.next())?,
        max_cylinder_head_temperature: number(parts.next())?,
        max_cylinder_head_temperature_cooling_rate: number(parts.next())?,
        max_exhaust_gas_temperature: number(parts.next())?,
        max_oil_temperature: number(parts.next())?,
        min_oil_temperature: number(parts.next())?,
    })
}

fn parse_fuel<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Fuel, Error> {
    let units = number(parts.next())?;
    Ok(Fuel {
        fuel_flow_units: FuelFlowUnits::from_header(units)
            .ok_or_else(|| Error::Header(format!("unknown fuel flow units {units}")))?,
        full_quantity: number(parts.next())?,
        warning_quantity: number(parts.next())?,
        k_factor_1: number(parts.next())?,
        k_factor_2: number(parts.next())?,
    })
}

fn parse_download_timestamp<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
) -> Result<i64, Error> {
    let month: u32 = number(parts.next())?;
    let day: u32 = number(parts.next())?;
    let year: i32 = number::<i32>(parts.next())? + 2000;
    let hour: u32 = number(parts.next())?;
    let minute: u32 = number(parts.next())?;
    let _unknown: i32 = number(parts.next())?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .map(|t| t.timestamp())
        .ok_or_else(|| Error::Header(format!("invalid download timestamp {year}-{month}-{day}")))
}

fn parse_features<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Features, Error> {
    let model_number = number(parts.next())?;
    let low: u16 = number(parts.next())?;
    let high: u16 = number(parts.next())?;
    let _unknown: u32 = number(parts.next())?;

    // Bit 12 of the high sensor word selects the engine temperature unit.
    let engine_temperature_unit = if high & (1 << 12) != 0 {
        TemperatureUnit::Fahrenheit
    } else {
        TemperatureUnit::Celsius
    };

    // The version numbers always come last, but different models put
    // additional data before them, so pick them off the reversed tail.
    let tail: Vec<&str> = parts.collect();
    let mut reversed = tail.iter().rev().copied();
    let (beta_number, build_number) = if tail.len() > 3 {
        (number(reversed.next())?, number(reversed.next())?)
    } else {
        (0, 0)
    };
    let firmware_version = number(reversed.next())?;

    Ok(Features {
        model_number,
        firmware_version,
        build_number,
        beta_number,
        sensors: sensors::parse(low, high),
        engine_temperature_unit,
    })
}
