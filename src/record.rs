//! The decoded output model.
//!
//! A [`DataRecord`] is the materialized state of every channel at one
//! recording interval. Records are addressable by dotted/indexed path strings
//! (see the [`path`] module); the [`Fields`] trait, derived on each record
//! struct, publishes the name-to-slot directory that addressing resolves
//! against.

pub mod path;

use magneto_derive::Fields;

use crate::metadata::Metadata;
use crate::sensors::Sensors;

/// A fully decoded download: the textual-header metadata and the selected
/// flights.
#[derive(Debug, Clone, PartialEq)]
pub struct JpiFile {
    pub metadata: Metadata,
    pub flight: Vec<Flight>,
}

/// One power-on session of the instrument.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Flight {
    pub flight_number: u16,
    /// Seconds since the Unix epoch, composed in UTC.
    pub start_timestamp: i64,
    pub recording_interval_secs: u16,
    pub sensors: Sensors,
    /// Bytes consumed by the flight header, including its checksum byte.
    pub header_length: usize,
    /// Bytes consumed (or skipped) by the flight's data records.
    pub data_length: usize,
    pub data: Vec<DataRecord>,
    pub parse_warning: Vec<String>,
}

/// The pilot-initiated mark channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    NotMarked,
    Marked,
    RichStart,
    RichEnd,
}

impl Mark {
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Self::NotMarked),
            1 => Some(Self::Marked),
            2 => Some(Self::RichStart),
            3 => Some(Self::RichEnd),
            _ => None,
        }
    }

    pub fn ordinal(self) -> i64 {
        match self {
            Self::NotMarked => 0,
            Self::Marked => 1,
            Self::RichStart => 2,
            Self::RichEnd => 3,
        }
    }
}

/// One time-sampled record across all engines.
#[derive(Debug, Default, Clone, PartialEq, Fields)]
pub struct DataRecord {
    #[field]
    pub engine: Vec<EngineDataRecord>,
    #[field]
    pub voltage: Vec<f32>,
    #[field]
    pub amperage: Vec<i32>,
    #[field]
    pub outside_air_temperature: Option<i32>,
    #[field]
    pub mark: Option<Mark>,
    pub parse_warning: Vec<String>,
}

/// Per-engine channels of a [`DataRecord`].
#[derive(Debug, Default, Clone, PartialEq, Fields)]
pub struct EngineDataRecord {
    #[field]
    pub exhaust_gas_temperature: Vec<i32>,
    #[field]
    pub cylinder_head_temperature: Vec<i32>,
    #[field]
    pub turbine_inlet_temperature: Vec<i32>,
    #[field]
    pub oil_temperature: Option<i32>,
    #[field]
    pub oil_pressure: Option<i32>,
    #[field]
    pub compressor_discharge_temperature: Option<i32>,
    #[field]
    pub induction_air_temperature: Option<i32>,
    #[field]
    pub manifold_pressure: Option<f32>,
    #[field]
    pub rpm: Option<i32>,
    #[field]
    pub horsepower: Option<i32>,
    #[field]
    pub fuel_used: Vec<f32>,
    #[field]
    pub fuel_flow: Vec<f32>,
    #[field]
    pub fuel_level: Vec<f32>,
    #[field]
    pub fuel_pressure: Option<f32>,
    #[field]
    pub hours: Option<f32>,
    #[field]
    pub torque: Option<i32>,
    #[field]
    pub hydraulic_pressure: Vec<i32>,
    #[field]
    pub cylinder_head_temperature_cooling_rate: Option<i32>,
    #[field]
    pub max_exhaust_gas_temperature_difference: Option<i32>,
}

/// A polymorphic field value, as read from or written through a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Mark(Mark),
}

impl Value {
    /// The numeric reading of the value; marks read as their ordinal.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
            Self::Mark(m) => m.ordinal() as f64,
        }
    }

    pub fn as_f32(self) -> f32 {
        self.as_f64() as f32
    }

    /// The integer part of the value.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Float(v) => v as i64,
            Self::Mark(m) => m.ordinal(),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Mark> for Value {
    fn from(m: Mark) -> Self {
        Self::Mark(m)
    }
}

/// A read-only reference to one named field of a record.
pub enum Slot<'a> {
    Int(&'a Option<i32>),
    Float(&'a Option<f32>),
    Mark(&'a Option<Mark>),
    IntList(&'a Vec<i32>),
    FloatList(&'a Vec<f32>),
    Engines(&'a Vec<EngineDataRecord>),
}

/// A mutable reference to one named field of a record.
pub enum SlotMut<'a> {
    Int(&'a mut Option<i32>),
    Float(&'a mut Option<f32>),
    Mark(&'a mut Option<Mark>),
    IntList(&'a mut Vec<i32>),
    FloatList(&'a mut Vec<f32>),
    Engines(&'a mut Vec<EngineDataRecord>),
}

/// The name-to-slot directory of a record struct.
///
/// See the [`Fields`](magneto_derive::Fields) derive macro for the automatic
/// implementation used by the output model.
pub trait Fields {
    /// Retrieve a field by name, if one exists.
    fn slot(&self, name: &str) -> Option<Slot<'_>>;
    /// Retrieve a field by name for mutation, if one exists.
    fn slot_mut(&mut self, name: &str) -> Option<SlotMut<'_>>;
}
