//! A decoder for the download files produced by JPI EDM engine monitors.
//!
//! The monitors record engine metrics (temperatures, pressures, fuel flow,
//! and the like) during flight and dump them over a serial port as a `.JPI`
//! file: a short textual header naming the aircraft, the installed sensors,
//! and a flight directory, followed by one delta-compressed binary segment
//! per flight.
//!
//! Most users should call [`decode`] with a reader over the whole file:
//!
//! ```no_run
//! use std::fs::File;
//!
//! use magneto::{decode, DecodeConfig};
//!
//! let file = File::open("U250901.JPI")?;
//! let jpi = decode(file, &DecodeConfig::default())?;
//! for flight in &jpi.flight {
//!     println!("flight {}: {} records", flight.flight_number, flight.data.len());
//! }
//! # Ok::<(), magneto::Error>(())
//! ```
//!
//! [`DecodeConfig`] selects which flights to fully decode; the rest are
//! skipped over cheaply using the directory's length estimates.

pub mod bits;
pub mod flight;
pub mod metadata;
pub mod metrics;
pub mod record;
pub mod sensors;
pub mod stream;

use std::io::Read;

use thiserror::Error as ThisError;

use crate::flight::FlightParser;
use crate::metrics::MetricTable;
use crate::record::JpiFile;
use crate::stream::JpiStream;

/// Errors occurring while decoding a download.
///
/// Only conditions that leave the stream position unrecoverable are errors;
/// suspicious-but-resynchronizable input is reported through the
/// `parse_warning` lists on the decoded records instead.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Unexpectedly reached the end of the download.
    #[error("Unexpectedly reached the end of the download.")]
    UnexpectedEof,
    /// An error from the supplied reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The binary stream contradicts the format.
    #[error("{reason}: [{record}]")]
    Format { reason: String, record: String },
    /// A malformed textual header line.
    #[error("Malformed header: {0}.")]
    Header(String),
    /// Two metrics claim the same decode bit for one version.
    #[error("Two metrics claim decode bit {bit}.")]
    MetricCollision { bit: u8 },
}

/// Selects which flights [`decode`] fully decodes.
///
/// The default decodes every flight in the file.
#[derive(Debug, Default, Clone)]
pub struct DecodeConfig {
    headers_only: bool,
    start_flight_number: Option<u16>,
    end_flight_number: Option<u16>,
}

impl DecodeConfig {
    /// Parse only the header of each flight, skipping the data records. The
    /// decoded flights will have empty `data`.
    pub fn headers_only(mut self) -> Self {
        self.headers_only = true;
        self
    }

    /// Skip flights numbered below `flight_number`.
    pub fn start_flight_number(mut self, flight_number: u16) -> Self {
        self.start_flight_number = Some(flight_number);
        self
    }

    /// Skip flights numbered above `flight_number`.
    pub fn end_flight_number(mut self, flight_number: u16) -> Self {
        self.end_flight_number = Some(flight_number);
        self
    }

    /// Decode a single flight.
    pub fn exact_flight_number(self, flight_number: u16) -> Self {
        self.start_flight_number(flight_number)
            .end_flight_number(flight_number)
    }

    fn selects(&self, flight_number: u16) -> bool {
        self.start_flight_number.is_none_or(|n| flight_number >= n)
            && self.end_flight_number.is_none_or(|n| flight_number <= n)
    }
}

/// Decode a download into its metadata and flights.
///
/// Flights outside the configured range are skipped over and not emitted.
pub fn decode<R: Read>(reader: R, config: &DecodeConfig) -> Result<JpiFile, Error> {
    let mut stream = JpiStream::new(reader);
    let metadata = metadata::parse(&mut stream)?;
    let table = MetricTable::for_metadata(&metadata)?;

    let mut flights = Vec::new();
    for entry in &metadata.flight_directory {
        let mut parser = FlightParser::new(
            &mut stream,
            &metadata,
            &table,
            entry.flight_number,
            entry.length_words,
        );
        if !config.selects(entry.flight_number) {
            parser.parse_header_and_skip_data()?;
            continue;
        }
        flights.push(if config.headers_only {
            parser.parse_header_and_skip_data()?
        } else {
            parser.parse()?
        });
    }
    Ok(JpiFile {
        metadata,
        flight: flights,
    })
}
