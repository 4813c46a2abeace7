//! Flight segments: a binary header followed by delta-compressed data
//! records.

pub mod data;

use std::io::Read;

use chrono::{TimeZone, Utc};
use tartan_bitfield::bitfield;
use tracing::trace;

use crate::flight::data::DataRecordParser;
use crate::metadata::Metadata;
use crate::metrics::MetricTable;
use crate::record::{DataRecord, Flight};
use crate::sensors;
use crate::stream::JpiStream;
use crate::Error;

bitfield! {
    struct PackedDate(u16) {
        [0..5] day: u8,
        [5..9] month: u8,
        [9..16] year: u8,
    }
}

bitfield! {
    struct PackedTime(u16) {
        [0..5] half_seconds: u8,
        [5..11] minute: u8,
        [11..16] hour: u8,
    }
}

fn parse_start_timestamp(packed_date: u16, packed_time: u16) -> Result<i64, Error> {
    let date = PackedDate(packed_date);
    let time = PackedTime(packed_time);

    // Two-digit years pivot at 75, the monitors' introduction.
    let mut year = u32::from(date.year());
    year += if year >= 75 { 1900 } else { 2000 };

    Utc.with_ymd_and_hms(
        year as i32,
        u32::from(date.month()),
        u32::from(date.day()),
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.half_seconds()) * 2,
    )
    .single()
    .map(|t| t.timestamp())
    .ok_or_else(|| Error::Format {
        reason: format!("invalid start timestamp {packed_date:04X} {packed_time:04X}"),
        record: String::new(),
    })
}

/// Parses one flight segment, either fully or header-only.
///
/// The directory entry gives an estimate of the segment length covering both
/// the header and the data. The actual length can be one byte less, which
/// the skip path resolves by probing for the next flight number.
pub struct FlightParser<'a, R> {
    stream: &'a mut JpiStream<R>,
    metadata: &'a Metadata,
    table: &'a MetricTable,
    flight_number: u16,
    estimated_length_bytes: usize,
}

impl<'a, R: Read> FlightParser<'a, R> {
    pub fn new(
        stream: &'a mut JpiStream<R>,
        metadata: &'a Metadata,
        table: &'a MetricTable,
        flight_number: u16,
        length_words: u32,
    ) -> Self {
        Self {
            stream,
            metadata,
            table,
            flight_number,
            estimated_length_bytes: length_words as usize * 2,
        }
    }

    /// Parse the flight header and every data record. The stream should be
    /// at the beginning of the flight.
    pub fn parse(&mut self) -> Result<Flight, Error> {
        let mut flight = self.parse_header()?;
        self.parse_data(&mut flight)?;
        Ok(flight)
    }

    /// Parse the flight header and skip past the data records. The stream
    /// should be at the beginning of the flight.
    pub fn parse_header_and_skip_data(&mut self) -> Result<Flight, Error> {
        let mut flight = self.parse_header()?;
        flight.data_length = self.skip_data(flight.header_length)?;
        Ok(flight)
    }

    fn parse_header(&mut self) -> Result<Flight, Error> {
        self.stream.reset_counter();
        self.stream.clear_record();

        let mut flight = Flight::default();
        flight.flight_number = self.stream.read_u16()?;
        if flight.flight_number != self.flight_number {
            flight.parse_warning.push(format!(
                "Unexpected flight number {} (0x{:04X}) instead of expected {} (0x{:04X})",
                flight.flight_number, flight.flight_number, self.flight_number, self.flight_number
            ));
        }
        trace!("parsing flight {} header", flight.flight_number);

        let low = self.stream.read_u16()?;
        let high = self.stream.read_u16()?;
        flight.sensors = sensors::parse(low, high);

        if self.metadata.has_extra_flight_header_configuration() {
            let _config_low = self.stream.read_u16()?;
            let _config_high = self.stream.read_u16()?;
            if self.metadata.is_build_number_at_least(880) {
                let _config = self.stream.read_u16()?;
            }
        }

        let _unknown = self.stream.read_u16()?;

        flight.recording_interval_secs = self.stream.read_u16()?;

        let packed_date = self.stream.read_u16()?;
        let packed_time = self.stream.read_u16()?;
        flight.start_timestamp = parse_start_timestamp(packed_date, packed_time)?;

        if let Some(warning) = self.stream.checksum_epilogue()? {
            flight.parse_warning.push(warning);
        }

        flight.header_length = self.stream.record_len();
        trace!(
            "parsed {} header bytes [{}]",
            self.stream.record_len(),
            self.stream.record_hex()
        );
        Ok(flight)
    }

    fn parse_data(&mut self, flight: &mut Flight) -> Result<(), Error> {
        let mut parser = DataRecordParser::new(self.metadata, self.table);
        let mut previous: Option<DataRecord> = None;
        while self.stream.counter() + self.minimum_record_size() <= self.estimated_length_bytes {
            let record = parser.parse(self.stream, previous.as_ref())?;

            // A repeat count means "emit the previous record N extra times
            // before this one".
            for _ in 0..parser.previous_repeat_count() {
                let repeated = previous.clone().ok_or_else(|| Error::Format {
                    reason: "repeat count with no previous record".into(),
                    record: self.stream.record_hex(),
                })?;
                flight.data.push(repeated);
            }
            flight.data.push(record.clone());
            previous = Some(record);
        }
        flight.data_length = self.stream.counter();
        Ok(())
    }

    /// Skips to the start of the next flight, returning the number of bytes
    /// skipped. The next record can start at either `length_words * 2` or
    /// one byte earlier, so probe for the next flight number at both.
    fn skip_data(&mut self, header_length: usize) -> Result<usize, Error> {
        if self.metadata.is_last_flight(self.flight_number) {
            return self.stream.skip_to_end();
        }
        let mut num_skip = self.estimated_length_bytes - header_length - 1;
        trace!(
            "skipping {num_skip} bytes ({} - {header_length} - 1)",
            self.estimated_length_bytes
        );
        self.stream.skip(num_skip)?;

        // Each flight header begins with the flight number.
        let peek = self.stream.peek::<3>()?;
        trace!("peeked at {:02X} {:02X} {:02X}", peek[0], peek[1], peek[2]);
        let next_flight_number = self
            .metadata
            .next_flight_number(self.flight_number)
            .ok_or_else(|| Error::Format {
                reason: format!("flight {} missing from the directory", self.flight_number),
                record: String::new(),
            })?;
        if u16::from_be_bytes([peek[0], peek[1]]) != next_flight_number {
            if u16::from_be_bytes([peek[1], peek[2]]) != next_flight_number {
                return Err(Error::Format {
                    reason: "could not find next flight header".into(),
                    record: format!("{:02X} {:02X} {:02X}", peek[0], peek[1], peek[2]),
                });
            }
            num_skip += 1;
            self.stream.skip(1)?;
        }
        Ok(num_skip)
    }

    // Two decode masks and the repeat count byte; value, sign, and payload
    // bytes are all conditional.
    fn minimum_record_size(&self) -> usize {
        if self.metadata.decode_mask_is_single_byte() {
            3
        } else {
            5
        }
    }
}
