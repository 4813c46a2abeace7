//! The delta decoder for flight data records.
//!
//! Each record updates the previous one. A decode mask (written twice, as its
//! own integrity check) selects which of up to 16 value-flag bytes follow;
//! each set flag bit maps through the metric table to one output field and
//! consumes one payload byte holding the magnitude of that field's change.

use std::collections::HashMap;
use std::io::Read;

use tracing::trace;

use crate::bits::BitArray;
use crate::metadata::Metadata;
use crate::metrics::{Metric, MetricTable};
use crate::record::path::Accessor;
use crate::record::{DataRecord, Value};
use crate::stream::JpiStream;
use crate::Error;

/// A payload byte of zero means the value is "not available".
const NOT_AVAILABLE_MARKER: u8 = 0;

/// The decode mask covers at most 16 flag bytes.
const MAX_NUM_VALUE_BYTES: usize = 16;

pub struct DataRecordParser<'a> {
    metadata: &'a Metadata,
    table: &'a MetricTable,
    value_flags: BitArray,
    sign_flags: BitArray,
    previous_repeat_count: u8,
    /// Last known actual values of fields currently "not available", keyed
    /// by the metric's low-byte bit. A cleared field stands in for "N/A" in
    /// the output; the real value is preserved here to seed later deltas.
    na_values: HashMap<u8, Value>,
}

impl<'a> DataRecordParser<'a> {
    pub fn new(metadata: &'a Metadata, table: &'a MetricTable) -> Self {
        Self {
            metadata,
            table,
            value_flags: BitArray::new(MAX_NUM_VALUE_BYTES),
            sign_flags: BitArray::new(MAX_NUM_VALUE_BYTES),
            previous_repeat_count: 0,
            na_values: HashMap::new(),
        }
    }

    /// How many extra times the caller should emit the previous record
    /// before the one most recently parsed.
    pub fn previous_repeat_count(&self) -> u8 {
        self.previous_repeat_count
    }

    pub fn parse<R: Read>(
        &mut self,
        stream: &mut JpiStream<R>,
        previous: Option<&DataRecord>,
    ) -> Result<DataRecord, Error> {
        self.value_flags.clear();
        self.sign_flags.clear();
        self.previous_repeat_count = 0;
        stream.clear_record();

        let mut record = previous.cloned().unwrap_or_default();
        record.parse_warning.clear();

        for bit in self.read_masks(stream, &mut record)? {
            let value = stream.read_u8()?;
            self.update_value(stream, &mut record, bit, value)?;
        }
        calculate_exhaust_gas_temperature_max_diffs(&mut record);

        if let Some(warning) = stream.checksum_epilogue()? {
            record.parse_warning.push(warning);
        }

        trace!(
            "parsed {} record bytes [{}]",
            stream.record_len(),
            stream.record_hex()
        );
        Ok(record)
    }

    /// Reads the doubled decode mask, the repeat count, and the value and
    /// sign flag bytes, returning the set value-flag bits in ascending
    /// order.
    fn read_masks<R: Read>(
        &mut self,
        stream: &mut JpiStream<R>,
        record: &mut DataRecord,
    ) -> Result<Vec<u8>, Error> {
        let single_byte = self.metadata.decode_mask_is_single_byte();
        let (decode_mask, second_decode_mask) = if single_byte {
            (u16::from(stream.read_u8()?), u16::from(stream.read_u8()?))
        } else {
            (stream.read_u16()?, stream.read_u16()?)
        };
        if decode_mask != second_decode_mask {
            return Err(Error::Format {
                reason: format!("expected the decode mask {decode_mask:02X} to appear twice"),
                record: stream.record_hex(),
            });
        }
        trace!("decode mask is {decode_mask:04X}");

        self.previous_repeat_count = stream.read_u8()?;

        let num_decode_bits = if single_byte { 8 } else { 16 };
        for i in 0..num_decode_bits {
            if decode_mask & (1 << i) != 0 {
                let next = stream.read_u8()?;
                if next == 0 {
                    record
                        .parse_warning
                        .push("value byte is 00. Don't know how many bytes to read.".to_string());
                }
                self.value_flags.set_byte(i, next);
                trace!("value byte {i} is {next:02X}");
            }
        }
        for i in 0..num_decode_bits {
            // Bytes 6 and 7 do not have a sign byte.
            if i != 6 && i != 7 && decode_mask & (1 << i) != 0 {
                let next = stream.read_u8()?;
                self.sign_flags.set_byte(i, next);
                trace!("sign byte {i} is {next:02X}");
            }
        }

        Ok((0..self.value_flags.num_bits())
            .filter(|bit| self.value_flags.test_bit(*bit))
            .map(|bit| bit as u8)
            .collect())
    }

    fn update_value<R: Read>(
        &mut self,
        stream: &JpiStream<R>,
        record: &mut DataRecord,
        bit: u8,
        value: u8,
    ) -> Result<(), Error> {
        let Some(metric) = self.table.metric(bit) else {
            return Err(Error::Format {
                reason: format!("no metric is mapped to decode bit {bit}"),
                record: stream.record_hex(),
            });
        };
        if metric.is_unsupported() {
            record
                .parse_warning
                .push(format!("Unexpected value for {metric}"));
            return Ok(());
        }

        let mut accessor = Accessor::new(record);
        if value == NOT_AVAILABLE_MARKER {
            // Transition from a valid value to "N/A".
            if !self.na_values.contains_key(&metric.low_byte_bit) {
                let current = existing_value_or_default(&accessor, metric, self.metadata);
                self.na_values.insert(metric.low_byte_bit, current);
                accessor.clear(metric.path);
            }
            return Ok(());
        } else if let Some(saved) = self.na_values.remove(&metric.low_byte_bit) {
            // Transition from "N/A" back to a valid value.
            accessor.set(metric.path, saved);
        }

        // High bytes take the sign from the low byte's sign bit.
        let mut delta = f32::from(value);
        if self.sign_flags.test_bit(usize::from(metric.low_byte_bit)) {
            delta = -delta;
        }
        if metric.is_high_byte_bit(bit) {
            delta *= 256.0;
        }
        let delta = metric.scale(self.metadata, delta);

        let existing = existing_value_or_default(&accessor, metric, self.metadata);
        trace!("updating {} = {} + {delta}", metric.path, existing.as_f32());

        accessor.set(metric.path, Value::from(existing.as_f32() + delta));
        Ok(())
    }
}

fn existing_value_or_default(accessor: &Accessor, metric: &Metric, metadata: &Metadata) -> Value {
    if accessor.has(metric.path) {
        accessor
            .get(metric.path)
            .unwrap_or_else(|| Value::from(metric.default_value(metadata)))
    } else {
        Value::from(metric.default_value(metadata))
    }
}

fn calculate_exhaust_gas_temperature_max_diffs(record: &mut DataRecord) {
    for engine in &mut record.engine {
        let temperatures = &engine.exhaust_gas_temperature;
        if temperatures.is_empty() {
            continue;
        }
        let maximum = temperatures.iter().copied().max().unwrap_or(0).max(0);
        let minimum = temperatures.iter().copied().min().unwrap_or(maximum).min(maximum);
        engine.max_exhaust_gas_temperature_difference = Some(maximum - minimum);
    }
}
