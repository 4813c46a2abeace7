use chrono::{TimeZone, Utc};
use magneto::{decode, DecodeConfig, Error};

/// Packed 2026-08-29 and 10:30:40.
const DATE: u16 = (26 << 9) | (8 << 5) | 29;
const TIME: u16 = (10 << 11) | (30 << 5) | 20;

fn start_timestamp() -> i64 {
    Utc.with_ymd_and_hms(2026, 8, 29, 10, 30, 40)
        .unwrap()
        .timestamp()
}

fn header_line(body: &str) -> Vec<u8> {
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${body}*{checksum:02X}\r\n").into_bytes()
}

/// Appends the byte balancing the running sum to zero mod 256.
fn checksummed(mut bytes: Vec<u8>) -> Vec<u8> {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    bytes.push(sum.wrapping_neg());
    bytes
}

struct FlightFixture {
    bytes: Vec<u8>,
    single_byte_mask: bool,
}

impl FlightFixture {
    fn new(flight_number: u16, single_byte_mask: bool, num_extra_config_words: usize) -> Self {
        let mut header = Vec::new();
        header.extend_from_slice(&flight_number.to_be_bytes());
        header.extend_from_slice(&63741u16.to_be_bytes());
        header.extend_from_slice(&24561u16.to_be_bytes());
        for _ in 0..num_extra_config_words {
            header.extend_from_slice(&0u16.to_be_bytes());
        }
        header.extend_from_slice(&0u16.to_be_bytes()); // unknown
        header.extend_from_slice(&6u16.to_be_bytes()); // interval
        header.extend_from_slice(&DATE.to_be_bytes());
        header.extend_from_slice(&TIME.to_be_bytes());
        Self {
            bytes: checksummed(header),
            single_byte_mask,
        }
    }

    /// Appends one well-formed record updating the given decode bits with
    /// the given payload bytes, negating those listed in `sign_bits`.
    fn record(mut self, repeat: u8, values: &[(u8, u8)], sign_bits: &[u8]) -> Self {
        let mut mask = 0u16;
        let mut value_bytes = [0u8; 16];
        let mut sign_bytes = [0u8; 16];
        for (bit, _) in values {
            mask |= 1 << (bit / 8);
            value_bytes[usize::from(bit / 8)] |= 1 << (bit % 8);
        }
        for bit in sign_bits {
            assert!(mask & (1 << (bit / 8)) != 0, "sign outside the mask");
            sign_bytes[usize::from(bit / 8)] |= 1 << (bit % 8);
        }

        let mut record = Vec::new();
        if self.single_byte_mask {
            assert!(mask <= 0xFF);
            record.extend_from_slice(&[mask as u8, mask as u8]);
        } else {
            record.extend_from_slice(&mask.to_be_bytes());
            record.extend_from_slice(&mask.to_be_bytes());
        }
        record.push(repeat);
        for i in 0..16 {
            if mask & (1 << i) != 0 {
                record.push(value_bytes[i]);
            }
        }
        for i in 0..16 {
            if i != 6 && i != 7 && mask & (1 << i) != 0 {
                record.push(sign_bytes[i]);
            }
        }
        let mut ordered: Vec<(u8, u8)> = values.to_vec();
        ordered.sort_by_key(|(bit, _)| *bit);
        for (_, payload) in ordered {
            record.push(payload);
        }
        self.bytes.extend(checksummed(record));
        self
    }

    fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }
}

fn jpi_file(header_lines: &[&str], flights: &[FlightFixture]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for body in header_lines {
        bytes.extend(header_line(body));
    }
    bytes.extend(header_line("L"));
    for flight in flights {
        bytes.extend_from_slice(&flight.bytes);
    }
    bytes
}

const EDM_830: &str = "C,830,2191,1552,2,300";
const EDM_900: &str = "C,900,2191,1552,2,108";
const GPH: &str = "F,0,49,10,2950,2950";

#[test]
fn decodes_a_single_byte_mask_flight() {
    let flight = FlightFixture::new(45, true, 0)
        .record(
            0,
            &[(0, 60), (1, 55), (8, 110), (15, 40), (20, 5)],
            &[15],
        )
        .record(0, &[(0, 2), (1, 3)], &[1])
        .record(2, &[(8, 10)], &[8]);
    assert_eq!(flight.len(), 45);
    let file = jpi_file(&[EDM_830, GPH, "D,45,23"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    assert_eq!(jpi.flight.len(), 1);

    let flight = &jpi.flight[0];
    assert_eq!(flight.flight_number, 45);
    assert_eq!(flight.start_timestamp, start_timestamp());
    assert_eq!(flight.recording_interval_secs, 6);
    assert_eq!(flight.header_length, 15);
    assert_eq!(flight.data_length, 45);
    assert!(flight.parse_warning.is_empty());
    assert_eq!(flight.sensors.num_exhaust_gas_temperature, 6);

    // The repeat count of two replays the middle record.
    assert_eq!(flight.data.len(), 5);

    let first = &flight.data[0];
    assert_eq!(first.engine[0].exhaust_gas_temperature, vec![300, 295]);
    assert_eq!(first.engine[0].cylinder_head_temperature, vec![350]);
    assert_eq!(first.engine[0].oil_temperature, Some(200));
    assert_eq!(first.engine[0].max_exhaust_gas_temperature_difference, Some(5));
    assert_eq!(first.voltage, vec![24.5]);

    let second = &flight.data[1];
    assert_eq!(second.engine[0].exhaust_gas_temperature, vec![302, 292]);
    assert_eq!(second.engine[0].max_exhaust_gas_temperature_difference, Some(10));
    assert_eq!(flight.data[2], *second);
    assert_eq!(flight.data[3], *second);

    let last = &flight.data[4];
    assert_eq!(last.engine[0].cylinder_head_temperature, vec![340]);
    assert_eq!(last.engine[0].exhaust_gas_temperature, vec![302, 292]);
}

#[test]
fn matches_the_csv_golden() {
    let flight = FlightFixture::new(45, true, 0)
        .record(
            0,
            &[(0, 60), (1, 55), (8, 110), (15, 40), (20, 5)],
            &[15],
        )
        .record(0, &[(0, 2), (1, 3)], &[1])
        .record(2, &[(8, 10)], &[8]);
    let file = jpi_file(&[EDM_830, GPH, "D,45,23"], &[flight]);
    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path("fixtures/flight-45.csv")
        .unwrap();
    let expected: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(|f| f.to_string()).collect())
        .collect();

    let rendered: Vec<Vec<String>> = jpi.flight[0]
        .data
        .iter()
        .map(|record| {
            let engine = &record.engine[0];
            vec![
                engine.exhaust_gas_temperature[0].to_string(),
                engine.exhaust_gas_temperature[1].to_string(),
                engine.cylinder_head_temperature[0].to_string(),
                engine.oil_temperature.unwrap().to_string(),
                record.voltage[0].to_string(),
                engine.max_exhaust_gas_temperature_difference.unwrap().to_string(),
            ]
        })
        .collect();
    assert_eq!(rendered, expected);
}

#[test]
fn decodes_a_sixteen_bit_mask_flight() {
    // Model 900 with firmware 108: two extra configuration words in the
    // flight header and a two-byte decode mask.
    let flight = FlightFixture::new(1, false, 2).record(0, &[(41, 200), (42, 2), (78, 4)], &[]);
    assert_eq!(flight.len(), 32);
    let file = jpi_file(&[EDM_900, GPH, "D,1,16"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    let flight = &jpi.flight[0];
    assert_eq!(flight.header_length, 19);
    assert_eq!(flight.data.len(), 1);

    // The high byte contributes `delta << 8` with the low byte's sign.
    assert_eq!(flight.data[0].engine[0].rpm, Some(240 + 200 + 2 * 256));
    // Engine hours accumulate in tenths.
    assert_eq!(flight.data[0].engine[0].hours, Some(24.4));
}

#[test]
fn exhaust_gas_high_bytes_have_no_sign_byte() {
    // Decode-mask bits 6 and 7 cover the high-byte region of the first
    // engine's thermocouples and contribute no sign bytes of their own.
    let flight = FlightFixture::new(1, true, 0).record(0, &[(0, 10), (48, 1)], &[]);
    assert_eq!(flight.len(), 24);
    let file = jpi_file(&[EDM_830, GPH, "D,1,12"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    assert_eq!(
        jpi.flight[0].data[0].engine[0].exhaust_gas_temperature,
        vec![240 + 10 + 256]
    );
}

#[test]
fn high_bytes_inherit_the_low_byte_sign() {
    let flight = FlightFixture::new(1, true, 0).record(0, &[(0, 10), (48, 1)], &[0]);
    let file = jpi_file(&[EDM_830, GPH, "D,1,12"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    assert_eq!(
        jpi.flight[0].data[0].engine[0].exhaust_gas_temperature,
        vec![240 - 10 - 256]
    );
}

#[test]
fn late_builds_carry_a_third_config_word() {
    // Builds from 880 on write one more configuration word in the flight
    // header; miscounting it would desync every record of the flight.
    let flight = FlightFixture::new(1, false, 3).record(0, &[(8, 10)], &[]);
    assert_eq!(flight.len(), 30);
    let file = jpi_file(
        &["C,900,2191,1552,2,290,108,900,1", GPH, "D,1,15"],
        &[flight],
    );

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    let flight = &jpi.flight[0];
    assert_eq!(flight.header_length, 21);
    assert_eq!(flight.data.len(), 1);
    assert_eq!(flight.data[0].engine[0].cylinder_head_temperature, vec![250]);
    assert!(flight.parse_warning.is_empty());
}

#[test]
fn not_available_round_trip() {
    let flight = FlightFixture::new(1, true, 0)
        .record(0, &[(8, 10)], &[])
        .record(0, &[(8, 0x00)], &[])
        .record(0, &[(8, 6)], &[]);
    assert_eq!(flight.len(), 36);
    let file = jpi_file(&[EDM_830, GPH, "D,1,18"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    let data = &jpi.flight[0].data;
    assert_eq!(data[0].engine[0].cylinder_head_temperature, vec![250]);
    // "N/A" presents as a zeroed element.
    assert_eq!(data[1].engine[0].cylinder_head_temperature, vec![0]);
    // The saved value is restored before the delta applies.
    assert_eq!(data[2].engine[0].cylinder_head_temperature, vec![256]);
}

#[test]
fn skips_unselected_flights_at_either_alignment() {
    // Flight 1 really ends one byte before its directory estimate; flight 2
    // ends exactly on it.
    let flight1 = FlightFixture::new(1, true, 0).raw(&[0xEE; 5]);
    assert_eq!(flight1.len(), 20);
    let flight2 = FlightFixture::new(2, true, 0).raw(&[0xEE; 2]);
    assert_eq!(flight2.len(), 17);
    let flight3 = FlightFixture::new(3, true, 0).record(0, &[(8, 10)], &[]);
    assert_eq!(flight3.len(), 22);
    let file = jpi_file(
        &[EDM_830, GPH, "D,1,10", "D,2,9", "D,3,11"],
        &[flight1, flight2, flight3],
    );

    let jpi = decode(file.as_slice(), &DecodeConfig::default().start_flight_number(3)).unwrap();
    assert_eq!(jpi.flight.len(), 1);
    assert_eq!(jpi.flight[0].flight_number, 3);
    assert_eq!(
        jpi.flight[0].data[0].engine[0].cylinder_head_temperature,
        vec![250]
    );
}

#[test]
fn headers_only_keeps_every_flight_but_no_data() {
    let flight1 = FlightFixture::new(1, true, 0).raw(&[0xEE; 5]);
    let flight2 = FlightFixture::new(2, true, 0).raw(&[0xEE; 2]);
    let flight3 = FlightFixture::new(3, true, 0).record(0, &[(8, 10)], &[]);
    let file = jpi_file(
        &[EDM_830, GPH, "D,1,10", "D,2,9", "D,3,11"],
        &[flight1, flight2, flight3],
    );

    let jpi = decode(file.as_slice(), &DecodeConfig::default().headers_only()).unwrap();
    assert_eq!(jpi.flight.len(), 3);
    for flight in &jpi.flight {
        assert!(flight.data.is_empty());
        assert_eq!(flight.header_length, 15);
    }
    // The last flight drains the source rather than probing.
    assert_eq!(jpi.flight[2].data_length, 7);
}

#[test]
fn selects_an_exact_flight() {
    let flight1 = FlightFixture::new(1, true, 0).raw(&[0xEE; 5]);
    let flight2 = FlightFixture::new(2, true, 0).record(0, &[(8, 10)], &[]);
    let file = jpi_file(&[EDM_830, GPH, "D,1,10", "D,2,11"], &[flight1, flight2]);

    let jpi = decode(
        file.as_slice(),
        &DecodeConfig::default().exact_flight_number(2),
    )
    .unwrap();
    assert_eq!(jpi.flight.len(), 1);
    assert_eq!(jpi.flight[0].flight_number, 2);
    assert_eq!(jpi.flight[0].data.len(), 1);
}

#[test]
fn mismatched_decode_masks_are_fatal() {
    let flight = FlightFixture::new(1, true, 0).raw(&[0x03, 0x02, 0x00, 0x01, 0x00, 0xFA]);
    let file = jpi_file(&[EDM_830, GPH, "D,1,11"], &[flight]);

    match decode(file.as_slice(), &DecodeConfig::default()) {
        Err(Error::Format { reason, .. }) => assert!(reason.contains("appear twice")),
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
fn payload_bits_without_a_metric_are_fatal() {
    // Bit 43 belongs to the second engine's rpm, which only twin-engine
    // catalogues claim; on a single-engine unit it would desync the stream.
    let flight = FlightFixture::new(1, true, 0).record(0, &[(43, 5)], &[]);
    assert_eq!(flight.len(), 22);
    let file = jpi_file(&[EDM_830, GPH, "D,1,11"], &[flight]);

    match decode(file.as_slice(), &DecodeConfig::default()) {
        Err(Error::Format { reason, .. }) => assert!(reason.contains("43")),
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
fn a_repeat_count_needs_a_previous_record() {
    let flight = FlightFixture::new(1, true, 0).record(2, &[(8, 10)], &[]);
    let file = jpi_file(&[EDM_830, GPH, "D,1,11"], &[flight]);

    assert!(matches!(
        decode(file.as_slice(), &DecodeConfig::default()),
        Err(Error::Format { .. })
    ));
}

#[test]
fn zero_value_bytes_warn_but_continue() {
    let flight = FlightFixture::new(1, true, 0).raw(&checksummed(vec![0x01, 0x01, 0x00, 0x00, 0x00]));
    let file = jpi_file(&[EDM_830, GPH, "D,1,11"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    let record = &jpi.flight[0].data[0];
    assert_eq!(
        record.parse_warning,
        vec!["value byte is 00. Don't know how many bytes to read.".to_string()]
    );
    assert!(record.engine.is_empty());
}

#[test]
fn unsupported_slots_warn_and_consume_their_byte() {
    // Bit 71 is populated by some units but has no known meaning.
    let flight = FlightFixture::new(1, false, 2).record(0, &[(71, 9)], &[]);
    let file = jpi_file(&[EDM_900, GPH, "D,1,14"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    let record = &jpi.flight[0].data[0];
    assert_eq!(record.parse_warning.len(), 1);
    assert!(record.parse_warning[0].starts_with("Unexpected value for"));
}

#[test]
fn record_checksum_mismatches_warn() {
    let mut record = vec![0x02, 0x02, 0x00, 0x01, 0x00, 0x0A];
    record.push(0x00); // should be the balancing byte
    let flight = FlightFixture::new(1, true, 0).raw(&record);
    let file = jpi_file(&[EDM_830, GPH, "D,1,11"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    let record = &jpi.flight[0].data[0];
    assert_eq!(record.parse_warning.len(), 1);
    assert!(record.parse_warning[0].starts_with("Checksum mismatch"));
    // The payload still applied.
    assert_eq!(record.engine[0].cylinder_head_temperature, vec![250]);
}

#[test]
fn flight_number_mismatches_warn() {
    let flight = FlightFixture::new(8, true, 0).record(0, &[(8, 10)], &[]);
    let file = jpi_file(&[EDM_830, GPH, "D,7,11"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    assert_eq!(jpi.flight[0].flight_number, 8);
    assert_eq!(
        jpi.flight[0].parse_warning,
        vec!["Unexpected flight number 8 (0x0008) instead of expected 7 (0x0007)".to_string()]
    );
}

#[test]
fn marks_are_set_by_exact_ordinal() {
    // A mark payload is an ordinal delta from zero; out-of-range sums leave
    // the field unset.
    let flight = FlightFixture::new(1, true, 0).record(0, &[(16, 1)], &[]);
    let file = jpi_file(&[EDM_830, GPH, "D,1,11"], &[flight]);

    let jpi = decode(file.as_slice(), &DecodeConfig::default()).unwrap();
    assert_eq!(jpi.flight[0].data[0].mark, None);
}
