use std::io::Cursor;

use magneto::stream::JpiStream;
use magneto::Error;

fn stream(bytes: &[u8]) -> JpiStream<Cursor<Vec<u8>>> {
    JpiStream::new(Cursor::new(bytes.to_vec()))
}

#[test]
fn words_are_big_endian() {
    let mut stream = stream(&[0x12, 0x34]);
    assert_eq!(stream.read_u16().unwrap(), 0x1234);
}

#[test]
fn reading_past_the_end_fails() {
    let mut stream = stream(&[0x01]);
    assert_eq!(stream.read_u8().unwrap(), 0x01);
    assert!(matches!(stream.read_u8(), Err(Error::UnexpectedEof)));
}

#[test]
fn peek_does_not_consume() {
    let mut stream = stream(&[0xAA, 0xBB, 0xCC]);
    assert_eq!(stream.peek::<2>().unwrap(), [0xAA, 0xBB]);
    assert_eq!(stream.peek::<3>().unwrap(), [0xAA, 0xBB, 0xCC]);
    assert_eq!(stream.counter(), 0);
    assert_eq!(stream.read_u8().unwrap(), 0xAA);
    assert_eq!(stream.read_u8().unwrap(), 0xBB);
}

#[test]
fn skip_advances_the_counter_but_not_the_record() {
    let mut stream = stream(&[0x01, 0x02, 0x03, 0x04]);
    stream.read_u8().unwrap();
    stream.skip(2).unwrap();
    assert_eq!(stream.counter(), 3);
    assert_eq!(stream.record_len(), 1);
    assert_eq!(stream.read_u8().unwrap(), 0x04);
}

#[test]
fn skip_to_end_counts_remaining_bytes() {
    let mut stream = stream(&[0x01, 0x02, 0x03, 0x04, 0x05]);
    stream.read_u8().unwrap();
    stream.peek::<2>().unwrap();
    assert_eq!(stream.skip_to_end().unwrap(), 4);
}

#[test]
fn record_capture_and_reset() {
    let mut stream = stream(&[0x10, 0x20, 0x30]);
    stream.read_u8().unwrap();
    stream.clear_record();
    stream.read_u8().unwrap();
    stream.read_u8().unwrap();
    assert_eq!(stream.record_bytes(), [0x20, 0x30]);
    assert_eq!(stream.record_hex(), "20 30");
    assert_eq!(stream.counter(), 3);
    stream.reset_counter();
    assert_eq!(stream.counter(), 0);
}

#[test]
fn checksum_epilogue_accepts_a_balancing_byte() {
    // 0x10 + 0x20 + 0xD0 == 0x100.
    let mut stream = stream(&[0x10, 0x20, 0xD0]);
    stream.read_u8().unwrap();
    stream.read_u8().unwrap();
    assert_eq!(stream.checksum_epilogue().unwrap(), None);
}

#[test]
fn checksum_epilogue_reports_the_expected_byte() {
    let mut stream = stream(&[0x10, 0x20, 0x00]);
    stream.read_u8().unwrap();
    stream.read_u8().unwrap();
    let warning = stream.checksum_epilogue().unwrap().unwrap();
    assert!(warning.starts_with("Checksum mismatch actual 00 vs expected D0"));
}
