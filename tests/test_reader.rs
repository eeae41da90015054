extern crate ihex;

use ihex::{LoadOptions, Record, RecordKind};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_record_from_text_parses_valid_data_records() {
    let record = Record::from_text(":0B0010006164647265737320676170A7").unwrap();
    assert_eq!(record.kind(), RecordKind::Data);
    assert_eq!(record.address(), 0x0010);
    assert_eq!(
        record.data(),
        &[0x61, 0x64, 0x64, 0x72, 0x65, 0x73, 0x73, 0x20, 0x67, 0x61, 0x70]
    );
    assert!(record.is_checksum_valid());
}

#[test]
fn test_record_from_text_rejects_empty_data_record() {
    assert!(Record::from_text(":00FFFE0003").is_err());
}

#[test]
fn test_record_from_text_parses_valid_eof_record() {
    let record = Record::from_text(":00000001FF").unwrap();
    assert_eq!(record.kind(), RecordKind::EndOfFile);
    assert!(record.is_checksum_valid());
}

#[test]
fn test_record_from_text_parses_valid_extended_segment_address() {
    let record = Record::from_text(":0200000212FEEC").unwrap();
    assert_eq!(record.kind(), RecordKind::ExtendedSegmentAddress);
    assert_eq!(record.extended_segment_address_base().unwrap(), 0x12FE);
}

#[test]
fn test_record_from_text_parses_valid_start_segment_address() {
    let record = Record::from_text(":04000003123438007B").unwrap();
    assert_eq!(record.kind(), RecordKind::StartSegmentAddress);
    assert_eq!(record.start_segment_address_code_segment().unwrap(), 0x1234);
    assert_eq!(record.instruction_pointer().unwrap(), 0x3800);
}

#[test]
fn test_record_from_text_parses_valid_extended_linear_address() {
    let record = Record::from_text(":02000004ABCD82").unwrap();
    assert_eq!(record.kind(), RecordKind::ExtendedLinearAddress);
    assert_eq!(record.extended_linear_address_base().unwrap(), 0xABCD);
}

#[test]
fn test_record_from_text_parses_valid_start_linear_address() {
    let record = Record::from_text(":0400000512345678E3").unwrap();
    assert_eq!(record.kind(), RecordKind::StartLinearAddress);
    assert_eq!(record.extended_instruction_pointer().unwrap(), 0x12345678);
}

#[test]
fn test_record_from_text_rejects_missing_colon() {
    assert!(Record::from_text("0400000512345678E3").is_err());
}

#[test]
fn test_record_from_text_rejects_unknown_kind() {
    assert!(Record::from_text(":0000000699").is_err());
}

#[test]
fn test_record_from_text_rejects_length_mismatch() {
    assert!(Record::from_text(":0400000512345678AABBE3").is_err());
}

#[test]
fn test_load_from_bytes_tolerates_invalid_line_when_disabled() {
    init_logger();
    let options = LoadOptions::default().with_throw_on_invalid_record(false);
    let bytes = b"not a record\n:00000001FF\n";
    let (group, clean) = ihex::load_from_bytes(bytes, &options).unwrap();
    assert!(!clean);
    assert_eq!(group.sections().len(), 1);
}

#[test]
fn test_load_from_bytes_throws_on_invalid_line_by_default() {
    init_logger();
    let bytes = b"not a record\n:00000001FF\n";
    assert!(ihex::load_from_bytes(bytes, &LoadOptions::default()).is_err());
}
