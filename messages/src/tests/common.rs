use crate::{Duration, ReportId, Role, TaskId, Time, roundtrip_encoding};
use assert_matches::assert_matches;
use prio::codec::{CodecError, Decode};
use serde_test::{Token, assert_de_tokens_error, assert_tokens};

#[test]
fn roundtrip_duration() {
    roundtrip_encoding(&[
        (Duration::from_seconds(u64::MIN), "0000000000000000"),
        (Duration::from_seconds(12345), "0000000000003039"),
        (Duration::from_seconds(u64::MAX), "FFFFFFFFFFFFFFFF"),
    ])
}

#[test]
fn roundtrip_time() {
    roundtrip_encoding(&[
        (Time::from_seconds_since_epoch(u64::MIN), "0000000000000000"),
        (Time::from_seconds_since_epoch(12345), "0000000000003039"),
        (Time::from_seconds_since_epoch(u64::MAX), "FFFFFFFFFFFFFFFF"),
    ])
}

#[test]
fn roundtrip_report_id() {
    roundtrip_encoding(&[
        (
            ReportId::from([u8::MIN; ReportId::LEN]),
            "00000000000000000000000000000000",
        ),
        (
            ReportId::from([
                0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78,
                0x90, 0x12,
            ]),
            "12345678901234567890123456789012",
        ),
        (
            ReportId::from([u8::MAX; ReportId::LEN]),
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        ),
    ])
}

#[test]
fn report_id_base64() {
    let report_id = ReportId::from([0xFF; ReportId::LEN]);
    assert_eq!(report_id.to_string(), "_____________________w");
    assert_eq!(format!("{report_id:?}"), "ReportId(_____________________w)");
    assert_eq!(
        "_____________________w".parse::<ReportId>().unwrap(),
        report_id
    );
    assert!("AAAA".parse::<ReportId>().is_err());
    assert!(ReportId::try_from([0u8; 15].as_slice()).is_err());
}

#[test]
fn roundtrip_role() {
    roundtrip_encoding(&[
        (Role::Collector, "00"),
        (Role::Client, "01"),
        (Role::Leader, "02"),
        (Role::Helper, "03"),
    ]);

    assert_matches!(Role::get_decoded(&[0x04]), Err(CodecError::Other(_)));
}

#[test]
fn role_for_aggregator_index() {
    assert_eq!(Role::for_aggregator_index(0), Role::Leader);
    assert_eq!(Role::for_aggregator_index(1), Role::Helper);
    assert_eq!(Role::for_aggregator_index(2), Role::Helper);
    assert_eq!(Role::Client.to_string(), "client");
    assert_eq!(Role::Helper.to_string(), "helper");
}

#[test]
fn roundtrip_task_id() {
    roundtrip_encoding(&[
        (
            TaskId::from([u8::MIN; TaskId::LEN]),
            "0000000000000000000000000000000000000000000000000000000000000000",
        ),
        (
            TaskId::from([
                0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78,
                0x90, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56,
                0x78, 0x90, 0x12, 0x34,
            ]),
            "1234567890123456789012345678901234567890123456789012345678901234",
        ),
        (
            TaskId::from([u8::MAX; TaskId::LEN]),
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        ),
    ])
}

#[test]
fn task_id_serde() {
    assert_tokens(
        &TaskId::from([0; 32]),
        &[Token::Str("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")],
    );
    assert_de_tokens_error::<TaskId>(
        &[Token::Str("/AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")],
        "invalid base64url value",
    );
    assert_de_tokens_error::<TaskId>(
        &[Token::Str("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")],
        "byte slice has incorrect length for TaskId",
    );
    assert_de_tokens_error::<TaskId>(
        &[Token::Str("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")],
        "byte slice has incorrect length for TaskId",
    );
}
