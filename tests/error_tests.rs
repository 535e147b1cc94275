//! Tests for error types.
//!
//! Validates display formatting and the mapping onto gRPC status codes.

use std::path::PathBuf;

use ssd_hook::hooks::status_code;
use ssd_hook::Error;
use tonic::{Code, Status};

// =============================================================================
// Display
// =============================================================================

#[test]
fn test_invalid_vmi_display() {
    let err = Error::InvalidVmi("expected value at line 1 column 1".to_string());
    let msg = err.to_string();

    assert!(msg.contains("VMI"), "should name the input");
    assert!(msg.contains("line 1 column 1"), "should include cause");
}

#[test]
fn test_missing_alias_display() {
    let err = Error::MissingDiskAlias { index: 3 };
    let msg = err.to_string();

    assert!(msg.contains("SATA"));
    assert!(msg.contains('3'), "should include disk position");
}

#[test]
fn test_bind_display() {
    let err = Error::Bind {
        path: PathBuf::from("/var/run/kubevirt-hooks/ssd.sock"),
        source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
    };
    let msg = err.to_string();

    assert!(msg.contains("/var/run/kubevirt-hooks/ssd.sock"));
}

#[test]
fn test_io_from() {
    let err: Error = std::io::Error::from(std::io::ErrorKind::NotFound).into();
    assert!(matches!(err, Error::Io(_)));
}

// =============================================================================
// Wire Mapping
// =============================================================================

#[test]
fn test_status_codes() {
    let cases = [
        (Error::InvalidVmi(String::new()), Code::InvalidArgument),
        (Error::InvalidDomain(String::new()), Code::InvalidArgument),
        (Error::MissingDiskAlias { index: 0 }, Code::InvalidArgument),
        (Error::Serialization(String::new()), Code::Internal),
        (Error::UnsupportedVersion("v9".into()), Code::Unimplemented),
        (Error::Config(String::new()), Code::Internal),
    ];

    for (err, code) in &cases {
        assert_eq!(status_code(err), *code, "{err}");
    }
}

#[test]
fn test_status_carries_message() {
    let err = Error::InvalidDomain("at byte 12: mismatched end tag".to_string());
    let status = Status::from(err);

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("mismatched end tag"));
}

#[test]
fn test_remote_status_becomes_error() {
    let err = Error::from(Status::unimplemented("unknown service"));
    let msg = err.to_string();

    assert!(matches!(err, Error::Remote { code: Code::Unimplemented, .. }));
    assert!(msg.contains("unknown service"));
}
