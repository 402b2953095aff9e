//! Egress validation end to end: shape policy, paths, content.

use ros_governance::guard::{EgressGuard, Payload, ReasonCode};
use ros_governance::phi::{Redactor, Tier};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
struct CohortSummary {
    cohort: String,
    n: u32,
    median_age: f64,
}

#[test]
fn aggregate_summary_passes() {
    let guard = EgressGuard::default();
    let summary = CohortSummary {
        cohort: "heart-failure-2023".to_owned(),
        n: 412,
        median_age: 67.5,
    };
    assert!(guard.check(&Payload::from_serialize(&summary)).is_ok());
}

#[test]
fn raw_containers_are_rejected_before_scanning() {
    let guard = EgressGuard::default();
    let err = guard
        .check(&Payload::Table { columns: 12, rows: 50_000 })
        .expect_err("tables never leave");
    assert_eq!(err.reason_code, ReasonCode::RawDataBlocked);
    assert_eq!(err.kinds, vec!["raw_table".to_owned()]);

    // Bytes are rejected even when they would scan clean.
    let err = guard
        .check(&Payload::Bytes(b"clean bytes".to_vec()))
        .expect_err("bytes never leave");
    assert_eq!(err.reason_code, ReasonCode::RawDataBlocked);
}

#[test]
fn restricted_path_reference_blocks() {
    let guard = EgressGuard::default();
    let payload = json!({"artifact": {"source": "/srv/project/DATA/RAW/visits.csv"}});
    let err = guard.check_value(&payload).expect_err("restricted path");
    assert_eq!(err.reason_code, ReasonCode::RawDataBlocked);
    assert_eq!(err.kinds, vec!["restricted_path".to_owned()]);
}

#[test]
fn restricted_segment_embedded_in_longer_path_blocks() {
    let guard = EgressGuard::default();
    let payload = json!({
        "inputs": [
            "/srv/bigdata/raw/ids.csv",
            "data/raw2024/ids.csv",
            "s3://bucket/projectdata/restricted/x",
        ]
    });
    let err = guard.check_value(&payload).expect_err("restricted path");
    assert_eq!(err.reason_code, ReasonCode::RawDataBlocked);
    assert_eq!(err.kinds, vec!["restricted_path".to_owned()]);

    for path in ["data/rawdump.csv", "archive/metadata/raw/x"] {
        let err = guard.check(&Payload::from(path)).expect_err(path);
        assert_eq!(err.reason_code, ReasonCode::RawDataBlocked, "{path}");
    }
}

#[test]
fn extended_tier_is_the_default() {
    let payload = Payload::from("follow-up on 2021-03-04");
    let err = EgressGuard::default().check(&payload).expect_err("date blocked");
    assert_eq!(err.reason_code, ReasonCode::PhiBlocked);

    let high = EgressGuard::default().with_tier(Tier::HighConfidence);
    assert!(high.check(&payload).is_ok());
}

#[test]
fn redacted_payload_clears_egress() {
    let guard = EgressGuard::default();
    let payload = json!({
        "notes": ["Patient: Jane Doe, MRN 00123456", "call 555-123-4567"],
        "counts": {"visits": 3}
    });
    assert!(guard.check_value(&payload).is_err());

    let redacted = Redactor::new(Tier::Extended).redact_value(&payload);
    assert!(guard.check_value(&redacted).is_ok());
}

#[test]
fn error_carries_counts_not_content() {
    let guard = EgressGuard::default();
    let payload = json!({"a": "SSN 123-45-6789", "b": "SSN 987-65-4321", "c": "x@y.org"});
    let err = guard.check_value(&payload).expect_err("phi");

    assert_eq!(err.counts.get("ssn"), Some(&2));
    assert_eq!(err.counts.get("email"), Some(&1));
    let rendered = format!("{err} {err:?}");
    assert!(!rendered.contains("123-45-6789"));
    assert!(!rendered.contains("x@y.org"));
}
