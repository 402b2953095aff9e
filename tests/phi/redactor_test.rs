//! Redaction round-trips with the scanner.

use ros_governance::phi::{redact, scan_text, Redactor, Tier};
use serde_json::json;

const SAMPLES: &[&str] = &[
    "Contact: a@b.com, SSN 123-45-6789",
    "Patient: Jane Doe, DOB 01/02/1930, MRN: A1234567",
    "Acct #: 123456789 via 192.168.0.1, license DL 12345678",
    "Serial no. AB-1234 at https://example.org/x?y=1",
    "Mr. John Smith, 101 years old, 7 Main Street",
    "no identifiers in this sentence",
    "",
];

#[test]
fn redacted_output_scans_clean_for_same_tier() {
    for tier in [Tier::HighConfidence, Tier::Extended] {
        for sample in SAMPLES {
            let redacted = redact(sample, tier);
            let rescan = scan_text(&redacted, tier);
            assert!(!rescan.has_phi(), "tier {tier:?}: {redacted:?} still has {:?}", rescan.kinds());
        }
    }
}

#[test]
fn redaction_is_idempotent() {
    for tier in [Tier::HighConfidence, Tier::Extended] {
        for sample in SAMPLES {
            let once = redact(sample, tier);
            assert_eq!(redact(&once, tier), once);
        }
    }
}

#[test]
fn clean_text_is_unchanged() {
    let text = "Median follow-up 14 months (IQR 9-20); n=120.";
    assert_eq!(redact(text, Tier::Extended), text);
}

#[test]
fn placeholders_name_the_kind() {
    let redacted = redact("MRN: 00123456 and phone (555) 123-4567", Tier::HighConfidence);
    assert_eq!(redacted, "MRN: [REDACTED:mrn] and phone [REDACTED:phone]");
}

#[test]
fn redact_value_leaves_structure_intact() {
    let redactor = Redactor::new(Tier::Extended);
    let value = json!({
        "rows": [
            {"id": 1, "note": "seen 2021-03-04 by Dr. Smith"},
            {"id": 2, "note": "clean"}
        ],
        "count": 2
    });

    let redacted = redactor.redact_value(&value);
    assert_eq!(redacted["rows"][0]["id"], json!(1));
    assert_eq!(redacted["rows"][1]["note"], json!("clean"));
    assert_eq!(redacted["count"], json!(2));

    let note = redacted["rows"][0]["note"].as_str().unwrap_or_default();
    assert!(note.contains("[REDACTED:date]"));
    assert!(note.contains("[REDACTED:name]"));
    assert!(!note.contains("Smith"));
}
