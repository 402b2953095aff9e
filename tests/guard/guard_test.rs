//! Fail-closed text guard and the no-leak property of its errors.

use ros_governance::guard::{FailMode, Guard, GuardBlocked, ReasonCode};
use ros_governance::phi::Tier;

const SECRET_SAMPLES: &[&str] = &[
    "Contact: a@b.com, SSN 123-45-6789",
    "MRN: 00123456 admitted",
    "call (555) 123-4567",
];

fn blocked(guard: &Guard, text: &str) -> GuardBlocked {
    match guard.guard_text(text) {
        Ok(out) => panic!("expected a block, got {} chars through", out.len()),
        Err(err) => err,
    }
}

#[test]
fn contact_sample_is_blocked_with_kinds() {
    let err = blocked(&Guard::high_confidence(), SECRET_SAMPLES[0]);

    assert_eq!(err.reason_code, ReasonCode::PhiBlocked);
    assert!(err.kinds.contains(&"email".to_owned()));
    assert!(err.kinds.contains(&"ssn".to_owned()));
    assert_eq!(err.total(), 2);
}

#[test]
fn errors_never_contain_matched_text() {
    let guard = Guard::extended();
    let fragments = ["a@b.com", "123-45-6789", "00123456", "555", "4567"];

    for sample in SECRET_SAMPLES {
        let err = blocked(&guard, sample);
        let rendered = [
            err.to_string(),
            format!("{err:?}"),
            serde_json::to_string(&err).unwrap_or_default(),
        ];
        for text in &rendered {
            for fragment in fragments {
                assert!(!text.contains(fragment), "{fragment:?} leaked into {text:?}");
            }
        }
    }
}

#[test]
fn extended_guard_catches_what_high_lets_through() {
    let text = "Patient: Jane Doe seen 2021-03-04";
    assert!(Guard::high_confidence().guard_text(text).is_ok());
    let err = blocked(&Guard::new(Tier::Extended), text);
    assert_eq!(err.kinds, vec!["date".to_owned(), "name".to_owned()]);
}

#[test]
fn fail_open_redacts_instead_of_blocking() {
    let outcome = Guard::high_confidence()
        .guard_text_with(SECRET_SAMPLES[0], FailMode::Open)
        .expect("fail-open does not error");
    assert_eq!(outcome.text, "Contact: [REDACTED:email], SSN [REDACTED:ssn]");
    assert_eq!(outcome.findings.len(), 2);
}

#[test]
fn guard_blocked_is_a_std_error() {
    fn as_error(err: GuardBlocked) -> Box<dyn std::error::Error + Send + Sync> {
        Box::new(err)
    }
    let err = as_error(blocked(&Guard::default(), "SSN 123-45-6789"));
    assert_eq!(err.to_string(), "blocked: PHI_BLOCKED (ssn=1)");
}
