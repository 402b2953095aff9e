//! Egress guards: the single content contract every outbound path uses.
//!
//! [`Guard`] scans text and, fail-closed, turns any finding into a
//! [`GuardBlocked`] that carries only a reason code, kinds and counts.
//! [`egress::EgressGuard`] adds a payload-shape check in front of it.

pub mod egress;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::phi::{redact, scan_text, PhiFinding, ScanResult, Tier};

pub use egress::{EgressGuard, Payload};

/// Closed set of denial reasons shared by guards and the capability gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Content scan found identifiers.
    PhiBlocked,
    /// The process is in STANDBY.
    StandbyBlocked,
    /// A real provider is configured but its credential is absent.
    LlmKeyMissing,
    /// Uploads are enabled without the strict PHI posture.
    UploadPhiNotStrict,
    /// Network access is disabled.
    ModeNoNetwork,
    /// Only mock backends may be used.
    ModeMockOnly,
    /// Raw, unscrubbed or unscannable data.
    RawDataBlocked,
    /// Uploads are disabled.
    UploadsDisabled,
    /// The capability name is not registered.
    CapabilityUnknown,
}

impl ReasonCode {
    /// Wire spelling, e.g. `PHI_BLOCKED`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PhiBlocked => "PHI_BLOCKED",
            Self::StandbyBlocked => "STANDBY_BLOCKED",
            Self::LlmKeyMissing => "LLM_KEY_MISSING",
            Self::UploadPhiNotStrict => "UPLOAD_PHI_NOT_STRICT",
            Self::ModeNoNetwork => "MODE_NO_NETWORK",
            Self::ModeMockOnly => "MODE_MOCK_ONLY",
            Self::RawDataBlocked => "RAW_DATA_BLOCKED",
            Self::UploadsDisabled => "UPLOADS_DISABLED",
            Self::CapabilityUnknown => "CAPABILITY_UNKNOWN",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call denial. Never carries matched content.
///
/// `kinds` holds fixed identifiers (PHI kinds such as `ssn`, shape names
/// such as `raw_bytes`, or a capability name), and `counts` maps each kind
/// to how many times it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardBlocked {
    /// Why the call was blocked.
    pub reason_code: ReasonCode,
    /// Occurrences per kind.
    pub counts: BTreeMap<String, usize>,
    /// What was found, in stable order.
    pub kinds: Vec<String>,
}

impl GuardBlocked {
    /// Denial with no per-kind detail.
    pub fn new(reason_code: ReasonCode) -> Self {
        Self {
            reason_code,
            counts: BTreeMap::new(),
            kinds: Vec::new(),
        }
    }

    /// Denial naming one kind, seen once.
    pub fn with_kind(reason_code: ReasonCode, kind: &str) -> Self {
        let mut blocked = Self::new(reason_code);
        blocked.counts.insert(kind.to_owned(), 1);
        blocked.kinds.push(kind.to_owned());
        blocked
    }

    /// `PHI_BLOCKED` summarising a scan.
    pub fn from_scan(scan: &ScanResult) -> Self {
        let counts: BTreeMap<String, usize> = scan
            .counts()
            .into_iter()
            .map(|(kind, count)| (kind.as_str().to_owned(), count))
            .collect();
        let kinds = counts.keys().cloned().collect();
        Self {
            reason_code: ReasonCode::PhiBlocked,
            counts,
            kinds,
        }
    }

    /// Total occurrences across kinds.
    pub fn total(&self) -> usize {
        self.counts
            .values()
            .fold(0_usize, |acc, n| acc.saturating_add(*n))
    }
}

impl fmt::Display for GuardBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blocked: {}", self.reason_code)?;
        if !self.counts.is_empty() {
            let parts: Vec<String> = self
                .counts
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for GuardBlocked {}

/// Whether detection stops the call or degrades to redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    /// Any finding blocks. The only mode for production egress.
    #[default]
    Closed,
    /// Findings are redacted and reported. Test and development only.
    Open,
}

/// Result of a guard call that did not block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    /// The text to emit: unchanged when clean, redacted otherwise.
    pub text: String,
    /// Findings in the original text. Empty when clean.
    pub findings: Vec<PhiFinding>,
}

/// Text guard over one pattern tier.
#[derive(Debug, Clone, Copy)]
pub struct Guard {
    tier: Tier,
}

impl Guard {
    /// Guard scanning with `tier`.
    pub fn new(tier: Tier) -> Self {
        Self { tier }
    }

    /// Guard for ingress and general egress gates.
    pub fn high_confidence() -> Self {
        Self::new(Tier::HighConfidence)
    }

    /// Guard for export boundaries.
    pub fn extended() -> Self {
        Self::new(Tier::Extended)
    }

    /// Tier this guard scans with.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Fail-closed check: returns the text untouched if clean.
    ///
    /// # Errors
    ///
    /// Returns [`GuardBlocked`] with `PHI_BLOCKED` on any finding. The
    /// caller must not fall back to emitting anything derived from `text`.
    pub fn guard_text(&self, text: &str) -> Result<String, GuardBlocked> {
        self.guard_text_with(text, FailMode::Closed)
            .map(|outcome| outcome.text)
    }

    /// Check with an explicit fail mode.
    ///
    /// # Errors
    ///
    /// With [`FailMode::Closed`], returns [`GuardBlocked`] on any finding.
    /// [`FailMode::Open`] never errors.
    pub fn guard_text_with(&self, text: &str, mode: FailMode) -> Result<GuardOutcome, GuardBlocked> {
        let scan = scan_text(text, self.tier);
        if !scan.has_phi() {
            return Ok(GuardOutcome {
                text: text.to_owned(),
                findings: Vec::new(),
            });
        }

        match mode {
            FailMode::Closed => {
                let blocked = GuardBlocked::from_scan(&scan);
                debug!(
                    reason_code = %blocked.reason_code,
                    kinds = ?blocked.kinds,
                    total = blocked.total(),
                    "guard blocked text"
                );
                Err(blocked)
            }
            FailMode::Open => {
                warn!(
                    kinds = ?scan.kinds(),
                    total = scan.total_matches(),
                    "fail-open guard redacted text; not permitted for production egress"
                );
                Ok(GuardOutcome {
                    text: redact(text, self.tier),
                    findings: scan.findings,
                })
            }
        }
    }

    /// Scan without deciding, for callers that only need counts.
    pub fn scan(&self, text: &str) -> ScanResult {
        scan_text(text, self.tier)
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::high_confidence()
    }
}
