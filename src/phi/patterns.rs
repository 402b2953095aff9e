//! Tiered PHI identifier patterns, compiled once and shared read-only.
//!
//! HIGH_CONFIDENCE is deliberately small so ingress and egress gates do not
//! block ordinary text. EXTENDED adds broader identifiers for export
//! boundaries, where a false positive is preferable to a leak.
//!
//! Pattern convention: when a regex has capture groups, the first group that
//! participates in a match is the sensitive span and the rest of the match
//! (a label such as `MRN:` or `Patient:`) is context that stays in place.
//! Without groups, the whole match is sensitive.
//!
//! No pattern may match its own placeholder (`[REDACTED:<kind>]`), which is
//! what makes redaction idempotent.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::error;

/// Which pattern set to scan with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Minimal, low false-positive set.
    HighConfidence,
    /// HIGH_CONFIDENCE plus broader identifiers.
    Extended,
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "high_confidence" => Ok(Self::HighConfidence),
            "extended" => Ok(Self::Extended),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Kind of identifier a pattern detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhiKind {
    /// US social security number.
    Ssn,
    /// Email address.
    Email,
    /// North American phone number.
    Phone,
    /// Medical record number.
    Mrn,
    /// Calendar date.
    Date,
    /// ZIP+4 postal code.
    ZipPlus4,
    /// IPv4 address.
    IpAddress,
    /// Labelled personal name.
    Name,
    /// Street address.
    Address,
    /// Account number.
    Account,
    /// Licence or certificate number.
    License,
    /// Device identifier or serial number.
    DeviceId,
    /// Web URL.
    Url,
    /// Age over 89.
    AgeOver89,
}

impl PhiKind {
    /// Lowercase name used in placeholders and counts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ssn => "ssn",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Mrn => "mrn",
            Self::Date => "date",
            Self::ZipPlus4 => "zip_plus4",
            Self::IpAddress => "ip_address",
            Self::Name => "name",
            Self::Address => "address",
            Self::Account => "account",
            Self::License => "license",
            Self::DeviceId => "device_id",
            Self::Url => "url",
            Self::AgeOver89 => "age_over_89",
        }
    }

    /// Placeholder that replaces a match of this kind.
    pub fn placeholder(self) -> String {
        format!("[REDACTED:{}]", self.as_str())
    }
}

impl fmt::Display for PhiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled identifier pattern.
#[derive(Debug, Clone)]
pub struct PhiPattern {
    kind: PhiKind,
    regex: Regex,
}

impl PhiPattern {
    /// Kind this pattern detects.
    pub fn kind(&self) -> PhiKind {
        self.kind
    }

    /// Underlying compiled regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Byte ranges of the sensitive spans in `text`, in order.
    pub fn spans<'t>(&'t self, text: &'t str) -> impl Iterator<Item = (usize, usize)> + 't {
        self.regex.captures_iter(text).filter_map(|caps| {
            let span = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .or_else(|| caps.get(0))?;
            Some((span.start(), span.end()))
        })
    }

    /// Replace every sensitive span with this kind's placeholder.
    pub fn replace_all(&self, text: &str) -> String {
        let placeholder = self.kind.placeholder();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (start, end) in self.spans(text) {
            out.push_str(&text[last..start]);
            out.push_str(&placeholder);
            last = end;
        }
        out.push_str(&text[last..]);
        out
    }
}

const HIGH_CONFIDENCE_SOURCES: &[(PhiKind, &str)] = &[
    (PhiKind::Ssn, r"\b\d{3}-\d{2}-\d{4}\b"),
    (
        PhiKind::Email,
        r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b",
    ),
    (
        PhiKind::Phone,
        r"(?:\+1[\-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[\-.\s])\d{3}[\-.\s]\d{4}\b",
    ),
    (
        PhiKind::Mrn,
        r"(?i)\b(?:MRN|medical\s+record\s+(?:number|no\.?))\s*[:#]*\s*([A-Z]?\d{6,10})\b",
    ),
];

const EXTENDED_ONLY_SOURCES: &[(PhiKind, &str)] = &[
    (
        PhiKind::Date,
        r"(?i)\b(?:\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}|\d{4}-\d{2}-\d{2}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4})\b",
    ),
    (PhiKind::ZipPlus4, r"\b\d{5}-\d{4}\b"),
    (
        PhiKind::IpAddress,
        r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
    ),
    (
        PhiKind::Name,
        r"\b(?:Patient|Pt|Name|Mr|Mrs|Ms|Dr)\.?:?[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){0,2})",
    ),
    (
        PhiKind::Address,
        r"\b\d{1,5}[ \t]+(?:[A-Z][a-z]+[ \t]+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Court|Ct|Way)\b\.?",
    ),
    (
        PhiKind::Account,
        r"(?i)\b(?:account|acct)(?:\s+(?:no|number))?\.?\s*[:#]*\s*(\d{6,17})\b",
    ),
    (
        PhiKind::License,
        r"(?i)\b(?:license|licence|DL)(?:\s+(?:no|number))?\.?\s*[:#]*\s*([A-Z]{0,2}\d{5,12})\b",
    ),
    (
        PhiKind::DeviceId,
        r"(?i)\b(?:device|serial)(?:\s+(?:id|no|number))?\.?\s*[:#]*\s*([A-Z0-9][A-Z0-9\-]*\d[A-Z0-9\-]*)\b",
    ),
    (PhiKind::Url, r#"\bhttps?://[^\s\[\]<>"']+"#),
    (
        PhiKind::AgeOver89,
        r"(?i)\b(?:aged?\s*[:=]?\s*(9\d|1[0-4]\d)\b|(9\d|1[0-4]\d)[\s\-]*(?:years?[\s\-]*old|y/?o|yrs?)\b)",
    ),
];

fn compile(sources: &[(PhiKind, &str)]) -> Vec<PhiPattern> {
    sources
        .iter()
        .filter_map(|(kind, source)| match Regex::new(source) {
            Ok(regex) => Some(PhiPattern { kind: *kind, regex }),
            Err(e) => {
                error!(kind = %kind, error = %e, "failed to compile PHI pattern");
                None
            }
        })
        .collect()
}

static HIGH_CONFIDENCE: LazyLock<Vec<PhiPattern>> =
    LazyLock::new(|| compile(HIGH_CONFIDENCE_SOURCES));

static EXTENDED: LazyLock<Vec<PhiPattern>> = LazyLock::new(|| {
    let mut patterns = HIGH_CONFIDENCE.clone();
    patterns.extend(compile(EXTENDED_ONLY_SOURCES));
    patterns
});

/// Compiled patterns for a tier, in scan order.
pub fn patterns(tier: Tier) -> &'static [PhiPattern] {
    match tier {
        Tier::HighConfidence => &HIGH_CONFIDENCE,
        Tier::Extended => &EXTENDED,
    }
}

/// Number of patterns a tier is expected to carry.
pub fn expected_len(tier: Tier) -> usize {
    match tier {
        Tier::HighConfidence => HIGH_CONFIDENCE_SOURCES.len(),
        Tier::Extended => HIGH_CONFIDENCE_SOURCES
            .len()
            .saturating_add(EXTENDED_ONLY_SOURCES.len()),
    }
}
