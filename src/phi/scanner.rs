//! Text and structured-payload scanning.
//!
//! Findings carry counts, byte offsets or a truncated hash. The matched text
//! itself is dropped before the scan call returns.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::patterns::{patterns, PhiKind, Tier};
use super::redactor::redact;

/// Default recursion limit for [`scan_object`].
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Hex characters kept from the SHA-256 of a first match.
const HASH_PREFIX_LEN: usize = 12;

/// How a finding locates its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMode {
    /// Byte offsets of every match.
    Offsets,
    /// Truncated hash of the first match.
    Hash,
}

/// Where the matches of a finding are, without their content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingLocation {
    /// `(start, end)` byte ranges.
    Offsets(Vec<(usize, usize)>),
    /// First 12 hex characters of the SHA-256 of the first match.
    Hash(String),
}

/// One pattern that matched, with its match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhiFinding {
    /// Identifier kind.
    pub kind: PhiKind,
    /// Number of matches.
    pub count: usize,
    /// Offsets or hash of the matches.
    pub location: FindingLocation,
    /// Dotted/bracketed path of the string within an object scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// One entry per matching pattern (per string leaf for object scans).
    pub findings: Vec<PhiFinding>,
    /// Set when an object scan stopped descending at the depth limit, so
    /// some content was never looked at.
    pub depth_exceeded: bool,
}

impl ScanResult {
    /// Whether any pattern matched.
    pub fn has_phi(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Total match count per kind.
    pub fn counts(&self) -> BTreeMap<PhiKind, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            let entry = counts.entry(finding.kind).or_insert(0_usize);
            *entry = entry.saturating_add(finding.count);
        }
        counts
    }

    /// Distinct kinds found, in stable order.
    pub fn kinds(&self) -> Vec<PhiKind> {
        self.counts().into_keys().collect()
    }

    /// Total matches across all findings.
    pub fn total_matches(&self) -> usize {
        self.findings
            .iter()
            .fold(0_usize, |acc, f| acc.saturating_add(f.count))
    }

    fn absorb(&mut self, other: ScanResult) {
        self.findings.extend(other.findings);
        self.depth_exceeded |= other.depth_exceeded;
    }
}

/// Scan text, locating matches by byte offset.
pub fn scan_text(text: &str, tier: Tier) -> ScanResult {
    scan_text_with(text, tier, LocationMode::Offsets)
}

/// Scan text, locating each finding by a truncated hash of its first match.
pub fn scan_text_hashed(text: &str, tier: Tier) -> ScanResult {
    scan_text_with(text, tier, LocationMode::Hash)
}

/// Scan text with an explicit location mode.
pub fn scan_text_with(text: &str, tier: Tier, mode: LocationMode) -> ScanResult {
    let mut result = ScanResult::default();
    if text.is_empty() {
        return result;
    }

    for pattern in patterns(tier) {
        let spans: Vec<(usize, usize)> = pattern.spans(text).collect();
        let Some(&(start, end)) = spans.first() else {
            continue;
        };
        let location = match mode {
            LocationMode::Offsets => FindingLocation::Offsets(spans.clone()),
            LocationMode::Hash => FindingLocation::Hash(hash_prefix(&text[start..end])),
        };
        result.findings.push(PhiFinding {
            kind: pattern.kind(),
            count: spans.len(),
            location,
            path: None,
        });
    }
    result
}

/// Recursively scan every string (and object key) in `value`.
///
/// Each finding is annotated with a path rooted at `label`, for example
/// `payload.items[2].notes`. Object keys that themselves match are redacted
/// in the path so it can be logged. Descent stops silently below
/// `max_depth`; [`ScanResult::depth_exceeded`] records that it happened.
pub fn scan_object(value: &Value, label: &str, tier: Tier, max_depth: usize) -> ScanResult {
    let mut result = ScanResult::default();
    walk(value, label, tier, 0, max_depth, &mut result);
    result
}

fn walk(
    value: &Value,
    path: &str,
    tier: Tier,
    depth: usize,
    max_depth: usize,
    out: &mut ScanResult,
) {
    if depth > max_depth {
        out.depth_exceeded = true;
        return;
    }
    let next = depth.saturating_add(1);

    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
        Value::String(s) => out.absorb(at_path(scan_text(s, tier), path)),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{path}[{i}]"), tier, next, max_depth, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let key_scan = scan_text(key, tier);
                let child = if key_scan.has_phi() {
                    let child = format!("{path}.{}", redact(key, tier));
                    out.absorb(at_path(key_scan, &child));
                    child
                } else {
                    format!("{path}.{key}")
                };
                walk(item, &child, tier, next, max_depth, out);
            }
        }
    }
}

fn at_path(mut result: ScanResult, path: &str) -> ScanResult {
    for finding in &mut result.findings {
        finding.path = Some(path.to_owned());
    }
    result
}

fn hash_prefix(matched: &str) -> String {
    let digest = Sha256::digest(matched.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(HASH_PREFIX_LEN);
    encoded
}
