//! Egress validation: payload shape first, then content.
//!
//! Some payloads are never eligible to leave the process whatever they
//! contain: raw tables, raw byte blobs, values that are not plain JSON, and
//! anything that references a restricted data directory. Those are rejected
//! with `RAW_DATA_BLOCKED` before any scan. Everything else goes through the
//! content guard, fail-closed.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Guard, GuardBlocked, ReasonCode};
use crate::phi::{scan_object, Tier, DEFAULT_MAX_DEPTH};

/// Path segments that mark restricted storage.
pub const DEFAULT_RESTRICTED_SEGMENTS: &[&str] = &["data/raw", "data/restricted"];

/// Label used as the root of finding paths in payload scans.
const PAYLOAD_LABEL: &str = "payload";

/// Something a caller wants to send or persist.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A plain JSON value.
    Json(Value),
    /// A plain string.
    Text(String),
    /// A raw tabular container. Only its shape is recorded.
    Table {
        /// Number of columns.
        columns: usize,
        /// Number of rows.
        rows: usize,
    },
    /// A raw byte blob.
    Bytes(Vec<u8>),
    /// A value that could not be expressed as plain JSON.
    Opaque {
        /// Rust type name of the value.
        type_name: String,
    },
}

impl Payload {
    /// Convert any serializable value. Serialization failure yields
    /// [`Payload::Opaque`], which the guard always rejects.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => Self::Json(json),
            Err(_) => Self::Opaque {
                type_name: std::any::type_name::<T>().to_owned(),
            },
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Table { .. } => "raw_table",
            Self::Bytes(_) => "raw_bytes",
            Self::Opaque { .. } => "opaque_value",
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Shape policy plus fail-closed content guard for outbound payloads.
#[derive(Debug, Clone)]
pub struct EgressGuard {
    guard: Guard,
    restricted_segments: Vec<String>,
    max_depth: usize,
}

impl Default for EgressGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl EgressGuard {
    /// EXTENDED-tier guard with the default restricted segments.
    pub fn new() -> Self {
        Self {
            guard: Guard::extended(),
            restricted_segments: DEFAULT_RESTRICTED_SEGMENTS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Use a different scan tier.
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.guard = Guard::new(tier);
        self
    }

    /// Replace the restricted path segments.
    pub fn with_restricted_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.restricted_segments = segments
            .into_iter()
            .map(|s| normalize_path(&s.into()))
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Change the object scan depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validate a payload for egress.
    ///
    /// # Errors
    ///
    /// Returns [`GuardBlocked`] with `RAW_DATA_BLOCKED` for a disallowed
    /// shape or restricted path, and `PHI_BLOCKED` for detected content or
    /// for a JSON payload nested deeper than the scan limit.
    pub fn check(&self, payload: &Payload) -> Result<(), GuardBlocked> {
        log_decision(payload.shape(), self.evaluate(payload))
    }

    /// Validate a JSON value for egress without wrapping it in a [`Payload`].
    ///
    /// # Errors
    ///
    /// See [`EgressGuard::check`].
    pub fn check_value(&self, value: &Value) -> Result<(), GuardBlocked> {
        log_decision("json", self.check_json(value))
    }

    fn evaluate(&self, payload: &Payload) -> Result<(), GuardBlocked> {
        match payload {
            Payload::Table { .. } | Payload::Bytes(_) | Payload::Opaque { .. } => Err(
                GuardBlocked::with_kind(ReasonCode::RawDataBlocked, payload.shape()),
            ),
            Payload::Text(text) => {
                if self.is_restricted(text) {
                    return Err(restricted_path());
                }
                self.guard.guard_text(text).map(|_| ())
            }
            Payload::Json(value) => self.check_json(value),
        }
    }

    fn check_json(&self, value: &Value) -> Result<(), GuardBlocked> {
        if self.references_restricted(value, 0) {
            return Err(restricted_path());
        }

        let scan = scan_object(value, PAYLOAD_LABEL, self.guard.tier(), self.max_depth);
        if scan.has_phi() {
            return Err(GuardBlocked::from_scan(&scan));
        }
        if scan.depth_exceeded {
            return Err(GuardBlocked::with_kind(ReasonCode::PhiBlocked, "depth_limit"));
        }
        Ok(())
    }

    fn references_restricted(&self, value: &Value, depth: usize) -> bool {
        if depth > self.max_depth {
            return false;
        }
        let next = depth.saturating_add(1);
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => false,
            Value::String(s) => self.is_restricted(s),
            Value::Array(items) => items.iter().any(|v| self.references_restricted(v, next)),
            Value::Object(map) => map
                .iter()
                .any(|(k, v)| self.is_restricted(k) || self.references_restricted(v, next)),
        }
    }

    /// Whether `text` mentions a restricted path segment anywhere, including
    /// inside a longer path component such as `bigdata/raw` or `data/raw2024`.
    pub fn is_restricted(&self, text: &str) -> bool {
        let normalized = normalize_path(text);
        self.restricted_segments
            .iter()
            .any(|segment| normalized.contains(segment.as_str()))
    }
}

fn log_decision(shape: &str, result: Result<(), GuardBlocked>) -> Result<(), GuardBlocked> {
    match &result {
        Ok(()) => debug!(shape, "egress allowed"),
        Err(blocked) => warn!(
            shape,
            reason_code = %blocked.reason_code,
            kinds = ?blocked.kinds,
            "egress denied"
        ),
    }
    result
}

fn restricted_path() -> GuardBlocked {
    GuardBlocked::with_kind(ReasonCode::RawDataBlocked, "restricted_path")
}

fn normalize_path(raw: &str) -> String {
    raw.trim().replace('\\', "/").to_ascii_lowercase()
}
