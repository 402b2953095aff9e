//! Deterministic, idempotent PHI redaction.

use serde_json::Value;

use super::patterns::{patterns, Tier};

/// Prefix shared by every placeholder (`[REDACTED:<kind>]`).
pub const REDACTION_PREFIX: &str = "[REDACTED:";

/// Replaces tier matches with typed placeholders.
#[derive(Debug, Clone, Copy)]
pub struct Redactor {
    tier: Tier,
}

impl Redactor {
    /// Create a redactor for the given tier.
    pub fn new(tier: Tier) -> Self {
        Self { tier }
    }

    /// Tier this redactor applies.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Redact a string. See [`redact`].
    pub fn redact(&self, text: &str) -> String {
        redact(text, self.tier)
    }

    /// Redact every string and object key in a JSON value.
    pub fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
            Value::String(s) => Value::String(self.redact(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (self.redact(k), self.redact_value(v)))
                    .collect(),
            ),
        }
    }
}

/// Replace every match of the tier's patterns with `[REDACTED:<kind>]`.
///
/// Patterns are applied in registry order, and the whole pass repeats until
/// nothing changes, so a replacement that shifts a word boundary cannot
/// leave a match behind for an earlier pattern. Placeholders never match
/// any pattern, so the loop terminates and `redact(redact(x)) == redact(x)`.
pub fn redact(text: &str, tier: Tier) -> String {
    let tier_patterns = patterns(tier);
    let max_passes = tier_patterns.len().saturating_add(1);

    let mut current = text.to_owned();
    for _ in 0..max_passes {
        let mut next = current.clone();
        for pattern in tier_patterns {
            next = pattern.replace_all(&next);
        }
        if next == current {
            break;
        }
        current = next;
    }
    current
}
