//! Operating mode derivation.
//!
//! The mode is never stored. It is recomputed from a [`RuntimeConfig`] each
//! time it is needed, so it can never drift from the flags it came from.
//!
//! [`RuntimeConfig`]: crate::config::RuntimeConfig

use std::fmt;

use serde::Serialize;

/// The single authoritative operating mode of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    /// Safety flags are all engaged. Only informational capabilities run.
    Standby,
    /// Conservative fallback. Real external backends are not used.
    Sandbox,
    /// Normal operation against real backends.
    Active,
    /// Production operation on verified-scrubbed data only.
    Live,
}

impl OperatingMode {
    /// Canonical upper-case name, as accepted in `ROS_MODE`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standby => "STANDBY",
            Self::Sandbox => "SANDBOX",
            Self::Active => "ACTIVE",
            Self::Live => "LIVE",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the operating mode from the safety flags and the claimed mode string.
///
/// Rules, in order:
/// 1. `mock_only && no_network && !allow_uploads` is STANDBY whatever the claim.
/// 2. A claim of ACTIVE, SANDBOX or LIVE (case-insensitive, trimmed) is honoured.
/// 3. Anything else, including a claimed STANDBY that fails rule 1, is SANDBOX.
pub fn resolve_mode(
    mock_only: bool,
    no_network: bool,
    allow_uploads: bool,
    claimed: &str,
) -> OperatingMode {
    if mock_only && no_network && !allow_uploads {
        return OperatingMode::Standby;
    }

    match claimed.trim().to_ascii_uppercase().as_str() {
        "ACTIVE" => OperatingMode::Active,
        "LIVE" => OperatingMode::Live,
        _ => OperatingMode::Sandbox,
    }
}
