//! Capability gate: may this named operation run in the current mode?
//!
//! Callers check before doing privileged work and stop on a denial. The
//! decision is binary and carries a reason code from the shared taxonomy.
//! All lookups are local and O(1): no network, no disk.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::guard::{GuardBlocked, ReasonCode};
use crate::mode::OperatingMode;

// ── Data admissibility ─────────────────────────────────────────────

/// Classification of the data a capability would process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataAdmissibility {
    /// Blank templates with no patient data.
    Template,
    /// Real data that passed scrubbing verification.
    VerifiedScrubbed,
    /// Synthetic PHI for tests.
    SyntheticPhiTest,
}

impl DataAdmissibility {
    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Template => "TEMPLATE",
            Self::VerifiedScrubbed => "VERIFIED_SCRUBBED",
            Self::SyntheticPhiTest => "SYNTHETIC_PHI_TEST",
        }
    }
}

impl fmt::Display for DataAdmissibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataAdmissibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "TEMPLATE" => Ok(Self::Template),
            "VERIFIED_SCRUBBED" => Ok(Self::VerifiedScrubbed),
            "SYNTHETIC_PHI_TEST" => Ok(Self::SyntheticPhiTest),
            other => Err(format!("unknown admissibility: {other}")),
        }
    }
}

// ── Capability table ───────────────────────────────────────────────

/// Which configured provider backs a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    /// `llm_provider`.
    Llm,
    /// `literature_provider`.
    Literature,
}

/// Static requirements of a named capability.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    /// Name callers pass to [`CapabilityGate::check`].
    pub name: &'static str,
    /// Informational capabilities run in every mode, STANDBY included.
    pub informational: bool,
    /// Requires outbound network.
    pub needs_network: bool,
    /// Requires a real (non-mock) provider of this role.
    pub backend: Option<ProviderRole>,
    /// Accepts uploaded files.
    pub upload: bool,
    /// Accepted data classifications. Empty means unclassified.
    pub admissible: &'static [DataAdmissibility],
}

const fn info_only(name: &'static str) -> Capability {
    Capability {
        name,
        informational: true,
        needs_network: false,
        backend: None,
        upload: false,
        admissible: &[],
    }
}

/// Every capability the gate knows. Anything else is denied.
pub const CAPABILITIES: &[Capability] = &[
    info_only("status"),
    info_only("health"),
    info_only("list_capabilities"),
    Capability {
        name: "llm_complete",
        informational: false,
        needs_network: true,
        backend: Some(ProviderRole::Llm),
        upload: false,
        admissible: &[],
    },
    Capability {
        name: "literature_search",
        informational: false,
        needs_network: true,
        backend: Some(ProviderRole::Literature),
        upload: false,
        admissible: &[],
    },
    Capability {
        name: "upload",
        informational: false,
        needs_network: false,
        backend: None,
        upload: true,
        admissible: &[],
    },
    Capability {
        name: "extract",
        informational: false,
        needs_network: false,
        backend: None,
        upload: false,
        admissible: &[
            DataAdmissibility::VerifiedScrubbed,
            DataAdmissibility::SyntheticPhiTest,
        ],
    },
    Capability {
        name: "export_bundle",
        informational: false,
        needs_network: false,
        backend: None,
        upload: false,
        admissible: &[DataAdmissibility::VerifiedScrubbed, DataAdmissibility::Template],
    },
    Capability {
        name: "template_render",
        informational: false,
        needs_network: false,
        backend: None,
        upload: false,
        admissible: &[DataAdmissibility::Template],
    },
];

/// Name recorded on decisions for a capability that is not in the table.
/// The caller's string is never echoed, since it may carry arbitrary text.
pub const UNKNOWN_CAPABILITY: &str = "unknown_capability";

/// Look up a capability by name.
pub fn lookup(name: &str) -> Option<&'static Capability> {
    CAPABILITIES.iter().find(|c| c.name == name)
}

// ── Credentials ────────────────────────────────────────────────────

/// Env var holding the key for a provider. `None` when the provider needs
/// no key; unknown providers are expected under `<NAME>_API_KEY`.
pub fn provider_key_var(provider: &str) -> Option<String> {
    match provider {
        "mock" | "pubmed" => None,
        "openai" => Some("OPENAI_API_KEY".to_owned()),
        "anthropic" => Some("ANTHROPIC_API_KEY".to_owned()),
        "azure" | "azure_openai" => Some("AZURE_OPENAI_API_KEY".to_owned()),
        "semantic_scholar" => Some("SEMANTIC_SCHOLAR_API_KEY".to_owned()),
        other => Some(format!(
            "{}_API_KEY",
            other.to_ascii_uppercase().replace(['-', '.', ' '], "_")
        )),
    }
}

/// Which credential env vars were present at capture time. Values are
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSnapshot {
    present: HashSet<String>,
}

impl CredentialSnapshot {
    /// Record presence of the keys the configured providers need.
    pub fn capture(config: &RuntimeConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let present = [config.llm_provider(), config.literature_provider()]
            .into_iter()
            .filter_map(provider_key_var)
            .filter(|var| env(var.as_str()).is_some_and(|v| !v.trim().is_empty()))
            .collect();
        Self { present }
    }

    /// Snapshot from explicit var names (for tests and embedding).
    pub fn with_keys<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            present: vars.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `var` was set.
    pub fn has(&self, var: &str) -> bool {
        self.present.contains(var)
    }
}

// ── Decision ───────────────────────────────────────────────────────

/// Outcome of one capability check. Carries no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityDecision {
    /// Whether the capability may run.
    pub allowed: bool,
    /// Human-readable reason.
    pub reason: String,
    /// Denial code. `None` when allowed.
    pub reason_code: Option<ReasonCode>,
    /// What an operator must change for the capability to be allowed.
    pub required_action: Option<String>,
    /// Capability that was checked.
    pub capability: String,
    /// Mode the check ran under.
    pub mode: OperatingMode,
    /// Data classification supplied with the request.
    pub admissibility: Option<DataAdmissibility>,
}

impl CapabilityDecision {
    /// Reason code as a string; `ALLOWED` for allowed decisions.
    pub fn code(&self) -> &'static str {
        self.reason_code.map_or("ALLOWED", ReasonCode::as_str)
    }

    /// Turn a denial into [`GuardBlocked`] so callers can use `?`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardBlocked`] carrying the denial code and the capability
    /// name when the decision is a denial.
    pub fn into_result(self) -> Result<(), GuardBlocked> {
        match self.reason_code {
            Some(code) if !self.allowed => Err(GuardBlocked::with_kind(code, &self.capability)),
            Some(_) | None => Ok(()),
        }
    }
}

// ── Gate ───────────────────────────────────────────────────────────

/// Authorizes named capabilities against the mode and config.
#[derive(Debug, Clone)]
pub struct CapabilityGate {
    config: Arc<RuntimeConfig>,
    credentials: CredentialSnapshot,
}

impl CapabilityGate {
    /// Create a gate over a config snapshot and captured credentials.
    pub fn new(config: Arc<RuntimeConfig>, credentials: CredentialSnapshot) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// Create a gate, capturing credential presence from the process env.
    pub fn from_env(config: Arc<RuntimeConfig>) -> Self {
        let credentials = CredentialSnapshot::capture(&config, |key| std::env::var(key).ok());
        Self::new(config, credentials)
    }

    /// Config the gate was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Check under the mode derived from the gate's own config.
    pub fn check_current(
        &self,
        capability: &str,
        admissibility: Option<DataAdmissibility>,
    ) -> CapabilityDecision {
        self.check(capability, self.config.to_mode(), admissibility)
    }

    /// Decide whether `capability` may run in `mode` on data classified as
    /// `admissibility`. The first failing rule determines the reason code.
    pub fn check(
        &self,
        capability: &str,
        mode: OperatingMode,
        admissibility: Option<DataAdmissibility>,
    ) -> CapabilityDecision {
        let cap = lookup(capability);
        let name = cap.map_or(UNKNOWN_CAPABILITY, |c| c.name);
        let decision = match self.evaluate(cap, mode, admissibility) {
            Ok(reason) => CapabilityDecision {
                allowed: true,
                reason,
                reason_code: None,
                required_action: None,
                capability: name.to_owned(),
                mode,
                admissibility,
            },
            Err(denial) => CapabilityDecision {
                allowed: false,
                reason: denial.reason,
                reason_code: Some(denial.code),
                required_action: denial.action,
                capability: name.to_owned(),
                mode,
                admissibility,
            },
        };

        if decision.allowed {
            debug!(capability = name, %mode, "capability allowed");
        } else {
            info!(capability = name, %mode, reason_code = decision.code(), "capability denied");
        }
        decision
    }

    fn evaluate(
        &self,
        cap: Option<&'static Capability>,
        mode: OperatingMode,
        admissibility: Option<DataAdmissibility>,
    ) -> Result<String, Denial> {
        let Some(cap) = cap else {
            return Err(Denial::new(
                ReasonCode::CapabilityUnknown,
                "capability is not registered".to_owned(),
                None,
            ));
        };

        if cap.informational {
            return Ok("informational capability".to_owned());
        }

        if mode == OperatingMode::Standby {
            return Err(Denial::new(
                ReasonCode::StandbyBlocked,
                "STANDBY permits informational capabilities only".to_owned(),
                Some("clear MOCK_ONLY or NO_NETWORK, or set ALLOW_UPLOADS, and restart"),
            ));
        }

        if !cap.admissible.is_empty() {
            check_admissibility(cap, mode, admissibility)?;
        }

        if cap.upload {
            if !self.config.allow_uploads() {
                return Err(Denial::new(
                    ReasonCode::UploadsDisabled,
                    "uploads are disabled".to_owned(),
                    Some("set ALLOW_UPLOADS=true"),
                ));
            }
            if !self.config.strict_phi_on_upload() {
                return Err(Denial::new(
                    ReasonCode::UploadPhiNotStrict,
                    "uploads require the strict PHI posture".to_owned(),
                    Some("set STRICT_PHI_ON_UPLOAD=true"),
                ));
            }
        }

        if cap.needs_network && self.config.no_network() {
            return Err(Denial::new(
                ReasonCode::ModeNoNetwork,
                "network access is disabled".to_owned(),
                Some("set NO_NETWORK=false"),
            ));
        }

        if let Some(role) = cap.backend {
            self.check_backend(role, mode)?;
        }

        Ok(format!("allowed in {mode}"))
    }

    fn check_backend(&self, role: ProviderRole, mode: OperatingMode) -> Result<(), Denial> {
        let provider = match role {
            ProviderRole::Llm => self.config.llm_provider(),
            ProviderRole::Literature => self.config.literature_provider(),
        };

        if mode == OperatingMode::Sandbox || self.config.mock_only() || provider == "mock" {
            return Err(Denial::new(
                ReasonCode::ModeMockOnly,
                format!("only mock backends are available in {mode}"),
                Some("set MOCK_ONLY=false, configure a real provider, and use ACTIVE or LIVE"),
            ));
        }

        match provider_key_var(provider) {
            Some(var) if !self.credentials.has(&var) => Err(Denial::new(
                ReasonCode::LlmKeyMissing,
                format!("provider '{provider}' has no credential"),
                Some("provide the provider API key in the environment"),
            )),
            _ => Ok(()),
        }
    }
}

fn check_admissibility(
    cap: &Capability,
    mode: OperatingMode,
    admissibility: Option<DataAdmissibility>,
) -> Result<(), Denial> {
    let Some(given) = admissibility else {
        return Err(Denial::new(
            ReasonCode::RawDataBlocked,
            format!("'{}' requires classified data", cap.name),
            Some("classify the data before requesting this capability"),
        ));
    };
    if !cap.admissible.contains(&given) {
        return Err(Denial::new(
            ReasonCode::RawDataBlocked,
            format!("'{}' does not accept {given} data", cap.name),
            Some("supply data with an accepted classification"),
        ));
    }
    if mode == OperatingMode::Live && given == DataAdmissibility::SyntheticPhiTest {
        return Err(Denial::new(
            ReasonCode::RawDataBlocked,
            "LIVE does not process synthetic PHI test data".to_owned(),
            Some("run synthetic PHI tests in ACTIVE or SANDBOX"),
        ));
    }
    Ok(())
}

struct Denial {
    code: ReasonCode,
    reason: String,
    action: Option<String>,
}

impl Denial {
    fn new(code: ReasonCode, reason: String, action: Option<&str>) -> Self {
        Self {
            code,
            reason,
            action: action.map(str::to_owned),
        }
    }
}
