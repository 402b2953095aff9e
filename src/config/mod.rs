//! Runtime configuration loading and validation.
//!
//! Loads the governance flags from built-in defaults, an optional flat TOML
//! file (`./ros.toml` or `$ROS_CONFIG_PATH`), and the environment.
//!
//! Precedence: env vars > config file > defaults.
//!
//! Malformed boolean and integer values never raise: they log a warning and
//! fall back to the built-in conservative value, whatever a lower layer set.
//! A malformed upload limit keeps the smaller of the current and default
//! limits. The one hard failure is `max_upload_mb` outside `[1, 1000]`.

pub mod handle;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mode::{resolve_mode, OperatingMode};

pub use handle::ConfigHandle;

/// Config file used when `ROS_CONFIG_PATH` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "ros.toml";

/// Env var naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "ROS_CONFIG_PATH";

/// Accepted range for `max_upload_mb`, inclusive.
pub const MAX_UPLOAD_MB_RANGE: RangeInclusive<i64> = 1..=1000;

const DEFAULT_MAX_UPLOAD_MB: u32 = 25;
const DEFAULT_PROVIDER: &str = "mock";

/// Fatal configuration errors, raised once at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_upload_mb` is a safety parameter and must be within bounds.
    #[error("max_upload_mb must be within [1, 1000], got {value}")]
    MaxUploadOutOfRange {
        /// The rejected value.
        value: i64,
    },
    /// The config file exists but could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    ReadFile {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML.
    #[error("failed to parse config file {}: {message}", path.display())]
    ParseFile {
        /// Path of the config file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

// ── Conservative values ─────────────────────────────────────────

const SAFE_NO_NETWORK: bool = true;
const SAFE_MOCK_ONLY: bool = true;
const SAFE_ALLOW_UPLOADS: bool = false;
const SAFE_STRICT_PHI_ON_UPLOAD: bool = true;

// ── Env vars ────────────────────────────────────────────────────

const ENV_MODE: &str = "ROS_MODE";
const ENV_NO_NETWORK: &str = "NO_NETWORK";
const ENV_MOCK_ONLY: &str = "MOCK_ONLY";
const ENV_ALLOW_UPLOADS: &str = "ALLOW_UPLOADS";
const ENV_STRICT_PHI_ON_UPLOAD: &str = "STRICT_PHI_ON_UPLOAD";
const ENV_MAX_UPLOAD_MB: &str = "MAX_UPLOAD_MB";
const ENV_LLM_PROVIDER: &str = "LLM_PROVIDER";
const ENV_LITERATURE_PROVIDER: &str = "LITERATURE_PROVIDER";

// ── File layer ──────────────────────────────────────────────────

/// Flat `ros.toml` table. Absent keys leave the layer below untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    #[serde(alias = "ros_mode", alias = "ROS_MODE", alias = "MODE")]
    mode: Option<String>,
    #[serde(alias = "NO_NETWORK")]
    no_network: Option<FileValue>,
    #[serde(alias = "MOCK_ONLY")]
    mock_only: Option<FileValue>,
    #[serde(alias = "ALLOW_UPLOADS")]
    allow_uploads: Option<FileValue>,
    #[serde(alias = "STRICT_PHI_ON_UPLOAD")]
    strict_phi_on_upload: Option<FileValue>,
    #[serde(alias = "MAX_UPLOAD_MB")]
    max_upload_mb: Option<FileValue>,
    #[serde(alias = "LLM_PROVIDER")]
    llm_provider: Option<String>,
    #[serde(alias = "LITERATURE_PROVIDER")]
    literature_provider: Option<String>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

/// A file value that may be written natively or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FileValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

// ── Runtime config ──────────────────────────────────────────────

/// Validated, immutable governance configuration.
///
/// Fields are private: the only way to obtain a value is through
/// [`RuntimeConfig::builder`] or one of the `load` functions, all of which
/// validate. Reloading builds a new value; see [`ConfigHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeConfig {
    mode: String,
    no_network: bool,
    mock_only: bool,
    allow_uploads: bool,
    strict_phi_on_upload: bool,
    max_upload_mb: u32,
    llm_provider: String,
    literature_provider: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Standby.as_str().to_owned(),
            no_network: SAFE_NO_NETWORK,
            mock_only: SAFE_MOCK_ONLY,
            allow_uploads: SAFE_ALLOW_UPLOADS,
            strict_phi_on_upload: SAFE_STRICT_PHI_ON_UPLOAD,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            llm_provider: DEFAULT_PROVIDER.to_owned(),
            literature_provider: DEFAULT_PROVIDER.to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Start from the conservative defaults.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Load with precedence env vars > config file > defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is present but unreadable or
    /// invalid, or if `max_upload_mb` is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing and embedding).
    ///
    /// # Errors
    ///
    /// See [`RuntimeConfig::load`].
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = config_path_with(&env);
        let mut builder = Self::builder();
        builder.apply_file(&path)?;
        builder.apply_overrides(&env);
        builder.build()
    }

    /// Parse a flat TOML table into config, without env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseFile`] for invalid TOML and
    /// [`ConfigError::MaxUploadOutOfRange`] for an out-of-range limit.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        builder.apply_toml(toml_str, Path::new("<inline>"))?;
        builder.build()
    }

    /// The operating mode as configured, before derivation.
    pub fn claimed_mode(&self) -> &str {
        &self.mode
    }

    /// Whether outbound network access is disabled.
    pub fn no_network(&self) -> bool {
        self.no_network
    }

    /// Whether only mock backends may be used.
    pub fn mock_only(&self) -> bool {
        self.mock_only
    }

    /// Whether uploads are accepted at all.
    pub fn allow_uploads(&self) -> bool {
        self.allow_uploads
    }

    /// Whether uploads are PHI-scanned with the strict posture.
    pub fn strict_phi_on_upload(&self) -> bool {
        self.strict_phi_on_upload
    }

    /// Upload size limit in megabytes, within [`MAX_UPLOAD_MB_RANGE`].
    pub fn max_upload_mb(&self) -> u32 {
        self.max_upload_mb
    }

    /// Upload size limit in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        u64::from(self.max_upload_mb).saturating_mul(1_048_576)
    }

    /// Configured LLM provider name.
    pub fn llm_provider(&self) -> &str {
        &self.llm_provider
    }

    /// Configured literature search provider name.
    pub fn literature_provider(&self) -> &str {
        &self.literature_provider
    }

    /// Derive the operating mode. Pure: same config, same mode.
    pub fn to_mode(&self) -> OperatingMode {
        resolve_mode(
            self.mock_only,
            self.no_network,
            self.allow_uploads,
            &self.mode,
        )
    }
}

// ── Builder ─────────────────────────────────────────────────────

/// Mutable draft of a [`RuntimeConfig`], validated by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RuntimeConfigBuilder {
    mode: String,
    no_network: bool,
    mock_only: bool,
    allow_uploads: bool,
    strict_phi_on_upload: bool,
    max_upload_mb: i64,
    llm_provider: String,
    literature_provider: String,
}

impl Default for RuntimeConfigBuilder {
    fn default() -> Self {
        let defaults = RuntimeConfig::default();
        Self {
            mode: defaults.mode,
            no_network: defaults.no_network,
            mock_only: defaults.mock_only,
            allow_uploads: defaults.allow_uploads,
            strict_phi_on_upload: defaults.strict_phi_on_upload,
            max_upload_mb: i64::from(defaults.max_upload_mb),
            llm_provider: defaults.llm_provider,
            literature_provider: defaults.literature_provider,
        }
    }
}

impl RuntimeConfigBuilder {
    /// Set the claimed mode string.
    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Set `no_network`.
    pub fn no_network(mut self, value: bool) -> Self {
        self.no_network = value;
        self
    }

    /// Set `mock_only`.
    pub fn mock_only(mut self, value: bool) -> Self {
        self.mock_only = value;
        self
    }

    /// Set `allow_uploads`.
    pub fn allow_uploads(mut self, value: bool) -> Self {
        self.allow_uploads = value;
        self
    }

    /// Set `strict_phi_on_upload`.
    pub fn strict_phi_on_upload(mut self, value: bool) -> Self {
        self.strict_phi_on_upload = value;
        self
    }

    /// Set `max_upload_mb`. Checked in [`build`](Self::build).
    pub fn max_upload_mb(mut self, value: i64) -> Self {
        self.max_upload_mb = value;
        self
    }

    /// Set the LLM provider name.
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = provider.into();
        self
    }

    /// Set the literature provider name.
    pub fn literature_provider(mut self, provider: impl Into<String>) -> Self {
        self.literature_provider = provider.into();
        self
    }

    /// Validate and freeze.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MaxUploadOutOfRange`] when `max_upload_mb` is
    /// outside [`MAX_UPLOAD_MB_RANGE`].
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        if !MAX_UPLOAD_MB_RANGE.contains(&self.max_upload_mb) {
            return Err(ConfigError::MaxUploadOutOfRange {
                value: self.max_upload_mb,
            });
        }
        let max_upload_mb = u32::try_from(self.max_upload_mb).map_err(|_| {
            ConfigError::MaxUploadOutOfRange {
                value: self.max_upload_mb,
            }
        })?;

        Ok(RuntimeConfig {
            mode: self.mode.trim().to_owned(),
            no_network: self.no_network,
            mock_only: self.mock_only,
            allow_uploads: self.allow_uploads,
            strict_phi_on_upload: self.strict_phi_on_upload,
            max_upload_mb,
            llm_provider: normalize_provider(&self.llm_provider),
            literature_provider: normalize_provider(&self.literature_provider),
        })
    }

    /// Layer a config file on top of the current values. A missing file is
    /// not an error.
    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                info!(path = %path.display(), "loading config from file");
                self.apply_toml(&contents, path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no config file found, using defaults");
                Ok(())
            }
            Err(source) => Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn apply_toml(&mut self, contents: &str, path: &Path) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            message: e.message().to_owned(),
        })?;
        for key in file.unknown.keys() {
            debug!(key = %key, "ignoring unknown config key");
        }

        if let Some(mode) = file.mode {
            self.mode = mode;
        }
        if let Some(v) = &file.no_network {
            file_bool(ENV_NO_NETWORK, v, &mut self.no_network, SAFE_NO_NETWORK);
        }
        if let Some(v) = &file.mock_only {
            file_bool(ENV_MOCK_ONLY, v, &mut self.mock_only, SAFE_MOCK_ONLY);
        }
        if let Some(v) = &file.allow_uploads {
            file_bool(ENV_ALLOW_UPLOADS, v, &mut self.allow_uploads, SAFE_ALLOW_UPLOADS);
        }
        if let Some(v) = &file.strict_phi_on_upload {
            file_bool(
                ENV_STRICT_PHI_ON_UPLOAD,
                v,
                &mut self.strict_phi_on_upload,
                SAFE_STRICT_PHI_ON_UPLOAD,
            );
        }
        if let Some(v) = &file.max_upload_mb {
            match v {
                FileValue::Int(n) => self.max_upload_mb = *n,
                FileValue::Text(s) => apply_int(ENV_MAX_UPLOAD_MB, s, &mut self.max_upload_mb),
                FileValue::Bool(b) => {
                    apply_int(ENV_MAX_UPLOAD_MB, &b.to_string(), &mut self.max_upload_mb);
                }
            }
        }
        if let Some(provider) = file.llm_provider {
            self.llm_provider = provider;
        }
        if let Some(provider) = file.literature_provider {
            self.literature_provider = provider;
        }
        Ok(())
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env(ENV_MODE) {
            self.mode = v;
        }
        if let Some(v) = env(ENV_NO_NETWORK) {
            apply_bool(ENV_NO_NETWORK, &v, &mut self.no_network, SAFE_NO_NETWORK);
        }
        if let Some(v) = env(ENV_MOCK_ONLY) {
            apply_bool(ENV_MOCK_ONLY, &v, &mut self.mock_only, SAFE_MOCK_ONLY);
        }
        if let Some(v) = env(ENV_ALLOW_UPLOADS) {
            apply_bool(ENV_ALLOW_UPLOADS, &v, &mut self.allow_uploads, SAFE_ALLOW_UPLOADS);
        }
        if let Some(v) = env(ENV_STRICT_PHI_ON_UPLOAD) {
            apply_bool(
                ENV_STRICT_PHI_ON_UPLOAD,
                &v,
                &mut self.strict_phi_on_upload,
                SAFE_STRICT_PHI_ON_UPLOAD,
            );
        }
        if let Some(v) = env(ENV_MAX_UPLOAD_MB) {
            apply_int(ENV_MAX_UPLOAD_MB, &v, &mut self.max_upload_mb);
        }
        if let Some(v) = env(ENV_LLM_PROVIDER) {
            self.llm_provider = v;
        }
        if let Some(v) = env(ENV_LITERATURE_PROVIDER) {
            self.literature_provider = v;
        }
    }
}

// ── Value parsing ───────────────────────────────────────────────

/// Parse a lenient boolean: `1/true/t/yes/y/on` and `0/false/f/no/n/off`,
/// case-insensitive. Anything else is `None`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Set `target` from `raw`, or to `conservative` when `raw` is not a boolean.
fn apply_bool(var: &str, raw: &str, target: &mut bool, conservative: bool) {
    match parse_bool(raw) {
        Some(value) => *target = value,
        None => {
            warn!(
                var,
                value = %raw,
                reset_to = conservative,
                "invalid boolean, falling back to conservative value"
            );
            *target = conservative;
        }
    }
}

/// Set `target` from `raw`. An unparsable value never raises the limit: it
/// keeps the smaller of the current and default limits.
fn apply_int(var: &str, raw: &str, target: &mut i64) {
    match raw.trim().parse::<i64>() {
        Ok(value) => *target = value,
        Err(_) => {
            let fallback = (*target).min(i64::from(DEFAULT_MAX_UPLOAD_MB));
            warn!(
                var,
                value = %raw,
                reset_to = fallback,
                "invalid integer, falling back to conservative value"
            );
            *target = fallback;
        }
    }
}

fn file_bool(var: &str, value: &FileValue, target: &mut bool, conservative: bool) {
    match value {
        FileValue::Bool(b) => *target = *b,
        FileValue::Text(s) => apply_bool(var, s, target, conservative),
        FileValue::Int(n) => apply_bool(var, &n.to_string(), target, conservative),
    }
}

fn normalize_provider(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_PROVIDER.to_owned()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Resolve the config file path: `$ROS_CONFIG_PATH` or `./ros.toml`.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    match env(CONFIG_PATH_ENV) {
        Some(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

// ── Tests ───────────────────────────────────────────────────────
