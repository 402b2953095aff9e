//! Governance layer for research pipelines that may touch protected health
//! information.
//!
//! Two concerns live here:
//! - **Mode and capabilities**: [`config`] loads the safety flags,
//!   [`mode::resolve_mode`] derives the operating mode, and
//!   [`capability::CapabilityGate`] authorizes named operations.
//! - **PHI safety**: [`phi`] detects and redacts identifiers, and
//!   [`guard`] turns detection into fail-closed egress decisions.
//!
//! Nothing here performs network I/O. Errors and logs never carry the
//! matched content, only kinds, counts and reason codes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capability;
pub mod config;
pub mod guard;
pub mod logging;
pub mod mode;
pub mod phi;

pub use capability::{CapabilityDecision, CapabilityGate, CredentialSnapshot, DataAdmissibility};
pub use config::{ConfigError, ConfigHandle, RuntimeConfig};
pub use guard::{EgressGuard, Guard, GuardBlocked, Payload, ReasonCode};
pub use mode::{resolve_mode, OperatingMode};
