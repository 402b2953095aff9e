//! PHI detection and redaction.
//!
//! Everything here is synchronous, allocation-bounded by input size, and
//! free of I/O. Compiled patterns are shared read-only across threads.

pub mod patterns;
pub mod redactor;
pub mod scanner;

pub use patterns::{PhiKind, PhiPattern, Tier};
pub use redactor::{redact, Redactor};
pub use scanner::{
    scan_object, scan_text, scan_text_hashed, FindingLocation, PhiFinding, ScanResult,
    DEFAULT_MAX_DEPTH,
};
