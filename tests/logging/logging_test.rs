//! Tests for `src/logging.rs`.

use ros_governance::logging::{LoggingGuard, LOG_FILE_PREFIX};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn log_file_prefix_names_the_crate() {
    assert!(LOG_FILE_PREFIX.starts_with("ros-governance"));
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber can be installed per process, so the
    // result is not asserted; the directory is created either way.
    let _result = ros_governance::logging::init_production(&logs_dir);
    assert!(logs_dir.exists(), "logs directory should be created");

    // A second CLI init is a no-op rather than a panic.
    ros_governance::logging::init_cli();
}
