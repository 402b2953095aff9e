//! Reload behaviour of `ConfigHandle` against a real config file.

use std::collections::HashMap;
use std::sync::Arc;

use ros_governance::config::{ConfigError, ConfigHandle, RuntimeConfig, CONFIG_PATH_ENV};
use ros_governance::mode::OperatingMode;

#[test]
fn reload_picks_up_file_changes() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("ros.toml");
    let vars: HashMap<String, String> =
        HashMap::from([(CONFIG_PATH_ENV.to_owned(), path.display().to_string())]);
    let env = |key: &str| vars.get(key).cloned();

    std::fs::write(&path, "mode = \"STANDBY\"\n").expect("write config");
    let handle = ConfigHandle::new(RuntimeConfig::load_with(env).expect("initial load"));
    let before = handle.current();
    assert_eq!(before.to_mode(), OperatingMode::Standby);

    std::fs::write(
        &path,
        "mode = \"LIVE\"\nmock_only = false\nno_network = false\n",
    )
    .expect("rewrite config");
    let after = handle.reload_with(env).expect("reload");

    assert_eq!(after.to_mode(), OperatingMode::Live);
    assert_eq!(handle.current().to_mode(), OperatingMode::Live);
    // Earlier snapshots are unaffected by the swap.
    assert_eq!(before.to_mode(), OperatingMode::Standby);
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn broken_file_on_reload_keeps_previous_config() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("ros.toml");
    let vars: HashMap<String, String> =
        HashMap::from([(CONFIG_PATH_ENV.to_owned(), path.display().to_string())]);
    let env = |key: &str| vars.get(key).cloned();

    std::fs::write(&path, "mode = \"ACTIVE\"\nmock_only = false\n").expect("write config");
    let handle = ConfigHandle::new(RuntimeConfig::load_with(env).expect("initial load"));
    let before = handle.current();

    std::fs::write(&path, "mode = ").expect("corrupt config");
    let result = handle.reload_with(env);

    assert!(matches!(result, Err(ConfigError::ParseFile { .. })));
    assert!(Arc::ptr_eq(&before, &handle.current()));
}
