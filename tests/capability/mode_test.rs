//! Mode resolution from loaded configuration.

use ros_governance::config::RuntimeConfig;
use ros_governance::mode::{resolve_mode, OperatingMode};

fn load(pairs: &[(&str, &str)]) -> RuntimeConfig {
    let owned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    RuntimeConfig::load_with(|key| {
        if key == "ROS_CONFIG_PATH" {
            return Some("/nonexistent/ros-governance/ros.toml".to_owned());
        }
        owned.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .expect("config loads")
}

#[test]
fn all_safety_flags_force_standby() {
    for claim in ["LIVE", "ACTIVE", "SANDBOX", "STANDBY", "", "bogus"] {
        assert_eq!(resolve_mode(true, true, false, claim), OperatingMode::Standby, "{claim}");
    }
}

#[test]
fn claimed_standby_without_flags_is_sandbox() {
    let config = load(&[("ROS_MODE", "STANDBY"), ("MOCK_ONLY", "false")]);
    assert_eq!(config.to_mode(), OperatingMode::Sandbox);
}

#[test]
fn claim_is_honoured_once_standby_is_lifted() {
    let config = load(&[("ROS_MODE", " live "), ("NO_NETWORK", "0")]);
    assert_eq!(config.to_mode(), OperatingMode::Live);

    let config = load(&[("ROS_MODE", "Active"), ("ALLOW_UPLOADS", "on")]);
    assert_eq!(config.to_mode(), OperatingMode::Active);
}

#[test]
fn unknown_claim_falls_back_to_sandbox() {
    let config = load(&[("ROS_MODE", "turbo"), ("MOCK_ONLY", "no")]);
    assert_eq!(config.to_mode(), OperatingMode::Sandbox);
}

#[test]
fn default_environment_is_standby() {
    assert_eq!(load(&[]).to_mode(), OperatingMode::Standby);
}

#[test]
fn mode_is_a_pure_function_of_config() {
    let config = load(&[("ROS_MODE", "ACTIVE"), ("NO_NETWORK", "false")]);
    let first = config.to_mode();
    for _ in 0..10 {
        assert_eq!(config.to_mode(), first);
    }
}
