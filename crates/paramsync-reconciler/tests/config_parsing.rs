use std::time::Duration;
use std::{env, fs};

use paramsync_reconciler::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("paramsync.toml");

    let toml_content = r#"
[sync]
manager = "elasticcacheparameters"
interval_secs = 60
lock_timeout_ms = 500

[dispatch]
enforce_single_task = false
channel_capacity = 16

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.sync.interval(), Duration::from_secs(60));
    assert_eq!(cfg.sync.lock_timeout(), Some(Duration::from_millis(500)));
    assert!(!cfg.dispatch.enforce_single_task);
    assert_eq!(cfg.dispatch.channel_capacity, 16);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override wins over file
    unsafe {
        env::set_var("PARAMSYNC__SYNC__INTERVAL_SECS", "15");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.sync.interval_secs, 15);
    unsafe {
        env::remove_var("PARAMSYNC__SYNC__INTERVAL_SECS");
    }

    // 3) Missing file falls back to defaults
    let missing = dir.path().join("absent.toml");
    let cfg_default = load_config(missing.to_str()).expect("defaults should load");
    assert_eq!(cfg_default.sync.interval_secs, 300);
    assert!(cfg_default.dispatch.enforce_single_task);

    // 4) Invalid values are rejected
    let invalid_path = dir.path().join("invalid.toml");
    fs::write(&invalid_path, "[dispatch]\nchannel_capacity = 0\n").expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.to_string().contains("channel_capacity must be > 0"));
}
