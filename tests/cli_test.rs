//! CLI integration tests
//! Run with: cargo test --test cli_test

use std::process::Command;

fn mbot() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mbot"))
}

#[test]
fn test_version_prints_package_version() {
    let output = mbot().arg("version").output().expect("binary runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("mbot v{}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_config_emits_loadable_yaml() {
    let output = mbot().arg("init-config").output().expect("binary runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let yaml = stdout
        .split("\nSave this to")
        .next()
        .expect("config precedes the hint");

    let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid YAML");
    assert_eq!(value["bot"]["prefix"].as_str(), Some("!"));
    assert!(value["server"]["channels"].is_sequence());
    assert!(value["security"]["rate-limit"]["max-commands"].is_number());
}

#[test]
fn test_run_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "bot:\n  prefix: ''\n").unwrap();

    let output = mbot()
        .args(["--config", path.to_str().unwrap(), "run"])
        .output()
        .expect("binary runs");
    assert!(!output.status.success());
}
