use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_linemark"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "linemark init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".linemark.toml");
    assert!(config_path.exists(), ".linemark.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[engine]"));
    assert!(content.contains("[sync]"));
    assert!(content.contains("[git]"));

    // Everything is commented out, so it parses to the defaults.
    let config = linemark_core::LinemarkConfig::from_toml(&content).unwrap();
    assert_eq!(config.sync.quiet_period_ms, 500);
    assert_eq!(config.git.baseline_rev, "HEAD");
    let _raw: toml::Value = toml::from_str(&content).unwrap();
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".linemark.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_linemark"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".linemark.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".linemark.toml"), "[sync]\nquiet_period_ms = 0\n").unwrap();
    std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_linemark"))
        .args(["diff", "a.txt", "--against", "a.txt"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}
