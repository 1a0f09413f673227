use std::process::Command;

use patchwise_core::ReviewerConfig;

#[test]
fn init_writes_default_yaml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_patchwise"))
        .arg("init")
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "patchwise init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".github/pr_review_config.yml");
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("review_mode: standard"));
    assert!(content.contains("file_filters:"));

    // The generated file must load back to the built-in defaults.
    let loaded = ReviewerConfig::load(dir.path(), None).unwrap();
    assert_eq!(loaded, ReviewerConfig::default());
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".github")).unwrap();
    std::fs::write(dir.path().join(".github/pr_review_config.yml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_patchwise"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content =
        std::fs::read_to_string(dir.path().join(".github/pr_review_config.yml")).unwrap();
    assert_eq!(content, "# existing");
}
