//! Configuration system tests
//!
//! Tests for config paths, app config persistence and keybind file selection.

use keyshed::config_paths;
use keyshed::input::defaults::EDITOR_CONTEXT;
use keyshed::input::BoundKeyFunction;
use keyshed::AppConfig;

// ========================================================================
// Config Paths Tests
// ========================================================================

#[test]
fn test_config_dir_contains_app_name() {
    let Some(dir) = config_paths::config_dir() else {
        return;
    };
    assert!(dir.to_string_lossy().contains("keyshed"));
}

#[test]
fn test_keybinds_file_ends_with_yaml() {
    let Some(path) = config_paths::keybinds_file() else {
        return;
    };
    assert!(path.to_string_lossy().ends_with("keybinds.yaml"));
}

#[test]
fn test_logs_dir_is_subdir_of_config() {
    let (Some(config), Some(logs)) = (config_paths::config_dir(), config_paths::logs_dir()) else {
        return;
    };
    assert!(logs.starts_with(&config));
}

// ========================================================================
// App Config Tests
// ========================================================================

#[test]
fn test_missing_config_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_from(&dir.path().join("config.yaml"));
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_broken_config_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "max_completions: [not a number").unwrap();
    assert_eq!(AppConfig::load_from(&path), AppConfig::default());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.yaml");

    let config = AppConfig {
        default_context: EDITOR_CONTEXT.to_string(),
        multiline_expressions: false,
        max_completions: 3,
        keybinds: Some(dir.path().join("binds.yaml")),
    };
    config.save_to(&path).unwrap();

    assert_eq!(AppConfig::load_from(&path), config);
}

#[test]
fn test_input_manager_uses_keybinds_override() {
    let dir = tempfile::tempdir().unwrap();
    let binds = dir.path().join("binds.yaml");
    std::fs::write(
        &binds,
        "version: 1\nbinds:\n  - function: MoveUp\n    key: Up\n",
    )
    .unwrap();

    let config = AppConfig {
        default_context: EDITOR_CONTEXT.to_string(),
        keybinds: Some(binds),
        ..AppConfig::default()
    };
    let manager = config.input_manager(None).unwrap();

    assert_eq!(manager.contexts().active_name(), Some(EDITOR_CONTEXT));
    assert_eq!(
        manager.key_function_button_string(&BoundKeyFunction::new("MoveUp")),
        "Up"
    );
}

#[test]
fn test_unreadable_keybinds_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let binds = dir.path().join("binds.yaml");
    std::fs::write(&binds, "binds: {{{").unwrap();

    let manager = AppConfig::default().input_manager(Some(&binds)).unwrap();
    assert_eq!(
        manager.key_function_button_string(&BoundKeyFunction::new("MoveUp")),
        "W"
    );
}
