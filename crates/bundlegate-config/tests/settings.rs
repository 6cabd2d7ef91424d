//! Layered server settings: defaults, settings file, environment, CLI.

use bundlegate_config::{ServerSettings, SettingsOverrides};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn clear_env() {
    unsafe {
        env::remove_var("BUNDLEGATE_PORT");
        env::remove_var("BUNDLEGATE_HOST");
        env::remove_var("BUNDLEGATE_ENGINE__DEBOUNCE_MS");
    }
}

#[test]
#[serial]
fn defaults_without_any_source() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");

    let settings = ServerSettings::load(None, dir.path(), &SettingsOverrides::default())
        .expect("load settings");
    assert_eq!(settings, ServerSettings::default());
}

#[test]
#[serial]
fn settings_file_in_cwd_is_discovered() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("bundlegate.toml"),
        r#"
port = 8123

[engine]
command = ["rspack", "build", "--config", "{config}", "--json"]
debounce_ms = 250
"#,
    )
    .expect("write settings");

    let settings = ServerSettings::load(None, dir.path(), &SettingsOverrides::default())
        .expect("load settings");
    assert_eq!(settings.port, 8123);
    assert_eq!(settings.engine.command[0], "rspack");
    assert_eq!(settings.engine.debounce_ms, 250);
    assert_eq!(settings.host, "127.0.0.1");
}

#[test]
#[serial]
fn environment_overrides_file_and_cli_overrides_environment() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("bundlegate.toml"), "port = 8123\n").expect("write settings");

    unsafe {
        env::set_var("BUNDLEGATE_PORT", "8200");
        env::set_var("BUNDLEGATE_ENGINE__DEBOUNCE_MS", "40");
    }

    let from_env = ServerSettings::load(None, dir.path(), &SettingsOverrides::default())
        .expect("load settings");
    assert_eq!(from_env.port, 8200);
    assert_eq!(from_env.engine.debounce_ms, 40);

    let overrides = SettingsOverrides {
        port: Some(8300),
        ..Default::default()
    };
    let from_cli = ServerSettings::load(None, dir.path(), &overrides).expect("load settings");
    assert_eq!(from_cli.port, 8300);
    assert_eq!(from_cli.engine.debounce_ms, 40);

    clear_env();
}

#[test]
#[serial]
fn explicit_missing_settings_file_fails() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("nope.toml");

    let err = ServerSettings::load(Some(&missing), dir.path(), &SettingsOverrides::default())
        .unwrap_err();
    assert!(err.to_string().contains("settings file not found"));
}
