//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use bundlegate_config::ConfigError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(ConfigError::InvalidSettings(msg)) => miette::miette!(
            "Invalid settings: {}\n\nHint: Check bundlegate.toml and BUNDLEGATE_* environment variables",
            msg
        ),
        CliError::Config(e) => miette::miette!("Configuration error: {}", e),
        CliError::Server(msg) => miette::miette!("Server error: {}", msg),
        _ => miette::miette!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_settings_carry_hint() {
        let report = cli_error_to_miette(CliError::Config(ConfigError::InvalidSettings(
            "invalid host 'nope'".into(),
        )));
        let msg = report.to_string();
        assert!(msg.contains("invalid host 'nope'"));
        assert!(msg.contains("Hint:"));
    }
}
