//! Environment overlay on top of the engine defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bridge_engine::InvokeSettings;
use log::LevelFilter;

use super::logging::{LogDestination, LogSettings};

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_API_URL: &str = "BRIDGE_API_URL";
pub const ENV_MODEL: &str = "BRIDGE_MODEL";
pub const ENV_CLI_PATH: &str = "BRIDGE_CLI_PATH";
pub const ENV_CLI_ARGS: &str = "BRIDGE_CLI_ARGS";
pub const ENV_TIMEOUT_SECS: &str = "BRIDGE_TIMEOUT_SECS";
pub const ENV_LOG_FILE: &str = "BRIDGE_LOG_FILE";
pub const ENV_LOG_DEST: &str = "BRIDGE_LOG_DEST";
pub const ENV_LOG_LEVEL: &str = "BRIDGE_LOG_LEVEL";

#[derive(Debug)]
pub struct AppConfig {
    pub invoke: InvokeSettings,
    pub log: LogSettings,
    /// Rejected values, reported once logging is up.
    pub warnings: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut warnings = Vec::new();

        let mut invoke = InvokeSettings::default();
        if let Some(key) = get(ENV_API_KEY) {
            invoke.api_key = Some(key);
        }
        if let Some(url) = get(ENV_API_URL) {
            invoke.api_url = url.trim().to_string();
        }
        if let Some(model) = get(ENV_MODEL) {
            invoke.model = model.trim().to_string();
        }
        if let Some(program) = get(ENV_CLI_PATH) {
            invoke.cli_program = program.trim().to_string();
        }
        if let Some(args) = lookup(ENV_CLI_ARGS) {
            invoke.cli_args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => invoke.timeout = Duration::from_secs(secs),
                _ => warnings.push(format!("Ignoring {ENV_TIMEOUT_SECS}={raw:?}")),
            }
        }

        let mut log = LogSettings::default();
        if let Some(path) = get(ENV_LOG_FILE) {
            log.file = PathBuf::from(path.trim());
        }
        if let Some(raw) = get(ENV_LOG_DEST) {
            match LogDestination::from_str(&raw) {
                Ok(destination) => log.destination = destination,
                Err(()) => warnings.push(format!("Ignoring {ENV_LOG_DEST}={raw:?}")),
            }
        }
        if let Some(raw) = get(ENV_LOG_LEVEL) {
            match LevelFilter::from_str(raw.trim()) {
                Ok(level) => log.level = level,
                Err(_) => warnings.push(format!("Ignoring {ENV_LOG_LEVEL}={raw:?}")),
            }
        }

        Self {
            invoke,
            log,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.invoke.cli_program, "claude");
        assert_eq!(config.invoke.cli_args, vec!["--print".to_string()]);
        assert_eq!(config.invoke.timeout, Duration::from_secs(120));
        assert_eq!(config.invoke.api_key, None);
        assert_eq!(config.log.destination, LogDestination::File);
        assert_eq!(config.log.level, LevelFilter::Info);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn environment_overrides_settings() {
        let config = config_from(&[
            (ENV_API_KEY, "sk-0123456789abcdefghij"),
            (ENV_API_URL, "http://localhost:8080"),
            (ENV_CLI_PATH, "/opt/bin/model"),
            (ENV_CLI_ARGS, "-p  --output-format text"),
            (ENV_TIMEOUT_SECS, "30"),
            (ENV_LOG_DEST, "both"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FILE, "/var/tmp/bridge.log"),
        ]);
        assert_eq!(config.invoke.api_key.as_deref(), Some("sk-0123456789abcdefghij"));
        assert_eq!(config.invoke.api_url, "http://localhost:8080");
        assert_eq!(config.invoke.cli_program, "/opt/bin/model");
        assert_eq!(
            config.invoke.cli_args,
            vec!["-p", "--output-format", "text"]
        );
        assert_eq!(config.invoke.timeout, Duration::from_secs(30));
        assert_eq!(config.log.destination, LogDestination::Both);
        assert_eq!(config.log.level, LevelFilter::Debug);
        assert_eq!(config.log.file, PathBuf::from("/var/tmp/bridge.log"));
    }

    #[test]
    fn empty_cli_args_clear_the_default_flags() {
        let config = config_from(&[(ENV_CLI_ARGS, "")]);
        assert!(config.invoke.cli_args.is_empty());
    }

    #[test]
    fn invalid_values_are_reported_and_ignored() {
        let config = config_from(&[
            (ENV_TIMEOUT_SECS, "soon"),
            (ENV_LOG_DEST, "stdout"),
            (ENV_LOG_LEVEL, "loud"),
        ]);
        assert_eq!(config.invoke.timeout, Duration::from_secs(120));
        assert_eq!(config.log.destination, LogDestination::File);
        assert_eq!(config.warnings.len(), 3);
    }
}
