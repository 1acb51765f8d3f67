//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `council.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Where automation definitions live.
    pub definitions: DefinitionsConfig,
    /// Where generated artifacts are written.
    pub artifacts: ArtifactsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DefinitionsConfig {
    /// Directory holding one `{name}.json` per automation.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `council.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("council.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("COUNCIL_HOST") {
            self.server.host = val;
        }
        if let Some(val) = var("COUNCIL_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Some(val) = var("COUNCIL_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("AUTOMATION_STORAGE_DIR") {
            self.definitions.dir = PathBuf::from(val);
        }
        if let Some(val) = var("COUNCIL_DEFINITIONS_DIR") {
            self.definitions.dir = PathBuf::from(val);
        }
        if let Some(val) = var("COUNCIL_ARTIFACTS_DIR") {
            self.artifacts.dir = PathBuf::from(val);
        }
        if let Some(val) = var("COUNCIL_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.definitions.dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "definitions directory must not be empty".to_string(),
            ));
        }
        if self.definitions.dir == self.artifacts.dir {
            return Err(ConfigError::Validation(
                "definitions and artifacts must use different directories".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/automations"),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/generated"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "councild=info,council=info,tower_http=debug".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.definitions.dir, PathBuf::from("data/automations"));
        assert_eq!(config.artifacts.dir, PathBuf::from("data/generated"));
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [definitions]
            dir = '/var/lib/council/automations'

            [artifacts]
            dir = '/var/lib/council/generated'

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.definitions.dir,
            PathBuf::from("/var/lib/council/automations")
        );
        assert_eq!(config.artifacts.dir, PathBuf::from("/var/lib/council/generated"));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("COUNCIL_BIND", "127.0.0.1:7000"),
            ("COUNCIL_DEFINITIONS_DIR", "/srv/defs"),
            ("COUNCIL_ARTIFACTS_DIR", "/srv/out"),
            ("COUNCIL_LOG", "trace"),
        ]));
        assert_eq!(config.bind_addr(), "127.0.0.1:7000");
        assert_eq!(config.definitions.dir, PathBuf::from("/srv/defs"));
        assert_eq!(config.artifacts.dir, PathBuf::from("/srv/out"));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_council_definitions_dir_over_legacy_variable() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("AUTOMATION_STORAGE_DIR", "/legacy"),
            ("COUNCIL_DEFINITIONS_DIR", "/current"),
        ]));
        assert_eq!(config.definitions.dir, PathBuf::from("/current"));

        let mut legacy = Config::default();
        legacy.apply_overrides(env(&[("AUTOMATION_STORAGE_DIR", "/legacy")]));
        assert_eq!(legacy.definitions.dir, PathBuf::from("/legacy"));
    }

    #[test]
    fn should_let_rust_log_win_over_council_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("COUNCIL_LOG", "info"), ("RUST_LOG", "debug")]));
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_ignore_unparsable_port() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("COUNCIL_PORT", "eighty")]));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_shared_definitions_and_artifacts_dir() {
        let mut config = Config::default();
        config.artifacts.dir = config.definitions.dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
