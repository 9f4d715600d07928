//! Configuration for the backup garbage collector.
//!
//! Configuration is read from a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every key has a
//! default, so the collector also starts with no config file at all.
//!
//! # Example
//!
//! ```toml
//! [database]
//! host = "db.internal"
//! password = "${DB_PASSWORD}"
//!
//! [cleanup]
//! backup_path = "/mnt/pterodactyl"
//! schedule = "0 2 * * *"
//! ```

mod cleanup;
mod database;
mod logging;

use std::path::Path;

pub use cleanup::CleanupConfig;
pub use database::DatabaseConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// All sections are optional with defaults matching the panel's standard
/// deployment, allowing a bare `backup-gc run` on a stock install.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GcConfig {
    /// Panel database connection parameters.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Backup directory and schedule.
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Keys that were absent from the file and fell back to their default.
    /// Recorded at load time, reported once tracing is up.
    #[serde(skip)]
    defaulted_keys: Vec<&'static str>,
}

/// Keys reported when their value falls back to the built-in default.
const DEFAULTABLE_KEYS: &[&str] = &[
    "database.host",
    "database.port",
    "database.user",
    "database.password",
    "database.database",
    "cleanup.backup_path",
    "cleanup.schedule",
];

impl GcConfig {
    /// Load configuration from an optional TOML file path.
    ///
    /// With no path, all defaults apply. A provided path must exist and
    /// parse; a broken config file is a startup failure, never silently
    /// replaced by defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let mut config = Self::default();
                config.defaulted_keys = DEFAULTABLE_KEYS.to_vec();
                Ok(config)
            }
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        // Inspect the raw document first so we can report which keys fell
        // back to defaults after typed deserialization erases that.
        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        let mut config: GcConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.defaulted_keys = collect_defaulted_keys(&raw);
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.cleanup.validate()?;
        Ok(())
    }

    /// Log one line per configuration key that fell back to its default.
    ///
    /// Called after tracing is initialized; `load` itself runs before the
    /// subscriber exists.
    pub fn log_defaulted_keys(&self) {
        for key in &self.defaulted_keys {
            tracing::info!(key, "config key not set, using default");
        }
    }

    #[cfg(test)]
    pub(crate) fn defaulted_keys(&self) -> &[&'static str] {
        &self.defaulted_keys
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Determine which defaultable keys are absent from the raw document.
fn collect_defaulted_keys(raw: &toml::Value) -> Vec<&'static str> {
    DEFAULTABLE_KEYS
        .iter()
        .copied()
        .filter(|key| {
            let mut node = raw;
            for part in key.split('.') {
                match node.get(part) {
                    Some(child) => node = child,
                    None => return true,
                }
            }
            false
        })
        .collect()
}

/// Expand `${VAR_NAME}` references to environment variable values.
///
/// References inside TOML comments are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let matched = cap.get(0).expect("capture 0 always present");

            // Leave references inside a comment untouched.
            if let Some(pos) = comment_pos
                && matched.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..matched.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = matched.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn empty_document_yields_all_defaults() {
        let config = GcConfig::from_toml("").unwrap();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(
            config.cleanup.backup_path,
            PathBuf::from("/mnt/pterodactyl")
        );
        assert_eq!(config.cleanup.schedule, "0 2 * * *");
        assert_eq!(config.defaulted_keys(), DEFAULTABLE_KEYS);
    }

    #[test]
    fn no_config_file_yields_all_defaults() {
        let config = GcConfig::load(None).unwrap();
        assert_eq!(config.database.database, "panel");
        assert_eq!(config.defaulted_keys(), DEFAULTABLE_KEYS);
    }

    #[test]
    fn explicit_keys_are_not_reported_as_defaulted() {
        let toml = r#"
            [database]
            host = "db.internal"
            port = 3307

            [cleanup]
            schedule = "*/30 * * * *"
        "#;
        let config = GcConfig::from_toml(toml).unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.cleanup.schedule, "*/30 * * * *");
        assert_eq!(
            config.defaulted_keys(),
            &[
                "database.user",
                "database.password",
                "database.database",
                "cleanup.backup_path",
            ]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
            [cleanup]
            backup_dir = "/srv/backups"
        "#;
        assert!(matches!(
            GcConfig::from_toml(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_schedule_fails_validation() {
        let toml = r#"
            [cleanup]
            schedule = "every fortnight"
        "#;
        assert!(matches!(
            GcConfig::from_toml(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn env_vars_are_expanded() {
        temp_env::with_var("GC_TEST_DB_PASSWORD", Some("s3cret"), || {
            let toml = r#"
                [database]
                password = "${GC_TEST_DB_PASSWORD}"
            "#;
            let config = GcConfig::from_toml(toml).unwrap();
            assert_eq!(config.database.password, "s3cret");
        });
    }

    #[test]
    fn missing_env_var_is_an_error() {
        temp_env::with_var_unset("GC_TEST_UNSET_VAR", || {
            let toml = r#"
                [database]
                password = "${GC_TEST_UNSET_VAR}"
            "#;
            match GcConfig::from_toml(toml) {
                Err(ConfigError::EnvVarNotFound(name)) => {
                    assert_eq!(name, "GC_TEST_UNSET_VAR");
                }
                other => panic!("expected EnvVarNotFound, got {other:?}"),
            }
        });
    }

    #[test]
    fn env_vars_in_comments_are_ignored() {
        let toml = r#"
            # password = "${GC_TEST_COMMENTED_VAR}"
            [database]
            user = "pterodactyl"
        "#;
        let config = GcConfig::from_toml(toml).unwrap();
        assert_eq!(config.database.user, "pterodactyl");
    }
}
