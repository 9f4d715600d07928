use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum log level. `RUST_LOG` overrides this when set.
    #[serde(default)]
    pub level: LogLevel,

    /// Console output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Additional tracing filter directives, appended to the base level
    /// (e.g. `"sqlx=debug"`).
    #[serde(default)]
    pub filter: Option<String>,
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Console log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// Structured JSON, one event per line.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_compact_info() {
        let config = LoggingConfig::default();
        assert!(matches!(config.level, LogLevel::Info));
        assert!(matches!(config.format, LogFormat::Compact));
        assert!(config.filter.is_none());
    }

    #[test]
    fn parse_from_toml() {
        let config: LoggingConfig = toml::from_str(
            r#"
                level = "debug"
                format = "json"
                filter = "sqlx=warn"
            "#,
        )
        .unwrap();
        assert!(matches!(config.level, LogLevel::Debug));
        assert!(matches!(config.format, LogFormat::Json));
        assert_eq!(config.filter.as_deref(), Some("sqlx=warn"));
    }
}
