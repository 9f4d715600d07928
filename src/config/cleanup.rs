use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::schedule;

/// Backup directory and schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Directory holding the `<uuid>.tar.gz` backup archives.
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,

    /// Standard 5-field cron expression (minute hour day-of-month month
    /// day-of-week) for scheduled runs. One run also fires at startup,
    /// independent of the schedule.
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            backup_path: default_backup_path(),
            schedule: default_schedule(),
        }
    }
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("/mnt/pterodactyl")
}

/// Daily at 02:00.
fn default_schedule() -> String {
    "0 2 * * *".to_string()
}

impl CleanupConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.backup_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "cleanup.backup_path cannot be empty".into(),
            ));
        }
        schedule::parse(&self.schedule)
            .map_err(|e| ConfigError::Validation(format!("cleanup.schedule: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_valid() {
        assert!(CleanupConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_backup_path_fails_validation() {
        let config = CleanupConfig {
            backup_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn six_field_schedule_fails_validation() {
        let config = CleanupConfig {
            schedule: "0 0 2 * * *".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
