//! Configuration parsing and validation (`reminder.toml`).
//!
//! Every section and key is optional; an empty file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::ReminderPolicy;

/// Longest allowed poll interval. Bounds how late a job may fire after
/// the wall clock jumps past its trigger.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("invalid config toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Timing loop settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Upper bound on how long the loop sleeps between checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

/// How trigger times are derived from deadlines.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ScheduleConfig {
    #[serde(default = "default_lead_hours")]
    pub lead_hours: i64,
    #[serde(default = "default_margin_minutes")]
    pub margin_minutes: i64,
    /// Offset from UTC in which a deadline's midnight is taken.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            lead_hours: default_lead_hours(),
            margin_minutes: default_margin_minutes(),
            utc_offset_minutes: 0,
        }
    }
}

fn default_lead_hours() -> i64 {
    24
}

fn default_margin_minutes() -> i64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TaskConfig {
    /// Cancel a task's pending reminder when the task is removed or cleared.
    #[serde(default)]
    pub cancel_on_remove: bool,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("tasks.json")
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReminderConfig {
    /// JSON file holding the task sequence.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            scheduler: SchedulerConfig::default(),
            schedule: ScheduleConfig::default(),
            tasks: TaskConfig::default(),
        }
    }
}

impl ReminderConfig {
    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// `ConfigError::Read` if the file cannot be read, otherwise as
    /// `from_toml_str`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// # Errors
    ///
    /// `ConfigError::Parse` for malformed TOML, `ConfigError::Invalid` when
    /// a value is out of range.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store_path must not be empty".into()));
        }

        let poll = self.scheduler.poll_interval_ms;
        if poll == 0 || poll > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "scheduler.poll_interval_ms must be in 1..={MAX_POLL_INTERVAL_MS}, got {poll}"
            )));
        }

        if self.schedule.lead_hours < 0 {
            return Err(ConfigError::Invalid(
                "schedule.lead_hours must not be negative".into(),
            ));
        }
        if self.schedule.margin_minutes < 0 {
            return Err(ConfigError::Invalid(
                "schedule.margin_minutes must not be negative".into(),
            ));
        }
        // chrono::Duration panics past i64::MAX milliseconds
        if self.schedule.lead_hours > 24 * 366 * 100 || self.schedule.margin_minutes > 60 * 24 * 366
        {
            return Err(ConfigError::Invalid(
                "schedule.lead_hours / margin_minutes are unreasonably large".into(),
            ));
        }

        self.offset()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.poll_interval_ms)
    }

    pub fn policy(&self) -> Result<ReminderPolicy, ConfigError> {
        Ok(ReminderPolicy {
            lead: chrono::Duration::hours(self.schedule.lead_hours),
            margin: chrono::Duration::minutes(self.schedule.margin_minutes),
            offset: self.offset()?,
        })
    }

    fn offset(&self) -> Result<FixedOffset, ConfigError> {
        let minutes = self.schedule.utc_offset_minutes;
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "schedule.utc_offset_minutes must be within +/-1439, got {minutes}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = ReminderConfig::from_toml_str("").unwrap();

        assert_eq!(config, ReminderConfig::default());
        assert_eq!(config.store_path, PathBuf::from("tasks.json"));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert!(!config.tasks.cancel_on_remove);
        assert_eq!(config.policy().unwrap(), ReminderPolicy::default());
    }

    #[test]
    fn full_file_parses() {
        let config = ReminderConfig::from_toml_str(
            r#"
            store_path = "/var/lib/reminders/tasks.json"

            [scheduler]
            poll_interval_ms = 500

            [schedule]
            lead_hours = 48
            margin_minutes = 0
            utc_offset_minutes = 240

            [tasks]
            cancel_on_remove = true
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.tasks.cancel_on_remove);
        let policy = config.policy().unwrap();
        assert_eq!(policy.lead, chrono::Duration::hours(48));
        assert_eq!(policy.margin, chrono::Duration::zero());
        assert_eq!(policy.offset.local_minus_utc(), 4 * 3600);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = ReminderConfig::from_toml_str("[schedule]\nmargin_minutes = 5\n").unwrap();

        assert_eq!(config.schedule.lead_hours, 24);
        assert_eq!(config.schedule.margin_minutes, 5);
    }

    #[rstest]
    #[case("[scheduler]\npoll_interval_ms = 0")]
    #[case("[scheduler]\npoll_interval_ms = 60001")]
    #[case("[schedule]\nlead_hours = -1")]
    #[case("[schedule]\nmargin_minutes = -10")]
    #[case("[schedule]\nutc_offset_minutes = 1440")]
    #[case("store_path = \"\"")]
    fn out_of_range_values_are_rejected(#[case] raw: &str) {
        let err = ReminderConfig::from_toml_str(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ReminderConfig::from_toml_str("[scheduler\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminder.toml");
        fs::write(&path, "[tasks]\ncancel_on_remove = true\n").unwrap();

        let config = ReminderConfig::load(&path).unwrap();
        assert!(config.tasks.cancel_on_remove);

        let missing = ReminderConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
