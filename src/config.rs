use crate::error::{AppError, ConfigError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "FACE_PIPELINE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub scheduler: SchedulerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// How long a cycle may wait for outstanding requests. `None` waits forever.
    pub stall_timeout_ms: Option<u64>,
    /// EWMA smoothing factor for throughput statistics.
    pub throughput_smoothing: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            stall_timeout_ms: Some(5_000),
            throughput_smoothing: 0.1,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SchedulerSettings {
    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_ms.map(Duration::from_millis)
    }

    // Overrides the stall timeout, this will override the loaded configuration.
    // Sub-millisecond timeouts round up to 1 ms.
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout_ms = timeout
            .map(|t| u64::try_from(t.as_micros().div_ceil(1_000)).unwrap_or(u64::MAX));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stall_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidSettings(
                "Stall timeout must be greater than 0".to_string(),
            ));
        }

        if !(self.throughput_smoothing > 0.0 && self.throughput_smoothing <= 1.0) {
            return Err(ConfigError::InvalidSettings(
                "Throughput smoothing must be in (0.0, 1.0]".to_string(),
            ));
        }

        Ok(())
    }
}

impl Configuration {
    /// Layers built-in defaults, an optional settings file and
    /// `FACE_PIPELINE__SECTION__KEY` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let configuration: Configuration = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        configuration.scheduler.validate()?;
        Ok(configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    #[test]
    fn defaults_are_valid() {
        let configuration = Configuration::default();
        assert!(configuration.scheduler.validate().is_ok());
        assert_eq!(
            configuration.scheduler.stall_timeout(),
            Some(Duration::from_secs(5))
        );
        assert_eq!(configuration.logging.level, "info");
    }

    #[test]
    fn zero_stall_timeout_is_rejected() {
        let settings = SchedulerSettings {
            stall_timeout_ms: Some(0),
            ..SchedulerSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSettings(_))
        ));
    }

    #[test]
    fn sub_millisecond_stall_timeout_rounds_up() {
        let settings =
            SchedulerSettings::default().with_stall_timeout(Some(Duration::from_micros(300)));
        assert_eq!(settings.stall_timeout_ms, Some(1));
        assert!(settings.validate().is_ok());

        let settings = SchedulerSettings::default().with_stall_timeout(Some(Duration::ZERO));
        assert_eq!(settings.stall_timeout_ms, Some(0));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn smoothing_out_of_range_is_rejected() {
        let settings = SchedulerSettings {
            throughput_smoothing: 1.5,
            ..SchedulerSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_reads_settings_file() {
        let path = std::env::temp_dir().join(format!("face-pipeline-{}.toml", Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[scheduler]\nstall_timeout_ms = 250\n\n[logging]\nlevel = \"debug\"").unwrap();
        drop(file);

        let configuration = Configuration::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            configuration.scheduler.stall_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(configuration.scheduler.throughput_smoothing, 0.1);
        assert_eq!(configuration.logging.level, "debug");
    }

    #[test]
    fn load_fails_for_missing_file() {
        let path = std::env::temp_dir().join(format!("missing-{}.toml", Uuid::new_v4()));
        assert!(matches!(
            Configuration::load(Some(&path)),
            Err(AppError::Settings(_))
        ));
    }
}
