use crate::config::LoggingSettings;
use crate::error::AppError;
use tracing::Level;

/// Installs the global fmt subscriber. Calling it again after a subscriber is
/// already installed returns an error rather than panicking.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), AppError> {
    let level: Level = settings
        .level
        .parse()
        .map_err(|_| AppError::Logging(format!("unknown log level '{}'", settings.level)))?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_is_rejected() {
        let settings = LoggingSettings {
            level: "chatty".to_string(),
        };
        assert!(matches!(init_logging(&settings), Err(AppError::Logging(_))));
    }
}
