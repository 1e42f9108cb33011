//! Conversion from [`Config`] to telemetry settings.

use caduceus_config::Config;
use caduceus_telemetry::{
    FileRotation, LogConfig, LogFormat, LogTarget, TelemetryError, TelemetryResult,
};

/// Convert the `[logging]` section to a [`LogConfig`].
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] for a format, target or rotation
/// the telemetry crate does not know.
pub(crate) fn to_log_config(cfg: &Config) -> TelemetryResult<LogConfig> {
    let logging = &cfg.logging;
    let format: LogFormat = logging.format.parse()?;
    let log = LogConfig::new(&logging.level)
        .with_format(format)
        .with_directives(&logging.directives);

    match logging.target.as_str() {
        "stderr" => Ok(log),
        "stdout" => Ok(log.with_target(LogTarget::Stdout)),
        "file" => {
            let rotation: FileRotation = logging.rotation.parse()?;
            Ok(log.with_file_logging(&logging.directory, &logging.file_prefix, rotation))
        },
        other => Err(TelemetryError::ConfigError(format!(
            "unknown log target '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_logging_section_maps_over() {
        let mut cfg = Config::default();
        cfg.logging.level = "debug".into();
        cfg.logging.format = "json".into();
        cfg.logging.directives = vec!["extism=warn".into()];

        let log = to_log_config(&cfg).unwrap();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["extism=warn".to_string()]);
        assert_eq!(log.target, LogTarget::Stderr);
    }

    #[test]
    fn test_file_target_maps_to_rolling_files() {
        let mut cfg = Config::default();
        cfg.logging.target = "file".into();
        cfg.logging.directory = PathBuf::from("/var/log/caduceus");
        cfg.logging.file_prefix = "runner".into();
        cfg.logging.rotation = "hourly".into();

        let log = to_log_config(&cfg).unwrap();
        assert_eq!(log.target, LogTarget::File(PathBuf::from("/var/log/caduceus")));
        assert_eq!(log.file.prefix, "runner");
        assert_eq!(log.file.rotation, FileRotation::Hourly);
        assert!(!log.ansi);
    }

    #[test]
    fn test_stdout_target() {
        let mut cfg = Config::default();
        cfg.logging.target = "stdout".into();
        assert_eq!(to_log_config(&cfg).unwrap().target, LogTarget::Stdout);
    }

    #[test]
    fn test_unknown_values_are_errors() {
        let mut cfg = Config::default();
        cfg.logging.format = "fancy".into();
        assert!(matches!(
            to_log_config(&cfg),
            Err(TelemetryError::ConfigError(msg)) if msg.contains("fancy")
        ));

        let mut cfg = Config::default();
        cfg.logging.target = "syslog".into();
        assert!(to_log_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.logging.target = "file".into();
        cfg.logging.rotation = "weekly".into();
        assert!(to_log_config(&cfg).is_err());
    }
}
