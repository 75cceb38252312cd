//! Configuration loading from disk and from the process environment.

use std::env;
use std::fs;
use std::path::Path;

use crate::config::schema::ObservanceConfig;
use crate::config::validation::validate_config;
use crate::error::{ObservanceError, ObservanceResult};

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> ObservanceResult<ObservanceConfig> {
    let content = fs::read_to_string(path).map_err(ObservanceError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> ObservanceResult<ObservanceConfig> {
    let config: ObservanceConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ObservanceError::InvalidConfig)?;

    Ok(config)
}

/// Build configuration from environment variables.
///
/// Recognized variables: `APP_NAME`, `LOG_LEVEL`, `APP_VERSION`,
/// `ENVIRONMENT`, `SENTRY_URL`, `METRICS_URL`, `METRICS_FLUSH_INTERVAL_MS`.
/// Unset variables keep their defaults. The result is validated.
pub fn from_env() -> ObservanceResult<ObservanceConfig> {
    from_lookup(|key| env::var(key).ok())
}

pub(crate) fn from_lookup<F>(lookup: F) -> ObservanceResult<ObservanceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ObservanceConfig::default();

    if let Some(name) = lookup("APP_NAME") {
        config.app_name = name;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.log_level = level;
    }
    config.version = lookup("APP_VERSION").filter(|v| !v.is_empty());
    config.environment = lookup("ENVIRONMENT").filter(|v| !v.is_empty());
    config.error_tracking.dsn = lookup("SENTRY_URL");
    config.metrics.endpoint = lookup("METRICS_URL");
    if let Some(interval) = lookup("METRICS_FLUSH_INTERVAL_MS") {
        // an unparseable interval is reported by validation as zero
        config.metrics.flush_interval_ms = interval.trim().parse().unwrap_or(0);
    }

    validate_config(&config).map_err(ObservanceError::InvalidConfig)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::ValidationError;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_toml() {
        let config = parse_config(
            r#"
            app_name = "billing"
            log_level = "debug"

            [error_tracking]
            dsn = "https://key@errors.example.com/7"

            [request.logged_headers]
            "x-session-id" = "sessionId"
            "#,
        )
        .unwrap();

        assert_eq!(config.app_name, "billing");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.error_tracking.dsn(), Some("https://key@errors.example.com/7"));
        assert_eq!(config.error_tracking.queue_capacity, 100);
        assert_eq!(
            config.request.logged_headers.get("x-session-id").map(String::as_str),
            Some("sessionId")
        );
        assert!(config.metrics.endpoint().is_none());
    }

    #[test]
    fn test_parse_rejects_invalid_level() {
        let err = parse_config(r#"log_level = "chatty""#).unwrap_err();
        match err {
            ObservanceError::InvalidConfig(errors) => {
                assert_eq!(errors, vec![ValidationError::UnknownLevel("chatty".into())]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_reports_toml_errors() {
        let err = parse_config("app_name = ").unwrap_err();
        assert!(matches!(err, ObservanceError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("does-not-exist.toml")).unwrap_err();
        assert!(matches!(err, ObservanceError::Io(_)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("APP_NAME", "orders"),
            ("LOG_LEVEL", "warn"),
            ("APP_VERSION", "1.4.2"),
            ("SENTRY_URL", ""),
            ("METRICS_URL", "http://pushgateway:9091"),
            ("METRICS_FLUSH_INTERVAL_MS", "1000"),
        ]
        .into_iter()
        .collect();

        let config = from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.app_name, "orders");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.version.as_deref(), Some("1.4.2"));
        assert!(config.environment.is_none());
        assert!(config.error_tracking.dsn().is_none());
        assert_eq!(config.metrics.endpoint(), Some("http://pushgateway:9091"));
        assert_eq!(config.metrics.flush_interval_ms, 1000);
    }

    #[test]
    fn test_from_lookup_bad_interval() {
        let err = from_lookup(|key| match key {
            "METRICS_URL" => Some("http://pushgateway:9091".into()),
            "METRICS_FLUSH_INTERVAL_MS" => Some("soon".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, ObservanceError::InvalidConfig(_)));
    }
}
