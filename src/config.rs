//! Configuration for the PrusaLink exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Printers to scrape. At least one must be configured.
    #[serde(default)]
    pub printers: Vec<PrinterTarget>,

    /// HTTP exposition endpoint settings.
    #[serde(default)]
    pub exporter: HttpConfig,

    /// Per-request timeout for printer API calls, in seconds.
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One monitored printer.
///
/// The host doubles as the network address and as the stable `printer`
/// label on every metric sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterTarget {
    /// Hostname or address of the printer (e.g., "prusaxl.lan").
    pub host: String,

    /// PrusaLink username for digest authentication.
    pub username: String,

    /// PrusaLink password for digest authentication.
    pub password: String,
}

/// HTTP exposition endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "127.0.0.1:9528").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "127.0.0.1:9528".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_scrape_timeout() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ExporterConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.printers.is_empty() {
            return Err(ConfigError::Validation(
                "no printers configured, nothing to scrape".to_string(),
            ));
        }

        for printer in &self.printers {
            if printer.host.is_empty() {
                return Err(ConfigError::Validation(
                    "printer host must not be empty".to_string(),
                ));
            }
        }

        if self.scrape_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scrape_timeout_secs must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self
            .exporter
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.exporter.listen
            )));
        }

        // Validate path starts with /
        if !self.exporter.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ONE_PRINTER: &str = r#"{
        printers: [
            { host: "prusaxl.lan", username: "maker", password: "secret" }
        ]
    }"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse(ONE_PRINTER).unwrap();

        assert_eq!(config.printers.len(), 1);
        assert_eq!(config.printers[0].host, "prusaxl.lan");
        assert_eq!(config.exporter.listen, "127.0.0.1:9528");
        assert_eq!(config.exporter.path, "/metrics");
        assert_eq!(config.scrape_timeout_secs, 10);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            printers: [
                { host: "prusaxl.lan", username: "maker", password: "one" },
                { host: "192.168.1.50", username: "maker", password: "two" },
            ],
            exporter: {
                listen: "0.0.0.0:9000",
                path: "/prusa/metrics"
            },
            scrape_timeout_secs: 3,
            logging: {
                level: "debug",
                format: "json"
            }
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.printers.len(), 2);
        assert_eq!(config.printers[1].host, "192.168.1.50");
        assert_eq!(config.exporter.listen, "0.0.0.0:9000");
        assert_eq!(config.exporter.path, "/prusa/metrics");
        assert_eq!(config.scrape_timeout_secs, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_no_printers() {
        let result = ExporterConfig::parse("{}");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("no printers configured")
        );
    }

    #[test]
    fn test_validate_empty_host() {
        let json = r#"{
            printers: [ { host: "", username: "u", password: "p" } ]
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid_listen() {
        let json = r#"{
            printers: [ { host: "h", username: "u", password: "p" } ],
            exporter: { listen: "not-an-address" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let json = r#"{
            printers: [ { host: "h", username: "u", password: "p" } ],
            exporter: { path: "no-leading-slash" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_zero_timeout() {
        let json = r#"{
            printers: [ { host: "h", username: "u", password: "p" } ],
            scrape_timeout_secs: 0
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ONE_PRINTER.as_bytes()).unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.printers[0].username, "maker");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ExporterConfig::load_from_file("/nonexistent/config.json5");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
