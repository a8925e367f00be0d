//! JSON configuration document.
//!
//! ```json
//! {
//!   "serverIp": "192.168.1.10",
//!   "serverPort": 502,
//!   "serverId": 1,
//!   "pollIntervalSeconds": 5,
//!   "serverTimeoutSeconds": 3,
//!   "logFileType": "csv",
//!   "logFileName": "plant floor",
//!   "inMemoryRecords": 12,
//!   "jsonIndent": null,
//!   "fileRotation": { "maxFileRecords": 1440 }
//! }
//! ```
//!
//! `maxReadRegisters`, `maxReadCoils` and `interRequestDelayMs` are optional
//! and default to the protocol maxima with no delay.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::device_limits::{
    DeviceLimits, DEFAULT_INTER_REQUEST_DELAY_MS, DEFAULT_MAX_READ_COILS,
    DEFAULT_MAX_READ_REGISTERS,
};
use crate::error::ConfigError;
use crate::log_buffer::{LogFormat, LogSettings};
use crate::protocol::UnitId;

/// Log file flavour named by `logFileType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFileType {
    Csv,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRotation {
    pub max_file_records: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
    pub server_ip: String,
    pub server_port: u32,
    pub server_id: u32,
    pub poll_interval_seconds: f64,
    pub server_timeout_seconds: f64,
    pub log_file_type: LogFileType,
    pub log_file_name: String,
    pub in_memory_records: usize,
    #[serde(default)]
    pub json_indent: Option<usize>,
    pub file_rotation: FileRotation,

    #[serde(default = "default_max_read_registers")]
    pub max_read_registers: u16,
    #[serde(default = "default_max_read_coils")]
    pub max_read_coils: u16,
    #[serde(default = "default_inter_request_delay_ms")]
    pub inter_request_delay_ms: u64,
}

fn default_max_read_registers() -> u16 {
    DEFAULT_MAX_READ_REGISTERS
}

fn default_max_read_coils() -> u16 {
    DEFAULT_MAX_READ_COILS
}

fn default_inter_request_delay_ms() -> u64 {
    DEFAULT_INTER_REQUEST_DELAY_MS
}

impl LoggerConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and sanitize `log_file_name` in place.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.server_ip.trim().is_empty() {
            return Err(invalid("serverIp must not be empty"));
        }
        if !(1..=65535).contains(&self.server_port) {
            return Err(invalid(format!(
                "serverPort must be in 1-65535, got {}",
                self.server_port
            )));
        }
        if self.server_id > 255 {
            return Err(invalid(format!(
                "serverId must be in 0-255, got {}",
                self.server_id
            )));
        }
        positive_seconds("pollIntervalSeconds", self.poll_interval_seconds)?;
        positive_seconds("serverTimeoutSeconds", self.server_timeout_seconds)?;
        if self.in_memory_records == 0 {
            return Err(invalid("inMemoryRecords must be greater than 0"));
        }
        if self.file_rotation.max_file_records == 0 {
            return Err(invalid("fileRotation.maxFileRecords must be at least 1"));
        }

        self.log_file_name = sanitize_file_name(&self.log_file_name);
        if self.log_file_name.is_empty() {
            return Err(invalid("logFileName must not be empty"));
        }
        Ok(())
    }

    pub fn unit_id(&self) -> UnitId {
        // range checked in validate
        self.server_id.min(255) as UnitId
    }

    pub fn port(&self) -> u16 {
        self.server_port.min(65535) as u16
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.server_timeout_seconds)
    }

    pub fn device_limits(&self) -> DeviceLimits {
        DeviceLimits::new()
            .with_max_read_registers(self.max_read_registers)
            .with_max_read_coils(self.max_read_coils)
            .with_inter_request_delay_ms(self.inter_request_delay_ms)
    }

    pub fn log_settings(&self) -> LogSettings {
        let format = match self.log_file_type {
            LogFileType::Csv => LogFormat::Csv,
            LogFileType::Json => LogFormat::Json {
                indent: self.json_indent,
            },
        };
        LogSettings {
            file_name: self.log_file_name.clone(),
            format,
            in_memory_records: self.in_memory_records,
            max_file_records: self.file_rotation.max_file_records,
        }
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn positive_seconds(key: &str, value: f64) -> Result<(), ConfigError> {
    // from_secs_f64 panics on non-finite or overflowing input
    if value.is_finite() && value > 0.0 && value < u64::MAX as f64 {
        Ok(())
    } else {
        Err(invalid(format!("{key} must be a positive number of seconds, got {value}")))
    }
}

/// Replace characters that are ambiguous in file names with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "serverIp": "127.0.0.1",
        "serverPort": 5020,
        "serverId": 17,
        "pollIntervalSeconds": 0.5,
        "serverTimeoutSeconds": 2,
        "logFileType": "json",
        "logFileName": "line 3: <pumps>",
        "inMemoryRecords": 4,
        "jsonIndent": 2,
        "fileRotation": { "maxFileRecords": 8 }
    }"#;

    #[test]
    fn test_parse_and_derive() {
        let config = LoggerConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.unit_id(), 17);
        assert_eq!(config.port(), 5020);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.log_file_name, "line_3___pumps_");

        let settings = config.log_settings();
        assert_eq!(settings.format, LogFormat::Json { indent: Some(2) });
        assert_eq!(settings.in_memory_records, 4);
        assert_eq!(settings.max_file_records, 8);

        let limits = config.device_limits();
        assert_eq!(limits, DeviceLimits::new());
    }

    #[test]
    fn test_optional_limits() {
        let text = SAMPLE.replace(
            "\"jsonIndent\": 2,",
            "\"maxReadRegisters\": 32, \"interRequestDelayMs\": 20,",
        );
        let config = LoggerConfig::from_json(&text).unwrap();
        assert_eq!(config.json_indent, None);
        assert_eq!(config.device_limits().max_read_registers, 32);
        assert_eq!(config.device_limits().inter_request_delay_ms, 20);
    }

    #[test]
    fn test_range_checks() {
        let cases = [
            ("\"serverPort\": 5020", "\"serverPort\": 0"),
            ("\"serverPort\": 5020", "\"serverPort\": 70000"),
            ("\"serverId\": 17", "\"serverId\": 256"),
            ("\"pollIntervalSeconds\": 0.5", "\"pollIntervalSeconds\": 0"),
            ("\"serverTimeoutSeconds\": 2", "\"serverTimeoutSeconds\": -1"),
            ("\"inMemoryRecords\": 4", "\"inMemoryRecords\": 0"),
            ("\"maxFileRecords\": 8", "\"maxFileRecords\": 0"),
            ("\"line 3: <pumps>\"", "\"   \""),
        ];
        for (from, to) in cases {
            let err = LoggerConfig::from_json(&SAMPLE.replace(from, to)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{to}: {err}");
        }
    }

    #[test]
    fn test_unknown_log_type_is_json_error() {
        let err = LoggerConfig::from_json(&SAMPLE.replace("\"json\"", "\"xml\"")).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = LoggerConfig::load(file.path()).unwrap();
        assert_eq!(config.server_ip, "127.0.0.1");

        let err = LoggerConfig::load("/nonexistent/modbus.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a/b\\c:d*e?f\"g<h>i|j k\tl"), "a_b_c_d_e_f_g_h_i_j_k_l");
        assert_eq!(sanitize_file_name("  plant  "), "plant");
    }
}
