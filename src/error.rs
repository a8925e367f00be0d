//! Error types for the data logger
//!
//! Wire-level failures are [`ModbusError`], persistence failures are
//! [`LogError`], and the acquisition session combines both in
//! [`DataLoggerError`]. Template anomalies are never errors: the planner
//! reports them as warnings and keeps going.

use thiserror::Error;

/// Result type for Modbus protocol operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Result type for log persistence operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised by the Modbus TCP protocol engine
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Connection refused, DNS failure or connection lost mid-exchange
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// No answer within the configured response timeout
    #[error("Timeout during {operation} after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Response that does not match the request
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Malformed or truncated frame
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Exception response returned by the server
    #[error("Modbus exception on function 0x{function:02X}: code 0x{code:02X} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// Function code outside the supported read set
    #[error("Invalid function code: 0x{code:02X}")]
    InvalidFunction { code: u8 },

    /// Request parameters rejected before sending
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

impl ModbusError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    pub fn exception(function: u8, code: u8) -> Self {
        let message = crate::protocol::ModbusException::from_u8(code)
            .map(|e| e.description().to_string())
            .unwrap_or_else(|| "unknown exception code".to_string());
        Self::Exception {
            function,
            code,
            message,
        }
    }

    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// True for failures of the connection itself (refused, dropped, timed out).
    ///
    /// Everything else is a protocol-level failure of a single exchange.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Exception code carried by a server exception response.
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            Self::Exception { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors raised while persisting samples
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV log error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON log error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while loading the configuration document or template
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV template: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that end an acquisition run
#[derive(Debug, Error)]
pub enum DataLoggerError {
    #[error(transparent)]
    Modbus(#[from] ModbusError),

    #[error(transparent)]
    Log(#[from] LogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_classification() {
        assert!(ModbusError::connection("refused").is_connection_error());
        assert!(ModbusError::timeout("read response header", 1000).is_connection_error());
        assert!(!ModbusError::protocol("mismatch").is_connection_error());
        assert!(!ModbusError::exception(0x03, 0x02).is_connection_error());
    }

    #[test]
    fn test_exception_carries_code() {
        let err = ModbusError::exception(0x03, 0x02);
        assert_eq!(err.exception_code(), Some(0x02));
        let text = err.to_string();
        assert!(text.contains("0x03"));
        assert!(text.contains("0x02"));
        assert_eq!(ModbusError::frame("short").exception_code(), None);
    }

    #[test]
    fn test_wraps_into_run_error() {
        let err: DataLoggerError = ModbusError::connection("gone").into();
        assert!(matches!(err, DataLoggerError::Modbus(_)));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: DataLoggerError = LogError::from(io).into();
        assert!(matches!(err, DataLoggerError::Log(LogError::Io(_))));
    }
}
