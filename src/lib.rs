//! # modbus_dl - Modbus TCP Data Logger
//!
//! Template-driven acquisition from a single Modbus TCP server: a CSV
//! register template is compiled into the minimal set of read requests,
//! every poll tick decodes the responses into one timestamped [`Sample`],
//! and samples are buffered and written to rotating CSV or JSON log files.
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Template read types |
//! |------|----------|---------------------|
//! | 0x01 | Read Coils | `coil`, `FC01`, `RC` |
//! | 0x02 | Read Discrete Inputs | `discrete`, `DI`, `FC02` |
//! | 0x03 | Read Holding Registers | `holding`, `HR`, `FC03` |
//! | 0x04 | Read Input Registers | `input register`, `IR`, `FC04` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use modbus_dl::planner::{ReadPlan, TemplateRow};
//! use modbus_dl::{DataLogger, ModbusTcpClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ModbusTcpClient::connect("127.0.0.1", 502, 1, Duration::from_secs(3)).await?;
//!     let plan = ReadPlan::compile(&[
//!         TemplateRow::new(0, "HR", "float32", "flow"),
//!         TemplateRow::new(10, "coil", "coil", "pump_on"),
//!     ]);
//!
//!     let token = CancellationToken::new();
//!     let mut logger = DataLogger::new(client, plan, Duration::from_secs(1));
//!     logger
//!         .run_with(token, |sample| println!("{}", modbus_dl::display::format_sample(sample, 5)))
//!         .await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Protocol
// ============================================================================

/// Error types for the wire, the log files and the loaders
pub mod error;

/// Modbus protocol constants
pub mod constants;

/// Stack-allocated PDU
pub mod pdu;

/// Read function codes, requests and responses
pub mod protocol;

/// MBAP framing over TCP
pub mod transport;

/// Modbus client API
pub mod client;

// ============================================================================
// Decoding
// ============================================================================

/// Byte order handling for multi-register values
pub mod bytes;

/// Tag values and samples
pub mod value;

/// Per-device request size limits
pub mod device_limits;

/// Template compilation into read groups
pub mod planner;

/// Register decoding and response interpretation
pub mod codec;

// ============================================================================
// Acquisition
// ============================================================================

/// One poll tick
pub mod poll;

/// Buffered, rotating log files
pub mod log_buffer;

/// Poll loop and shutdown
pub mod logger;

/// JSON configuration document
pub mod config;

/// CSV template loader
pub mod template;

/// Console rendering
pub mod display;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use tokio;

// === Core client API ===
pub use client::{GenericModbusClient, ModbusClient, ModbusTcpClient};

// === Error handling ===
pub use error::{ConfigError, DataLoggerError, LogError, LogResult, ModbusError, ModbusResult};

// === Core types ===
pub use bytes::ByteOrder;
pub use protocol::{ModbusFunction, ModbusRequest, ModbusResponse, RawValues, UnitId};
pub use value::{Sample, TagMap, TagValue};

// === Acquisition ===
pub use config::LoggerConfig;
pub use device_limits::DeviceLimits;
pub use log_buffer::{LogBuffer, LogFormat, LogSettings};
pub use logger::DataLogger;
pub use planner::{DataType, PlanWarning, ReadGroup, ReadPlan, TemplateRow};
pub use poll::poll_once;

// === Transport ===
pub use transport::{ModbusTransport, TcpTransport, TransportStats};

// === Protocol limits ===
pub use constants::{MAX_PDU_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
