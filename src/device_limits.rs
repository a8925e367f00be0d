//! # Device Limits
//!
//! Per-device caps on how much a single read request may ask for, and how
//! long to pause between the requests of one poll tick.
//!
//! - **Read Holding/Input Registers (FC03/04)**: max 125 registers per request
//! - **Read Coils/Discrete Inputs (FC01/02)**: max 2000 bits per request
//!
//! Some devices accept less. The planner splits read groups to fit these
//! limits; the poll cycle honours the inter-request delay.

use std::time::Duration;

use crate::constants::{MAX_READ_COILS, MAX_READ_REGISTERS};
use crate::protocol::ModbusFunction;

pub const DEFAULT_MAX_READ_REGISTERS: u16 = MAX_READ_REGISTERS as u16;

pub const DEFAULT_MAX_READ_COILS: u16 = MAX_READ_COILS as u16;

pub const DEFAULT_INTER_REQUEST_DELAY_MS: u64 = 0;

/// Device-specific read limits.
///
/// ```rust
/// use modbus_dl::DeviceLimits;
///
/// let limits = DeviceLimits::new()
///     .with_max_read_registers(50)
///     .with_inter_request_delay_ms(10);
///
/// assert_eq!(limits.max_read_registers, 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Maximum registers per FC03/FC04 request.
    pub max_read_registers: u16,
    /// Maximum bits per FC01/FC02 request.
    pub max_read_coils: u16,
    /// Pause between consecutive requests of one tick (milliseconds).
    pub inter_request_delay_ms: u64,
}

impl DeviceLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_read_registers(mut self, count: u16) -> Self {
        self.max_read_registers = count;
        self
    }

    pub fn with_max_read_coils(mut self, count: u16) -> Self {
        self.max_read_coils = count;
        self
    }

    pub fn with_inter_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_request_delay_ms = delay_ms;
        self
    }

    /// Effective per-request quantity for `function`.
    ///
    /// Always within `1..=` the protocol maximum, whatever was configured.
    pub fn max_quantity(&self, function: ModbusFunction) -> u16 {
        let configured = if function.is_bit_access() {
            self.max_read_coils
        } else {
            self.max_read_registers
        };
        configured.clamp(1, function.max_quantity())
    }

    /// Delay to insert between requests, if any.
    pub fn inter_request_delay(&self) -> Option<Duration> {
        (self.inter_request_delay_ms > 0).then(|| Duration::from_millis(self.inter_request_delay_ms))
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_read_registers: DEFAULT_MAX_READ_REGISTERS,
            max_read_coils: DEFAULT_MAX_READ_COILS,
            inter_request_delay_ms: DEFAULT_INTER_REQUEST_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = DeviceLimits::default();
        assert_eq!(limits.max_read_registers, 125);
        assert_eq!(limits.max_read_coils, 2000);
        assert_eq!(limits.inter_request_delay(), None);
    }

    #[test]
    fn test_max_quantity_clamped() {
        let limits = DeviceLimits::new()
            .with_max_read_registers(500)
            .with_max_read_coils(0);
        assert_eq!(limits.max_quantity(ModbusFunction::ReadHoldingRegisters), 125);
        assert_eq!(limits.max_quantity(ModbusFunction::ReadCoils), 1);
    }

    #[test]
    fn test_builder_limits() {
        let limits = DeviceLimits::new()
            .with_max_read_registers(50)
            .with_max_read_coils(500)
            .with_inter_request_delay_ms(10);
        assert_eq!(limits.max_quantity(ModbusFunction::ReadInputRegisters), 50);
        assert_eq!(limits.max_quantity(ModbusFunction::ReadDiscreteInputs), 500);
        assert_eq!(limits.inter_request_delay(), Some(Duration::from_millis(10)));
    }
}
