//! Modbus protocol definitions and data structures
//!
//! Read function codes, exception codes and the request/response types
//! exchanged between the client and the transport.

use std::fmt;

use crate::constants::{
    EXCEPTION_ACKNOWLEDGE, EXCEPTION_GATEWAY_PATH_UNAVAILABLE, EXCEPTION_GATEWAY_TARGET_FAILED,
    EXCEPTION_ILLEGAL_DATA_ADDRESS, EXCEPTION_ILLEGAL_DATA_VALUE, EXCEPTION_ILLEGAL_FUNCTION,
    EXCEPTION_MEMORY_PARITY_ERROR, EXCEPTION_SERVER_DEVICE_BUSY, EXCEPTION_SERVER_DEVICE_FAILURE,
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    MAX_READ_COILS, MAX_READ_REGISTERS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::ModbusPdu;

/// Modbus unit identifier (0-255 on Modbus TCP)
pub type UnitId = u8;

/// Read function codes understood by the data logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = FC_READ_COILS,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = FC_READ_DISCRETE_INPUTS,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    /// Read Input Registers (0x04)
    ReadInputRegisters = FC_READ_INPUT_REGISTERS,
}

impl ModbusFunction {
    /// All read functions, in declaration order.
    pub const ALL: [ModbusFunction; 4] = [
        ModbusFunction::ReadCoils,
        ModbusFunction::ReadDiscreteInputs,
        ModbusFunction::ReadHoldingRegisters,
        ModbusFunction::ReadInputRegisters,
    ];

    pub fn from_u8(value: u8) -> ModbusResult<Self> {
        match value {
            FC_READ_COILS => Ok(ModbusFunction::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Ok(ModbusFunction::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(ModbusFunction::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(ModbusFunction::ReadInputRegisters),
            _ => Err(ModbusError::invalid_function(value)),
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Coils and discrete inputs answer with packed bits, the others with words.
    #[inline]
    pub fn is_bit_access(self) -> bool {
        matches!(
            self,
            ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs
        )
    }

    /// Largest quantity a single request may ask for.
    #[inline]
    pub fn max_quantity(self) -> u16 {
        if self.is_bit_access() {
            MAX_READ_COILS as u16
        } else {
            MAX_READ_REGISTERS as u16
        }
    }

    /// Short label used in logs and synthesized names, e.g. `FC03`.
    pub fn label(self) -> &'static str {
        match self {
            ModbusFunction::ReadCoils => "FC01",
            ModbusFunction::ReadDiscreteInputs => "FC02",
            ModbusFunction::ReadHoldingRegisters => "FC03",
            ModbusFunction::ReadInputRegisters => "FC04",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModbusFunction::ReadCoils => "Read Coils",
            ModbusFunction::ReadDiscreteInputs => "Read Discrete Inputs",
            ModbusFunction::ReadHoldingRegisters => "Read Holding Registers",
            ModbusFunction::ReadInputRegisters => "Read Input Registers",
        };
        write!(f, "{} (0x{:02X})", name, *self as u8)
    }
}

/// Modbus exception codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModbusException {
    IllegalFunction = EXCEPTION_ILLEGAL_FUNCTION,
    IllegalDataAddress = EXCEPTION_ILLEGAL_DATA_ADDRESS,
    IllegalDataValue = EXCEPTION_ILLEGAL_DATA_VALUE,
    ServerDeviceFailure = EXCEPTION_SERVER_DEVICE_FAILURE,
    Acknowledge = EXCEPTION_ACKNOWLEDGE,
    ServerDeviceBusy = EXCEPTION_SERVER_DEVICE_BUSY,
    MemoryParityError = EXCEPTION_MEMORY_PARITY_ERROR,
    GatewayPathUnavailable = EXCEPTION_GATEWAY_PATH_UNAVAILABLE,
    GatewayTargetDeviceFailedToRespond = EXCEPTION_GATEWAY_TARGET_FAILED,
}

impl ModbusException {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            EXCEPTION_ILLEGAL_FUNCTION => Some(ModbusException::IllegalFunction),
            EXCEPTION_ILLEGAL_DATA_ADDRESS => Some(ModbusException::IllegalDataAddress),
            EXCEPTION_ILLEGAL_DATA_VALUE => Some(ModbusException::IllegalDataValue),
            EXCEPTION_SERVER_DEVICE_FAILURE => Some(ModbusException::ServerDeviceFailure),
            EXCEPTION_ACKNOWLEDGE => Some(ModbusException::Acknowledge),
            EXCEPTION_SERVER_DEVICE_BUSY => Some(ModbusException::ServerDeviceBusy),
            EXCEPTION_MEMORY_PARITY_ERROR => Some(ModbusException::MemoryParityError),
            EXCEPTION_GATEWAY_PATH_UNAVAILABLE => Some(ModbusException::GatewayPathUnavailable),
            EXCEPTION_GATEWAY_TARGET_FAILED => {
                Some(ModbusException::GatewayTargetDeviceFailedToRespond)
            }
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ModbusException::IllegalFunction => "illegal function",
            ModbusException::IllegalDataAddress => "illegal data address",
            ModbusException::IllegalDataValue => "illegal data value",
            ModbusException::ServerDeviceFailure => "server device failure",
            ModbusException::Acknowledge => "acknowledge",
            ModbusException::ServerDeviceBusy => "server device busy",
            ModbusException::MemoryParityError => "memory parity error",
            ModbusException::GatewayPathUnavailable => "gateway path unavailable",
            ModbusException::GatewayTargetDeviceFailedToRespond => {
                "gateway target device failed to respond"
            }
        }
    }
}

/// One read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    pub unit_id: UnitId,
    pub function: ModbusFunction,
    pub address: u16,
    pub quantity: u16,
}

impl ModbusRequest {
    pub fn new(unit_id: UnitId, function: ModbusFunction, address: u16, quantity: u16) -> Self {
        Self {
            unit_id,
            function,
            address,
            quantity,
        }
    }

    /// Reject quantities the server is not allowed to answer.
    pub fn validate(&self) -> ModbusResult<()> {
        let max = self.function.max_quantity();
        if self.quantity == 0 || self.quantity > max {
            return Err(ModbusError::invalid_data(format!(
                "Invalid quantity {} for {} (allowed 1-{})",
                self.quantity, self.function, max
            )));
        }
        if u32::from(self.address) + u32::from(self.quantity) > 0x1_0000 {
            return Err(ModbusError::invalid_data(format!(
                "Address range {}+{} exceeds 65535",
                self.address, self.quantity
            )));
        }
        Ok(())
    }

    /// Validated request PDU.
    pub fn to_pdu(&self) -> ModbusResult<ModbusPdu> {
        self.validate()?;
        Ok(ModbusPdu::read_request(self.function, self.address, self.quantity))
    }
}

/// Non-exception response to a read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse {
    pub unit_id: UnitId,
    pub function: ModbusFunction,
    /// Byte count followed by the data bytes
    pub data: Vec<u8>,
}

impl ModbusResponse {
    pub fn new(unit_id: UnitId, function: ModbusFunction, data: Vec<u8>) -> Self {
        Self {
            unit_id,
            function,
            data,
        }
    }

    /// Validate a response PDU against the request it answers.
    pub fn from_pdu(unit_id: UnitId, function: ModbusFunction, pdu: &ModbusPdu) -> ModbusResult<Self> {
        pdu.check_answers(function)?;
        Ok(Self::new(unit_id, function, pdu.payload().to_vec()))
    }

    fn data_bytes(&self, expected_len: usize) -> ModbusResult<&[u8]> {
        let (&byte_count, rest) = self
            .data
            .split_first()
            .ok_or_else(|| ModbusError::frame("Empty response data"))?;
        let byte_count = byte_count as usize;
        if byte_count != expected_len {
            return Err(ModbusError::protocol(format!(
                "Byte count mismatch: expected {}, got {}",
                expected_len, byte_count
            )));
        }
        if rest.len() < byte_count {
            return Err(ModbusError::frame(format!(
                "Incomplete response data: byte count {} but {} bytes present",
                byte_count,
                rest.len()
            )));
        }
        Ok(&rest[..byte_count])
    }

    /// Parse exactly `quantity` big-endian registers.
    pub fn parse_registers(&self, quantity: u16) -> ModbusResult<Vec<u16>> {
        let bytes = self.data_bytes(quantity as usize * 2)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Parse exactly `quantity` bits, LSB of the first byte first.
    pub fn parse_bits(&self, quantity: u16) -> ModbusResult<Vec<bool>> {
        let bytes = self.data_bytes((quantity as usize).div_ceil(8))?;
        Ok((0..quantity as usize)
            .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
            .collect())
    }
}

/// Raw values returned by one read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValues {
    /// One entry per coil / discrete input
    Bits(Vec<bool>),
    /// One entry per 16-bit register
    Words(Vec<u16>),
}

impl RawValues {
    pub fn len(&self) -> usize {
        match self {
            RawValues::Bits(bits) => bits.len(),
            RawValues::Words(words) => words.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
