//! Stack-allocated Modbus PDU
//!
//! A read request is always 5 bytes and a read response at most
//! [`MAX_PDU_SIZE`], so both fit in a fixed array without touching the heap.

use tracing::debug;

use crate::constants::{EXCEPTION_FLAG, MAX_PDU_SIZE};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::ModbusFunction;

/// Function code followed by its payload
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    /// Request PDU: function code, start address, quantity (big-endian).
    pub fn read_request(function: ModbusFunction, address: u16, quantity: u16) -> Self {
        let mut data = [0u8; MAX_PDU_SIZE];
        data[0] = function.to_u8();
        data[1..3].copy_from_slice(&address.to_be_bytes());
        data[3..5].copy_from_slice(&quantity.to_be_bytes());
        Self { data, len: 5 }
    }

    /// Copy a received PDU.
    pub fn from_slice(bytes: &[u8]) -> ModbusResult<Self> {
        if bytes.len() > MAX_PDU_SIZE {
            return Err(ModbusError::frame(format!(
                "PDU of {} bytes exceeds {}",
                bytes.len(),
                MAX_PDU_SIZE
            )));
        }
        let mut data = [0u8; MAX_PDU_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        let pdu = Self {
            data,
            len: bytes.len(),
        };

        match (pdu.function_code(), pdu.exception_code()) {
            (Some(fc), Some(code)) => debug!("PDU in: FC={:02X} exception={:02X}", fc, code),
            (Some(fc), None) => debug!("PDU in: FC={:02X} payload={}B", fc, pdu.len - 1),
            (None, _) => debug!("PDU in: empty"),
        }
        Ok(pdu)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Bytes after the function code
    #[inline]
    pub fn payload(&self) -> &[u8] {
        self.as_slice().get(1..).unwrap_or(&[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    #[inline]
    pub fn is_exception(&self) -> bool {
        matches!(self.function_code(), Some(fc) if fc & EXCEPTION_FLAG != 0)
    }

    /// Server exception code, only for exception responses.
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() {
            self.payload().first().copied()
        } else {
            None
        }
    }

    /// Check that this response answers `function`.
    ///
    /// An exception response for the same function becomes
    /// [`ModbusError::Exception`] carrying the server's exception code.
    pub fn check_answers(&self, function: ModbusFunction) -> ModbusResult<()> {
        let expected = function.to_u8();
        let fc = self
            .function_code()
            .ok_or_else(|| ModbusError::frame("Empty response PDU"))?;

        if fc & !EXCEPTION_FLAG != expected {
            return Err(ModbusError::protocol(format!(
                "{} answered with function {:02X}",
                function.label(),
                fc & !EXCEPTION_FLAG
            )));
        }
        if self.is_exception() {
            let code = self
                .exception_code()
                .ok_or_else(|| ModbusError::frame("Exception response without exception code"))?;
            return Err(ModbusError::exception(expected, code));
        }
        Ok(())
    }
}
