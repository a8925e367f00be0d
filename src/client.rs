//! Read-only Modbus client
//!
//! The application layer on top of a [`ModbusTransport`]: it validates the
//! request, hands it to the transport and parses the response into bits or
//! words.
//!
//! # API Naming Convention
//!
//! | Function Code | Primary Name | Semantic Alias |
//! |---------------|--------------|----------------|
//! | 0x01 | `read_01()` | `read_coils()` |
//! | 0x02 | `read_02()` | `read_discrete_inputs()` |
//! | 0x03 | `read_03()` | `read_holding_registers()` |
//! | 0x04 | `read_04()` | `read_input_registers()` |
//!
//! The poll cycle goes through [`ModbusClient::read`], which dispatches on
//! the function code and addresses the client's own unit ID.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use modbus_dl::{ModbusClient, ModbusFunction, ModbusResult, ModbusTcpClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let mut client =
//!         ModbusTcpClient::connect("127.0.0.1", 502, 1, Duration::from_secs(5)).await?;
//!
//!     let raw = client.read(ModbusFunction::ReadHoldingRegisters, 0, 10).await?;
//!     println!("Registers: {:?}", raw);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use crate::error::ModbusResult;
use crate::protocol::{ModbusFunction, ModbusRequest, ModbusResponse, RawValues, UnitId};
use crate::transport::{ModbusTransport, TcpTransport, TransportStats};

/// Interface of a read-only Modbus client.
///
/// # Protocol Limits
///
/// | Operation | Limit |
/// |-----------|-------|
/// | Read Coils (0x01) | 2000 coils |
/// | Read Discrete Inputs (0x02) | 2000 bits |
/// | Read Holding Registers (0x03) | 125 registers |
/// | Read Input Registers (0x04) | 125 registers |
///
/// Quantities outside these limits are rejected with
/// [`ModbusError::InvalidData`](crate::ModbusError::InvalidData) before anything is sent.
pub trait ModbusClient: Send + Sync {
    /// Read coils (function code 0x01).
    ///
    /// Returns exactly `quantity` coil states.
    fn read_01(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read discrete inputs (function code 0x02).
    fn read_02(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read holding registers (function code 0x03).
    ///
    /// Returns exactly `quantity` 16-bit register values.
    fn read_03(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Read input registers (function code 0x04).
    fn read_04(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Unit ID addressed by [`read`](ModbusClient::read).
    fn unit_id(&self) -> UnitId;

    /// Read `quantity` bits or registers starting at `address`.
    ///
    /// Bit functions answer [`RawValues::Bits`], register functions
    /// [`RawValues::Words`].
    fn read(
        &mut self,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<RawValues>> + Send
    where
        Self: Sized,
    {
        let unit_id = self.unit_id();
        async move {
            match function {
                ModbusFunction::ReadCoils => self
                    .read_01(unit_id, address, quantity)
                    .await
                    .map(RawValues::Bits),
                ModbusFunction::ReadDiscreteInputs => self
                    .read_02(unit_id, address, quantity)
                    .await
                    .map(RawValues::Bits),
                ModbusFunction::ReadHoldingRegisters => self
                    .read_03(unit_id, address, quantity)
                    .await
                    .map(RawValues::Words),
                ModbusFunction::ReadInputRegisters => self
                    .read_04(unit_id, address, quantity)
                    .await
                    .map(RawValues::Words),
            }
        }
    }

    fn is_connected(&self) -> bool;

    /// Close the connection. Safe to call more than once.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;

    // ========================================================================
    // Semantic aliases
    // ========================================================================

    /// Alias for [`read_01`](ModbusClient::read_01).
    fn read_coils(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send
    where
        Self: Sized,
    {
        self.read_01(unit_id, address, quantity)
    }

    /// Alias for [`read_02`](ModbusClient::read_02).
    fn read_discrete_inputs(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send
    where
        Self: Sized,
    {
        self.read_02(unit_id, address, quantity)
    }

    /// Alias for [`read_03`](ModbusClient::read_03).
    fn read_holding_registers(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send
    where
        Self: Sized,
    {
        self.read_03(unit_id, address, quantity)
    }

    /// Alias for [`read_04`](ModbusClient::read_04).
    fn read_input_registers(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send
    where
        Self: Sized,
    {
        self.read_04(unit_id, address, quantity)
    }
}

/// Modbus client over any transport
pub struct GenericModbusClient<T: ModbusTransport> {
    transport: T,
    unit_id: UnitId,
}

impl<T: ModbusTransport> GenericModbusClient<T> {
    pub fn new(transport: T, unit_id: UnitId) -> Self {
        Self { transport, unit_id }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Validate and execute a raw request
    pub async fn execute_request(&mut self, request: ModbusRequest) -> ModbusResult<ModbusResponse> {
        request.validate()?;
        debug!(
            "Request unit={} {} address={} quantity={}",
            request.unit_id,
            request.function.label(),
            request.address,
            request.quantity
        );

        let response = self.transport.request(&request).await?;

        debug!(
            "Response unit={} {} data_len={}",
            response.unit_id,
            response.function.label(),
            response.data.len()
        );
        Ok(response)
    }

    async fn read_bits(
        &mut self,
        function: ModbusFunction,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        let request = ModbusRequest::new(unit_id, function, address, quantity);
        let response = self.execute_request(request).await?;
        response.parse_bits(quantity)
    }

    async fn read_words(
        &mut self,
        function: ModbusFunction,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        let request = ModbusRequest::new(unit_id, function, address, quantity);
        let response = self.execute_request(request).await?;
        response.parse_registers(quantity)
    }
}

impl<T: ModbusTransport> ModbusClient for GenericModbusClient<T> {
    async fn read_01(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(ModbusFunction::ReadCoils, unit_id, address, quantity)
            .await
    }

    async fn read_02(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(ModbusFunction::ReadDiscreteInputs, unit_id, address, quantity)
            .await
    }

    async fn read_03(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_words(ModbusFunction::ReadHoldingRegisters, unit_id, address, quantity)
            .await
    }

    async fn read_04(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_words(ModbusFunction::ReadInputRegisters, unit_id, address, quantity)
            .await
    }

    fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.transport.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

/// Modbus TCP client
pub struct ModbusTcpClient {
    inner: GenericModbusClient<TcpTransport>,
}

impl ModbusTcpClient {
    /// Resolve `host`, connect, and address `unit_id` on subsequent reads.
    pub async fn connect(
        host: &str,
        port: u16,
        unit_id: UnitId,
        timeout: Duration,
    ) -> ModbusResult<Self> {
        let transport = TcpTransport::connect(host, port, timeout).await?;
        Ok(Self::from_transport(transport, unit_id))
    }

    pub fn from_transport(transport: TcpTransport, unit_id: UnitId) -> Self {
        Self {
            inner: GenericModbusClient::new(transport, unit_id),
        }
    }

    pub fn server_address(&self) -> SocketAddr {
        self.inner.transport().address
    }

    /// Enable or disable packet logging on existing client
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.inner.transport_mut().set_packet_logging(enabled);
    }
}

impl ModbusClient for ModbusTcpClient {
    async fn read_01(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.inner.read_01(unit_id, address, quantity).await
    }

    async fn read_02(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.inner.read_02(unit_id, address, quantity).await
    }

    async fn read_03(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.inner.read_03(unit_id, address, quantity).await
    }

    async fn read_04(
        &mut self,
        unit_id: UnitId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.inner.read_04(unit_id, address, quantity).await
    }

    fn unit_id(&self) -> UnitId {
        self.inner.unit_id()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.inner.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.inner.get_stats()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ModbusError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport answering from a queue of prepared responses
    pub(crate) struct MockTransport {
        requests: Mutex<Vec<ModbusRequest>>,
        responses: Mutex<VecDeque<ModbusResult<ModbusResponse>>>,
        connected: Mutex<bool>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(VecDeque::new()),
                connected: Mutex::new(true),
            }
        }

        pub(crate) fn add_response(&self, response: ModbusResult<ModbusResponse>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub(crate) fn get_requests(&self) -> Vec<ModbusRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ModbusTransport for MockTransport {
        fn request(
            &mut self,
            request: &ModbusRequest,
        ) -> impl Future<Output = ModbusResult<ModbusResponse>> + Send {
            self.requests.lock().unwrap().push(request.clone());
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModbusError::connection("No response prepared in mock")));
            async move { response }
        }

        fn is_connected(&self) -> bool {
            *self.connected.lock().unwrap()
        }

        fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send {
            *self.connected.lock().unwrap() = false;
            async { Ok(()) }
        }

        fn get_stats(&self) -> TransportStats {
            TransportStats::default()
        }
    }

    /// FC03/FC04 response with byte count prefix
    pub(crate) fn create_register_response(
        unit_id: UnitId,
        function: ModbusFunction,
        values: &[u16],
    ) -> ModbusResponse {
        let mut data = Vec::with_capacity(1 + values.len() * 2);
        data.push((values.len() * 2) as u8);
        for &val in values {
            data.extend_from_slice(&val.to_be_bytes());
        }
        ModbusResponse::new(unit_id, function, data)
    }

    /// FC01/FC02 response with byte count prefix, LSB first within each byte
    pub(crate) fn create_coil_response(
        unit_id: UnitId,
        function: ModbusFunction,
        coils: &[bool],
    ) -> ModbusResponse {
        let byte_count = coils.len().div_ceil(8);
        let mut data = vec![0u8; 1 + byte_count];
        data[0] = byte_count as u8;
        for (i, &coil) in coils.iter().enumerate() {
            if coil {
                data[1 + i / 8] |= 1 << (i % 8);
            }
        }
        ModbusResponse::new(unit_id, function, data)
    }

    #[tokio::test]
    async fn test_read_holding_registers() {
        let mock = MockTransport::new();
        let function = ModbusFunction::ReadHoldingRegisters;
        mock.add_response(Ok(create_register_response(1, function, &[10, 20, 30])));

        let mut client = GenericModbusClient::new(mock, 1);
        let values = client.read_03(1, 100, 3).await.unwrap();
        assert_eq!(values, vec![10, 20, 30]);

        let requests = client.transport().get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].address, 100);
        assert_eq!(requests[0].quantity, 3);
        assert_eq!(requests[0].function, function);
    }

    #[tokio::test]
    async fn test_read_dispatches_by_function() {
        let mock = MockTransport::new();
        let coils = [true, false, true, true, false, false, false, false, true, false];
        mock.add_response(Ok(create_coil_response(7, ModbusFunction::ReadCoils, &coils)));
        mock.add_response(Ok(create_register_response(
            7,
            ModbusFunction::ReadInputRegisters,
            &[0xBEEF],
        )));

        let mut client = GenericModbusClient::new(mock, 7);
        let bits = client.read(ModbusFunction::ReadCoils, 0, 10).await.unwrap();
        assert_eq!(bits, RawValues::Bits(coils.to_vec()));

        let words = client
            .read(ModbusFunction::ReadInputRegisters, 5, 1)
            .await
            .unwrap();
        assert_eq!(words, RawValues::Words(vec![0xBEEF]));

        let requests = client.transport().get_requests();
        assert!(requests.iter().all(|r| r.unit_id == 7));
        assert_eq!(requests[1].function, ModbusFunction::ReadInputRegisters);
    }

    #[tokio::test]
    async fn test_invalid_quantity_not_sent() {
        let mut client = GenericModbusClient::new(MockTransport::new(), 1);

        let err = client.read_03(1, 0, 126).await.unwrap_err();
        assert!(matches!(err, ModbusError::InvalidData { .. }));
        let err = client.read_01(1, 0, 0).await.unwrap_err();
        assert!(matches!(err, ModbusError::InvalidData { .. }));

        assert!(client.transport().get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_exception_propagates() {
        let mock = MockTransport::new();
        mock.add_response(Err(ModbusError::exception(0x03, 0x02)));

        let mut client = GenericModbusClient::new(mock, 1);
        let err = client
            .read(ModbusFunction::ReadHoldingRegisters, 9000, 2)
            .await
            .unwrap_err();
        assert_eq!(err.exception_code(), Some(0x02));
    }

    #[tokio::test]
    async fn test_short_response_is_protocol_error() {
        let mock = MockTransport::new();
        let function = ModbusFunction::ReadHoldingRegisters;
        mock.add_response(Ok(create_register_response(1, function, &[1, 2])));

        let mut client = GenericModbusClient::new(mock, 1);
        let err = client.read_holding_registers(1, 0, 3).await.unwrap_err();
        assert!(matches!(err, ModbusError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut client = GenericModbusClient::new(MockTransport::new(), 1);
        assert!(client.is_connected());
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(!client.is_connected());
    }
}
