//! # Modbus TCP Transport
//!
//! Owns the TCP connection to the Modbus server and performs one
//! request/response exchange at a time:
//!
//! - MBAP header handling with transaction ID management
//! - Response validation (transaction ID, protocol ID, length, function code)
//! - Configurable response timeout and statistics
//! - Optional hex packet logging through `tracing`
//!
//! The transport never reconnects on its own. Once an exchange fails at the
//! connection level the transport reports itself disconnected and every
//! further request fails with [`ModbusError::Connection`].
//!
//! ```rust,no_run
//! use modbus_dl::transport::{ModbusTransport, TcpTransport};
//! use modbus_dl::protocol::{ModbusFunction, ModbusRequest};
//! use std::time::Duration;
//!
//! # async fn example() -> modbus_dl::ModbusResult<()> {
//! let mut transport = TcpTransport::connect("localhost", 502, Duration::from_secs(5)).await?;
//! let request = ModbusRequest::new(1, ModbusFunction::ReadHoldingRegisters, 0, 10);
//! let response = transport.request(&request).await?;
//! println!("{:?}", response.parse_registers(10)?);
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN, MODBUS_PROTOCOL_ID};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::ModbusPdu;
use crate::protocol::{ModbusRequest, ModbusResponse};

/// Format raw bytes as hex string for packet logging
fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_packet(direction: &str, data: &[u8], unit_id: u8) {
    info!(
        "[MODBUS-TCP] {} unit:{} {}",
        direction,
        unit_id,
        format_hex_packet(data)
    );
}

/// Transport layer abstraction
///
/// Implemented by [`TcpTransport`]; tests substitute in-memory transports.
pub trait ModbusTransport: Send + Sync {
    /// Send one request and wait for its response.
    ///
    /// Server exception responses come back as [`ModbusError::Exception`].
    fn request(
        &mut self,
        request: &ModbusRequest,
    ) -> impl Future<Output = ModbusResult<ModbusResponse>> + Send;

    fn is_connected(&self) -> bool;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;
}

/// Transport layer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Modbus TCP transport implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    pub address: SocketAddr,
    timeout: Duration,
    transaction_id: u16,
    stats: TransportStats,
    packet_logging: bool,
}

impl TcpTransport {
    /// Resolve `host` and connect to `host:port` within `timeout`.
    ///
    /// `host` may be a dotted quad or a name such as `localhost`.
    pub async fn connect(host: &str, port: u16, timeout_after: Duration) -> ModbusResult<Self> {
        let timeout_ms = timeout_after.as_millis() as u64;
        let mut addresses = timeout(timeout_after, lookup_host((host, port)))
            .await
            .map_err(|_| ModbusError::timeout(format!("resolve {}", host), timeout_ms))?
            .map_err(|e| {
                ModbusError::connection(format!("Failed to resolve {}:{}: {}", host, port, e))
            })?;
        let address = addresses.next().ok_or_else(|| {
            ModbusError::connection(format!("No address found for {}:{}", host, port))
        })?;
        Self::new(address, timeout_after).await
    }

    /// Connect to an already resolved address.
    pub async fn new(address: SocketAddr, timeout_after: Duration) -> ModbusResult<Self> {
        let stream = timeout(timeout_after, TcpStream::connect(address))
            .await
            .map_err(|_| {
                ModbusError::timeout(
                    format!("connect to {}", address),
                    timeout_after.as_millis() as u64,
                )
            })?
            .map_err(|e| ModbusError::connection(format!("Failed to connect to {}: {}", address, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY on {}: {}", address, e);
        }
        info!("Connected to Modbus TCP server at {}", address);

        Ok(Self {
            stream: Some(stream),
            address,
            timeout: timeout_after,
            transaction_id: 0,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        if self.transaction_id == 0 {
            self.transaction_id = 1;
        }
        self.transaction_id
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    async fn exchange(&mut self, stream: &mut TcpStream, frame: &[u8]) -> ModbusResult<Vec<u8>> {
        match timeout(self.timeout, stream.write_all(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ModbusError::connection(format!("send request: {}", e))),
            Err(_) => {
                self.stats.timeouts += 1;
                return Err(ModbusError::timeout("send request", self.timeout_ms()));
            }
        }

        // MBAP header plus unit identifier
        let mut header = [0u8; MBAP_HEADER_LEN + 1];
        match timeout(self.timeout, stream.read_exact(&mut header)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(ModbusError::connection(format!("read response header: {}", e)))
            }
            Err(_) => {
                self.stats.timeouts += 1;
                return Err(ModbusError::timeout("read response header", self.timeout_ms()));
            }
        }

        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if !(2..=MAX_MBAP_LENGTH).contains(&length) {
            return Err(ModbusError::frame(format!(
                "Invalid MBAP length field: {}",
                length
            )));
        }

        let mut response = vec![0u8; MBAP_HEADER_LEN + length];
        response[..header.len()].copy_from_slice(&header);
        match timeout(self.timeout, stream.read_exact(&mut response[header.len()..])).await {
            Ok(Ok(_)) => Ok(response),
            Ok(Err(e)) => Err(ModbusError::connection(format!("read response data: {}", e))),
            Err(_) => {
                self.stats.timeouts += 1;
                Err(ModbusError::timeout("read response data", self.timeout_ms()))
            }
        }
    }
}

/// Build the MBAP frame for a read request.
pub fn encode_request(transaction_id: u16, request: &ModbusRequest) -> ModbusResult<BytesMut> {
    let pdu = request.to_pdu()?;
    let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + 1 + pdu.len());
    frame.put_u16(transaction_id);
    frame.put_u16(MODBUS_PROTOCOL_ID);
    frame.put_u16((pdu.len() + 1) as u16);
    frame.put_u8(request.unit_id);
    frame.put_slice(pdu.as_slice());
    Ok(frame)
}

/// Decode a complete MBAP frame answering `request`.
pub fn decode_response(
    transaction_id: u16,
    request: &ModbusRequest,
    frame: &[u8],
) -> ModbusResult<ModbusResponse> {
    if frame.len() < MBAP_HEADER_LEN + 2 {
        return Err(ModbusError::frame(format!(
            "Frame too short: {} bytes",
            frame.len()
        )));
    }

    let received_tid = u16::from_be_bytes([frame[0], frame[1]]);
    let protocol_id = u16::from_be_bytes([frame[2], frame[3]]);
    let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
    let unit_id = frame[6];

    if received_tid != transaction_id {
        return Err(ModbusError::protocol(format!(
            "Transaction ID mismatch: expected {}, got {}",
            transaction_id, received_tid
        )));
    }
    if protocol_id != MODBUS_PROTOCOL_ID {
        return Err(ModbusError::protocol(format!(
            "Unexpected protocol ID: {}",
            protocol_id
        )));
    }
    if frame.len() != MBAP_HEADER_LEN + length {
        return Err(ModbusError::frame(format!(
            "Length field {} does not match frame size {}",
            length,
            frame.len()
        )));
    }
    if unit_id != request.unit_id {
        warn!(
            "Response unit ID {} differs from request unit ID {}",
            unit_id, request.unit_id
        );
    }

    let pdu = ModbusPdu::from_slice(&frame[MBAP_HEADER_LEN + 1..])?;
    ModbusResponse::from_pdu(unit_id, request.function, &pdu)
}

impl ModbusTransport for TcpTransport {
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        request.validate()?;

        let Some(mut stream) = self.stream.take() else {
            return Err(ModbusError::connection(format!(
                "Not connected to {}",
                self.address
            )));
        };

        let transaction_id = self.next_transaction_id();
        let frame = match encode_request(transaction_id, request) {
            Ok(frame) => frame,
            Err(e) => {
                self.stream = Some(stream);
                return Err(e);
            }
        };

        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;
        if self.packet_logging {
            log_packet("send", &frame, request.unit_id);
        }

        // The stream is only put back after a complete exchange, so any
        // failure above leaves the transport disconnected.
        let response_frame = match self.exchange(&mut stream, &frame).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.errors += 1;
                warn!("Modbus exchange with {} failed: {}", self.address, e);
                return Err(e);
            }
        };
        self.stream = Some(stream);

        self.stats.responses_received += 1;
        self.stats.bytes_received += response_frame.len() as u64;
        if self.packet_logging {
            log_packet("receive", &response_frame, request.unit_id);
        }

        decode_response(transaction_id, request, &response_frame).inspect_err(|_| {
            self.stats.errors += 1;
        })
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Error shutting down connection to {}: {}", self.address, e);
            }
            info!("Disconnected from {}", self.address);
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
