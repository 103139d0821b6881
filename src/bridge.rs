//! Register bridge over a Modbus TCP field device
//!
//! The bridge is a thin capability: write one holding register, read N
//! holding registers, read N coils. There is no retry and no backoff; a
//! single failed call is final for that reading. Protocol calls carry no
//! timeout, so a stalled device blocks the control loop (known liveness
//! limit of the testbed).

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Result, SimSrvError};

/// Modbus MBAP header length (Transaction ID + Protocol ID + Length + Unit ID)
pub const MBAP_HEADER_LEN: usize = 7;

/// Maximum value of the MBAP length field (Unit ID + maximum PDU of 253)
pub const MAX_MBAP_LENGTH: usize = 254;

const FC_READ_COILS: u8 = 0x01;
const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Capability over a field device's register interface.
///
/// The simulation driver takes this trait instead of a concrete connection
/// so tests can substitute an in-memory double.
#[async_trait]
pub trait RegisterBus: Send {
    /// Write one holding register. The value is coerced to an integer;
    /// fractional parts are truncated by design.
    async fn write_register(&mut self, address: u16, value: f64) -> Result<()>;

    /// Read `count` holding registers starting at `address`
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Read `count` coils starting at `address`
    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>>;
}

/// Modbus TCP implementation of [`RegisterBus`].
///
/// The connection is established once and held for the process lifetime;
/// dropping the bridge closes the socket on every exit path.
pub struct ModbusBridge {
    stream: TcpStream,
    unit_id: u8,
    transaction_id: u16,
}

impl ModbusBridge {
    /// Connect to the field device
    pub async fn connect(host: &str, port: u16, unit_id: u8) -> Result<ModbusBridge> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| SimSrvError::ConnectionError(format!("{addr}: {e}")))?;
        info!("Connected to field device at {}", addr);

        Ok(ModbusBridge {
            stream,
            unit_id,
            transaction_id: 0,
        })
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }

    /// Send one request PDU and return the response data (after the
    /// function code), validating the MBAP header along the way.
    async fn transact(&mut self, function: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let tid = self.next_transaction_id();

        let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + 1 + payload.len());
        frame.extend_from_slice(&tid.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]); // Protocol ID
        frame.extend_from_slice(&((2 + payload.len()) as u16).to_be_bytes());
        frame.push(self.unit_id);
        frame.push(function);
        frame.extend_from_slice(payload);

        self.stream.write_all(&frame).await?;
        debug!(function, tid, "request sent ({} bytes)", frame.len());

        let mut header = [0u8; MBAP_HEADER_LEN];
        self.stream.read_exact(&mut header).await?;

        let response_tid = u16::from_be_bytes([header[0], header[1]]);
        if response_tid != tid {
            return Err(SimSrvError::ProtocolError(format!(
                "transaction id mismatch: sent {tid}, got {response_tid}"
            )));
        }

        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if length < 2 || length > MAX_MBAP_LENGTH {
            return Err(SimSrvError::ProtocolError(format!(
                "invalid MBAP length field: {length}"
            )));
        }

        // Unit ID was part of the header; the rest is function code + data
        let mut pdu = vec![0u8; length - 1];
        self.stream.read_exact(&mut pdu).await?;

        let response_function = pdu[0];
        if response_function == function | 0x80 {
            let exception = pdu.get(1).copied().unwrap_or(0);
            return Err(SimSrvError::ProtocolError(format!(
                "device exception 0x{exception:02X} for function 0x{function:02X}"
            )));
        }
        if response_function != function {
            return Err(SimSrvError::ProtocolError(format!(
                "unexpected function code in response: 0x{response_function:02X}"
            )));
        }

        Ok(pdu[1..].to_vec())
    }
}

#[async_trait]
impl RegisterBus for ModbusBridge {
    async fn write_register(&mut self, address: u16, value: f64) -> Result<()> {
        // Fractional values are truncated, matching the device's integer
        // register width.
        let register_value = value as u16;

        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&address.to_be_bytes());
        payload.extend_from_slice(&register_value.to_be_bytes());

        let echo = self.transact(FC_WRITE_SINGLE_REGISTER, &payload).await?;
        if echo.len() < 4 || echo[0..2] != address.to_be_bytes() {
            return Err(SimSrvError::ProtocolError(format!(
                "write echo mismatch for register {address}"
            )));
        }
        Ok(())
    }

    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&address.to_be_bytes());
        payload.extend_from_slice(&count.to_be_bytes());

        let data = self
            .transact(FC_READ_HOLDING_REGISTERS, &payload)
            .await
            .map_err(|e| SimSrvError::ProtocolReadError(e.to_string()))?;

        let expected_bytes = count as usize * 2;
        if data.len() < 1 + expected_bytes || data[0] as usize != expected_bytes {
            return Err(SimSrvError::ProtocolReadError(format!(
                "short register response: {} data bytes for {count} registers",
                data.len().saturating_sub(1)
            )));
        }

        Ok(data[1..=expected_bytes]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>> {
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&address.to_be_bytes());
        payload.extend_from_slice(&count.to_be_bytes());

        let data = self
            .transact(FC_READ_COILS, &payload)
            .await
            .map_err(|e| SimSrvError::ProtocolReadError(e.to_string()))?;

        let expected_bytes = (count as usize).div_ceil(8);
        if data.len() < 1 + expected_bytes || data[0] as usize != expected_bytes {
            return Err(SimSrvError::ProtocolReadError(format!(
                "short coil response: {} data bytes for {count} coils",
                data.len().saturating_sub(1)
            )));
        }

        // Coils are packed LSB-first within each byte
        Ok((0..count as usize)
            .map(|i| data[1 + i / 8] & (1 << (i % 8)) != 0)
            .collect())
    }
}
