//! In-memory Modbus TCP device simulator
//!
//! A small register/coil server used by the integration tests and for
//! hardware-free local runs. Supports the three function codes the bridge
//! uses: read coils (0x01), read holding registers (0x03) and write single
//! register (0x06). Reads of registers that were never written answer with
//! an illegal-data-address exception, which exercises the per-read failure
//! tolerance of the driver.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::Result;

const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;
const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Shared-state Modbus TCP device double
#[derive(Clone, Default)]
pub struct DeviceSimulator {
    holding_registers: Arc<RwLock<HashMap<u16, u16>>>,
    coils: Arc<RwLock<HashMap<u16, bool>>>,
}

impl DeviceSimulator {
    pub fn new() -> DeviceSimulator {
        DeviceSimulator::default()
    }

    /// Preset a holding register, making it readable before any client write
    pub async fn set_holding_register(&self, address: u16, value: u16) {
        self.holding_registers.write().await.insert(address, value);
    }

    /// Current value of a holding register, if any client wrote it
    pub async fn holding_register(&self, address: u16) -> Option<u16> {
        self.holding_registers.read().await.get(&address).copied()
    }

    /// Wire a coil on or off; unset coils read back as off
    pub async fn set_coil(&self, address: u16, on: bool) {
        self.coils.write().await.insert(address, on);
    }

    /// Bind to an ephemeral local port and serve connections in the
    /// background. Returns the bound address for clients to connect to.
    pub async fn start(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;
        info!("Device simulator listening on {}", local_addr);

        let sim = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!("Simulator connection from {}", peer);
                        let conn = sim.clone();
                        tokio::spawn(async move {
                            if let Err(e) = conn.handle_connection(stream).await {
                                error!("Simulator connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Simulator accept error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(local_addr)
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let mut buffer = vec![0u8; 260]; // Max Modbus TCP frame size

        loop {
            let n = match stream.read(&mut buffer).await {
                Ok(0) => break, // Connection closed
                Ok(n) => n,
                Err(e) => {
                    debug!("Simulator read error: {}", e);
                    break;
                }
            };

            if n < 12 {
                continue; // Below minimum request frame size
            }

            let transaction_id = u16::from_be_bytes([buffer[0], buffer[1]]);
            let protocol_id = u16::from_be_bytes([buffer[2], buffer[3]]);
            let unit_id = buffer[6];
            let function_code = buffer[7];

            if protocol_id != 0 {
                continue; // Not Modbus
            }

            let address = u16::from_be_bytes([buffer[8], buffer[9]]);
            let operand = u16::from_be_bytes([buffer[10], buffer[11]]);

            let response = match function_code {
                0x01 => {
                    self.read_coils_response(transaction_id, unit_id, address, operand)
                        .await
                }
                0x03 => {
                    self.read_holding_response(transaction_id, unit_id, address, operand)
                        .await
                }
                0x06 => {
                    self.write_single_response(transaction_id, unit_id, address, operand)
                        .await
                }
                _ => build_exception(
                    transaction_id,
                    unit_id,
                    function_code,
                    EXCEPTION_ILLEGAL_FUNCTION,
                ),
            };

            if let Err(e) = stream.write_all(&response).await {
                debug!("Simulator write error: {}", e);
                break;
            }
        }

        Ok(())
    }

    /// Read Coils (0x01); unset coils answer as off
    async fn read_coils_response(&self, tid: u16, uid: u8, start: u16, count: u16) -> Vec<u8> {
        let coils = self.coils.read().await;
        let byte_count = (count as usize).div_ceil(8);

        let mut data = vec![0u8; byte_count];
        for i in 0..count as usize {
            let on = coils.get(&(start + i as u16)).copied().unwrap_or(false);
            if on {
                data[i / 8] |= 1 << (i % 8);
            }
        }

        let mut response = mbap_header(tid, uid, 2 + byte_count);
        response.push(0x01);
        response.push(byte_count as u8);
        response.extend_from_slice(&data);
        response
    }

    /// Read Holding Registers (0x03); unmapped registers raise an exception
    async fn read_holding_response(&self, tid: u16, uid: u8, start: u16, count: u16) -> Vec<u8> {
        let holding = self.holding_registers.read().await;

        let mut values = Vec::with_capacity(count as usize);
        for i in 0..count {
            match holding.get(&(start + i)) {
                Some(&value) => values.push(value),
                None => return build_exception(tid, uid, 0x03, EXCEPTION_ILLEGAL_DATA_ADDRESS),
            }
        }

        let mut response = mbap_header(tid, uid, 2 + values.len() * 2);
        response.push(0x03);
        response.push((values.len() * 2) as u8);
        for value in values {
            response.extend_from_slice(&value.to_be_bytes());
        }
        response
    }

    /// Write Single Register (0x06); echoes the request back
    async fn write_single_response(&self, tid: u16, uid: u8, address: u16, value: u16) -> Vec<u8> {
        self.holding_registers.write().await.insert(address, value);

        let mut response = mbap_header(tid, uid, 5);
        response.push(0x06);
        response.extend_from_slice(&address.to_be_bytes());
        response.extend_from_slice(&value.to_be_bytes());
        response
    }
}

/// MBAP header with the given length field (unit id + PDU bytes)
fn mbap_header(tid: u16, uid: u8, pdu_len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(7 + pdu_len);
    header.extend_from_slice(&tid.to_be_bytes());
    header.extend_from_slice(&[0x00, 0x00]); // Protocol ID
    header.extend_from_slice(&((1 + pdu_len) as u16).to_be_bytes());
    header.push(uid);
    header
}

fn build_exception(tid: u16, uid: u8, function: u8, exception: u8) -> Vec<u8> {
    let mut response = mbap_header(tid, uid, 2);
    response.push(function | 0x80);
    response.push(exception);
    response
}
