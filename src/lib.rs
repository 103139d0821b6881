//! simsrv - building-automation testbed simulator
//!
//! Drives a Modbus TCP field device with scripted or randomized sensor
//! values, polls back the resulting register and coil state, and archives
//! readings and derived events in a SQLite historian.

pub mod bridge;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod historian;
pub mod registers;
pub mod scenario;
pub mod simulator;

pub use error::{Result, SimSrvError};

/// Service information
pub const SERVICE_NAME: &str = "simsrv";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
