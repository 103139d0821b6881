//! Error handling for the simulation service
//!
//! One typed error enum covers the whole pipeline; every variant is
//! recoverable at the menu-loop boundary. A persistence failure aborts the
//! current step only, never the process.

use thiserror::Error;

/// Simulation service error type
#[derive(Error, Debug, Clone)]
pub enum SimSrvError {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection establishment errors (device or store)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Protocol framing or device exception errors
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// A device read returned an error; the affected value is omitted for
    /// the current step and the run continues
    #[error("Device read failed: {0}")]
    ProtocolReadError(String),

    /// Menu selection outside the enumerated choices
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Requested step count outside [1, 20]
    #[error("Step count out of range [1, 20]: {0}")]
    InvalidStepCount(i64),

    /// Requested scenario name matched nothing in the scenario source
    #[error("No data found for scenario '{0}'")]
    EmptyScenario(String),

    /// Coil vector handed to event derivation had the wrong width
    #[error("Coil vector must be exactly {expected} bits, got {actual}")]
    CoilWidthMismatch { expected: usize, actual: usize },

    /// Historian write or query errors
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Result type alias for the simulation service
pub type Result<T> = std::result::Result<T, SimSrvError>;

impl From<std::io::Error> for SimSrvError {
    fn from(err: std::io::Error) -> Self {
        SimSrvError::IoError(err.to_string())
    }
}

impl From<sqlx::Error> for SimSrvError {
    fn from(err: sqlx::Error) -> Self {
        SimSrvError::StorageError(err.to_string())
    }
}
