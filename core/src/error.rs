use thiserror::Error;

use crate::device::DriverPhase;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("Timeout waiting for {what} after {cycles} cycles")]
    Timeout { what: &'static str, cycles: usize },

    #[error("Not enough decided bits: got {got} needed {needed}")]
    InsufficientDecodedBits { got: usize, needed: usize },

    #[error("Device not ready for stimulus (phase {0:?})")]
    DeviceNotReady(DriverPhase),
}

pub type Result<T> = std::result::Result<T, SimError>;
