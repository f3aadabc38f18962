use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("malformed heart rate frame ({0} bytes)")]
    MalformedFrame(usize),

    #[error("no peripheral matching {filter:?} after {attempts} scan attempts")]
    NotFound { filter: String, attempts: u32 },

    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("peripheral {0} is no longer known to the adapter")]
    UnknownPeripheral(String),

    #[error("characteristic {0} with NOTIFY not found")]
    CharacteristicNotFound(Uuid),

    #[error("teardown failed: {0}")]
    Teardown(String),

    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
