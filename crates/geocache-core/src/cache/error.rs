use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Refusing to store non-finite coordinate ({0})")]
    InvalidCoordinate(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
