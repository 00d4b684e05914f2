use thiserror::Error;

use crate::cache::StoreError;
use crate::sensor::SensorError;

/// Errors a location request can resolve to.
#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Geolocation is not supported on this device")]
    UnsupportedEnvironment,

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Timed out waiting for a position")]
    Timeout,

    #[error("Position unavailable: {0}")]
    Sensor(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Request was superseded by a newer one")]
    Superseded,

    #[error("Failed to persist location: {0}")]
    Store(#[from] StoreError),
}

impl From<SensorError> for LocationError {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::PermissionDenied => LocationError::PermissionDenied,
            SensorError::Timeout => LocationError::Timeout,
            SensorError::Unavailable(msg) => LocationError::Sensor(msg),
        }
    }
}
