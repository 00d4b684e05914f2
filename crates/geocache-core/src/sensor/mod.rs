//! Device position sources.
//!
//! A `LocationSensor` answers one position request at a time with either a
//! `Coordinate` or a `SensorError`. Requests can't be aborted once issued;
//! the resolver decides whether a late answer still matters.

pub mod scripted;

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::models::Coordinate;

pub use scripted::ScriptedSensor;

/// Time budget the sensor gets for one request.
pub const SENSOR_TIMEOUT: Duration = Duration::from_secs(12);

/// Oldest sensor-level fix a non-forced request accepts.
pub const SENSOR_MAX_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Zero forces a live read.
    pub maximum_age: Duration,
}

impl SensorOptions {
    /// High accuracy, 12s timeout, accepts a fix up to 10 minutes old.
    pub fn allow_cached() -> Self {
        Self {
            high_accuracy: true,
            timeout: SENSOR_TIMEOUT,
            maximum_age: SENSOR_MAX_AGE,
        }
    }

    /// High accuracy, 12s timeout, live read only.
    pub fn live() -> Self {
        Self {
            maximum_age: Duration::ZERO,
            ..Self::allow_cached()
        }
    }
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self::allow_cached()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("timeout")]
    Timeout,

    #[error("{0}")]
    Unavailable(String),
}

impl SensorError {
    /// Stable short code, as reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            SensorError::PermissionDenied => "PERMISSION_DENIED",
            SensorError::Timeout => "TIMEOUT",
            SensorError::Unavailable(_) => "POSITION_UNAVAILABLE",
        }
    }
}

pub trait LocationSensor: Send + Sync {
    /// Whether this environment has a position capability at all.
    fn is_supported(&self) -> bool {
        true
    }

    fn current_position(
        &self,
        options: SensorOptions,
    ) -> BoxFuture<'static, Result<Coordinate, SensorError>>;
}
