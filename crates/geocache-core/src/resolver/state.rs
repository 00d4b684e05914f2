use serde::{Deserialize, Serialize};

use crate::models::Coordinate;
use crate::sensor::SensorError;

/// Resolution status visible to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ResolutionState {
    #[default]
    Idle,
    Requesting,
    Granted,
    Denied,
    Error,
    /// The caller is offering manual entry.
    Fallback,
}

impl ResolutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionState::Idle => "idle",
            ResolutionState::Requesting => "requesting",
            ResolutionState::Granted => "granted",
            ResolutionState::Denied => "denied",
            ResolutionState::Error => "error",
            ResolutionState::Fallback => "fallback",
        }
    }

    /// Still waiting on a first answer.
    pub fn is_loading(&self) -> bool {
        matches!(self, ResolutionState::Idle | ResolutionState::Requesting)
    }
}

impl std::fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the published coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum CoordinateSource {
    Cache,
    Sensor,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ErrorCode {
    NotSupported,
    PermissionDenied,
    Timeout,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_supported() -> Self {
        Self::new(ErrorCode::NotSupported, "not supported")
    }

    /// Classified message for a sensor failure.
    pub fn from_sensor(err: &SensorError) -> Self {
        match err {
            SensorError::PermissionDenied => {
                Self::new(ErrorCode::PermissionDenied, "permission denied")
            }
            SensorError::Timeout => Self::new(ErrorCode::Timeout, "timeout"),
            SensorError::Unavailable(msg) if msg.is_empty() => {
                Self::new(ErrorCode::Unavailable, "unknown error")
            }
            SensorError::Unavailable(msg) => Self::new(ErrorCode::Unavailable, msg.clone()),
        }
    }

    /// Same code, but a single retry-oriented message.
    pub fn retryable(err: &SensorError) -> Self {
        Self::new(Self::from_sensor(err).code, "GPS not available")
    }
}

/// Everything an observer needs to render location-dependent UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LocationSnapshot {
    pub status: ResolutionState,
    pub coordinate: Option<Coordinate>,
    pub source: Option<CoordinateSource>,
    pub error: Option<ErrorInfo>,
    pub last_updated_ms: Option<i64>,
}

impl LocationSnapshot {
    pub fn is_from_cache(&self) -> bool {
        self.source == Some(CoordinateSource::Cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            ErrorInfo::from_sensor(&SensorError::PermissionDenied).code,
            ErrorCode::PermissionDenied
        );
        assert_eq!(ErrorInfo::from_sensor(&SensorError::Timeout).message, "timeout");
        assert_eq!(
            ErrorInfo::from_sensor(&SensorError::Unavailable(String::new())).message,
            "unknown error"
        );
        assert_eq!(
            ErrorInfo::from_sensor(&SensorError::Unavailable("no satellites".into())).message,
            "no satellites"
        );
    }

    #[test]
    fn test_retryable_keeps_code() {
        let info = ErrorInfo::retryable(&SensorError::Timeout);
        assert_eq!(info.code, ErrorCode::Timeout);
        assert_eq!(info.message, "GPS not available");
    }

    #[test]
    fn test_loading_states() {
        assert!(ResolutionState::Idle.is_loading());
        assert!(ResolutionState::Requesting.is_loading());
        assert!(!ResolutionState::Granted.is_loading());
        assert_eq!(ResolutionState::Fallback.to_string(), "fallback");
    }

    #[test]
    fn test_snapshot_from_cache() {
        let mut snapshot = LocationSnapshot::default();
        assert!(!snapshot.is_from_cache());
        snapshot.source = Some(CoordinateSource::Cache);
        assert!(snapshot.is_from_cache());
    }
}
