use serde::{Deserialize, Serialize};

use crate::sensor::SensorOptions;

/// Default number of failures for a target before manual entry is offered.
pub const DEFAULT_MANUAL_PROMPT_THRESHOLD: u32 = 2;

/// What a failed explicit request does to the published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Publish `Denied`/`Error` with a classified message.
    SurfaceError,
    /// Go back to `Idle` so a retry stays on offer, and count the failure
    /// against the requesting target.
    ReturnToIdleAndCount,
}

/// Named policy presets, as selected in config and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Basic,
    Robust,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Basic => "basic",
            PolicyKind::Robust => "robust",
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(PolicyKind::Basic),
            "robust" => Ok(PolicyKind::Robust),
            other => Err(format!("unknown policy '{}', expected basic or robust", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverPolicy {
    pub on_failure: FailurePolicy,
    /// Refresh a fresh cached fix in the background on activation.
    pub silent_refresh: bool,
    pub sensor: SensorOptions,
    pub manual_prompt_threshold: u32,
}

impl ResolverPolicy {
    /// Passive use: surface errors, refresh silently, accept a recent
    /// sensor-level fix.
    pub fn basic() -> Self {
        Self {
            on_failure: FailurePolicy::SurfaceError,
            silent_refresh: true,
            sensor: SensorOptions::allow_cached(),
            manual_prompt_threshold: DEFAULT_MANUAL_PROMPT_THRESHOLD,
        }
    }

    /// User-initiated use: stay retryable, count failures, always read live.
    pub fn robust() -> Self {
        Self {
            on_failure: FailurePolicy::ReturnToIdleAndCount,
            silent_refresh: false,
            sensor: SensorOptions::live(),
            manual_prompt_threshold: DEFAULT_MANUAL_PROMPT_THRESHOLD,
        }
    }

    pub fn with_manual_prompt_threshold(mut self, threshold: u32) -> Self {
        self.manual_prompt_threshold = threshold;
        self
    }
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self::basic()
    }
}

impl From<PolicyKind> for ResolverPolicy {
    fn from(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Basic => Self::basic(),
            PolicyKind::Robust => Self::robust(),
        }
    }
}
