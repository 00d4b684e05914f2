//! Location resolution state machine.
//!
//! One `LocationResolver` serves both passive pages (which want a coordinate
//! as soon as possible and surface errors) and user-initiated requests (which
//! stay retryable and count failures per target). The difference is carried
//! by `ResolverPolicy`, not by separate types.
//!
//! ```text
//!  Idle ──activate──> Granted (fresh cache or manual fix)
//!    │                   ^
//!    └──> Requesting ────┤ sensor ok
//!              │         │
//!              └──> Denied / Error      (surface_error)
//!              └──> Idle + fail count   (return_to_idle_and_count)
//! ```

pub mod machine;
pub mod policy;
pub mod state;

pub use machine::{LocationResolver, PendingLocation};
pub use policy::{FailurePolicy, PolicyKind, ResolverPolicy, DEFAULT_MANUAL_PROMPT_THRESHOLD};
pub use state::{CoordinateSource, ErrorCode, ErrorInfo, LocationSnapshot, ResolutionState};
