use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::policy::{FailurePolicy, ResolverPolicy};
use super::state::{CoordinateSource, ErrorCode, ErrorInfo, LocationSnapshot, ResolutionState};
use crate::cache::CacheManager;
use crate::distance::distance_km;
use crate::error::LocationError;
use crate::models::Coordinate;
use crate::sensor::{LocationSensor, SensorError};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for sensor completions.
/// At most one explicit and one silent request are normally outstanding;
/// superseded requests can add a few more.
const CHANNEL_BUFFER_SIZE: usize = 16;

// ============================================================================
// Sensor task plumbing
// ============================================================================

type Reply = Result<Coordinate, LocationError>;

/// Completions sent back from spawned sensor tasks.
enum SensorEvent {
    /// Answer to an explicit request (activation or `request_location`)
    Explicit {
        request_id: u64,
        result: Result<Coordinate, SensorError>,
    },
    /// Answer to a background refresh of a cached fix
    Silent {
        result: Result<Coordinate, SensorError>,
    },
}

#[derive(Clone, Copy)]
enum TaskKind {
    Explicit(u64),
    Silent,
}

/// The one explicit request whose answer drives state.
struct ActiveRequest {
    id: u64,
    target: Option<String>,
    reply: oneshot::Sender<Reply>,
}

impl ActiveRequest {
    fn resolve(self, result: Reply) {
        // The caller may have dropped its handle
        let _ = self.reply.send(result);
    }
}

enum RequestFailure {
    Unsupported,
    Sensor(SensorError),
}

impl RequestFailure {
    fn surfaced(&self) -> (ResolutionState, ErrorInfo) {
        match self {
            RequestFailure::Unsupported => (ResolutionState::Error, ErrorInfo::not_supported()),
            RequestFailure::Sensor(err @ SensorError::PermissionDenied) => {
                (ResolutionState::Denied, ErrorInfo::from_sensor(err))
            }
            RequestFailure::Sensor(err) => (ResolutionState::Error, ErrorInfo::from_sensor(err)),
        }
    }

    fn retryable(&self) -> ErrorInfo {
        match self {
            RequestFailure::Unsupported => {
                ErrorInfo::new(ErrorCode::NotSupported, "geolocation not supported")
            }
            RequestFailure::Sensor(err) => ErrorInfo::retryable(err),
        }
    }

    fn into_error(self) -> LocationError {
        match self {
            RequestFailure::Unsupported => LocationError::UnsupportedEnvironment,
            RequestFailure::Sensor(err) => err.into(),
        }
    }
}

/// Handle to the outcome of an explicit location request.
///
/// Resolves once the resolver has processed the sensor's answer, or with
/// `Cancelled`/`Superseded` if the resolver stopped tracking the request.
pub struct PendingLocation {
    rx: oneshot::Receiver<Reply>,
}

impl PendingLocation {
    /// The outcome, if the resolver has already produced one.
    pub fn try_result(&mut self) -> Option<Reply> {
        match self.rx.try_recv() {
            Ok(reply) => Some(reply),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(LocationError::Cancelled)),
        }
    }
}

impl Future for PendingLocation {
    type Output = Reply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(reply)) => Poll::Ready(reply),
            Poll::Ready(Err(_)) => Poll::Ready(Err(LocationError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Location state machine for one session.
///
/// Prefers a fresh cached fix, then a stored manual fix, then the device
/// sensor. Sensor work runs on spawned Tokio tasks; their answers are only
/// applied when the owner calls [`check_sensor_tasks`](Self::check_sensor_tasks),
/// [`next_event`](Self::next_event) or [`settle`](Self::settle), so all state
/// changes happen on the owner's side. Methods that start sensor work must be
/// called inside a Tokio runtime.
pub struct LocationResolver {
    cache: CacheManager,
    sensor: Arc<dyn LocationSensor>,
    policy: ResolverPolicy,

    snapshot: LocationSnapshot,
    snapshot_tx: watch::Sender<LocationSnapshot>,

    events_tx: mpsc::Sender<SensorEvent>,
    events_rx: mpsc::Receiver<SensorEvent>,

    active: Option<ActiveRequest>,
    next_request_id: u64,
    in_flight: usize,
}

impl LocationResolver {
    pub fn new(cache: CacheManager, sensor: Arc<dyn LocationSensor>, policy: ResolverPolicy) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (snapshot_tx, _) = watch::channel(LocationSnapshot::default());
        Self {
            cache,
            sensor,
            policy,
            snapshot: LocationSnapshot::default(),
            snapshot_tx,
            events_tx,
            events_rx,
            active: None,
            next_request_id: 0,
            in_flight: 0,
        }
    }

    // =========================================================================
    // Observed state
    // =========================================================================

    pub fn status(&self) -> ResolutionState {
        self.snapshot.status
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.snapshot.coordinate
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.snapshot.error.as_ref()
    }

    pub fn last_updated_ms(&self) -> Option<i64> {
        self.snapshot.last_updated_ms
    }

    pub fn source(&self) -> Option<CoordinateSource> {
        self.snapshot.source
    }

    pub fn is_from_cache(&self) -> bool {
        self.snapshot.is_from_cache()
    }

    pub fn snapshot(&self) -> &LocationSnapshot {
        &self.snapshot
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<LocationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Sensor tasks whose answers haven't been processed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }

    fn set_fix(&mut self, coordinate: Coordinate, source: CoordinateSource, at_ms: i64) {
        self.snapshot.coordinate = Some(coordinate);
        self.snapshot.source = Some(source);
        self.snapshot.last_updated_ms = Some(at_ms);
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Start the session: use a fresh cached fix, else a manual fix, else ask
    /// the sensor. Does nothing unless the resolver is `Idle`.
    pub fn activate(&mut self) {
        if self.snapshot.status != ResolutionState::Idle {
            debug!(status = %self.snapshot.status, "Activation ignored, resolver not idle");
            return;
        }

        if let Some(cached) = self.cache.read_fresh() {
            info!(coordinate = %cached.coordinate, "Using cached location");
            self.set_fix(cached.coordinate, CoordinateSource::Cache, cached.captured_at_ms);
            self.snapshot.error = None;
            self.snapshot.status = ResolutionState::Granted;
            self.publish();

            if self.policy.silent_refresh && self.sensor.is_supported() {
                self.spawn_sensor(TaskKind::Silent);
            }
            return;
        }

        if let Some(manual) = self.cache.read_manual() {
            info!(coordinate = %manual.coordinate, "Using manually entered location");
            self.set_fix(manual.coordinate, CoordinateSource::Manual, manual.set_at_ms);
            self.snapshot.error = None;
            self.snapshot.status = ResolutionState::Granted;
            self.publish();
            return;
        }

        // Nobody awaits the activation request; its outcome shows up in state
        drop(self.request_location(None));
    }

    /// Ask the sensor for a position, counting a failure against `target_id`.
    ///
    /// Supersedes any request still being tracked.
    pub fn request_location(&mut self, target_id: Option<&str>) -> PendingLocation {
        let (reply, rx) = oneshot::channel();
        let pending = PendingLocation { rx };

        if let Some(previous) = self.active.take() {
            debug!(request_id = previous.id, "Superseding location request");
            previous.resolve(Err(LocationError::Superseded));
        }

        self.next_request_id += 1;
        let request = ActiveRequest {
            id: self.next_request_id,
            target: target_id.map(str::to_string),
            reply,
        };

        if !self.sensor.is_supported() {
            warn!("Location requested but no sensor is available");
            self.fail_request(request, RequestFailure::Unsupported);
            return pending;
        }

        info!(request_id = request.id, target_id = ?request.target, "Requesting location");
        let kind = TaskKind::Explicit(request.id);
        self.active = Some(request);
        self.snapshot.status = ResolutionState::Requesting;
        self.snapshot.error = None;
        self.publish();
        self.spawn_sensor(kind);

        pending
    }

    /// Stop tracking the outstanding request. A no-op unless `Requesting` or
    /// `Fallback`; those fall back to `Granted` when a coordinate is held,
    /// otherwise `Idle`.
    pub fn cancel_request(&mut self) {
        match self.snapshot.status {
            ResolutionState::Requesting | ResolutionState::Fallback => {
                if let Some(request) = self.active.take() {
                    debug!(request_id = request.id, "Cancelling location request");
                    request.resolve(Err(LocationError::Cancelled));
                }
                self.snapshot.status = if self.snapshot.coordinate.is_some() {
                    ResolutionState::Granted
                } else {
                    ResolutionState::Idle
                };
                self.publish();
            }
            status => debug!(%status, "Nothing to cancel"),
        }
    }

    /// Force `Idle` and clear the error. The held coordinate is kept.
    pub fn reset_to_idle(&mut self) {
        if let Some(request) = self.active.take() {
            request.resolve(Err(LocationError::Cancelled));
        }
        self.snapshot.status = ResolutionState::Idle;
        self.snapshot.error = None;
        self.publish();
    }

    /// Store and publish a user-entered coordinate. Valid from any state.
    ///
    /// An outstanding request is superseded; its answer only refreshes the
    /// device cache.
    pub fn save_manual_coords(
        &mut self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Coordinate, LocationError> {
        let coordinate = Coordinate::new(latitude, longitude);
        let manual = self.cache.write_manual(coordinate)?;

        if let Some(request) = self.active.take() {
            debug!(request_id = request.id, "Manual location supersedes request");
            request.resolve(Err(LocationError::Superseded));
        }

        info!(%coordinate, "Manual location saved");
        self.set_fix(coordinate, CoordinateSource::Manual, manual.set_at_ms);
        self.snapshot.error = None;
        self.snapshot.status = ResolutionState::Granted;
        self.publish();
        Ok(coordinate)
    }

    /// Mark that the caller is offering manual entry.
    pub fn enter_fallback(&mut self) {
        self.snapshot.status = ResolutionState::Fallback;
        self.publish();
    }

    pub fn fail_count(&self, target_id: &str) -> u32 {
        self.cache.fail_count(target_id)
    }

    /// True once `target_id` has failed often enough to offer manual entry.
    pub fn should_offer_manual_entry(&self, target_id: &str) -> bool {
        self.fail_count(target_id) >= self.policy.manual_prompt_threshold
    }

    /// Distance in km from the published coordinate to `target`.
    pub fn distance_to(&self, target: &Coordinate) -> Option<f64> {
        distance_km(self.snapshot.coordinate.as_ref(), Some(target))
    }

    // =========================================================================
    // Sensor completions
    // =========================================================================

    fn spawn_sensor(&mut self, kind: TaskKind) {
        let position = self.sensor.current_position(self.policy.sensor);
        let tx = self.events_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            // A panicking sensor still has to report back, or `in_flight` never drains
            let result = match AssertUnwindSafe(position).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Location sensor panicked");
                    Err(SensorError::Unavailable("sensor failed".to_string()))
                }
            };
            let event = match kind {
                TaskKind::Explicit(request_id) => SensorEvent::Explicit { request_id, result },
                TaskKind::Silent => SensorEvent::Silent { result },
            };
            if tx.send(event).await.is_err() {
                debug!("Resolver dropped before the sensor answered");
            }
        });
    }

    /// Apply every completion that has already arrived. Never waits.
    pub fn check_sensor_tasks(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.process_event(event);
            processed += 1;
        }
        processed
    }

    /// Wait for the next completion and apply it. Returns false when no
    /// sensor task is outstanding.
    pub async fn next_event(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.events_rx.recv().await {
            Some(event) => {
                self.process_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply completions until no sensor task is outstanding.
    pub async fn settle(&mut self) {
        while self.next_event().await {}
    }

    fn process_event(&mut self, event: SensorEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match event {
            SensorEvent::Explicit { request_id, result } => {
                let request = match self.active.take() {
                    Some(request) if request.id == request_id => request,
                    other => {
                        self.active = other;
                        self.apply_late_result(request_id, result);
                        return;
                    }
                };
                match result {
                    Ok(coordinate) => self.complete_request(request, coordinate),
                    Err(err) => self.fail_request(request, RequestFailure::Sensor(err)),
                }
            }
            SensorEvent::Silent { result } => match result {
                Ok(coordinate) => self.apply_silent_fix(coordinate),
                Err(err) => debug!(error = %err, "Silent refresh failed, keeping current fix"),
            },
        }
    }

    /// Write through to the cache, returning the capture time.
    fn persist_fix(&self, coordinate: Coordinate) -> i64 {
        match self.cache.write_cached(coordinate) {
            Ok(cached) => cached.captured_at_ms,
            Err(e) => {
                warn!(error = %e, "Failed to cache location");
                self.cache.now_ms()
            }
        }
    }

    fn complete_request(&mut self, request: ActiveRequest, coordinate: Coordinate) {
        let captured_at_ms = self.persist_fix(coordinate);
        info!(request_id = request.id, %coordinate, "Location granted");

        self.set_fix(coordinate, CoordinateSource::Sensor, captured_at_ms);
        self.snapshot.error = None;
        self.snapshot.status = ResolutionState::Granted;
        self.publish();

        request.resolve(Ok(coordinate));
    }

    fn fail_request(&mut self, request: ActiveRequest, failure: RequestFailure) {
        if let Some(target) = &request.target {
            if let Err(e) = self.cache.increment_fail_count(target) {
                warn!(target_id = %target, error = %e, "Failed to record location failure");
            }
        }

        let (status, error) = match self.policy.on_failure {
            FailurePolicy::SurfaceError => failure.surfaced(),
            FailurePolicy::ReturnToIdleAndCount => {
                (ResolutionState::Idle, failure.retryable())
            }
        };
        warn!(request_id = request.id, %status, message = %error.message, "Location request failed");

        self.snapshot.status = status;
        self.snapshot.error = Some(error);
        self.publish();

        request.resolve(Err(failure.into_error()));
    }

    /// Answers to untracked requests leave state alone, but a good fix still
    /// refreshes the cache.
    fn apply_late_result(&mut self, request_id: u64, result: Result<Coordinate, SensorError>) {
        match result {
            Ok(coordinate) => {
                debug!(request_id, %coordinate, "Late location answer, caching only");
                self.persist_fix(coordinate);
            }
            Err(err) => debug!(request_id, error = %err, "Late location failure ignored"),
        }
    }

    fn apply_silent_fix(&mut self, coordinate: Coordinate) {
        let captured_at_ms = self.persist_fix(coordinate);

        let showing_device_fix = self.snapshot.status == ResolutionState::Granted
            && self.snapshot.source != Some(CoordinateSource::Manual);
        if showing_device_fix {
            debug!(%coordinate, "Silent refresh updated location");
            self.set_fix(coordinate, CoordinateSource::Sensor, captured_at_ms);
            self.publish();
        } else {
            debug!(status = %self.snapshot.status, "Silent refresh cached without publishing");
        }
    }
}
