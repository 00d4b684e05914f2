use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tracing::debug;

use super::{LocationSensor, SensorError, SensorOptions};
use crate::models::Coordinate;

type Outcome = Result<Coordinate, SensorError>;

/// A sensor that plays back preset answers.
///
/// Queued outcomes are consumed in request order; once the queue is empty
/// the repeating outcome (if any) answers every request. A held sensor keeps
/// each request pending until [`ScriptedSensor::release`] is called.
pub struct ScriptedSensor {
    supported: bool,
    queue: Mutex<VecDeque<Outcome>>,
    repeat: Option<Outcome>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    last_options: Mutex<Option<SensorOptions>>,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self {
            supported: true,
            queue: Mutex::new(VecDeque::new()),
            repeat: None,
            delay: None,
            gate: None,
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    /// Always answers with `coordinate`.
    pub fn fixed(coordinate: Coordinate) -> Self {
        Self {
            repeat: Some(Ok(coordinate)),
            ..Self::new()
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: SensorError) -> Self {
        Self {
            repeat: Some(Err(error)),
            ..Self::new()
        }
    }

    /// No position capability.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn held(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn queue_fix(&self, coordinate: Coordinate) {
        self.lock_queue().push_back(Ok(coordinate));
    }

    pub fn queue_failure(&self, error: SensorError) {
        self.lock_queue().push_back(Err(error));
    }

    /// Let `count` held requests complete, oldest first.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<SensorOptions> {
        *self.last_options.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Outcome>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_outcome(&self) -> Outcome {
        self.lock_queue()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| Err(SensorError::Unavailable("no scripted position".to_string())))
    }
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSensor for ScriptedSensor {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn current_position(&self, options: SensorOptions) -> BoxFuture<'static, Outcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_options.lock().unwrap_or_else(|e| e.into_inner()) = Some(options);

        let outcome = self.next_outcome();
        let gate = self.gate.clone();
        let delay = self.delay;
        debug!(call, ok = outcome.is_ok(), "Scripted sensor request");

        Box::pin(async move {
            let wait = async {
                if let Some(gate) = gate {
                    match gate.acquire_owned().await {
                        Ok(permit) => permit.forget(),
                        Err(_) => {
                            return Err(SensorError::Unavailable("sensor closed".to_string()))
                        }
                    }
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            };

            match tokio::time::timeout(options.timeout, wait).await {
                Ok(Ok(())) => outcome,
                Ok(Err(e)) => Err(e),
                Err(_) => Err(SensorError::Timeout),
            }
        })
    }
}
