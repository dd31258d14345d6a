//! Admission control for outbound RPC calls.
//!
//! The governor bounds how many operations run at once and spaces out
//! their start times. It never retries, classifies or inspects results;
//! each caller gets back exactly what its own operation produced.

use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

/// Default number of operations allowed to run concurrently.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default minimum gap between two successive operation starts.
pub const DEFAULT_PACING: Duration = Duration::from_millis(50);

/// Default time a slot stays occupied after its operation finished.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(200);

/// Configuration for the request governor.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Maximum number of operations executing at the same time.
    pub max_concurrent: usize,
    /// Minimum gap between the starts of two successive operations.
    pub pacing: Duration,
    /// Delay before a finished operation's slot is handed to the next one.
    pub cooldown: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            pacing: DEFAULT_PACING,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Bounded-concurrency, paced FIFO queue for RPC operations.
///
/// Submissions wait on a fair mutex, so they are admitted strictly in
/// submission order. The head of the queue holds the mutex while it waits
/// for a free slot and for the pacing gap, then releases it and runs.
/// Draining is driven by slot release; nobody has to pump the queue.
pub struct RequestGovernor {
    config: GovernorConfig,
    /// One permit per concurrent slot.
    slots: Arc<Semaphore>,
    /// FIFO admission queue. Holds the start time of the last admitted operation.
    admission: Mutex<Option<Instant>>,
    /// Number of submissions waiting for admission.
    queued: AtomicUsize,
}

impl RequestGovernor {
    /// Creates a governor with the given configuration.
    ///
    /// A `max_concurrent` of zero is treated as one.
    pub fn new(mut config: GovernorConfig) -> Self {
        if config.max_concurrent == 0 {
            config.max_concurrent = 1;
        }
        Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            admission: Mutex::new(None),
            queued: AtomicUsize::new(0),
            config,
        }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Number of occupied slots, including slots still cooling down.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent - self.slots.available_permits()
    }

    /// Number of submissions waiting to start.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Runs `operation` once a slot is free and the pacing gap has elapsed.
    ///
    /// Operations start in submission order; completion order is whatever
    /// the operations themselves produce.
    pub async fn submit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiting = QueuedTicket::new(&self.queued);

        let permit = {
            let mut last_start = self.admission.lock().await;

            let permit = self
                .slots
                .clone()
                .acquire_owned()
                .await
                .expect("governor semaphore is never closed");

            if let Some(prev) = *last_start {
                tokio::time::sleep_until(prev + self.config.pacing).await;
            }
            *last_start = Some(Instant::now());
            permit
        };

        drop(waiting);
        debug!(
            "Governor admitted request ({} in flight, {} queued)",
            self.in_flight(),
            self.queued()
        );

        let output = operation().await;

        let cooldown = self.config.cooldown;
        if cooldown.is_zero() {
            drop(permit);
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(cooldown).await;
                drop(permit);
            });
        }

        output
    }
}

/// Counts a submission as queued until it is admitted or dropped.
struct QueuedTicket<'a>(&'a AtomicUsize);

impl<'a> QueuedTicket<'a> {
    fn new(queued: &'a AtomicUsize) -> Self {
        queued.fetch_add(1, Ordering::Relaxed);
        Self(queued)
    }
}

impl Drop for QueuedTicket<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for RequestGovernor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}

impl std::fmt::Debug for RequestGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGovernor")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}
