//! The epoch driver.
//!
//! A single task owns the `TagQueue` and serializes all access to it:
//! submissions and rate updates arrive as commands over a bounded channel,
//! and a jittered timer drives epoch steps. After each step the driver
//! fully drains the priority buckets, completing every admitted request's
//! reply before its next await point, so the queue never tracks admitted
//! requests across epochs.
//!
//! Versions on successful replies come from a monotone counter; real
//! version assignment happens downstream and is not this crate's concern.

use std::fmt;

use lattice_admission::{
    AdmissionResult, Priority, PriorityBuckets, RateMap, ReadVersionReply, ReadVersionRequest,
    TagMap, TagQueue,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::rate_source::RateUpdates;

/// Commands accepted by the driver task.
#[derive(Debug)]
pub enum DriverCommand {
    /// Enqueue a read-version request.
    Submit(ReadVersionRequest),
    /// Replace the rate table.
    UpdateRates {
        /// The replacement table.
        rates: RateMap,
        /// Acknowledgement channel carrying the queue's verdict.
        response: oneshot::Sender<AdmissionResult<()>>,
    },
    /// Cancel pending work and stop the driver.
    Shutdown,
}

/// Errors surfaced to handle callers.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The driver task is gone or shutting down.
    Unavailable,
    /// The queue refused, starved, or cancelled the request or update.
    Rejected(lattice_admission::AdmissionError),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "admission driver unavailable"),
            Self::Rejected(error) => write!(f, "rejected: {error}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Handle to a running epoch driver.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    commands: mpsc::Sender<DriverCommand>,
}

impl QueueHandle {
    /// Submits a request and awaits its reply.
    ///
    /// # Errors
    /// `Unavailable` if the driver is gone; `Rejected` with the queue's
    /// error if the request was refused at a bound, starved, or cancelled.
    pub async fn get_read_version(
        &self,
        tags: TagMap,
        priority: Priority,
    ) -> Result<ReadVersionReply, DriverError> {
        let (request, reply) = ReadVersionRequest::new(tags, priority);
        self.commands
            .send(DriverCommand::Submit(request))
            .await
            .map_err(|_| DriverError::Unavailable)?;

        match reply.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(error)) => Err(DriverError::Rejected(error)),
            Err(_) => Err(DriverError::Unavailable),
        }
    }

    /// Submits a pre-built request without waiting for its reply.
    ///
    /// # Errors
    /// `Unavailable` if the driver is gone.
    pub async fn submit(&self, request: ReadVersionRequest) -> Result<(), DriverError> {
        self.commands
            .send(DriverCommand::Submit(request))
            .await
            .map_err(|_| DriverError::Unavailable)
    }

    /// Replaces the rate table, awaiting the queue's verdict.
    ///
    /// # Errors
    /// `Unavailable` if the driver is gone; `Rejected` if the table carried
    /// an invalid rate (the queue's state is then unchanged).
    pub async fn update_rates(&self, rates: RateMap) -> Result<(), DriverError> {
        let (response, ack) = oneshot::channel();
        self.commands
            .send(DriverCommand::UpdateRates { rates, response })
            .await
            .map_err(|_| DriverError::Unavailable)?;

        match ack.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(DriverError::Rejected(error)),
            Err(_) => Err(DriverError::Unavailable),
        }
    }

    /// Requests driver shutdown. Pending and deferred requests are failed
    /// with `Shutdown` on their reply channels.
    ///
    /// # Errors
    /// `Unavailable` if the driver is already gone.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.commands
            .send(DriverCommand::Shutdown)
            .await
            .map_err(|_| DriverError::Unavailable)
    }
}

/// The epoch driver: owns the queue and the epoch cadence.
pub struct EpochDriver {
    config: DriverConfig,
    queue: TagQueue,
    buckets: PriorityBuckets,
    next_version: u64,
}

impl EpochDriver {
    /// Creates a driver with the given configuration.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        let queue = TagQueue::new(config.queue.clone());
        Self {
            config,
            queue,
            buckets: PriorityBuckets::new(),
            next_version: 1,
        }
    }

    /// Runs the driver, returning a handle for interaction.
    ///
    /// The returned future is the driver task; spawn it or poll it to run
    /// the queue.
    pub fn run(self) -> (QueueHandle, impl std::future::Future<Output = ()>) {
        let (commands, receiver) = mpsc::channel(self.config.command_queue_depth);
        let handle = QueueHandle { commands };
        let future = self.run_loop(receiver, None);
        (handle, future)
    }

    /// Runs the driver with a rate feed; the queue reconciles on every
    /// published table.
    pub fn run_with_rate_source(
        self,
        rates: RateUpdates,
    ) -> (QueueHandle, impl std::future::Future<Output = ()>) {
        let (commands, receiver) = mpsc::channel(self.config.command_queue_depth);
        let handle = QueueHandle { commands };
        let future = self.run_loop(receiver, Some(rates));
        (handle, future)
    }

    /// Main loop: commands, the epoch timer, and the optional rate feed.
    async fn run_loop(
        mut self,
        mut commands: mpsc::Receiver<DriverCommand>,
        mut rates: Option<RateUpdates>,
    ) {
        // The feed's change notifications only cover later publishes; the
        // table it was seeded with is applied here.
        if let Some(source) = rates.as_mut() {
            let table = source.current();
            match self.queue.update_rates(&table) {
                Ok(()) => debug!(tags = table.len(), "initial rate table applied"),
                Err(error) => warn!(%error, "initial rate table rejected"),
            }
        }

        let epoch_sleep = tokio::time::sleep(self.config.jittered_epoch_interval());
        tokio::pin!(epoch_sleep);
        let mut last_epoch = Instant::now();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(DriverCommand::Submit(request)) => {
                            if let Err(error) = self.queue.add_request(request) {
                                debug!(%error, "request refused at enqueue");
                            }
                        }
                        Some(DriverCommand::UpdateRates { rates: table, response }) => {
                            let result = self.queue.update_rates(&table);
                            if let Err(error) = &result {
                                warn!(%error, "rate table rejected");
                            }
                            let _ = response.send(result);
                        }
                        // All handles dropping counts as shutdown.
                        Some(DriverCommand::Shutdown) | None => break,
                    }
                }

                () = &mut epoch_sleep => {
                    let now = Instant::now();
                    let elapsed = (now - last_epoch).as_secs_f64();
                    last_epoch = now;
                    self.step_epoch(elapsed);
                    epoch_sleep
                        .as_mut()
                        .reset(Instant::now() + self.config.jittered_epoch_interval());
                }

                changed = async {
                    match rates.as_mut() {
                        Some(source) => source.changed().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if changed.is_ok() {
                        let table = rates.as_mut().expect("feed present").current();
                        match self.queue.update_rates(&table) {
                            Ok(()) => info!(tags = table.len(), "rate table replaced"),
                            Err(error) => warn!(%error, "published rate table rejected"),
                        }
                    } else {
                        // Publisher gone; keep running on the last table.
                        rates = None;
                    }
                }
            }
        }

        let cancelled = self.queue.cancel_pending();
        info!(cancelled, "admission driver stopped");
    }

    /// Runs one epoch step and drains the buckets, highest priority first.
    fn step_epoch(&mut self, elapsed: f64) {
        self.queue.run_epoch(elapsed, &mut self.buckets);

        let admitted = self.buckets.total();
        for request in self.buckets.drain_ordered() {
            let version = self.next_version;
            self.next_version += 1;
            request.complete(ReadVersionReply { version });
        }
        if admitted > 0 {
            debug!(admitted, elapsed, "epoch step complete");
        }
    }
}
