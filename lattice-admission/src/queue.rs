//! The tag-based admission queue.
//!
//! `TagQueue` accepts read-version requests, reconciles the per-tag rate
//! table, and once per epoch splits pending and previously deferred
//! requests into admitted (bucketed by priority) and carried-over
//! (deferred) sets.
//!
//! Within one epoch step, new arrivals are evaluated before carried-over
//! deferred requests, each set in FIFO order; each output bucket therefore
//! holds new admits in arrival order followed by deferred admits in
//! deferral order. A request with multiple tags is admitted only when every
//! one of its tags has remaining budget.
//!
//! The queue is single-threaded: `add_request`, `update_rates`, and
//! `run_epoch` must not interleave. The async driver owns the queue inside
//! one task and serializes all three.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use crate::error::{AdmissionError, AdmissionResult};
use crate::rate_info::{RateInfo, DEFAULT_BURST_MULTIPLIER};
use crate::request::ReadVersionRequest;
use crate::tag::{Priority, RateMap, Tag};

/// Configuration for the admission queue.
///
/// Every queue has an explicit bound; overflow fails the request on its
/// reply channel rather than dropping it.
#[derive(Debug, Clone)]
pub struct TagQueueConfig {
    /// Maximum requests buffered between epoch steps.
    pub max_pending: usize,

    /// Maximum requests carried over in the deferred set.
    pub max_deferred: usize,

    /// Maximum seconds a request may stay deferred before it is failed.
    pub max_deferred_age: f64,

    /// Cap on per-tag carryover, as a multiple of one epoch's allowance.
    pub burst_multiplier: f64,

    /// Maximum tags a single request may carry.
    pub max_tags_per_request: usize,
}

impl TagQueueConfig {
    /// Creates a configuration for testing (small limits, short starvation
    /// bound).
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_pending: 100,
            max_deferred: 100,
            max_deferred_age: 10.0,
            burst_multiplier: 2.0,
            max_tags_per_request: 4,
        }
    }
}

impl Default for TagQueueConfig {
    fn default() -> Self {
        Self {
            max_pending: 10_000,
            max_deferred: 10_000,
            max_deferred_age: 60.0,
            burst_multiplier: DEFAULT_BURST_MULTIPLIER,
            max_tags_per_request: 16,
        }
    }
}

/// The three output queues admitted requests are emitted into.
///
/// Ownership of each request moves into its bucket and out to the caller;
/// the queue keeps no reference after emission. The driver must fully drain
/// all three buckets before the next epoch step.
#[derive(Debug, Default)]
pub struct PriorityBuckets {
    /// Admitted `Batch` requests, in emission order.
    pub batch: VecDeque<ReadVersionRequest>,

    /// Admitted `Default` requests, in emission order.
    pub default: VecDeque<ReadVersionRequest>,

    /// Admitted `Immediate` requests, in emission order.
    pub immediate: VecDeque<ReadVersionRequest>,
}

impl PriorityBuckets {
    /// Creates empty buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bucket for a priority.
    pub fn bucket_mut(&mut self, priority: Priority) -> &mut VecDeque<ReadVersionRequest> {
        match priority {
            Priority::Batch => &mut self.batch,
            Priority::Default => &mut self.default,
            Priority::Immediate => &mut self.immediate,
        }
    }

    /// Returns the total number of requests across all buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.batch.len() + self.default.len() + self.immediate.len()
    }

    /// Returns whether all buckets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Drains all buckets, highest priority first.
    pub fn drain_ordered(&mut self) -> Vec<ReadVersionRequest> {
        let mut out = Vec::with_capacity(self.total());
        out.extend(self.immediate.drain(..));
        out.extend(self.default.drain(..));
        out.extend(self.batch.drain(..));
        out
    }
}

/// A request that failed admission, retained for retry in later epochs.
#[derive(Debug)]
struct DeferredRequest {
    /// The deferred request.
    request: ReadVersionRequest,

    /// Queue clock reading when the request was first deferred. Re-deferral
    /// keeps the original reading.
    deferred_at: f64,
}

/// Counters describing queue activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagQueueStats {
    /// Requests accepted by `add_request`.
    pub total_submitted: u64,
    /// Requests emitted to a priority bucket.
    pub total_admitted: u64,
    /// Deferral decisions (a request deferred twice counts twice).
    pub total_deferrals: u64,
    /// Requests failed for exceeding the maximum deferral age.
    pub total_starved: u64,
    /// Requests failed at a capacity or tag-set bound.
    pub total_rejected: u64,
    /// Requests failed during teardown.
    pub total_cancelled: u64,
    /// Epoch steps run.
    pub epochs: u64,
    /// Requests currently awaiting their first epoch step.
    pub pending: usize,
    /// Requests currently carried over in the deferred set.
    pub deferred: usize,
    /// Tags with a rate entry.
    pub tracked_tags: usize,
}

/// The tag-based admission queue.
pub struct TagQueue {
    config: TagQueueConfig,

    /// Per-tag accounting; sole owner. Tags absent here are unthrottled.
    rate_infos: HashMap<Tag, RateInfo>,

    /// Requests submitted since the last epoch step, in arrival order.
    new_requests: VecDeque<ReadVersionRequest>,

    /// Requests carried over from prior epochs.
    delayed_requests: VecDeque<DeferredRequest>,

    /// Cost units released per tag in the current epoch.
    released_in_epoch: HashMap<Tag, u64>,

    /// Accumulated elapsed seconds across all epochs; the deferral age
    /// basis.
    clock: f64,

    total_submitted: u64,
    total_admitted: u64,
    total_deferrals: u64,
    total_starved: u64,
    total_rejected: u64,
    total_cancelled: u64,
    epochs: u64,
}

impl TagQueue {
    /// Creates a queue with the given configuration.
    #[must_use]
    pub fn new(config: TagQueueConfig) -> Self {
        Self {
            config,
            rate_infos: HashMap::new(),
            new_requests: VecDeque::new(),
            delayed_requests: VecDeque::new(),
            released_in_epoch: HashMap::new(),
            clock: 0.0,
            total_submitted: 0,
            total_admitted: 0,
            total_deferrals: 0,
            total_starved: 0,
            total_rejected: 0,
            total_cancelled: 0,
            epochs: 0,
        }
    }

    /// Replaces the rate table.
    ///
    /// Tags present in `new_rates` get their rate updated (carryover
    /// preserved) or a fresh entry; tags absent from `new_rates` lose their
    /// entry and become unthrottled. On any invalid rate the whole call is
    /// rejected and the table is left unchanged.
    ///
    /// Must not interleave with `run_epoch`.
    ///
    /// # Errors
    ///
    /// Returns `AdmissionError::RateMisconfigured` for a negative or
    /// non-finite rate.
    pub fn update_rates(&mut self, new_rates: &RateMap) -> AdmissionResult<()> {
        for (tag, rate) in new_rates {
            if !rate.is_finite() || *rate < 0.0 {
                return Err(AdmissionError::RateMisconfigured {
                    tag: tag.clone(),
                    rate: *rate,
                });
            }
        }

        for (tag, rate) in new_rates {
            match self.rate_infos.entry(tag.clone()) {
                Entry::Occupied(mut entry) => entry.get_mut().set_rate(*rate),
                Entry::Vacant(entry) => {
                    entry.insert(
                        RateInfo::new(*rate).with_burst_multiplier(self.config.burst_multiplier),
                    );
                }
            }
        }
        self.rate_infos.retain(|tag, _| new_rates.contains_key(tag));
        Ok(())
    }

    /// Enqueues a request for the next epoch step. No admission decision is
    /// made here.
    ///
    /// On rejection the request's reply channel is completed with the error
    /// before it is returned, so the caller never holds a dangling reply.
    ///
    /// # Errors
    ///
    /// `QueueFull` if the pending queue is at capacity; `TooManyTags` if
    /// the request's tag set exceeds the per-request bound.
    pub fn add_request(&mut self, request: ReadVersionRequest) -> AdmissionResult<()> {
        if request.tags.len() > self.config.max_tags_per_request {
            let error = AdmissionError::TooManyTags {
                count: request.tags.len(),
                max: self.config.max_tags_per_request,
            };
            self.total_rejected += 1;
            request.fail(error.clone());
            return Err(error);
        }
        if self.new_requests.len() >= self.config.max_pending {
            let error = AdmissionError::QueueFull {
                size: self.new_requests.len(),
                max: self.config.max_pending,
            };
            self.total_rejected += 1;
            request.fail(error.clone());
            return Err(error);
        }

        self.total_submitted += 1;
        self.new_requests.push_back(request);
        Ok(())
    }

    /// Returns whether `count` more cost units may be released against
    /// `tag` this epoch. Tags without a rate entry are unthrottled.
    #[must_use]
    pub fn can_start_tag(&self, tag: &Tag, count: u64) -> bool {
        self.rate_infos
            .get(tag)
            .map_or(true, |info| info.can_start(self.released_for(tag), count))
    }

    /// Returns whether a request passes the admission test: `Immediate`
    /// unconditionally, otherwise every one of its tags must have budget.
    #[must_use]
    pub fn can_start(&self, request: &ReadVersionRequest) -> bool {
        if request.priority.bypasses_admission() {
            return true;
        }
        request
            .tags
            .iter()
            .all(|(tag, count)| self.can_start_tag(tag, *count))
    }

    /// Runs one epoch step over an interval of `elapsed` seconds.
    ///
    /// New arrivals are evaluated first, then previously deferred requests,
    /// each in FIFO order; admitted requests move into `out` bucketed by
    /// priority, the rest are carried over. Requests deferred past the
    /// maximum age are failed with `Starved` before admission begins.
    /// Negative `elapsed` is treated as zero.
    pub fn run_epoch(&mut self, elapsed: f64, out: &mut PriorityBuckets) {
        let elapsed = elapsed.max(0.0);
        self.clock += elapsed;
        self.epochs += 1;

        for info in self.rate_infos.values_mut() {
            info.start_epoch(elapsed);
        }
        self.released_in_epoch.clear();

        self.sweep_starved();

        let mut carried = VecDeque::new();
        while let Some(request) = self.new_requests.pop_front() {
            if self.can_start(&request) {
                self.admit(request, out);
            } else {
                let deferred = DeferredRequest {
                    deferred_at: self.clock,
                    request,
                };
                self.defer(deferred, &mut carried);
            }
        }
        while let Some(deferred) = self.delayed_requests.pop_front() {
            if self.can_start(&deferred.request) {
                self.admit(deferred.request, out);
            } else {
                self.defer(deferred, &mut carried);
            }
        }
        self.delayed_requests = carried;

        for (tag, info) in &mut self.rate_infos {
            let released = self.released_in_epoch.get(tag).copied().unwrap_or(0);
            info.end_epoch(released, elapsed);
        }
    }

    /// Fails every request still held by the queue with `Shutdown`.
    ///
    /// Call during teardown so no reply channel is left hanging. Returns
    /// the number of requests cancelled.
    pub fn cancel_pending(&mut self) -> usize {
        let count = self.new_requests.len() + self.delayed_requests.len();
        for request in self.new_requests.drain(..) {
            request.fail(AdmissionError::Shutdown);
        }
        for deferred in self.delayed_requests.drain(..) {
            deferred.request.fail(AdmissionError::Shutdown);
        }
        self.total_cancelled += count as u64;
        count
    }

    /// Returns the cost units released against `tag` in the current epoch.
    #[must_use]
    pub fn released_in_epoch(&self, tag: &Tag) -> u64 {
        self.released_for(tag)
    }

    /// Returns the number of requests awaiting their first epoch step.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.new_requests.len()
    }

    /// Returns the number of requests carried over in the deferred set.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.delayed_requests.len()
    }

    /// Returns the number of tags with a rate entry.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.rate_infos.len()
    }

    /// Returns whether `tag` has a rate entry.
    #[must_use]
    pub fn is_throttled(&self, tag: &Tag) -> bool {
        self.rate_infos.contains_key(tag)
    }

    /// Returns activity counters and current depths.
    #[must_use]
    pub fn stats(&self) -> TagQueueStats {
        TagQueueStats {
            total_submitted: self.total_submitted,
            total_admitted: self.total_admitted,
            total_deferrals: self.total_deferrals,
            total_starved: self.total_starved,
            total_rejected: self.total_rejected,
            total_cancelled: self.total_cancelled,
            epochs: self.epochs,
            pending: self.new_requests.len(),
            deferred: self.delayed_requests.len(),
            tracked_tags: self.rate_infos.len(),
        }
    }

    fn released_for(&self, tag: &Tag) -> u64 {
        self.released_in_epoch.get(tag).copied().unwrap_or(0)
    }

    /// Charges a request's tags and emits it to its priority bucket.
    fn admit(&mut self, request: ReadVersionRequest, out: &mut PriorityBuckets) {
        for (tag, count) in &request.tags {
            *self.released_in_epoch.entry(tag.clone()).or_default() += *count;
        }
        self.total_admitted += 1;
        out.bucket_mut(request.priority).push_back(request);
    }

    /// Carries a request over to the next epoch, or fails it if the
    /// deferred set is at capacity.
    fn defer(&mut self, deferred: DeferredRequest, carried: &mut VecDeque<DeferredRequest>) {
        if carried.len() >= self.config.max_deferred {
            self.total_rejected += 1;
            deferred.request.fail(AdmissionError::QueueFull {
                size: carried.len(),
                max: self.config.max_deferred,
            });
            return;
        }
        self.total_deferrals += 1;
        carried.push_back(deferred);
    }

    /// Fails deferred requests older than the configured maximum age.
    ///
    /// Re-deferral keeps the original timestamp and newly deferred requests
    /// sit ahead of older ones, so the set is not age-sorted; scan it all.
    fn sweep_starved(&mut self) {
        let max_age = self.config.max_deferred_age;
        if !max_age.is_finite() {
            return;
        }

        let mut kept = VecDeque::with_capacity(self.delayed_requests.len());
        while let Some(deferred) = self.delayed_requests.pop_front() {
            let waited = self.clock - deferred.deferred_at;
            if waited > max_age {
                self.total_starved += 1;
                deferred
                    .request
                    .fail(AdmissionError::Starved { waited, max_age });
            } else {
                kept.push_back(deferred);
            }
        }
        self.delayed_requests = kept;
    }
}
