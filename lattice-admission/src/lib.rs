//! Tag-based admission control for read-version requests.
//!
//! Clients label read-version requests with one or more throttling tags; an
//! external rate controller publishes per-tag target rates. Once per epoch
//! the queue admits the requests that fit every one of their tags' budgets,
//! defers the rest, and emits admitted requests into per-priority buckets
//! for downstream processing.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        TagQueue                            │
//! │                                                            │
//! │  ┌────────────┐     ┌─────────────┐     ┌──────────────┐   │
//! │  │ Per-Tag    │     │  Epoch Step │     │  Priority    │   │
//! │  │ RateInfo   │────▶│ (admit /    │────▶│  Buckets     │   │
//! │  └────────────┘     │  defer)     │     └──────────────┘   │
//! │                     └─────────────┘                        │
//! │                            │                               │
//! │                            ▼                               │
//! │                     Deferred Set (carried to next epoch)   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Determinism
//!
//! The engine never reads a clock. Every epoch step takes the elapsed
//! interval as a parameter, so the same sequence of calls always produces
//! the same admissions regardless of wall time. The async driver that
//! measures real time lives in a separate crate.
//!
//! # Example
//!
//! ```rust
//! use lattice_admission::{
//!     Priority, PriorityBuckets, RateMap, ReadVersionRequest, Tag, TagQueue, TagQueueConfig,
//! };
//!
//! let mut queue = TagQueue::new(TagQueueConfig::for_testing());
//!
//! let rates: RateMap = [(Tag::from_static("workload"), 10.0)].into_iter().collect();
//! queue.update_rates(&rates).unwrap();
//!
//! let (request, _reply) = ReadVersionRequest::new(
//!     [(Tag::from_static("workload"), 1)].into_iter().collect(),
//!     Priority::Default,
//! );
//! queue.add_request(request).unwrap();
//!
//! let mut buckets = PriorityBuckets::new();
//! queue.run_epoch(0.1, &mut buckets);
//! assert_eq!(buckets.default.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod queue;
pub mod rate_info;
pub mod request;
pub mod tag;

// Re-export main types for convenience.
pub use error::{AdmissionError, AdmissionResult};
pub use queue::{PriorityBuckets, TagQueue, TagQueueConfig, TagQueueStats};
pub use rate_info::{RateInfo, DEFAULT_BURST_MULTIPLIER};
pub use request::{ReadVersionReply, ReadVersionRequest, ReplyReceiver, ReplySender};
pub use tag::{Priority, RateMap, Tag, TagMap};
