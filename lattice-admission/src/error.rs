//! Admission error types.

use crate::tag::Tag;

/// Admission error type.
///
/// Failures reach callers on one of two paths: `RateMisconfigured` rejects
/// the offending API call outright, while the request-scoped errors are
/// delivered on the failed request's reply channel.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdmissionError {
    /// A published rate was negative or non-finite.
    #[error("misconfigured rate {rate} for tag {tag}")]
    RateMisconfigured {
        /// The offending tag.
        tag: Tag,
        /// The rejected rate.
        rate: f64,
    },

    /// A request stayed deferred past the maximum deferral age.
    #[error("starved after {waited:.3}s deferred (max {max_age:.3}s)")]
    Starved {
        /// Seconds the request had been deferred.
        waited: f64,
        /// The configured maximum deferral age in seconds.
        max_age: f64,
    },

    /// A bounded queue was at capacity.
    #[error("queue full: {size} requests (max {max})")]
    QueueFull {
        /// Current queue depth.
        size: usize,
        /// Maximum queue depth.
        max: usize,
    },

    /// A request carried more tags than allowed.
    #[error("request carries {count} tags (max {max})")]
    TooManyTags {
        /// Number of tags on the request.
        count: usize,
        /// Maximum tags per request.
        max: usize,
    },

    /// The queue is shutting down; the request was cancelled.
    #[error("admission queue shutting down")]
    Shutdown,
}

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;
