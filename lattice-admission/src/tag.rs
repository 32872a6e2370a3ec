//! Throttling tags and request priorities.
//!
//! A tag is an opaque byte string naming a throttling class. Requests carry
//! a map of tags to cost units; each epoch, the queue charges every tag's
//! budget by the request's cost for that tag.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

/// An opaque byte-string label assigning a request to a throttling class.
///
/// Equality, ordering, and hashing are by byte content. Clones are cheap
/// reference-count bumps.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(Bytes);

impl Tag {
    /// Creates a tag from anything that converts into bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Creates a tag from a static string without copying.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Bytes::from_static(name.as_bytes()))
    }

    /// Returns the tag's raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the tag length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the tag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&'static str> for Tag {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// Request priority, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background traffic; throttled first.
    Batch,
    /// Ordinary client traffic.
    Default,
    /// System-critical traffic.
    ///
    /// `Immediate` requests skip the admission test entirely: they are
    /// always emitted, and their tag costs are charged as debt against
    /// future epochs. Latency is traded for fairness on this path.
    Immediate,
}

impl Priority {
    /// Returns all priorities, lowest first.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Batch, Self::Default, Self::Immediate]
    }

    /// Returns whether this priority skips the admission test.
    #[must_use]
    pub const fn bypasses_admission(self) -> bool {
        matches!(self, Self::Immediate)
    }
}

/// Map from tag to the cost units a request charges against that tag.
pub type TagMap = HashMap<Tag, u64>;

/// A published rate table: target rate in cost units per second per tag.
pub type RateMap = HashMap<Tag, f64>;
