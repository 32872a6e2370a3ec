//! Async epoch driver for the tag-based admission queue.
//!
//! The admission engine in `lattice-admission` is a synchronous state
//! machine; this crate supplies the cooperative harness around it:
//!
//! - **`EpochDriver`**: a single task that owns the queue, fields
//!   submissions and rate updates over a command channel, steps an epoch on
//!   a jittered timer, and drains the priority buckets to reply channels.
//! - **`QueueHandle`**: the cloneable client side of the command channel.
//! - **Rate feed**: a `watch`-based seam to the external rate controller;
//!   the driver reconciles the queue on every published table.
//!
//! Concurrency is cooperative tasks and channels only: clients are tasks
//! that submit a request holding a single-shot reply channel and await it;
//! the driver is the only code that ever touches the queue.

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod rate_source;

pub use config::{ConfigError, DriverConfig};
pub use driver::{DriverCommand, DriverError, EpochDriver, QueueHandle};
pub use rate_source::{rate_channel, RatePublisher, RateUpdates};
