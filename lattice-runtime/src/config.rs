//! Driver configuration.

use std::time::Duration;

use lattice_admission::TagQueueConfig;

/// Configuration for the epoch driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Nominal wall-clock period between epoch steps.
    pub epoch_interval: Duration,

    /// Fraction by which each epoch sleep is jittered, in `[0, 1)`.
    pub epoch_jitter: f64,

    /// Depth of the driver's command channel.
    pub command_queue_depth: usize,

    /// Admission queue configuration.
    pub queue: TagQueueConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            epoch_interval: Duration::from_millis(100),
            epoch_jitter: 0.1,
            command_queue_depth: 256,
            queue: TagQueueConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Creates a configuration for testing (short epochs, small limits).
    #[must_use]
    pub fn fast_for_testing() -> Self {
        Self {
            epoch_interval: Duration::from_millis(10),
            epoch_jitter: 0.1,
            command_queue_depth: 64,
            queue: TagQueueConfig::for_testing(),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the epoch interval is zero, the jitter fraction
    /// is outside `[0, 1)`, the command channel has no capacity, or the
    /// burst multiplier is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch_interval.is_zero() {
            return Err(ConfigError::InvalidTiming {
                message: "epoch_interval must be non-zero".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.epoch_jitter) {
            return Err(ConfigError::InvalidTiming {
                message: "epoch_jitter must be in [0, 1)".to_string(),
            });
        }
        if self.command_queue_depth == 0 {
            return Err(ConfigError::InvalidLimit {
                message: "command_queue_depth must be non-zero".to_string(),
            });
        }
        if !self.queue.burst_multiplier.is_finite() || self.queue.burst_multiplier < 0.0 {
            return Err(ConfigError::InvalidLimit {
                message: "burst_multiplier must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    /// Samples the next epoch sleep: the nominal interval scaled by a
    /// random factor in `[1 - jitter, 1 + jitter]`.
    #[must_use]
    pub fn jittered_epoch_interval(&self) -> Duration {
        use rand::Rng;

        let base = self.epoch_interval.as_secs_f64();
        let spread = rand::thread_rng().gen_range(-self.epoch_jitter..=self.epoch_jitter);
        Duration::from_secs_f64(base * (1.0 + spread))
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid timing configuration.
    InvalidTiming {
        /// Error description.
        message: String,
    },
    /// Invalid limit configuration.
    InvalidLimit {
        /// Error description.
        message: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTiming { message } => write!(f, "invalid timing: {message}"),
            Self::InvalidLimit { message } => write!(f, "invalid limit: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
