//! Rate feed from the external rate controller.
//!
//! The controller that computes per-tag target rates lives outside this
//! crate. It publishes whole replacement tables through a `RatePublisher`;
//! the driver reconciles its queue from the paired `RateUpdates`
//! subscription. Intermediate tables may be skipped under load: only the
//! latest table matters.

use lattice_admission::RateMap;
use tokio::sync::watch;

/// Publishing side of a rate feed.
#[derive(Debug)]
pub struct RatePublisher {
    table: watch::Sender<RateMap>,
}

impl RatePublisher {
    /// Publishes a replacement rate table.
    ///
    /// Returns `false` if every subscription has been dropped.
    pub fn publish(&self, rates: RateMap) -> bool {
        self.table.send(rates).is_ok()
    }

    /// Opens a new subscription positioned at the current table.
    #[must_use]
    pub fn subscribe(&self) -> RateUpdates {
        RateUpdates {
            table: self.table.subscribe(),
        }
    }
}

/// Subscription side of a rate feed.
#[derive(Debug, Clone)]
pub struct RateUpdates {
    table: watch::Receiver<RateMap>,
}

impl RateUpdates {
    /// Waits until a table newer than the last observed one is published.
    ///
    /// # Errors
    /// Returns an error once the publisher has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.table.changed().await
    }

    /// Returns the latest table, marking it observed.
    #[must_use]
    pub fn current(&mut self) -> RateMap {
        self.table.borrow_and_update().clone()
    }
}

/// Creates a rate feed seeded with `initial`.
#[must_use]
pub fn rate_channel(initial: RateMap) -> (RatePublisher, RateUpdates) {
    let (table, subscription) = watch::channel(initial);
    (
        RatePublisher { table },
        RateUpdates {
            table: subscription,
        },
    )
}
