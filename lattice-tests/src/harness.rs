//! Shared harness utilities for driving the admission stack in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lattice_admission::{Priority, RateMap, Tag, TagMap};
use lattice_runtime::QueueHandle;

/// Builds a single-tag cost map.
#[must_use]
pub fn single_tag(name: &'static str, count: u64) -> TagMap {
    [(Tag::from_static(name), count)].into_iter().collect()
}

/// Builds a rate table from static tag names.
#[must_use]
pub fn rate_table(entries: &[(&'static str, f64)]) -> RateMap {
    entries
        .iter()
        .map(|(name, rate)| (Tag::from_static(name), *rate))
        .collect()
}

/// Installs a compact tracing subscriber for ad-hoc test debugging.
///
/// Safe to call from multiple tests; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A mock client that submits one request at a time at a target rate.
///
/// Each iteration starts a jittered pause of roughly `1 / request_rate`
/// seconds, submits a single-tag request, awaits the reply, then waits out
/// the rest of the pause. Successful replies increment `completed`. The
/// loop ends when the driver goes away or the queue fails the request.
pub async fn run_mock_client(
    handle: QueueHandle,
    tag: Tag,
    priority: Priority,
    request_rate: f64,
    completed: Arc<AtomicU64>,
) {
    use rand::Rng;

    let base = 1.0 / request_rate;
    loop {
        let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.5);
        let pause = tokio::time::sleep(Duration::from_secs_f64(base * jitter));

        let tags: TagMap = [(tag.clone(), 1)].into_iter().collect();
        if handle.get_read_version(tags, priority).await.is_err() {
            break;
        }
        completed.fetch_add(1, Ordering::Relaxed);

        pause.await;
    }
}
