//! Benchmark fixtures for `rusty_reactive`.
//!
//! - **publish**: fan-out cost per subscriber, decorator-chain depth, and
//!   listen/dispose churn.
//! - **joins**: merge, combine-latest, join-all and race-any sessions over
//!   many inner sources.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rusty_reactive_bench
//!
//! # Run a specific group
//! cargo bench -p rusty_reactive_bench -- fan_out
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rusty_reactive::{DisposeReason, Listener, Source, StreamExt, Subscription};

/// A listener that sums what it receives into a shared counter.
#[derive(Clone, Default)]
pub struct Sum {
    total: Arc<AtomicU64>,
}

impl Sum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Listener<u64> for Sum {
    #[inline]
    fn react(&mut self, event: &u64) {
        self.total.fetch_add(*event, Ordering::Relaxed);
    }

    fn on_dispose(&mut self, _: DisposeReason) {}
}

impl Listener<Vec<u64>> for Sum {
    #[inline]
    fn react(&mut self, event: &Vec<u64>) {
        self.total.fetch_add(event.iter().sum(), Ordering::Relaxed);
    }

    fn on_dispose(&mut self, _: DisposeReason) {}
}

/// A source with `count` summing subscribers attached.
pub fn fan_out(count: usize) -> (Source<u64>, Sum, Vec<Subscription>) {
    let source = Source::new();
    let sum = Sum::new();
    let subscriptions = (0..count).map(|_| source.listen(sum.clone())).collect();
    (source, sum, subscriptions)
}

/// `count` independent sources.
pub fn sources(count: usize) -> Vec<Source<u64>> {
    (0..count).map(|_| Source::new()).collect()
}
