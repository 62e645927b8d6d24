//! Lightweight operational counters for the population pipeline, logged as
//! `tracing` fields rather than through a metrics registry crate, matching
//! the rest of this crate's `tracing`-only observability style.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::descriptor::IndexDescriptor;

/// Process-wide population counters. A host that wants per-instance scoping
/// constructs more than one; nothing here is a global singleton.
#[derive(Default)]
pub struct PopulationMetrics {
	started: AtomicU64,
	completed_ok: AtomicU64,
	completed_failed: AtomicU64,
	cancelled: AtomicU64,
}

impl PopulationMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record_started(&self, descriptor: IndexDescriptor) {
		let n = self.started.fetch_add(1, Ordering::Relaxed) + 1;
		tracing::info!(index = %descriptor, total_started = n, "population started");
	}

	pub fn record_flipped_online(&self, descriptor: IndexDescriptor, queue_depth_at_flip: usize) {
		let n = self.completed_ok.fetch_add(1, Ordering::Relaxed) + 1;
		tracing::info!(index = %descriptor, total_completed = n, queue_depth_at_flip, "population completed");
	}

	pub fn record_failed(&self, descriptor: IndexDescriptor) {
		let n = self.completed_failed.fetch_add(1, Ordering::Relaxed) + 1;
		tracing::info!(index = %descriptor, total_failed = n, "population failed");
	}

	pub fn record_cancelled(&self, descriptor: IndexDescriptor) {
		let n = self.cancelled.fetch_add(1, Ordering::Relaxed) + 1;
		tracing::info!(index = %descriptor, total_cancelled = n, "population cancelled");
	}

	pub fn snapshot(&self) -> MetricsSnapshot {
		MetricsSnapshot {
			started: self.started.load(Ordering::Relaxed),
			completed_ok: self.completed_ok.load(Ordering::Relaxed),
			completed_failed: self.completed_failed.load(Ordering::Relaxed),
			cancelled: self.cancelled.load(Ordering::Relaxed),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricsSnapshot {
	pub started: u64,
	pub completed_ok: u64,
	pub completed_failed: u64,
	pub cancelled: u64,
}
