//! Unbounded, multi-producer/single-consumer FIFO of pending updates.
//!
//! Collects live writes behind a mutex while an index builds and drains them
//! as the scan catches up. `drain_while` generalizes a single
//! drain-everything step into a predicate-bounded operation, since the
//! population job needs two distinct drains: one bounded by the scan
//! frontier, one unbounded at flip time.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::update::NodePropertyUpdate;

/// No backpressure by design: a slow populator must never stall committers.
/// Unbounded growth is a deliberate tradeoff, not an oversight — a host that
/// cares about memory exhaustion here needs to bound how long an index is
/// allowed to stay in `Populating`, not add a bound to this queue.
#[derive(Default)]
pub struct UpdateQueue {
	inner: Mutex<VecDeque<NodePropertyUpdate>>,
}

impl UpdateQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Never blocks, never fails. Visible to the consumer as soon as this
	/// call returns.
	pub fn enqueue(&self, update: NodePropertyUpdate) {
		self.inner.lock().push_back(update);
	}

	/// Removes and returns the longest FIFO-ordered prefix of updates for
	/// which `predicate` holds, stopping at (and not consuming) the first
	/// update that doesn't match.
	pub fn drain_while(&self, mut predicate: impl FnMut(&NodePropertyUpdate) -> bool) -> Vec<NodePropertyUpdate> {
		let mut guard = self.inner.lock();
		let mut drained = Vec::new();
		while let Some(front) = guard.front() {
			if !predicate(front) {
				break;
			}
			drained.push(guard.pop_front().expect("front just checked to exist"));
		}
		drained
	}

	/// Drains every update currently queued, regardless of content. Used for
	/// the terminal drain at flip time (draining everything queued).
	pub fn drain_all(&self) -> Vec<NodePropertyUpdate> {
		self.drain_while(|_| true)
	}

	pub fn len(&self) -> usize {
		self.inner.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
