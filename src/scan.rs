//! Single-pass forward scan over all nodes currently matching an index's
//! descriptor. The store itself (files, pages, migration) is out of scope
//! this module only specifies the contract the populator drives.

use crate::err::Error;

/// One entry produced by a [`StoreScan`]: the matching node and the property
/// value the index should see for it.
pub struct ScannedEntry {
	pub node_id: u64,
	pub value: String,
}

/// Receives entries from a running scan. Rejecting an entry aborts the scan
/// with that error.
pub trait ScanVisitor {
	fn visit(&mut self, entry: ScannedEntry) -> Result<(), Error>;
}

/// Cooperative, stoppable forward scan. `run` is synchronous and is always
/// invoked on the populator thread; `stop` is callable from any thread.
///
/// After `stop()`, `run()` must return promptly without any guarantee of
/// having visited every matching node.
pub trait StoreScan: Send + Sync {
	fn run(&self, visitor: &mut dyn ScanVisitor) -> Result<(), Error>;

	fn stop(&self);
}

#[cfg(any(test, feature = "testing"))]
pub mod fakes {
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;

	use super::*;

	/// Scans a fixed, pre-sorted set of `(nodeId, value)` pairs, checking
	/// `stop()` between entries so cancellation tests can exercise it without
	/// a real store.
	pub struct FixedScan {
		entries: Vec<(u64, String)>,
		stopped: Arc<AtomicBool>,
	}

	impl FixedScan {
		pub fn new(mut entries: Vec<(u64, String)>) -> Self {
			entries.sort_by_key(|(id, _)| *id);
			Self {
				entries,
				stopped: Arc::new(AtomicBool::new(false)),
			}
		}

		pub fn stop_handle(&self) -> Arc<AtomicBool> {
			self.stopped.clone()
		}
	}

	impl StoreScan for FixedScan {
		fn run(&self, visitor: &mut dyn ScanVisitor) -> Result<(), Error> {
			for (node_id, value) in &self.entries {
				if self.stopped.load(Ordering::Acquire) {
					return Ok(());
				}
				visitor.visit(ScannedEntry {
					node_id: *node_id,
					value: value.clone(),
				})?;
			}
			Ok(())
		}

		fn stop(&self) {
			self.stopped.store(true, Ordering::Release);
		}
	}
}
