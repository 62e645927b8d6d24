//! The pluggable persistent sink a [`crate::population::PopulationJob`]
//! builds into. The on-disk format behind an implementation is out of scope
//! this module only specifies the contract every implementation must
//! honor.

use crate::err::{Error, FailureCause};

/// Contract:
/// - `create` is called exactly once before any `add`/`update`.
/// - `add` is used during the initial store scan, in ascending nodeId order.
/// - `update` is used once the scan frontier has passed, for live updates.
/// - `close` is called exactly once, with `true` iff population succeeded.
pub trait IndexWriter: Send {
	fn create(&mut self) -> Result<(), Error>;

	/// Add a single scanned entry. Order is ascending nodeId.
	fn add(&mut self, node_id: u64, value: &str) -> Result<(), Error>;

	/// Apply a batch of live updates that arrived after the scan frontier
	/// passed their nodeId.
	fn update(&mut self, batch: &[crate::update::NodePropertyUpdate]) -> Result<(), Error>;

	/// Persist a human-readable failure record so a restart observes a
	/// `FAILED` index with cause.
	fn mark_failed(&mut self, reason: &FailureCause) -> Result<(), Error>;

	/// `close(true)` makes the index durable and queryable; `close(false)`
	/// discards partial state. Called exactly once.
	fn close(&mut self, success: bool) -> Result<(), Error>;
}

#[cfg(any(test, feature = "testing"))]
pub mod fakes {
	use std::collections::BTreeMap;
	use std::sync::Arc;

	use parking_lot::Mutex;

	use super::*;
	use crate::update::{NodePropertyUpdate, UpdateKind};

	/// In-memory writer used by tests: enforces uniqueness when
	/// `unique` is set, tracks lifecycle call order, and records everything
	/// it was asked to persist so tests can assert on it.
	#[derive(Default)]
	pub struct InMemoryWriter {
		pub unique: bool,
		pub created: bool,
		pub closed: Option<bool>,
		pub failure: Option<FailureCause>,
		pub entries: BTreeMap<u64, String>,
		pub applied_order: Vec<(u64, UpdateKind)>,
	}

	impl InMemoryWriter {
		pub fn new(unique: bool) -> Self {
			Self {
				unique,
				..Default::default()
			}
		}

		fn check_unique(&self, node_id: u64, value: &str) -> Result<(), Error> {
			if !self.unique {
				return Ok(());
			}
			if let Some((other_id, _)) = self
				.entries
				.iter()
				.find(|(id, v)| **id != node_id && v.as_str() == value)
			{
				return Err(Error::IndexEntryConflict {
					value: value.to_string(),
					node_ids: vec![*other_id, node_id],
				});
			}
			Ok(())
		}
	}

	impl IndexWriter for InMemoryWriter {
		fn create(&mut self) -> Result<(), Error> {
			assert!(!self.created, "create() must be called exactly once");
			self.created = true;
			Ok(())
		}

		fn add(&mut self, node_id: u64, value: &str) -> Result<(), Error> {
			self.check_unique(node_id, value)?;
			self.entries.insert(node_id, value.to_string());
			self.applied_order.push((node_id, UpdateKind::Added));
			Ok(())
		}

		fn update(&mut self, batch: &[NodePropertyUpdate]) -> Result<(), Error> {
			for update in batch {
				match update.kind {
					UpdateKind::Added | UpdateKind::Changed => {
						let value = update
							.value_after
							.clone()
							.expect("add/change updates carry a new value");
						self.check_unique(update.node_id, &value)?;
						self.entries.insert(update.node_id, value);
					},
					UpdateKind::Removed => {
						self.entries.remove(&update.node_id);
					},
				}
				self.applied_order.push((update.node_id, update.kind));
			}
			Ok(())
		}

		fn mark_failed(&mut self, reason: &FailureCause) -> Result<(), Error> {
			self.failure = Some(reason.clone());
			Ok(())
		}

		fn close(&mut self, success: bool) -> Result<(), Error> {
			assert!(self.closed.is_none(), "close() must be called exactly once");
			self.closed = Some(success);
			Ok(())
		}
	}

	/// A handle onto an [`InMemoryWriter`] shared between the boxed
	/// `dyn IndexWriter` a populator owns and a test that wants to inspect
	/// `entries`/`applied_order`/`closed` after the job finishes, since the
	/// populator otherwise takes the writer by value and a caller has no way
	/// to get it back.
	#[derive(Clone, Default)]
	pub struct SharedWriter(pub Arc<Mutex<InMemoryWriter>>);

	impl SharedWriter {
		pub fn new(unique: bool) -> Self {
			Self(Arc::new(Mutex::new(InMemoryWriter::new(unique))))
		}

		pub fn entries(&self) -> BTreeMap<u64, String> {
			self.0.lock().entries.clone()
		}

		pub fn applied_order(&self) -> Vec<(u64, UpdateKind)> {
			self.0.lock().applied_order.clone()
		}

		pub fn closed(&self) -> Option<bool> {
			self.0.lock().closed
		}
	}

	impl IndexWriter for SharedWriter {
		fn create(&mut self) -> Result<(), Error> {
			self.0.lock().create()
		}

		fn add(&mut self, node_id: u64, value: &str) -> Result<(), Error> {
			self.0.lock().add(node_id, value)
		}

		fn update(&mut self, batch: &[NodePropertyUpdate]) -> Result<(), Error> {
			self.0.lock().update(batch)
		}

		fn mark_failed(&mut self, reason: &FailureCause) -> Result<(), Error> {
			self.0.lock().mark_failed(reason)
		}

		fn close(&mut self, success: bool) -> Result<(), Error> {
			self.0.lock().close(success)
		}
	}
}
