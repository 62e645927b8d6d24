//! The schema rule registry (`SchemaStatement`) and the bean-level index
//! handle. Both are external collaborators as far as the core algorithms are
//! concerned — the real implementation is out of scope — but this crate
//! carries an in-memory one as test/reference scaffolding, exercising
//! `Transaction`-style commit/rollback against an in-memory registry rather
//! than a real storage engine.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::descriptor::IndexDescriptor;
use crate::err::Error;
use crate::state::IndexState;

pub type ConstraintId = u64;

/// What kind of rule a descriptor's index belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleKind {
	Regular,
	/// Created as the enforcement mechanism for a uniqueness constraint.
	/// `owner` is the constraint that adopted it; `None` between the index's
	/// creation and its owning constraint's commit is the crash window
	/// [`crate::recovery::RecoveryCoordinator`] repairs.
	ConstraintBacking { owner: Option<ConstraintId> },
}

/// The in-memory shape of a persisted index rule.
#[derive(Clone, Debug)]
pub struct IndexRule {
	pub descriptor: IndexDescriptor,
	pub kind: RuleKind,
	pub state: IndexState,
}

/// External contract this crate consumes and is consumed by. Committed
/// reads only — in-transaction visibility is exercised separately via
/// [`fakes::SchemaTransaction`], since that is a property of the host's
/// transaction manager, not of this contract.
pub trait SchemaStatement: Send + Sync {
	fn index_create(&self, label_id: u64, property_key_id: u64) -> Result<IndexDescriptor, Error>;

	fn index_drop(&self, descriptor: IndexDescriptor) -> Result<(), Error>;

	fn indexes_get_for_label(&self, label_id: u64) -> Vec<IndexDescriptor>;

	fn indexes_get_for_label_and_property_key(&self, label_id: u64, property_key_id: u64) -> Option<IndexDescriptor>;

	fn indexes_get_all(&self) -> Vec<IndexRule>;

	fn unique_indexes_get_all(&self) -> Vec<IndexRule>;

	fn unique_indexes_get_for_label(&self, label_id: u64) -> Vec<IndexRule>;

	fn uniqueness_constraint_create(&self, label_id: u64, property_key_id: u64) -> Result<ConstraintId, Error>;
}

/// A bean-level handle to one index. `drop_index` (named to avoid colliding
/// with [`Drop`]) rejects a constraint-backing index with the exact message
/// fixed by the schema API, rather than delegating to `SchemaStatement::index_drop`.
pub struct IndexHandle<'a> {
	pub descriptor: IndexDescriptor,
	pub kind: RuleKind,
	schema: &'a dyn SchemaStatement,
}

impl<'a> IndexHandle<'a> {
	pub fn new(descriptor: IndexDescriptor, kind: RuleKind, schema: &'a dyn SchemaStatement) -> Self {
		Self { descriptor, kind, schema }
	}

	pub fn drop_index(&self) -> Result<(), Error> {
		if matches!(self.kind, RuleKind::ConstraintBacking { .. }) {
			return Err(Error::ConstraintIndexDropRejected);
		}
		self.schema.index_drop(self.descriptor)
	}
}

#[cfg(any(test, feature = "testing"))]
pub mod fakes {
	use super::*;

	/// Committed-state-only in-memory schema. Good enough to exercise the
	/// create/drop/list/constraint-conflict scenarios; not a
	/// persistence engine.
	pub struct InMemorySchema {
		rules: Mutex<HashMap<IndexDescriptor, IndexRule>>,
		next_constraint_id: Mutex<ConstraintId>,
	}

	impl InMemorySchema {
		pub fn new() -> Self {
			Self {
				rules: Mutex::new(HashMap::new()),
				next_constraint_id: Mutex::new(1),
			}
		}

		/// Directly inserts a constraint-backing rule, modeling the closed
		/// transactor action used for testing orphan recovery —
		/// bypasses the ordinary `index_create`/`uniqueness_constraint_create`
		/// pairing so a caller can simulate the crash window between them.
		pub fn create_constraint_backing_index(&self, descriptor: IndexDescriptor, owner: Option<ConstraintId>) {
			self.rules.lock().insert(
				descriptor,
				IndexRule {
					descriptor,
					kind: RuleKind::ConstraintBacking { owner },
					state: IndexState::Online,
				},
			);
		}

		pub fn begin(&self) -> SchemaTransaction<'_> {
			SchemaTransaction {
				base: self,
				overlay: Mutex::new(HashMap::new()),
			}
		}

		fn visible(&self) -> HashMap<IndexDescriptor, IndexRule> {
			self.rules.lock().clone()
		}
	}

	impl Default for InMemorySchema {
		fn default() -> Self {
			Self::new()
		}
	}

	impl SchemaStatement for InMemorySchema {
		fn index_create(&self, label_id: u64, property_key_id: u64) -> Result<IndexDescriptor, Error> {
			let descriptor = IndexDescriptor::new(label_id, property_key_id);
			let mut rules = self.rules.lock();
			match rules.get(&descriptor) {
				Some(rule) if matches!(rule.kind, RuleKind::ConstraintBacking { .. }) => {
					Err(Error::already_constrained(descriptor))
				},
				Some(_) => Err(Error::AlreadyIndexed { label: label_id, property: property_key_id }),
				None => {
					rules.insert(
						descriptor,
						IndexRule {
							descriptor,
							kind: RuleKind::Regular,
							state: IndexState::Populating,
						},
					);
					Ok(descriptor)
				},
			}
		}

		fn index_drop(&self, descriptor: IndexDescriptor) -> Result<(), Error> {
			let mut rules = self.rules.lock();
			if rules.remove(&descriptor).is_some() {
				Ok(())
			} else {
				Err(Error::no_such_index(descriptor))
			}
		}

		fn indexes_get_for_label(&self, label_id: u64) -> Vec<IndexDescriptor> {
			self.visible()
				.values()
				.filter(|rule| rule.descriptor.label_id == label_id && matches!(rule.kind, RuleKind::Regular))
				.map(|rule| rule.descriptor)
				.collect()
		}

		fn indexes_get_for_label_and_property_key(&self, label_id: u64, property_key_id: u64) -> Option<IndexDescriptor> {
			let descriptor = IndexDescriptor::new(label_id, property_key_id);
			self.visible()
				.get(&descriptor)
				.filter(|rule| matches!(rule.kind, RuleKind::Regular))
				.map(|rule| rule.descriptor)
		}

		fn indexes_get_all(&self) -> Vec<IndexRule> {
			self.visible().into_values().filter(|rule| matches!(rule.kind, RuleKind::Regular)).collect()
		}

		fn unique_indexes_get_all(&self) -> Vec<IndexRule> {
			self.visible()
				.into_values()
				.filter(|rule| matches!(rule.kind, RuleKind::ConstraintBacking { .. }))
				.collect()
		}

		fn unique_indexes_get_for_label(&self, label_id: u64) -> Vec<IndexRule> {
			self.visible()
				.into_values()
				.filter(|rule| rule.descriptor.label_id == label_id && matches!(rule.kind, RuleKind::ConstraintBacking { .. }))
				.collect()
		}

		fn uniqueness_constraint_create(&self, label_id: u64, property_key_id: u64) -> Result<ConstraintId, Error> {
			let descriptor = IndexDescriptor::new(label_id, property_key_id);
			let mut rules = self.rules.lock();
			if rules.contains_key(&descriptor) {
				return Err(Error::AlreadyIndexed { label: label_id, property: property_key_id });
			}
			let mut next_id = self.next_constraint_id.lock();
			let id = *next_id;
			*next_id += 1;
			rules.insert(
				descriptor,
				IndexRule {
					descriptor,
					kind: RuleKind::ConstraintBacking { owner: Some(id) },
					state: IndexState::Online,
				},
			);
			Ok(id)
		}
	}

	/// A transaction-scoped overlay on top of an [`InMemorySchema`], so tests
	/// can exercise in-transaction visibility and rollback without this
	/// crate's contract type needing to know about transactions at all.
	pub struct SchemaTransaction<'a> {
		base: &'a InMemorySchema,
		overlay: Mutex<HashMap<IndexDescriptor, Option<IndexRule>>>,
	}

	impl SchemaTransaction<'_> {
		fn visible(&self) -> HashMap<IndexDescriptor, IndexRule> {
			let mut merged = self.base.visible();
			for (descriptor, rule) in self.overlay.lock().iter() {
				match rule {
					Some(rule) => {
						merged.insert(*descriptor, rule.clone());
					},
					None => {
						merged.remove(descriptor);
					},
				}
			}
			merged
		}

		pub fn index_create(&self, label_id: u64, property_key_id: u64) -> Result<IndexDescriptor, Error> {
			let descriptor = IndexDescriptor::new(label_id, property_key_id);
			let visible = self.visible();
			match visible.get(&descriptor) {
				Some(rule) if matches!(rule.kind, RuleKind::ConstraintBacking { .. }) => {
					Err(Error::already_constrained(descriptor))
				},
				Some(_) => Err(Error::AlreadyIndexed { label: label_id, property: property_key_id }),
				None => {
					self.overlay.lock().insert(
						descriptor,
						Some(IndexRule {
							descriptor,
							kind: RuleKind::Regular,
							state: IndexState::Populating,
						}),
					);
					Ok(descriptor)
				},
			}
		}

		pub fn indexes_get_for_label(&self, label_id: u64) -> Vec<IndexDescriptor> {
			self.visible()
				.values()
				.filter(|rule| rule.descriptor.label_id == label_id && matches!(rule.kind, RuleKind::Regular))
				.map(|rule| rule.descriptor)
				.collect()
		}

		/// Commits the overlay into the base schema's committed state.
		pub fn commit(self) {
			for (descriptor, rule) in self.overlay.into_inner() {
				let mut rules = self.base.rules.lock();
				match rule {
					Some(rule) => {
						rules.insert(descriptor, rule);
					},
					None => {
						rules.remove(&descriptor);
					},
				}
			}
		}

		/// Discards the overlay. The base schema is left untouched.
		pub fn cancel(self) {}
	}
}
