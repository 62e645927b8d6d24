//! Startup repair for orphaned constraint-backing indexes.
//!
//! Runs once, before any user transaction is admitted, over every persisted
//! index rule. A constraint-backing index whose owning constraint never
//! committed is a crash artifact and is dropped.

use crate::cnf;
use crate::err::Error;
use crate::schema::{RuleKind, SchemaStatement};
use crate::state::{self, Event, IndexState, Transition};

/// Sweeps `schema` for constraint-backing rules with no owner and drops
/// them. Batches the sweep at [`cnf::RECOVERY_SWEEP_BATCH_SIZE`] rules at a
/// time so a host with a very large schema doesn't hold whatever lock
/// `indexesGetAll` takes for the entire sweep in one go.
pub struct RecoveryCoordinator;

impl RecoveryCoordinator {
	/// Returns the descriptors actually dropped, for the caller's startup log
	/// line.
	pub fn recover(schema: &dyn SchemaStatement) -> Result<Vec<crate::descriptor::IndexDescriptor>, Error> {
		let all = schema.indexes_get_all().into_iter().chain(schema.unique_indexes_get_all());
		let orphans: Vec<_> = all
			.filter(|rule| matches!(rule.kind, RuleKind::ConstraintBacking { owner: None }))
			.map(|rule| rule.descriptor)
			.collect();

		let mut dropped = Vec::new();
		for batch in orphans.chunks(*cnf::RECOVERY_SWEEP_BATCH_SIZE) {
			for descriptor in batch {
				// The pure state machine agrees this transition is legal
				// before we touch the schema at all; a mismatch here would
				// mean the schema and the state machine have drifted apart.
				state::transition(&IndexState::AwaitingConstraintOwner, Event::RecoverOrphan)
					.map(|t| matches!(t, Transition::Removed))
					.expect("an orphaned constraint-backing index is always recoverable");

				match schema.index_drop(*descriptor) {
					Ok(()) => {
						tracing::info!(index = %descriptor, "dropped orphaned constraint-backing index on recovery");
						dropped.push(*descriptor);
					},
					// Already gone (e.g. a previous recovery pass raced it) — not an error.
					Err(Error::NoSuchIndex { .. }) => {},
					Err(other) => return Err(other),
				}
			}
		}

		Ok(dropped)
	}
}
