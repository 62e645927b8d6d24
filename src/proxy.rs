//! The flippable proxy: one per index, created at declaration, destroyed
//! only on drop. Holds the single mutable "current delegate" slot and
//! performs atomic flips between delegate kinds.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::IndexDescriptor;
use crate::err::{Error, FailureCause};
use crate::queue::UpdateQueue;
use crate::state::{self, Event, IndexState, Transition};
use crate::update::NodePropertyUpdate;

/// The current implementation behind the proxy. Only `Populating` actually
/// does anything with a live update: `Online` and `Failed` are no-ops from
/// this subsystem's point of view, since ongoing maintenance of an online
/// index is handled elsewhere, outside this crate.
#[derive(Clone)]
pub enum Delegate {
	Populating(Arc<UpdateQueue>),
	Online,
	Failed(Option<FailureCause>),
}

impl Delegate {
	fn to_state(&self) -> IndexState {
		match self {
			Delegate::Populating(_) => IndexState::Populating,
			Delegate::Online => IndexState::Online,
			Delegate::Failed(cause) => IndexState::Failed(cause.clone()),
		}
	}
}

/// One flip barrier, guarding the one delegate slot. Taking the lock to read
/// the delegate (`delegate_for_updates`, `state`) and taking it to swap the
/// delegate (`flip`, `flip_to`) share the same critical section: a flip in
/// progress makes concurrent committers wait for the barrier rather than
/// lose or misroute an update.
pub struct FlippableProxy {
	descriptor: IndexDescriptor,
	delegate: Mutex<Delegate>,
}

impl FlippableProxy {
	pub fn new_populating(descriptor: IndexDescriptor, queue: Arc<UpdateQueue>) -> Self {
		Self {
			descriptor,
			delegate: Mutex::new(Delegate::Populating(queue)),
		}
	}

	pub fn descriptor(&self) -> IndexDescriptor {
		self.descriptor
	}

	/// Returns the delegate callers should pipe writes to.
	pub fn delegate_for_updates(&self) -> Delegate {
		self.delegate.lock().clone()
	}

	/// Routes a single live update to whatever delegate is current. Enqueues
	/// while populating; a no-op once the delegate has left `Populating`.
	///
	/// Enqueues under the same lock `flip` takes, not a clone of the
	/// delegate taken outside it — otherwise a committer that snapshots
	/// `Populating(queue)` just before a flip could enqueue into that queue
	/// after `flip` has already drained and closed it, silently losing the
	/// update. Holding the lock here makes a racing `accept_update` either
	/// land on the still-populating queue or observe the post-flip delegate
	/// and correctly no-op.
	pub fn accept_update(&self, update: NodePropertyUpdate) {
		let guard = self.delegate.lock();
		if let Delegate::Populating(queue) = &*guard {
			queue.enqueue(update);
		}
	}

	pub fn state(&self) -> IndexState {
		self.delegate.lock().to_state()
	}

	/// Acquires the flip barrier, runs `action` (which must durably commit
	/// the new state — e.g. drain the queue and close the writer), and
	/// installs `Online` on success or `on_failure(&cause)`'s delegate if
	/// `action` fails.
	pub fn flip(
		&self,
		action: impl FnOnce() -> Result<(), FailureCause>,
		on_failure: impl FnOnce(&FailureCause) -> Delegate,
	) -> Result<(), FailureCause> {
		let mut guard = self.delegate.lock();
		let current_state = guard.to_state();
		match action() {
			Ok(()) => {
				state::transition(&current_state, Event::FlipOk)
					.expect("a fresh populating delegate may always flip to online");
				*guard = Delegate::Online;
				tracing::info!(index = %self.descriptor, "index flipped to ONLINE");
				Ok(())
			},
			Err(cause) => {
				state::transition(&current_state, Event::FlipFail(Some(cause.clone())))
					.expect("a populating delegate may always flip to failed");
				*guard = on_failure(&cause);
				if !Error::IndexPopulationFailed(cause.clone()).is_quiet() {
					tracing::error!(index = %self.descriptor, cause = %cause, "index population failed");
				}
				Err(cause)
			},
		}
	}

	/// Unconditionally installs `delegate` under the barrier. Used for the
	/// preemptive flip to a generic failed delegate ahead of the cause being
	/// known — the "double-flip on failure" pattern.
	pub fn flip_to(&self, delegate: Delegate) {
		let mut guard = self.delegate.lock();
		*guard = delegate;
	}

	/// Drops the index's delegate. Only legal from `Online` or `Failed`.
	pub fn drop_index(&self) -> Result<(), Error> {
		let mut guard = self.delegate.lock();
		let current_state = guard.to_state();
		match state::transition(&current_state, Event::Drop) {
			Ok(Transition::Removed) => {
				*guard = Delegate::Failed(Some(FailureCause::new("index dropped")));
				Ok(())
			},
			Ok(Transition::To(_)) => unreachable!("Drop never yields a To(..) transition"),
			Err(_) => Err(Error::IndexProxyAlreadyClosed),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn descriptor() -> IndexDescriptor {
		IndexDescriptor::new(5, 8)
	}

	#[test]
	fn starts_populating_and_enqueues_updates() {
		let queue = Arc::new(UpdateQueue::new());
		let proxy = FlippableProxy::new_populating(descriptor(), queue.clone());
		assert_eq!(proxy.state(), IndexState::Populating);

		proxy.accept_update(NodePropertyUpdate::added(1, "a"));
		assert_eq!(queue.len(), 1);
	}

	#[test]
	fn successful_flip_goes_online_and_stops_enqueuing() {
		let queue = Arc::new(UpdateQueue::new());
		let proxy = FlippableProxy::new_populating(descriptor(), queue.clone());

		proxy.flip(|| Ok(()), |cause| Delegate::Failed(Some(cause.clone()))).unwrap();
		assert_eq!(proxy.state(), IndexState::Online);

		proxy.accept_update(NodePropertyUpdate::added(1, "a"));
		assert!(queue.is_empty(), "updates after flip must not reach the drained queue");
	}

	#[test]
	fn failed_flip_installs_the_failure_delegate() {
		let queue = Arc::new(UpdateQueue::new());
		let proxy = FlippableProxy::new_populating(descriptor(), queue);

		let err = proxy
			.flip(
				|| Err(FailureCause::new("disk full")),
				|cause| Delegate::Failed(Some(cause.clone())),
			)
			.unwrap_err();
		assert_eq!(err.message, "disk full");
		assert!(matches!(proxy.state(), IndexState::Failed(Some(_))));
	}

	#[test]
	fn double_flip_on_failure_preempts_then_refines() {
		let queue = Arc::new(UpdateQueue::new());
		let proxy = FlippableProxy::new_populating(descriptor(), queue);

		proxy.flip_to(Delegate::Failed(None));
		assert!(matches!(proxy.state(), IndexState::Failed(None)));

		proxy.flip_to(Delegate::Failed(Some(FailureCause::new("conflict"))));
		assert!(matches!(proxy.state(), IndexState::Failed(Some(_))));
	}

	#[test]
	fn online_index_can_be_dropped() {
		let queue = Arc::new(UpdateQueue::new());
		let proxy = FlippableProxy::new_populating(descriptor(), queue);
		proxy.flip(|| Ok(()), |cause| Delegate::Failed(Some(cause.clone()))).unwrap();
		assert!(proxy.drop_index().is_ok());
	}

	#[test]
	fn populating_index_cannot_be_dropped_directly() {
		let queue = Arc::new(UpdateQueue::new());
		let proxy = FlippableProxy::new_populating(descriptor(), queue);
		assert!(proxy.drop_index().is_err());
	}
}
