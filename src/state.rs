//! Pure transition rules for index state, isolated from [`crate::proxy`] and
//! [`crate::recovery`] so the rules themselves are independently testable
//! so the rules themselves can be tested without a proxy or recovery.

use std::fmt;

use crate::err::FailureCause;

/// Externally observable state of an index.
#[derive(Clone, Debug)]
pub enum IndexState {
	Populating,
	Online,
	Failed(Option<FailureCause>),
	AwaitingConstraintOwner,
}

impl PartialEq for IndexState {
	fn eq(&self, other: &Self) -> bool {
		matches!(
			(self, other),
			(IndexState::Populating, IndexState::Populating)
				| (IndexState::Online, IndexState::Online)
				| (IndexState::Failed(_), IndexState::Failed(_))
				| (IndexState::AwaitingConstraintOwner, IndexState::AwaitingConstraintOwner)
		)
	}
}

impl fmt::Display for IndexState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IndexState::Populating => write!(f, "POPULATING"),
			IndexState::Online => write!(f, "ONLINE"),
			IndexState::Failed(Some(cause)) => write!(f, "FAILED({cause})"),
			IndexState::Failed(None) => write!(f, "FAILED(unknown)"),
			IndexState::AwaitingConstraintOwner => write!(f, "AWAITING_CONSTRAINT_OWNER"),
		}
	}
}

/// Events that can drive a state transition.
#[derive(Clone, Debug)]
pub enum Event {
	ScanDone,
	FlipOk,
	/// `None` is the preemptive flip to a generic failed delegate before the
	/// cause is known; `Some(cause)` both performs an ordinary
	/// populating-failure flip and refines an already-preempted failure.
	FlipFail(Option<FailureCause>),
	Drop,
	RecoverOrphan,
}

/// Outcome of a legal transition.
pub enum Transition {
	To(IndexState),
	Removed,
}

/// A transition the state machine does not permit.
#[derive(Clone, Debug)]
pub struct IllegalTransition {
	pub from: IndexState,
	pub event: Event,
}

impl fmt::Display for IllegalTransition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "illegal transition: {:?} from state {}", self.event, self.from)
	}
}

/// `(current, event) -> next | error`. No side effects: callers (the proxy,
/// recovery) are responsible for actually installing the resulting state.
pub fn transition(current: &IndexState, event: Event) -> Result<Transition, IllegalTransition> {
	use IndexState::*;

	match (current, &event) {
		(Populating, Event::ScanDone) => Ok(Transition::To(Populating)),
		(Populating, Event::FlipOk) => Ok(Transition::To(Online)),
		(Populating, Event::FlipFail(cause)) => Ok(Transition::To(Failed(cause.clone()))),
		(Failed(None), Event::FlipFail(Some(cause))) => {
			Ok(Transition::To(Failed(Some(cause.clone()))))
		},
		(Online, Event::Drop) => Ok(Transition::Removed),
		(Failed(_), Event::Drop) => Ok(Transition::Removed),
		(AwaitingConstraintOwner, Event::RecoverOrphan) => Ok(Transition::Removed),
		_ => Err(IllegalTransition {
			from: current.clone(),
			event,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn populating_flips_to_online_on_success() {
		let next = transition(&IndexState::Populating, Event::FlipOk).unwrap();
		assert!(matches!(next, Transition::To(IndexState::Online)));
	}

	#[test]
	fn populating_flips_to_failed_on_failure() {
		let cause = FailureCause::new("boom");
		let next = transition(&IndexState::Populating, Event::FlipFail(Some(cause))).unwrap();
		assert!(matches!(next, Transition::To(IndexState::Failed(Some(_)))));
	}

	#[test]
	fn scan_done_is_a_populating_no_op() {
		let next = transition(&IndexState::Populating, Event::ScanDone).unwrap();
		assert!(matches!(next, Transition::To(IndexState::Populating)));
	}

	#[test]
	fn preempted_failure_can_be_refined() {
		let preempted = transition(&IndexState::Populating, Event::FlipFail(None)).unwrap();
		let Transition::To(failed_unknown) = preempted else {
			panic!("expected a To(..) transition");
		};
		assert!(matches!(failed_unknown, IndexState::Failed(None)));

		let cause = FailureCause::new("conflict on value X");
		let refined = transition(&failed_unknown, Event::FlipFail(Some(cause))).unwrap();
		assert!(matches!(refined, Transition::To(IndexState::Failed(Some(_)))));
	}

	#[test]
	fn online_cannot_flip_back() {
		assert!(transition(&IndexState::Online, Event::FlipOk).is_err());
		assert!(transition(&IndexState::Online, Event::FlipFail(None)).is_err());
	}

	#[test]
	fn failed_cannot_flip_to_online() {
		assert!(transition(&IndexState::Failed(None), Event::FlipOk).is_err());
	}

	#[test]
	fn online_and_failed_are_droppable() {
		assert!(matches!(
			transition(&IndexState::Online, Event::Drop).unwrap(),
			Transition::Removed
		));
		assert!(matches!(
			transition(&IndexState::Failed(None), Event::Drop).unwrap(),
			Transition::Removed
		));
	}

	#[test]
	fn populating_is_not_directly_droppable() {
		assert!(transition(&IndexState::Populating, Event::Drop).is_err());
	}

	#[test]
	fn recovery_removes_an_orphaned_awaiting_owner_index() {
		assert!(matches!(
			transition(&IndexState::AwaitingConstraintOwner, Event::RecoverOrphan).unwrap(),
			Transition::Removed
		));
	}

	#[test]
	fn recovery_event_does_not_apply_to_other_states() {
		assert!(transition(&IndexState::Online, Event::RecoverOrphan).is_err());
	}
}
