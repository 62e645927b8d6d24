//! Error surface for the index kernel.
//!
//! Every error a caller can observe from this crate is a variant of [`Error`].
//! Where the caller-facing wording is fixed, the `#[error(...)]` message
//! reproduces it verbatim.

use std::fmt;

use crate::descriptor::IndexDescriptor;

/// A human-readable cause recorded against a failed population. Kept as an
/// owned string rather than a boxed `dyn Error` so it can be cloned into both
/// a log line and the writer's persistent failure record without re-running
/// the original computation.
///
/// `was_conflict` distinguishes an expected uniqueness violation (never
/// logged at error severity) from every other populator failure (always
/// logged with a stack trace in a host that has one to log).
#[derive(Clone, Debug)]
pub struct FailureCause {
	pub message: String,
	pub was_conflict: bool,
}

impl FailureCause {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			was_conflict: false,
		}
	}

	pub fn from_error(err: &Error) -> Self {
		Self {
			message: err.to_string(),
			was_conflict: matches!(err, Error::IndexEntryConflict { .. }),
		}
	}
}

impl fmt::Display for FailureCause {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.message)
	}
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	#[error(
		"Unable to add index :label[{label}](property[{property}]) : Already constrained \
		 CONSTRAINT ON ( n:label[{label}] ) ASSERT n.property[{property}] IS UNIQUE."
	)]
	AlreadyConstrained { label: u64, property: u64 },

	#[error("Index already exists on :label[{label}](property[{property}]).")]
	AlreadyIndexed { label: u64, property: u64 },

	#[error(
		"Unable to drop index on :label[{label}](property[{property}]): No such INDEX ON \
		 :label[{label}](property[{property}])."
	)]
	NoSuchIndex { label: u64, property: u64 },

	#[error("Index population failed: {0}")]
	IndexPopulationFailed(FailureCause),

	#[error("Index entry conflict on value {value:?} between nodes {node_ids:?}")]
	IndexEntryConflict { value: String, node_ids: Vec<u64> },

	#[error("Index proxy is already closed")]
	IndexProxyAlreadyClosed,

	#[error(
		"Constraint indexes cannot be dropped directly, instead drop the owning uniqueness \
		 constraint."
	)]
	ConstraintIndexDropRejected,
}

impl Error {
	pub fn already_constrained(descriptor: IndexDescriptor) -> Self {
		Error::AlreadyConstrained {
			label: descriptor.label_id,
			property: descriptor.property_key_id,
		}
	}

	pub fn no_such_index(descriptor: IndexDescriptor) -> Self {
		Error::NoSuchIndex {
			label: descriptor.label_id,
			property: descriptor.property_key_id,
		}
	}

	/// Errors that must not be logged at error severity: expected uniqueness
	/// conflicts on a backing index, and shutdown races against an
	/// already-closed proxy.
	pub fn is_quiet(&self) -> bool {
		match self {
			Error::IndexPopulationFailed(cause) => cause.was_conflict,
			Error::IndexProxyAlreadyClosed => true,
			_ => false,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
