//! Node-property update records flowing from the transaction layer into the
//! index kernel.

/// What happened to the property value for a node, relative to the index's
/// descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UpdateKind {
	Added,
	Changed,
	Removed,
}

/// A single committed change to a node's indexed property.
///
/// `value_before`/`value_after` are opaque to the kernel — they are handed
/// straight through to [`crate::writer::IndexWriter`], which is the only
/// component that needs to interpret them (the on-disk value encoding is
/// out of scope here).
#[derive(Clone, Debug)]
pub struct NodePropertyUpdate {
	pub node_id: u64,
	pub kind: UpdateKind,
	pub value_before: Option<String>,
	pub value_after: Option<String>,
}

impl NodePropertyUpdate {
	pub fn added(node_id: u64, value: impl Into<String>) -> Self {
		Self {
			node_id,
			kind: UpdateKind::Added,
			value_before: None,
			value_after: Some(value.into()),
		}
	}

	pub fn changed(node_id: u64, before: impl Into<String>, after: impl Into<String>) -> Self {
		Self {
			node_id,
			kind: UpdateKind::Changed,
			value_before: Some(before.into()),
			value_after: Some(after.into()),
		}
	}

	pub fn removed(node_id: u64, before: impl Into<String>) -> Self {
		Self {
			node_id,
			kind: UpdateKind::Removed,
			value_before: Some(before.into()),
			value_after: None,
		}
	}
}
