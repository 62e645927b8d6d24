//! End-to-end index lifecycle scenarios, exercised against the in-memory
//! `SchemaStatement`/`IndexWriter`/`StoreScan` fakes this crate ships behind
//! `feature = "testing"`, driving `Transaction`-style commit/rollback end to
//! end against an in-memory registry instead of a real storage backend.

use std::sync::Arc;

use index_kernel::descriptor::IndexDescriptor;
use index_kernel::metrics::PopulationMetrics;
use index_kernel::proxy::FlippableProxy;
use index_kernel::queue::UpdateQueue;
use index_kernel::recovery::RecoveryCoordinator;
use index_kernel::scan::fakes::FixedScan;
use index_kernel::scan::StoreScan;
use index_kernel::schema::fakes::InMemorySchema;
use index_kernel::schema::{IndexHandle, RuleKind, SchemaStatement};
use index_kernel::writer::fakes::{InMemoryWriter, SharedWriter};
use index_kernel::{IndexState, NodePropertyUpdate, PopulationRegistry, UpdateKind};

fn descriptor(label: u64, property: u64) -> IndexDescriptor {
	IndexDescriptor::new(label, property)
}

#[test]
fn create_then_list_in_a_new_transaction() {
	let schema = InMemorySchema::new();
	schema.index_create(5, 8).unwrap();

	assert_eq!(schema.indexes_get_for_label(5), vec![descriptor(5, 8)]);
	assert_eq!(schema.indexes_get_for_label_and_property_key(5, 8), Some(descriptor(5, 8)));
}

#[test]
fn transactional_merge_is_visible_before_commit() {
	let schema = InMemorySchema::new();
	schema.index_create(5, 8).unwrap();

	let tx = schema.begin();
	tx.index_create(5, 10).unwrap();
	let mut seen = tx.indexes_get_for_label(5);
	seen.sort();
	assert_eq!(seen, vec![descriptor(5, 8), descriptor(5, 10)]);
}

#[test]
fn rollback_leaves_no_trace() {
	let schema = InMemorySchema::new();
	let tx = schema.begin();
	tx.index_create(5, 8).unwrap();
	tx.cancel();

	assert!(schema.indexes_get_for_label(5).is_empty());
}

/// An index created directly through the constraint-index-creator action,
/// with no owning constraint ever committed, is dropped by recovery as if
/// the process had just restarted.
#[test]
fn orphan_recovery_drops_an_unowned_constraint_backing_index() {
	let schema = InMemorySchema::new();
	schema.create_constraint_backing_index(descriptor(5, 8), None);

	let dropped = RecoveryCoordinator::recover(&schema).unwrap();

	assert_eq!(dropped, vec![descriptor(5, 8)]);
	assert!(schema.indexes_get_for_label(5).is_empty());
	assert!(schema.unique_indexes_get_for_label(5).is_empty());
}

#[test]
fn double_drop_is_rejected_with_the_exact_message() {
	let schema = InMemorySchema::new();
	schema.index_create(5, 8).unwrap();
	schema.index_drop(descriptor(5, 8)).unwrap();

	let err = schema.index_drop(descriptor(5, 8)).unwrap_err();
	assert_eq!(
		err.to_string(),
		"Unable to drop index on :label[5](property[8]): No such INDEX ON :label[5](property[8])."
	);
}

#[test]
fn constraint_blocks_index_creation_with_the_exact_message() {
	let schema = InMemorySchema::new();
	schema.uniqueness_constraint_create(5, 8).unwrap();

	let err = schema.index_create(5, 8).unwrap_err();
	assert_eq!(
		err.to_string(),
		"Unable to add index :label[5](property[8]) : Already constrained CONSTRAINT ON ( n:label[5] ) ASSERT \
		 n.property[8] IS UNIQUE."
	);
}

/// Plain and constraint-backing indexes on the same label stay in separate
/// views, driven end to end through both `SchemaStatement` views rather than
/// through a single fake's internals.
#[test]
fn view_separation_between_plain_and_constraint_backing_indexes() {
	let schema = InMemorySchema::new();
	schema.uniqueness_constraint_create(5, 8).unwrap();
	schema.index_create(5, 10).unwrap();

	assert_eq!(schema.indexes_get_for_label(5), vec![descriptor(5, 10)]);
	assert_eq!(schema.unique_indexes_get_for_label(5).len(), 1);
	assert_eq!(schema.unique_indexes_get_for_label(5)[0].descriptor, descriptor(5, 8));
}

#[test]
fn bean_handle_rejects_dropping_a_constraint_backing_index() {
	let schema = InMemorySchema::new();
	schema.uniqueness_constraint_create(5, 8).unwrap();
	let handle = IndexHandle::new(descriptor(5, 8), RuleKind::ConstraintBacking { owner: Some(1) }, &schema);

	let err = handle.drop_index().unwrap_err();
	assert_eq!(
		err.to_string(),
		"Constraint indexes cannot be dropped directly, instead drop the owning uniqueness constraint."
	);
}

/// A population that interleaves scanned nodes with a racing live update
/// preserves per-node ordering and loses nothing across the flip.
#[tokio::test]
async fn population_preserves_ordering_and_applies_every_update_before_close() {
	let registry = Arc::new(PopulationRegistry::new());
	let queue = Arc::new(UpdateQueue::new());
	let proxy = Arc::new(FlippableProxy::new_populating(descriptor(5, 8), queue.clone()));
	let scan: Arc<dyn StoreScan> = Arc::new(FixedScan::new(vec![(1, "a".into()), (2, "b".into()), (3, "c".into())]));

	// A live update for node 3 races the scan; since 3 is the highest scanned
	// nodeId, it should be picked up by the terminal drain at flip rather
	// than the scan-time opportunistic drain, either way ending up applied
	// exactly once, in order, before the writer closes successfully.
	queue.enqueue(NodePropertyUpdate::changed(3, "c", "c2"));

	let writer = SharedWriter::new(true);
	let handle = registry
		.spawn(
			descriptor(5, 8),
			proxy.clone(),
			queue,
			Box::new(writer.clone()),
			scan,
			Arc::new(index_kernel::population::NoopSchemaStateCache),
			Arc::new(PopulationMetrics::new()),
		)
		.unwrap();

	handle.await_completion().await;
	assert_eq!(proxy.state(), IndexState::Online);

	// The scan's own add for node 3 and the racing live update must both
	// have reached the writer, in that order, before `close(true)` — not
	// dropped, and not reordered ahead of the scan's add for the same node.
	assert_eq!(
		writer.applied_order(),
		vec![
			(1, UpdateKind::Added),
			(2, UpdateKind::Added),
			(3, UpdateKind::Added),
			(3, UpdateKind::Changed),
		]
	);
	assert_eq!(writer.entries().get(&3), Some(&"c2".to_string()));
	assert_eq!(writer.closed(), Some(true));
}

#[tokio::test]
async fn at_most_one_populator_per_descriptor() {
	let registry = Arc::new(PopulationRegistry::new());
	let queue = Arc::new(UpdateQueue::new());
	let proxy = Arc::new(FlippableProxy::new_populating(descriptor(5, 8), queue.clone()));
	let scan: Arc<dyn StoreScan> = Arc::new(FixedScan::new(vec![(1, "a".into())]));

	let first = registry
		.spawn(
			descriptor(5, 8),
			proxy.clone(),
			queue.clone(),
			Box::new(InMemoryWriter::new(false)),
			scan.clone(),
			Arc::new(index_kernel::population::NoopSchemaStateCache),
			Arc::new(PopulationMetrics::new()),
		)
		.unwrap();

	let second = registry.spawn(
		descriptor(5, 8),
		proxy,
		queue,
		Box::new(InMemoryWriter::new(false)),
		scan,
		Arc::new(index_kernel::population::NoopSchemaStateCache),
		Arc::new(PopulationMetrics::new()),
	);

	assert!(second.is_err());
	first.await_completion().await;
}
