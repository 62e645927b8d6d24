//! The population job: the worker that drives a single index from
//! `POPULATING` to `ONLINE` (or `FAILED`), and the registry that keeps two
//! jobs from ever running against the same descriptor at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::cnf;
use crate::descriptor::IndexDescriptor;
use crate::err::{Error, FailureCause};
use crate::metrics::PopulationMetrics;
use crate::proxy::{Delegate, FlippableProxy};
use crate::queue::UpdateQueue;
use crate::scan::{ScanVisitor, ScannedEntry, StoreScan};
use crate::writer::IndexWriter;

/// Derived state cleared after a successful flip, e.g. a schema cache.
/// Out of scope to actually cache anything here — this crate only owns the
/// seam a host wires its own cache into.
pub trait SchemaStateCache: Send + Sync {
	fn clear(&self);
}

/// A cache that clears nothing. The default for hosts that don't need one.
pub struct NoopSchemaStateCache;

impl SchemaStateCache for NoopSchemaStateCache {
	fn clear(&self) {}
}

/// Handle returned to the caller that spawned a [`PopulationJob`]. Outlives
/// the populator thread; `cancel`/`await_completion` are callable from any
/// thread.
pub struct PopulationJobHandle {
	descriptor: IndexDescriptor,
	cancelled: Arc<AtomicBool>,
	scan_stop: Arc<dyn StoreScan>,
	done_rx: watch::Receiver<bool>,
	failure: Arc<Mutex<Option<Error>>>,
}

impl PopulationJobHandle {
	pub fn descriptor(&self) -> IndexDescriptor {
		self.descriptor
	}

	/// Idempotent. Flips the cancellation flag and asks the scan to stop;
	/// does not itself wait for the job to exit.
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Release);
		self.scan_stop.stop();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Acquire)
	}

	/// The `IndexPopulationFailed` cause, once the job has failed — either
	/// during the scan/create setup or at the flip itself. `None` while the
	/// job is still running, cancelled, or has flipped online successfully.
	pub fn failure(&self) -> Option<Error> {
		self.failure.lock().clone()
	}

	/// Resolves once the job's done-latch has fired. Already-completed if
	/// the job has already finished, including a job cancelled and re-polled
	/// after the fact — cancelling an already-flipped job is a no-op that
	/// returns an already-completed future.
	pub async fn await_completion(&self) {
		let mut rx = self.done_rx.clone();
		if *rx.borrow() {
			return;
		}
		let _ = rx.changed().await;
	}
}

/// Enforces at-most-one-populator-per-descriptor: rejects a second job for
/// a descriptor already present in the concurrent map.
#[derive(Default)]
pub struct PopulationRegistry {
	running: DashMap<IndexDescriptor, ()>,
}

impl PopulationRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Spawns a populator thread for `descriptor`, or returns
	/// `AlreadyIndexed` if one is already running for it.
	#[allow(clippy::too_many_arguments)]
	pub fn spawn(
		self: &Arc<Self>,
		descriptor: IndexDescriptor,
		proxy: Arc<FlippableProxy>,
		queue: Arc<UpdateQueue>,
		mut writer: Box<dyn IndexWriter>,
		scan: Arc<dyn StoreScan>,
		schema_cache: Arc<dyn SchemaStateCache>,
		metrics: Arc<PopulationMetrics>,
	) -> Result<PopulationJobHandle, Error> {
		match self.running.entry(descriptor) {
			dashmap::mapref::entry::Entry::Occupied(_) => {
				return Err(Error::AlreadyIndexed {
					label: descriptor.label_id,
					property: descriptor.property_key_id,
				});
			},
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(());
			},
		}

		let cancelled = Arc::new(AtomicBool::new(false));
		let (done_tx, done_rx) = watch::channel(false);
		let failure = Arc::new(Mutex::new(None));

		let handle = PopulationJobHandle {
			descriptor,
			cancelled: cancelled.clone(),
			scan_stop: scan.clone(),
			done_rx,
			failure: failure.clone(),
		};

		let registry = self.clone();
		let thread_cancelled = cancelled;

		thread::Builder::new()
			.name(format!("{}{descriptor}", cnf::POPULATOR_THREAD_PREFIX))
			.spawn(move || {
				run(
					descriptor,
					proxy,
					queue,
					writer.as_mut(),
					scan.as_ref(),
					schema_cache.as_ref(),
					metrics.as_ref(),
					&thread_cancelled,
					&failure,
				);
				registry.running.remove(&descriptor);
				let _ = done_tx.send(true);
			})
			.expect("spawning the populator thread must not fail under normal operation");

		Ok(handle)
	}
}

struct ScanDrainVisitor<'a> {
	writer: &'a mut dyn IndexWriter,
	queue: &'a UpdateQueue,
}

impl ScanVisitor for ScanDrainVisitor<'_> {
	fn visit(&mut self, entry: ScannedEntry) -> Result<(), Error> {
		self.writer.add(entry.node_id, &entry.value)?;

		// Bounded by cnf::SCAN_DRAIN_CHUNK_SIZE so one densely-updated node
		// can't hold up the scan indefinitely; anything past the chunk limit
		// is picked up by a later node's drain or the terminal drain at flip.
		let limit = *cnf::SCAN_DRAIN_CHUNK_SIZE;
		let mut taken = 0usize;
		let caught_up = self.queue.drain_while(|update| {
			if taken >= limit || update.node_id > entry.node_id {
				return false;
			}
			taken += 1;
			true
		});
		if !caught_up.is_empty() {
			self.writer.update(&caught_up)?;
		}
		Ok(())
	}
}

/// The populator thread's body, running entirely under the name
/// `thread::Builder` gave this thread at spawn time. Each job
/// gets a dedicated, single-use OS thread rather than a pooled one, so there
/// is no prior name to save and restore — the populate-prefixed name is the
/// only name this thread ever has, and it goes away with the thread when
/// `run` returns.
///
/// Runs create → scan → (cancellation check) → flip, and always releases
/// the done-latch on the way out via the caller.
#[allow(clippy::too_many_arguments)]
fn run(
	descriptor: IndexDescriptor,
	proxy: Arc<FlippableProxy>,
	queue: Arc<UpdateQueue>,
	writer: &mut dyn IndexWriter,
	scan: &dyn StoreScan,
	schema_cache: &dyn SchemaStateCache,
	metrics: &PopulationMetrics,
	cancelled: &AtomicBool,
	failure_slot: &Mutex<Option<Error>>,
) {
	metrics.record_started(descriptor);
	tracing::info!(index = %descriptor, "index population starting");

	let setup: Result<(), FailureCause> = (|| {
		writer.create().map_err(|e| FailureCause::from_error(&e))?;
		let mut visitor = ScanDrainVisitor { writer, queue: &queue };
		scan.run(&mut visitor).map_err(|e| FailureCause::from_error(&e))?;
		Ok(())
	})();

	if let Err(cause) = setup {
		fail(descriptor, &proxy, writer, cause, metrics, failure_slot);
		return;
	}

	if cancelled.load(Ordering::Acquire) {
		metrics.record_cancelled(descriptor);
		tracing::info!(index = %descriptor, "population cancelled before flip; index remains POPULATING");
		return;
	}

	let queue_depth_at_flip = std::cell::Cell::new(0usize);
	let flip_result = proxy.flip(
		|| {
			let remaining = queue.drain_all();
			queue_depth_at_flip.set(remaining.len());
			let commit = if remaining.is_empty() {
				Ok(())
			} else {
				writer.update(&remaining)
			};
			match commit {
				Ok(()) => {
					writer.close(true).map_err(|e| FailureCause::from_error(&e))?;
					schema_cache.clear();
					Ok(())
				},
				Err(e) => {
					let _ = writer.close(false);
					Err(FailureCause::from_error(&e))
				},
			}
		},
		|cause| Delegate::Failed(Some(cause.clone())),
	);

	match flip_result {
		Ok(()) => metrics.record_flipped_online(descriptor, queue_depth_at_flip.get()),
		Err(cause) => {
			let _ = writer.mark_failed(&cause);
			metrics.record_failed(descriptor);
			let err = Error::IndexPopulationFailed(cause);
			if err.is_quiet() {
				tracing::debug!(index = %descriptor, cause = %err, "index population failed at flip");
			} else {
				tracing::error!(index = %descriptor, cause = %err, "index population failed at flip");
			}
			*failure_slot.lock() = Some(err);
		},
	}
}

/// The failure path: preemptively flip to a cause-less failed
/// delegate so committers stop enqueueing into a populating delegate that
/// will never drain, then do the (possibly slow) writer teardown, then
/// refine the delegate with the now-known cause.
fn fail(
	descriptor: IndexDescriptor,
	proxy: &FlippableProxy,
	writer: &mut dyn IndexWriter,
	cause: FailureCause,
	metrics: &PopulationMetrics,
	failure_slot: &Mutex<Option<Error>>,
) {
	proxy.flip_to(Delegate::Failed(None));

	let _ = writer.mark_failed(&cause);
	let _ = writer.close(false);

	proxy.flip_to(Delegate::Failed(Some(cause.clone())));
	metrics.record_failed(descriptor);

	let err = Error::IndexPopulationFailed(cause);
	if err.is_quiet() {
		tracing::debug!(index = %descriptor, cause = %err, "index population failed on a uniqueness conflict");
	} else {
		tracing::error!(index = %descriptor, cause = %err, "index population failed");
	}
	*failure_slot.lock() = Some(err);
}
