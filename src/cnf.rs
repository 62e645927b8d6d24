//! Tunables read once at startup. Mirrors the shape of the values a host
//! would wire in from its own configuration layer; this module only owns
//! sane defaults and the seam to override them via environment variables.

use std::env;

use once_cell::sync::Lazy;

fn env_usize(key: &str, default: usize) -> usize {
	env::var(key)
		.ok()
		.and_then(|v| v.parse().ok())
		.unwrap_or(default)
}

/// Maximum number of updates considered per `drain_while` call during the
/// scan-time opportunistic drain. Bounds how long a single scanned node's
/// drain can hold up the populator thread.
pub static SCAN_DRAIN_CHUNK_SIZE: Lazy<usize> = Lazy::new(|| env_usize("INDEX_SCAN_DRAIN_CHUNK_SIZE", 256));

/// Batch size used by `RecoveryCoordinator` when sweeping persisted index
/// rules at startup.
pub static RECOVERY_SWEEP_BATCH_SIZE: Lazy<usize> = Lazy::new(|| env_usize("INDEX_RECOVERY_SWEEP_BATCH_SIZE", 64));

/// Prefix used when renaming the populator thread for observability.
pub const POPULATOR_THREAD_PREFIX: &str = "index-populate-";
