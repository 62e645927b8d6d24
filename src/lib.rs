//! Online schema-index population and index-proxy lifecycle for a
//! property-graph kernel.
//!
//! Builds an index from existing data while the store keeps accepting
//! writes, then atomically flips it online without losing an update or
//! blocking a committer for longer than the flip itself takes.

#[macro_use]
extern crate tracing;

pub mod cnf;
pub mod descriptor;
pub mod err;
pub mod metrics;
pub mod population;
pub mod proxy;
pub mod queue;
pub mod recovery;
pub mod scan;
pub mod schema;
pub mod state;
pub mod update;
pub mod writer;

pub use descriptor::IndexDescriptor;
pub use err::{Error, FailureCause, Result};
pub use population::{PopulationJobHandle, PopulationRegistry, SchemaStateCache};
pub use proxy::{Delegate, FlippableProxy};
pub use queue::UpdateQueue;
pub use recovery::RecoveryCoordinator;
pub use state::IndexState;
pub use update::{NodePropertyUpdate, UpdateKind};
