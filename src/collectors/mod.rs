//! Collector collaborators
//!
//! A [`Collector`] turns host state into snapshots. The monitor only needs an
//! aggregate verdict per call; per-domain gaps are expressed as `None` fields
//! on the returned snapshot and checked by the worker.

pub mod system;

use crate::snapshot::{Domain, DynamicSnapshot, StaticSnapshot};

pub use system::SystemCollector;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("{domain} information unavailable: {reason}")]
    Unavailable { domain: Domain, reason: String },

    #[error("failed to read {domain} information")]
    Io {
        domain: Domain,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot is missing {0:?}")]
    Incomplete(Vec<Domain>),
}

/// Source of host snapshots
///
/// Implementations are called from a blocking thread of the monitor worker,
/// one call at a time per monitor. They must not rely on being called on any
/// particular thread.
pub trait Collector: Send + Sync {
    /// Hardware facts that stay constant while the process runs.
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError>;

    /// Volatile counters, refreshed every cycle.
    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError>;
}
