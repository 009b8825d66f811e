//! State shared between the controller and its worker
//!
//! Each concern has its own lock or atomic, so a slow consumer never delays
//! an error read and a collection never holds the snapshot lock.

use std::sync::atomic::{AtomicI32, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::callback::CallbackRegistry;
use crate::error::ErrorState;
use crate::snapshot::{DynamicSnapshot, StaticSnapshot};
use crate::util::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RunState::Running,
            2 => RunState::Stopping,
            _ => RunState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunState::Idle => 0,
            RunState::Running => 1,
            RunState::Stopping => 2,
        }
    }
}

/// Snapshots produced by the worker during a session
///
/// The static snapshot lives for the whole session. The dynamic snapshot is
/// owned by the slot for one cycle: stored after collection, read back for
/// emission and discarded before the worker sleeps.
#[derive(Debug, Default)]
pub(crate) struct SnapshotSlot {
    pub static_snapshot: Option<Arc<StaticSnapshot>>,
    pub dynamic_snapshot: Option<Arc<DynamicSnapshot>>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    state: AtomicU8,
    interval_ms: AtomicI32,
    cycles: AtomicU64,
    pub errors: ErrorState,
    pub callbacks: CallbackRegistry,
    snapshots: Mutex<SnapshotSlot>,
    started_at: Mutex<Option<Instant>>,
    last_update: Mutex<Option<DateTime<Utc>>>,
}

impl Shared {
    pub fn new(interval_ms: i32) -> Self {
        Self {
            state: AtomicU8::new(RunState::Idle.as_u8()),
            interval_ms: AtomicI32::new(interval_ms),
            cycles: AtomicU64::new(0),
            errors: ErrorState::default(),
            callbacks: CallbackRegistry::default(),
            snapshots: Mutex::new(SnapshotSlot::default()),
            started_at: Mutex::new(None),
            last_update: Mutex::new(None),
        }
    }

    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_run_state(&self, state: RunState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub fn interval_ms(&self) -> i32 {
        self.interval_ms.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.interval_ms()).unwrap_or_default())
    }

    pub fn set_interval_ms(&self, interval_ms: i32) {
        self.interval_ms.store(interval_ms, Ordering::SeqCst);
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_update)
    }

    pub fn mark_started(&self) {
        *lock(&self.started_at) = Some(Instant::now());
    }

    pub fn uptime(&self) -> Duration {
        if self.run_state() != RunState::Running {
            return Duration::ZERO;
        }
        let started_at = *lock(&self.started_at);
        started_at
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    pub fn cached_static(&self) -> Option<Arc<StaticSnapshot>> {
        lock(&self.snapshots).static_snapshot.clone()
    }

    pub fn cache_static(&self, snapshot: Arc<StaticSnapshot>) {
        lock(&self.snapshots).static_snapshot = Some(snapshot);
    }

    pub fn store_dynamic(&self, snapshot: Arc<DynamicSnapshot>) {
        lock(&self.snapshots).dynamic_snapshot = Some(snapshot);
    }

    pub fn current_dynamic(&self) -> Option<Arc<DynamicSnapshot>> {
        lock(&self.snapshots).dynamic_snapshot.clone()
    }

    pub fn discard_dynamic(&self) {
        lock(&self.snapshots).dynamic_snapshot = None;
    }

    /// Ends a cycle: bumps the counter and stamps the update time.
    pub fn finish_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_update) = Some(Utc::now());
    }

    /// Drops snapshots, counters and timestamps of the previous session.
    pub fn reset_session(&self) {
        *lock(&self.snapshots) = SnapshotSlot::default();
        self.cycles.store(0, Ordering::SeqCst);
        *lock(&self.started_at) = None;
        *lock(&self.last_update) = None;
    }
}
