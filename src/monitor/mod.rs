//! Lifecycle controller
//!
//! A [`Monitor`] owns at most one background worker at a time. Every method
//! takes `&self`, so a monitor can be shared between threads behind an `Arc`.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──start()──→ Running ──stop()──→ Stopping ──→ Idle
//!   ↑                  │
//!   └─ start() fails   └─ start() → AlreadyRunning
//! ```
//!
//! `stop()` blocks the calling thread for at most the configured stop
//! timeout. A worker that does not confirm exit within that window is torn
//! down anyway and `ThreadTerminationFailed` is recorded. A consumer still
//! running at that point is detached, not waited for.

mod state;
mod worker;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

pub use state::RunState;

use crate::callback::Consumer;
use crate::collectors::{Collector, SystemCollector};
use crate::config::{MonitorConfig, is_valid_interval};
use crate::document::{DocumentSerializer, JsonSerializer};
use crate::error::{ErrorCode, MonitorError, MonitorResult};
use crate::util::lock;
use state::Shared;
use worker::WorkerHandle;

pub struct Monitor {
    shared: Arc<Shared>,
    /// Lifecycle lock; `Some` while a worker exists
    session: Mutex<Option<WorkerHandle>>,
    collector: Arc<dyn Collector>,
    serializer: Arc<dyn DocumentSerializer>,
    stop_timeout: Duration,
}

impl Monitor {
    /// Creates a monitor for the local host.
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(SystemCollector::new()),
            Arc::new(JsonSerializer::new(config.document.clone())),
        )
    }

    pub fn with_collaborators(
        config: &MonitorConfig,
        collector: Arc<dyn Collector>,
        serializer: Arc<dyn DocumentSerializer>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(config.interval_ms)),
            session: Mutex::new(None),
            collector,
            serializer,
            stop_timeout: config.stop_timeout(),
        }
    }

    /// Starts the background worker, cycling every `interval_ms`.
    #[instrument(skip(self))]
    pub fn start(&self, interval_ms: i32) -> MonitorResult<()> {
        let result = self.try_start(interval_ms);
        if let Err(e) = &result {
            warn!(error = %e, "failed to start monitoring");
            self.shared.errors.set(e.code());
        }
        result
    }

    fn try_start(&self, interval_ms: i32) -> MonitorResult<()> {
        let mut session = lock(&self.session);
        if session.is_some() || self.shared.run_state() != RunState::Idle {
            return Err(MonitorError::AlreadyRunning);
        }
        if !is_valid_interval(interval_ms) {
            return Err(MonitorError::InvalidInterval(interval_ms));
        }

        self.shared.errors.clear();
        self.shared.reset_session();
        self.shared.set_interval_ms(interval_ms);

        let handle = WorkerHandle::spawn(
            self.shared.clone(),
            self.collector.clone(),
            self.serializer.clone(),
        )
        .map_err(MonitorError::ThreadCreation)?;

        self.shared.mark_started();
        self.shared.set_run_state(RunState::Running);
        *session = Some(handle);

        info!(interval_ms, "monitoring started");
        Ok(())
    }

    /// Stops the worker and resets the session. A no-op while idle.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let handle = {
            let mut session = lock(&self.session);
            let Some(handle) = session.take() else {
                return;
            };
            self.shared.set_run_state(RunState::Stopping);
            handle
        };

        debug!(timeout = ?self.stop_timeout, "waiting for worker to exit");
        if let Err(code) = handle.shutdown(self.stop_timeout) {
            warn!(%code, "worker did not exit cleanly, forced termination");
            self.shared.errors.set(code);
        }

        self.shared.reset_session();
        self.shared.callbacks.detach();
        self.shared.set_run_state(RunState::Idle);
        info!("monitoring stopped");
    }

    /// Changes the sleep between cycles, effective from the next sleep.
    pub fn set_interval(&self, interval_ms: i32) -> MonitorResult<()> {
        if !is_valid_interval(interval_ms) {
            let e = MonitorError::InvalidInterval(interval_ms);
            warn!(error = %e, "rejected interval change");
            self.shared.errors.set(e.code());
            return Err(e);
        }

        self.shared.set_interval_ms(interval_ms);
        debug!(interval_ms, "interval updated");
        Ok(())
    }

    /// Wakes the worker to run its next cycle without waiting out the interval.
    pub fn trigger_now(&self) -> MonitorResult<()> {
        let session = lock(&self.session);
        let Some(handle) = session.as_ref() else {
            self.shared.errors.set(ErrorCode::NotRunning);
            return Err(MonitorError::NotRunning);
        };
        handle.wake();
        Ok(())
    }

    /// Installs `consumer` as the document consumer, replacing any previous one.
    pub fn set_callback(&self, consumer: impl Consumer + 'static) {
        self.set_consumer(Some(Arc::new(consumer)));
    }

    /// Replaces the consumer. `None` detaches it.
    pub fn set_consumer(&self, consumer: Option<Arc<dyn Consumer>>) {
        self.shared.callbacks.replace(consumer, &self.shared.errors);
    }

    pub fn clear_callback(&self) {
        self.set_consumer(None);
    }

    pub fn is_running(&self) -> bool {
        self.shared.run_state() != RunState::Idle
    }

    pub fn run_state(&self) -> RunState {
        self.shared.run_state()
    }

    pub fn last_error(&self) -> ErrorCode {
        self.shared.errors.get()
    }

    /// Time since the current session started; zero unless running.
    pub fn uptime(&self) -> Duration {
        self.shared.uptime()
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval()
    }

    /// Cycles completed in the current session.
    pub fn cycle_count(&self) -> u64 {
        self.shared.cycles()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.shared.last_update()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("state", &self.run_state())
            .field("interval", &self.interval())
            .field("last_error", &self.last_error())
            .finish()
    }
}
