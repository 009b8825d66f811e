//! Monitoring worker
//!
//! Each session runs one worker task on its own single-threaded runtime.
//! Collector, serializer and consumer calls are moved to the runtime's
//! blocking pool so the task stays abortable while they run.
//!
//! ## Cycle
//!
//! ```text
//! cancelled? → static snapshot (once) → dynamic snapshot → serialize → consumer
//!     ↑                                                                   │
//!     └──── sleep(interval) / wake / cancel ←── finish cycle ←────────────┘
//! ```
//!
//! A failing stage records its error code and skips the rest of the cycle.
//! Nothing a collaborator does ends the loop; only cancellation does.

use std::io;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::{Notify, watch};
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, instrument, trace, warn};

use super::state::Shared;
use crate::collectors::Collector;
use crate::document::DocumentSerializer;
use crate::error::ErrorCode;
use crate::snapshot::{DynamicSnapshot, StaticSnapshot};

struct Worker {
    shared: Arc<Shared>,
    collector: Arc<dyn Collector>,
    serializer: Arc<dyn DocumentSerializer>,
    cancel: watch::Receiver<bool>,
    wake: Arc<Notify>,
}

impl Worker {
    #[instrument(skip_all, name = "telemetry_worker")]
    async fn run(mut self, exited: mpsc::Sender<()>) {
        debug!("starting monitoring worker");

        loop {
            if *self.cancel.borrow_and_update() {
                break;
            }

            self.run_cycle().await;
            self.shared.finish_cycle();

            let interval = self.shared.interval();
            trace!(cycle = self.shared.cycles(), ?interval, "cycle finished");

            tokio::select! {
                _ = self.cancel.changed() => break,
                _ = self.wake.notified() => trace!("woken for an immediate cycle"),
                _ = tokio::time::sleep(interval) => {}
            }
        }

        debug!("monitoring worker stopped");
        let _ = exited.send(());
    }

    async fn run_cycle(&self) {
        let Some(static_snapshot) = self.static_snapshot().await else {
            return;
        };

        let Some(dynamic_snapshot) = self.dynamic_snapshot().await else {
            return;
        };

        self.shared.store_dynamic(dynamic_snapshot);
        if !*self.cancel.borrow() {
            if let Some(dynamic_snapshot) = self.shared.current_dynamic() {
                self.emit(static_snapshot, dynamic_snapshot).await;
            }
        }
        self.shared.discard_dynamic();
    }

    /// Returns the cached static snapshot, collecting it first if needed.
    async fn static_snapshot(&self) -> Option<Arc<StaticSnapshot>> {
        if let Some(cached) = self.shared.cached_static() {
            return Some(cached);
        }

        let collector = self.collector.clone();
        match spawn_blocking(move || collector.collect_static()).await {
            Ok(Ok(snapshot)) if snapshot.is_complete() => {
                debug!("static snapshot established");
                let snapshot = Arc::new(snapshot);
                self.shared.cache_static(snapshot.clone());
                Some(snapshot)
            }
            Ok(Ok(snapshot)) => {
                warn!(missing = ?snapshot.missing(), "static snapshot incomplete");
                self.shared.errors.set(ErrorCode::DataCollectionFailed);
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "static collection failed");
                self.shared.errors.set(ErrorCode::DataCollectionFailed);
                None
            }
            Err(e) => {
                warn!(error = %e, "static collector panicked");
                self.shared.errors.set(ErrorCode::DataCollectionFailed);
                None
            }
        }
    }

    async fn dynamic_snapshot(&self) -> Option<Arc<DynamicSnapshot>> {
        let collector = self.collector.clone();
        match spawn_blocking(move || collector.collect_dynamic()).await {
            Ok(Ok(snapshot)) if snapshot.is_essential_complete() => Some(Arc::new(snapshot)),
            Ok(Ok(snapshot)) => {
                warn!(missing = ?snapshot.missing(), "dynamic snapshot incomplete");
                self.shared.errors.set(ErrorCode::DataCollectionFailed);
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "dynamic collection failed");
                self.shared.errors.set(ErrorCode::DataCollectionFailed);
                None
            }
            Err(e) => {
                warn!(error = %e, "dynamic collector panicked");
                self.shared.errors.set(ErrorCode::DataCollectionFailed);
                None
            }
        }
    }

    async fn emit(
        &self,
        static_snapshot: Arc<StaticSnapshot>,
        dynamic_snapshot: Arc<DynamicSnapshot>,
    ) {
        let serializer = self.serializer.clone();
        let serialized =
            spawn_blocking(move || serializer.serialize(&static_snapshot, &dynamic_snapshot)).await;

        let document = match serialized {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                warn!(error = %e, "serialization failed");
                self.shared.errors.set(ErrorCode::JsonGenerationFailed);
                return;
            }
            Err(e) => {
                warn!(error = %e, "serializer panicked");
                self.shared.errors.set(ErrorCode::JsonGenerationFailed);
                return;
            }
        };

        let shared = self.shared.clone();
        match spawn_blocking(move || shared.callbacks.invoke(&document, &shared.errors)).await {
            Ok(ErrorCode::Success) => trace!("document delivered"),
            Ok(code) => debug!(%code, "document not delivered"),
            Err(e) => {
                warn!(error = %e, "consumer invocation aborted");
                self.shared.errors.set(ErrorCode::CallbackExecutionFailed);
            }
        }
    }
}

/// Handle for one running worker
///
/// Owns the session runtime, the cancellation signal and the exit
/// confirmation channel.
pub(crate) struct WorkerHandle {
    runtime: Runtime,
    task: JoinHandle<()>,
    cancel: watch::Sender<bool>,
    wake: Arc<Notify>,
    exited: mpsc::Receiver<()>,
}

impl WorkerHandle {
    pub fn spawn(
        shared: Arc<Shared>,
        collector: Arc<dyn Collector>,
        serializer: Arc<dyn DocumentSerializer>,
    ) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("telemetry-worker")
            .enable_time()
            .build()?;

        let (cancel, cancel_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());
        let (exited_tx, exited) = mpsc::channel();

        let worker = Worker {
            shared,
            collector,
            serializer,
            cancel: cancel_rx,
            wake: wake.clone(),
        };
        let task = runtime.spawn(worker.run(exited_tx));

        Ok(Self {
            runtime,
            task,
            cancel,
            wake,
            exited,
        })
    }

    /// Cuts the current sleep short.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Cancels the worker and waits up to `timeout` for it to confirm exit.
    ///
    /// The task and its runtime are torn down either way; a blocking call
    /// still in flight is detached and its result dropped.
    pub fn shutdown(self, timeout: Duration) -> Result<(), ErrorCode> {
        let _ = self.cancel.send(true);

        let outcome = match self.exited.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ErrorCode::ThreadTerminationFailed),
            // worker task ended without confirming, i.e. it panicked
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ErrorCode::SystemResourceError),
        };

        self.task.abort();
        self.runtime.shutdown_background();
        outcome
    }
}
