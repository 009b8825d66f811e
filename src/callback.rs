//! Consumer callbacks
//!
//! A [`Consumer`] receives every emitted document. Any
//! `Fn(&str) -> anyhow::Result<()>` closure is a consumer; plain function
//! pointers without a result are wrapped with [`FnConsumer`].
//!
//! The [`CallbackRegistry`] holds at most one consumer. Invocation and
//! replacement take the same lock, so a consumer is never swapped out while
//! it is running and never runs twice at once. Detaching does not take that
//! lock: it moves the registry to a new epoch and a consumer installed under
//! an older epoch is dropped the next time the lock is held.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

use tracing::{debug, trace, warn};

use crate::error::{ErrorCode, ErrorState};
use crate::util::lock;

pub trait Consumer: Send + Sync {
    fn deliver(&self, document: &str) -> anyhow::Result<()>;
}

impl<F> Consumer for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    fn deliver(&self, document: &str) -> anyhow::Result<()> {
        self(document)
    }
}

/// Adapter for plain function pointers that cannot report failure
#[derive(Clone, Copy)]
pub struct FnConsumer(pub fn(&str));

impl Consumer for FnConsumer {
    fn deliver(&self, document: &str) -> anyhow::Result<()> {
        (self.0)(document);
        Ok(())
    }
}

impl fmt::Debug for FnConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnConsumer").finish()
    }
}

#[derive(Default)]
struct Slot {
    consumer: Option<Arc<dyn Consumer>>,
    /// Registry epoch the consumer was installed under
    epoch: u64,
}

impl Slot {
    fn drop_if_stale(&mut self, epoch: u64) {
        if self.epoch != epoch && self.consumer.take().is_some() {
            trace!("dropped detached consumer");
        }
    }
}

#[derive(Default)]
pub struct CallbackRegistry {
    slot: Mutex<Slot>,
    epoch: AtomicU64,
}

impl CallbackRegistry {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Replaces the stored consumer.
    ///
    /// Waits for a delivery in progress. Installing a consumer clears a
    /// callback failure left by its predecessor.
    pub fn replace(&self, consumer: Option<Arc<dyn Consumer>>, errors: &ErrorState) {
        let installing = consumer.is_some();
        {
            let mut slot = lock(&self.slot);
            slot.consumer = consumer;
            slot.epoch = self.epoch();
        }

        if installing && errors.clear_if(ErrorCode::is_callback_failure) {
            trace!("cleared previous callback failure");
        }
    }

    /// Detaches the consumer without waiting for a delivery in progress.
    ///
    /// A consumer that is still running is dropped as soon as it returns and
    /// its outcome is not recorded.
    pub fn detach(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        match self.slot.try_lock() {
            Ok(mut slot) => slot.drop_if_stale(epoch),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().drop_if_stale(epoch),
            Err(TryLockError::WouldBlock) => debug!("consumer busy, detaching once it returns"),
        }
    }

    pub fn is_set(&self) -> bool {
        let slot = lock(&self.slot);
        slot.consumer.is_some() && slot.epoch == self.epoch()
    }

    /// Delivers `document` to the stored consumer.
    ///
    /// Errors and panics raised by the consumer are contained here and
    /// recorded in `errors` as [`ErrorCode::CallbackExecutionFailed`] before
    /// the registry lock is released, so a concurrent [`replace`] always
    /// observes the outcome. Without a consumer this is a successful no-op,
    /// and so is a delivery whose consumer was detached while it ran.
    ///
    /// [`replace`]: CallbackRegistry::replace
    pub fn invoke(&self, document: &str, errors: &ErrorState) -> ErrorCode {
        if document.is_empty() {
            errors.set(ErrorCode::InvalidParameter);
            return ErrorCode::InvalidParameter;
        }

        let mut slot = lock(&self.slot);
        let epoch = self.epoch();
        slot.drop_if_stale(epoch);
        let Some(consumer) = slot.consumer.clone() else {
            return ErrorCode::Success;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| consumer.deliver(document)));
        if self.epoch() != epoch {
            slot.drop_if_stale(self.epoch());
            return ErrorCode::Success;
        }

        let code = match outcome {
            Ok(Ok(())) => return ErrorCode::Success,
            Ok(Err(e)) => {
                warn!(error = %e, "consumer rejected document");
                ErrorCode::CallbackExecutionFailed
            }
            Err(_) => {
                warn!("consumer panicked");
                ErrorCode::CallbackExecutionFailed
            }
        };
        errors.set(code);
        code
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("is_set", &self.is_set())
            .finish()
    }
}
