use std::sync::{Mutex, MutexGuard, PoisonError};

pub const TELEMETRY_INTERVAL_MS: &str = "TELEMETRY_INTERVAL_MS";

pub const TELEMETRY_STOP_TIMEOUT_MS: &str = "TELEMETRY_STOP_TIMEOUT_MS";

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Every value guarded in this crate stays valid even if an update was cut
/// short, so poisoning carries no information worth propagating.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
