//! Error types and the last-error register
//!
//! The monitor reports failures two ways:
//!
//! 1. **Result returns** - caller-driven operations (`start`, `set_interval`,
//!    `trigger_now`) return a [`MonitorError`] immediately.
//! 2. **Polling** - everything the worker absorbs in the background (collection,
//!    serialization, consumer failures) is only visible through the
//!    [`ErrorState`] register, read with `Monitor::last_error`.
//!
//! The register holds a single [`ErrorCode`]. It has no history and no
//! subscription; each failing stage overwrites it.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

use crate::config::{MAX_UPDATE_INTERVAL_MS, MIN_UPDATE_INTERVAL_MS};
use crate::util::lock;

/// Result type alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Flat error taxonomy of the monitoring core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[default]
    Success,
    InvalidParameter,
    InvalidInterval,
    AlreadyRunning,
    NotRunning,
    ThreadCreationFailed,
    ThreadTerminationFailed,
    SystemResourceError,
    DataCollectionFailed,
    JsonGenerationFailed,
    CallbackFailed,
    CallbackExecutionFailed,
    UnknownError,
}

impl ErrorCode {
    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }

    /// Whether the code was produced by a misbehaving consumer.
    pub fn is_callback_failure(self) -> bool {
        matches!(
            self,
            ErrorCode::CallbackFailed | ErrorCode::CallbackExecutionFailed
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::InvalidParameter => "Invalid parameter",
            ErrorCode::InvalidInterval => "Invalid interval",
            ErrorCode::AlreadyRunning => "Monitoring already running",
            ErrorCode::NotRunning => "Monitoring not running",
            ErrorCode::ThreadCreationFailed => "Thread creation failed",
            ErrorCode::ThreadTerminationFailed => "Thread termination failed",
            ErrorCode::SystemResourceError => "System resource error",
            ErrorCode::DataCollectionFailed => "Data collection failed",
            ErrorCode::JsonGenerationFailed => "JSON generation failed",
            ErrorCode::CallbackFailed => "Callback failed",
            ErrorCode::CallbackExecutionFailed => "Callback execution failed",
            ErrorCode::UnknownError => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors returned synchronously by the lifecycle controller
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitoring already running")]
    AlreadyRunning,

    #[error("monitoring not running")]
    NotRunning,

    #[error(
        "invalid update interval: {0}ms (expected {min}..={max})",
        min = MIN_UPDATE_INTERVAL_MS,
        max = MAX_UPDATE_INTERVAL_MS
    )]
    InvalidInterval(i32),

    #[error("failed to spawn monitoring worker: {0}")]
    ThreadCreation(#[source] std::io::Error),
}

impl MonitorError {
    /// The code recorded in the [`ErrorState`] for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MonitorError::AlreadyRunning => ErrorCode::AlreadyRunning,
            MonitorError::NotRunning => ErrorCode::NotRunning,
            MonitorError::InvalidInterval(_) => ErrorCode::InvalidInterval,
            MonitorError::ThreadCreation(_) => ErrorCode::ThreadCreationFailed,
        }
    }
}

/// Last-error register
///
/// Guarded by its own lock so a slow consumer or collection never delays
/// error reads.
#[derive(Debug, Default)]
pub struct ErrorState {
    code: Mutex<ErrorCode>,
}

impl ErrorState {
    pub fn set(&self, code: ErrorCode) {
        *lock(&self.code) = code;
    }

    pub fn get(&self) -> ErrorCode {
        *lock(&self.code)
    }

    pub fn clear(&self) {
        self.set(ErrorCode::Success);
    }

    /// Resets the register to `Success` if the current code matches `predicate`.
    ///
    /// Returns whether the register was cleared.
    pub fn clear_if(&self, predicate: impl FnOnce(ErrorCode) -> bool) -> bool {
        let mut code = lock(&self.code);
        if predicate(*code) {
            *code = ErrorCode::Success;
            return true;
        }
        false
    }
}
