pub mod callback;
pub mod collectors;
pub mod config;
pub mod document;
pub mod error;
pub mod monitor;
pub mod snapshot;
pub mod util;

pub use callback::{CallbackRegistry, Consumer, FnConsumer};
pub use collectors::{CollectError, Collector, SystemCollector};
pub use config::{
    DEFAULT_UPDATE_INTERVAL_MS, DocumentConfig, MAX_THREAD_WAIT_MS, MAX_UPDATE_INTERVAL_MS,
    MIN_UPDATE_INTERVAL_MS, MonitorConfig,
};
pub use document::{DocumentSerializer, JsonSerializer, SerializeError};
pub use error::{ErrorCode, MonitorError, MonitorResult};
pub use monitor::{Monitor, RunState};
pub use snapshot::{Domain, DynamicSnapshot, StaticSnapshot};
