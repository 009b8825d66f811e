//! Test doubles for the monitor's collaborators

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use host_telemetry::{
    CollectError, Collector, Consumer, Domain, DynamicSnapshot, JsonSerializer, Monitor,
    MonitorConfig, SerializeError, StaticSnapshot,
    document::DocumentSerializer,
    snapshot::{
        AdapterKind, AudioDevice, BatteryInformation, CpuInformation, DiskInformation,
        GpuInformation, MemoryInformation, MotherboardInformation, NetworkAdapter,
    },
};

pub const GB: u64 = 1024 * 1024 * 1024;

/// Create a complete static snapshot with deterministic values
pub fn create_test_static_snapshot() -> StaticSnapshot {
    StaticSnapshot {
        cpus: Some(vec![CpuInformation {
            name: "Test CPU".to_string(),
            cores: 4,
            threads: 8,
            clock_speed: 3200,
        }]),
        gpus: Some(vec![GpuInformation {
            name: "Test GPU".to_string(),
            dedicated_memory_bytes: 4 * GB,
            shared_memory_bytes: 0,
            integrated: true,
        }]),
        motherboard: Some(MotherboardInformation {
            manufacturer: "Test Inc.".to_string(),
            product: "TB-1".to_string(),
            serial_number: "0001".to_string(),
            bios_version: "1.0".to_string(),
            bios_serial: "0002".to_string(),
            system_sku: "SKU-1".to_string(),
        }),
        audio: Some(vec![AudioDevice {
            name: "Test Audio".to_string(),
            manufacturer: "Test Inc.".to_string(),
        }]),
        monitors: Some(vec![]),
    }
}

/// Create a fully populated dynamic snapshot
pub fn create_test_dynamic_snapshot() -> DynamicSnapshot {
    DynamicSnapshot {
        memory: Some(MemoryInformation {
            total_bytes: 8 * GB,
            available_bytes: 2 * GB,
            used_bytes: 6 * GB,
            ram_slots: vec![],
        }),
        storage: Some(vec![DiskInformation {
            drive: "/".to_string(),
            kind: "SSD".to_string(),
            model: "/dev/nvme0n1".to_string(),
            interface: "NVMe".to_string(),
            total_bytes: 100 * GB,
            available_bytes: 40 * GB,
        }]),
        network: Some(vec![NetworkAdapter {
            name: "eth0".to_string(),
            mac_address: "02:00:00:00:00:01".to_string(),
            ip_address: "192.168.1.10".to_string(),
            status: "Connected".to_string(),
            kind: AdapterKind::Ethernet,
        }]),
        battery: Some(BatteryInformation::desktop()),
    }
}

/// Collector returning deterministic data immediately
#[derive(Default)]
pub struct FakeCollector {
    pub static_calls: AtomicUsize,
    pub dynamic_calls: AtomicUsize,
}

impl Collector for FakeCollector {
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError> {
        self.static_calls.fetch_add(1, Ordering::SeqCst);
        Ok(create_test_static_snapshot())
    }

    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError> {
        self.dynamic_calls.fetch_add(1, Ordering::SeqCst);
        Ok(create_test_dynamic_snapshot())
    }
}

/// Collector whose dynamic collection fails until `recovered` is set
#[derive(Default)]
pub struct FailingDynamicCollector {
    pub dynamic_calls: AtomicUsize,
    pub recovered: AtomicBool,
}

impl Collector for FailingDynamicCollector {
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError> {
        Ok(create_test_static_snapshot())
    }

    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError> {
        self.dynamic_calls.fetch_add(1, Ordering::SeqCst);
        if self.recovered.load(Ordering::SeqCst) {
            return Ok(create_test_dynamic_snapshot());
        }
        Err(CollectError::Unavailable {
            domain: Domain::Memory,
            reason: "injected failure".to_string(),
        })
    }
}

/// Collector whose static snapshot misses the motherboard for the first
/// `incomplete_calls` calls
pub struct FlakyStaticCollector {
    pub incomplete_calls: usize,
    pub static_calls: AtomicUsize,
}

impl FlakyStaticCollector {
    pub fn new(incomplete_calls: usize) -> Self {
        Self {
            incomplete_calls,
            static_calls: AtomicUsize::new(0),
        }
    }
}

impl Collector for FlakyStaticCollector {
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError> {
        let call = self.static_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = create_test_static_snapshot();
        if call < self.incomplete_calls {
            snapshot.motherboard = None;
        }
        Ok(snapshot)
    }

    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError> {
        Ok(create_test_dynamic_snapshot())
    }
}

/// Collector whose dynamic snapshot lacks the network domain
pub struct MissingNetworkCollector;

impl Collector for MissingNetworkCollector {
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError> {
        Ok(create_test_static_snapshot())
    }

    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError> {
        let mut snapshot = create_test_dynamic_snapshot();
        snapshot.network = None;
        Ok(snapshot)
    }
}

/// Collector that blocks uninterruptibly inside static collection
pub struct BlockingCollector {
    pub block_for: Duration,
    pub entered: AtomicUsize,
}

impl BlockingCollector {
    pub fn new(block_for: Duration) -> Self {
        Self {
            block_for,
            entered: AtomicUsize::new(0),
        }
    }
}

impl Collector for BlockingCollector {
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.block_for);
        Ok(create_test_static_snapshot())
    }

    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError> {
        Ok(create_test_dynamic_snapshot())
    }
}

/// Collector that panics on every dynamic collection
pub struct PanickingCollector;

impl Collector for PanickingCollector {
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError> {
        Ok(create_test_static_snapshot())
    }

    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError> {
        panic!("collector bug")
    }
}

/// Serializer that always fails
pub struct FailingSerializer;

impl DocumentSerializer for FailingSerializer {
    fn serialize(
        &self,
        _static_snapshot: &StaticSnapshot,
        _dynamic_snapshot: &DynamicSnapshot,
    ) -> Result<String, SerializeError> {
        Err(SerializeError::Incomplete)
    }
}

/// Consumer that records every document with its arrival time
#[derive(Default)]
pub struct RecordingConsumer {
    documents: Mutex<Vec<(Instant, String)>>,
}

impl RecordingConsumer {
    pub fn count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .map(|(_, document)| document.clone())
            .collect()
    }

    pub fn arrivals(&self) -> Vec<Instant> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .map(|(arrival, _)| *arrival)
            .collect()
    }

    pub fn reset(&self) {
        self.documents.lock().unwrap().clear();
    }
}

impl Consumer for RecordingConsumer {
    fn deliver(&self, document: &str) -> anyhow::Result<()> {
        self.documents
            .lock()
            .unwrap()
            .push((Instant::now(), document.to_string()));
        Ok(())
    }
}

/// Consumer that fails on every delivery, either by error or by panic
pub struct FailingConsumer {
    pub panic: bool,
    pub calls: AtomicUsize,
}

impl FailingConsumer {
    pub fn erroring() -> Self {
        Self {
            panic: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Consumer for FailingConsumer {
    fn deliver(&self, _document: &str) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("consumer bug");
        }
        anyhow::bail!("consumer refused document")
    }
}

/// Consumer that blocks for `block_for` on every delivery, then fails
pub struct SlowConsumer {
    pub block_for: Duration,
    pub entered: AtomicUsize,
    pub returned: AtomicUsize,
}

impl SlowConsumer {
    pub fn new(block_for: Duration) -> Self {
        Self {
            block_for,
            entered: AtomicUsize::new(0),
            returned: AtomicUsize::new(0),
        }
    }
}

impl Consumer for SlowConsumer {
    fn deliver(&self, _document: &str) -> anyhow::Result<()> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.block_for);
        self.returned.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("consumer gave up")
    }
}

pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        interval_ms: 100,
        stop_timeout_ms: 2000,
        ..MonitorConfig::default()
    }
}

/// Create a monitor around `collector` with the JSON serializer
pub fn create_test_monitor(collector: Arc<dyn Collector>) -> Monitor {
    create_test_monitor_with_config(&test_config(), collector)
}

pub fn create_test_monitor_with_config(
    config: &MonitorConfig,
    collector: Arc<dyn Collector>,
) -> Monitor {
    Monitor::with_collaborators(
        config,
        collector,
        Arc::new(JsonSerializer::new(config.document.clone())),
    )
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
