//! Document serializer collaborator
//!
//! [`JsonSerializer`] renders a static and a dynamic snapshot as one JSON
//! object. Sizes are reported in GB rounded to two decimals, and network
//! adapters are grouped into `ethernet` and `wifi`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::config::DocumentConfig;
use crate::snapshot::{
    AdapterKind, AudioDevice, BatteryInformation, CpuInformation, DiskInformation,
    DisplayInformation, DynamicSnapshot, GpuInformation, MemoryInformation,
    MotherboardInformation, NetworkAdapter, StaticSnapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("snapshot is not complete enough to serialize")]
    Incomplete,

    #[error("failed to encode document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub trait DocumentSerializer: Send + Sync {
    fn serialize(
        &self,
        static_snapshot: &StaticSnapshot,
        dynamic_snapshot: &DynamicSnapshot,
    ) -> Result<String, SerializeError>;
}

#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    config: DocumentConfig,
}

impl JsonSerializer {
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }

    /// Renders the document with an explicit collection time.
    pub fn serialize_at(
        &self,
        timestamp: DateTime<Utc>,
        static_snapshot: &StaticSnapshot,
        dynamic_snapshot: &DynamicSnapshot,
    ) -> Result<String, SerializeError> {
        let document = Document::build(timestamp, static_snapshot, dynamic_snapshot)
            .ok_or(SerializeError::Incomplete)?;

        if !self.config.pretty_print {
            return Ok(serde_json::to_string(&document)?);
        }

        let indent = " ".repeat(self.config.indent);
        let mut buffer = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(indent.as_bytes()));
        document.serialize(&mut serializer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl DocumentSerializer for JsonSerializer {
    fn serialize(
        &self,
        static_snapshot: &StaticSnapshot,
        dynamic_snapshot: &DynamicSnapshot,
    ) -> Result<String, SerializeError> {
        self.serialize_at(Utc::now(), static_snapshot, dynamic_snapshot)
    }
}

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn gigabytes(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_GB * 100.0).round() / 100.0
}

#[derive(Serialize)]
struct Document<'a> {
    timestamp: String,
    gpu: Vec<GpuView<'a>>,
    motherboard: &'a MotherboardInformation,
    cpu: Vec<CpuView<'a>>,
    memory: MemoryView<'a>,
    storage: Vec<DiskView<'a>>,
    network: NetworkView<'a>,
    audio: &'a [AudioDevice],
    #[serde(skip_serializing_if = "Option::is_none")]
    battery: Option<&'a BatteryInformation>,
    monitors: &'a [DisplayInformation],
}

impl<'a> Document<'a> {
    fn build(
        timestamp: DateTime<Utc>,
        static_snapshot: &'a StaticSnapshot,
        dynamic_snapshot: &'a DynamicSnapshot,
    ) -> Option<Self> {
        let StaticSnapshot {
            cpus: Some(cpus),
            gpus: Some(gpus),
            motherboard: Some(motherboard),
            audio: Some(audio),
            monitors: Some(monitors),
        } = static_snapshot
        else {
            return None;
        };
        let DynamicSnapshot {
            memory: Some(memory),
            storage: Some(storage),
            network: Some(network),
            battery,
        } = dynamic_snapshot
        else {
            return None;
        };

        Some(Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            gpu: gpus.iter().map(GpuView::from).collect(),
            motherboard,
            cpu: cpus.iter().map(CpuView::from).collect(),
            memory: MemoryView::from(memory),
            storage: storage.iter().map(DiskView::from).collect(),
            network: NetworkView::from(network.as_slice()),
            audio: audio.as_slice(),
            battery: battery.as_ref(),
            monitors: monitors.as_slice(),
        })
    }
}

#[derive(Serialize)]
struct GpuView<'a> {
    name: &'a str,
    vram: f64,
    shared_memory: f64,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> From<&'a GpuInformation> for GpuView<'a> {
    fn from(gpu: &'a GpuInformation) -> Self {
        Self {
            name: &gpu.name,
            vram: gigabytes(gpu.dedicated_memory_bytes),
            shared_memory: gigabytes(gpu.shared_memory_bytes),
            kind: if gpu.integrated { "iGPU" } else { "dGPU" },
        }
    }
}

#[derive(Serialize)]
struct CpuView<'a> {
    name: &'a str,
    cores: u32,
    threads: u32,
    clock_speed: u64,
}

impl<'a> From<&'a CpuInformation> for CpuView<'a> {
    fn from(cpu: &'a CpuInformation) -> Self {
        Self {
            name: cpu.name.trim(),
            cores: cpu.cores,
            threads: cpu.threads,
            clock_speed: cpu.clock_speed,
        }
    }
}

#[derive(Serialize)]
struct MemoryView<'a> {
    total: f64,
    available: f64,
    used: f64,
    usage_percent: u32,
    ram_slots: Vec<RamSlotView<'a>>,
}

#[derive(Serialize)]
struct RamSlotView<'a> {
    location: &'a str,
    capacity: f64,
    speed: u32,
    configured_speed: u32,
    manufacturer: &'a str,
}

impl<'a> From<&'a MemoryInformation> for MemoryView<'a> {
    fn from(memory: &'a MemoryInformation) -> Self {
        Self {
            total: gigabytes(memory.total_bytes),
            available: gigabytes(memory.available_bytes),
            used: gigabytes(memory.used_bytes),
            usage_percent: memory.load_percent(),
            ram_slots: memory
                .ram_slots
                .iter()
                .map(|slot| RamSlotView {
                    location: &slot.location,
                    capacity: gigabytes(slot.capacity_bytes),
                    speed: slot.speed,
                    configured_speed: slot.configured_speed,
                    manufacturer: &slot.manufacturer,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct DiskView<'a> {
    drive: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    model: &'a str,
    interface: &'a str,
    total_size: f64,
    free_space: f64,
    used_space: f64,
}

impl<'a> From<&'a DiskInformation> for DiskView<'a> {
    fn from(disk: &'a DiskInformation) -> Self {
        Self {
            drive: &disk.drive,
            kind: &disk.kind,
            model: &disk.model,
            interface: &disk.interface,
            total_size: gigabytes(disk.total_bytes),
            free_space: gigabytes(disk.available_bytes),
            used_space: gigabytes(disk.total_bytes.saturating_sub(disk.available_bytes)),
        }
    }
}

#[derive(Serialize)]
struct NetworkView<'a> {
    ethernet: Vec<AdapterView<'a>>,
    wifi: Vec<AdapterView<'a>>,
}

#[derive(Serialize)]
struct AdapterView<'a> {
    name: &'a str,
    mac_address: &'a str,
    ip_address: &'a str,
    status: &'a str,
}

impl<'a> From<&'a [NetworkAdapter]> for NetworkView<'a> {
    fn from(adapters: &'a [NetworkAdapter]) -> Self {
        let of_kind = |kind: AdapterKind| -> Vec<AdapterView<'a>> {
            adapters
                .iter()
                .filter(|adapter| adapter.kind == kind)
                .map(|adapter| AdapterView {
                    name: &adapter.name,
                    mac_address: &adapter.mac_address,
                    ip_address: &adapter.ip_address,
                    status: &adapter.status,
                })
                .collect()
        };

        Self {
            ethernet: of_kind(AdapterKind::Ethernet),
            wifi: of_kind(AdapterKind::Wifi),
        }
    }
}
