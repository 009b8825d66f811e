//! Host snapshots
//!
//! A [`StaticSnapshot`] holds hardware facts that do not change while the
//! process runs. It is collected once per session and cached. A
//! [`DynamicSnapshot`] holds volatile counters. It is collected every cycle
//! and discarded at the end of that cycle.
//!
//! Each domain is an `Option`: `None` means the collector could not produce
//! it, while `Some(vec![])` means the domain was queried and is genuinely
//! empty (e.g. a headless host without monitors).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data domains a collector reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Cpu,
    Gpu,
    Motherboard,
    Audio,
    Monitors,
    Memory,
    Storage,
    Network,
    Battery,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Cpu => "cpu",
            Domain::Gpu => "gpu",
            Domain::Motherboard => "motherboard",
            Domain::Audio => "audio",
            Domain::Monitors => "monitors",
            Domain::Memory => "memory",
            Domain::Storage => "storage",
            Domain::Network => "network",
            Domain::Battery => "battery",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticSnapshot {
    pub cpus: Option<Vec<CpuInformation>>,
    pub gpus: Option<Vec<GpuInformation>>,
    pub motherboard: Option<MotherboardInformation>,
    pub audio: Option<Vec<AudioDevice>>,
    pub monitors: Option<Vec<DisplayInformation>>,
}

impl StaticSnapshot {
    /// All five static domains are present.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn missing(&self) -> Vec<Domain> {
        [
            (Domain::Cpu, self.cpus.is_some()),
            (Domain::Gpu, self.gpus.is_some()),
            (Domain::Motherboard, self.motherboard.is_some()),
            (Domain::Audio, self.audio.is_some()),
            (Domain::Monitors, self.monitors.is_some()),
        ]
        .into_iter()
        .filter_map(|(domain, present)| (!present).then_some(domain))
        .collect()
    }

    /// Share of static domains present, in `0.0..=1.0`.
    pub fn completion(&self) -> f64 {
        const TOTAL: usize = 5;
        (TOTAL - self.missing().len()) as f64 / TOTAL as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicSnapshot {
    pub memory: Option<MemoryInformation>,
    pub storage: Option<Vec<DiskInformation>>,
    pub network: Option<Vec<NetworkAdapter>>,
    pub battery: Option<BatteryInformation>,
}

impl DynamicSnapshot {
    /// Memory, storage and network are present. Battery is optional since
    /// not every host has one.
    pub fn is_essential_complete(&self) -> bool {
        self.memory.is_some() && self.storage.is_some() && self.network.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.is_essential_complete() && self.battery.is_some()
    }

    /// Essential domains that are absent.
    pub fn missing(&self) -> Vec<Domain> {
        [
            (Domain::Memory, self.memory.is_some()),
            (Domain::Storage, self.storage.is_some()),
            (Domain::Network, self.network.is_some()),
        ]
        .into_iter()
        .filter_map(|(domain, present)| (!present).then_some(domain))
        .collect()
    }

    /// Share of dynamic domains present (battery included), in `0.0..=1.0`.
    pub fn completion(&self) -> f64 {
        const TOTAL: usize = 4;
        let present = (TOTAL - 1 - self.missing().len()) + usize::from(self.battery.is_some());
        present as f64 / TOTAL as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuInformation {
    pub name: String,
    pub cores: u32,
    pub threads: u32,
    /// Clock speed in MHz
    pub clock_speed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInformation {
    pub name: String,
    pub dedicated_memory_bytes: u64,
    pub shared_memory_bytes: u64,
    pub integrated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotherboardInformation {
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
    pub bios_version: String,
    pub bios_serial: String,
    pub system_sku: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub name: String,
    pub manufacturer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayInformation {
    pub is_primary: bool,
    pub width: u32,
    pub height: u32,
    pub current_resolution: String,
    pub native_resolution: String,
    pub aspect_ratio: String,
    pub refresh_rate: u32,
    pub screen_size: String,
    pub physical_width_mm: u32,
    pub physical_height_mm: u32,
    pub manufacturer: String,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryInformation {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub ram_slots: Vec<RamSlot>,
}

impl MemoryInformation {
    /// Used memory in percent, rounded down.
    pub fn load_percent(&self) -> u32 {
        if self.total_bytes == 0 {
            return 0;
        }
        (self.used_bytes.saturating_mul(100) / self.total_bytes) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamSlot {
    pub location: String,
    pub capacity_bytes: u64,
    pub speed: u32,
    pub configured_speed: u32,
    pub manufacturer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskInformation {
    /// Mount point or drive letter
    pub drive: String,
    pub kind: String,
    pub model: String,
    pub interface: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Ethernet,
    Wifi,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAdapter {
    pub name: String,
    pub mac_address: String,
    pub ip_address: String,
    pub status: String,
    pub kind: AdapterKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryInformation {
    pub is_desktop: bool,
    pub percent: u8,
    pub power_plugged: bool,
}

impl BatteryInformation {
    /// Reported for hosts without a battery.
    pub fn desktop() -> Self {
        Self {
            is_desktop: true,
            percent: 100,
            power_plugged: true,
        }
    }
}
