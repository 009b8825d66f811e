//! Default host collector
//!
//! Volatile domains and the CPU list come from `sysinfo`. Everything else
//! `sysinfo` does not expose is read from `/sys` and `/proc` on Linux, plus an
//! optional `nvidia-smi` probe for GPUs. On other platforms those domains are
//! reported with placeholder values or left out.
//!
//! A failing domain never fails the whole call: it is left `None` and the
//! worker decides whether the snapshot is usable.

use std::collections::BTreeMap;
use std::process::Command;

use sysinfo::{DiskKind, Disks, Networks, System};
use tracing::{debug, instrument, trace};

use super::{CollectError, Collector};
use crate::snapshot::{
    AdapterKind, AudioDevice, BatteryInformation, CpuInformation, DiskInformation,
    DisplayInformation, Domain, DynamicSnapshot, GpuInformation, MemoryInformation,
    MotherboardInformation, NetworkAdapter, StaticSnapshot,
};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCollector;

impl SystemCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for SystemCollector {
    #[instrument(skip(self))]
    fn collect_static(&self) -> Result<StaticSnapshot, CollectError> {
        let snapshot = StaticSnapshot {
            cpus: settle(Domain::Cpu, collect_cpus()),
            gpus: settle(Domain::Gpu, collect_gpus()),
            motherboard: settle(Domain::Motherboard, linux::motherboard()),
            audio: settle(Domain::Audio, linux::audio_devices()),
            monitors: settle(Domain::Monitors, linux::displays()),
        };
        trace!(completion = snapshot.completion(), "static snapshot collected");
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    fn collect_dynamic(&self) -> Result<DynamicSnapshot, CollectError> {
        let snapshot = DynamicSnapshot {
            memory: settle(Domain::Memory, collect_memory()),
            storage: settle(Domain::Storage, collect_storage()),
            network: settle(Domain::Network, collect_network()),
            battery: settle(Domain::Battery, linux::battery()),
        };
        trace!(completion = snapshot.completion(), "dynamic snapshot collected");
        Ok(snapshot)
    }
}

fn settle<T>(domain: Domain, result: Result<T, CollectError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(%domain, error = %e, "domain collection failed");
            None
        }
    }
}

fn collect_cpus() -> Result<Vec<CpuInformation>, CollectError> {
    let mut sys = System::new();
    sys.refresh_cpu_all();

    let cpus = sys.cpus();
    if cpus.is_empty() {
        return Err(CollectError::Unavailable {
            domain: Domain::Cpu,
            reason: "no logical CPUs reported".to_string(),
        });
    }

    // (logical threads, highest frequency) per brand
    let mut packages: BTreeMap<String, (u32, u64)> = BTreeMap::new();
    for cpu in cpus {
        let entry = packages.entry(cpu.brand().trim().to_string()).or_default();
        entry.0 += 1;
        entry.1 = entry.1.max(cpu.frequency());
    }

    let physical = System::physical_core_count().map(|count| count as u32);
    let single_package = packages.len() == 1;

    Ok(packages
        .into_iter()
        .map(|(name, (threads, clock_speed))| CpuInformation {
            name,
            cores: match physical {
                Some(cores) if single_package => cores,
                _ => threads,
            },
            threads,
            clock_speed,
        })
        .collect())
}

fn collect_gpus() -> Result<Vec<GpuInformation>, CollectError> {
    if let Some(gpus) = nvidia_gpus()
        && !gpus.is_empty()
    {
        return Ok(gpus);
    }
    linux::drm_gpus()
}

fn nvidia_gpus() -> Option<Vec<GpuInformation>> {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(parse_nvidia_smi(&text))
}

/// Parses `name, memory.total` rows, memory in MiB.
fn parse_nvidia_smi(text: &str) -> Vec<GpuInformation> {
    text.lines()
        .filter_map(|line| {
            let (name, memory) = line.rsplit_once(',')?;
            let mib = memory.trim().parse::<u64>().ok()?;
            Some(GpuInformation {
                name: name.trim().to_string(),
                dedicated_memory_bytes: mib * 1024 * 1024,
                shared_memory_bytes: 0,
                integrated: false,
            })
        })
        .collect()
}

fn collect_memory() -> Result<MemoryInformation, CollectError> {
    let mut sys = System::new();
    sys.refresh_memory();

    let total_bytes = sys.total_memory();
    if total_bytes == 0 {
        return Err(CollectError::Unavailable {
            domain: Domain::Memory,
            reason: "total memory reported as zero".to_string(),
        });
    }

    Ok(MemoryInformation {
        total_bytes,
        available_bytes: sys.available_memory(),
        used_bytes: sys.used_memory(),
        ram_slots: Vec::new(),
    })
}

fn collect_storage() -> Result<Vec<DiskInformation>, CollectError> {
    let disks = Disks::new_with_refreshed_list();

    Ok(disks
        .iter()
        .map(|disk| {
            let model = disk.name().to_string_lossy().to_string();
            DiskInformation {
                drive: disk.mount_point().to_string_lossy().to_string(),
                kind: match disk.kind() {
                    DiskKind::SSD => "SSD".to_string(),
                    DiskKind::HDD => "HDD".to_string(),
                    DiskKind::Unknown(_) => UNKNOWN.to_string(),
                },
                interface: disk_interface(&model).to_string(),
                model,
                total_bytes: disk.total_space(),
                available_bytes: disk.available_space(),
            }
        })
        .collect())
}

fn disk_interface(device: &str) -> &'static str {
    let device = device.trim_start_matches("/dev/");
    if device.starts_with("nvme") {
        "NVMe"
    } else if device.starts_with("sd") {
        "SATA"
    } else if device.starts_with("mmcblk") {
        "MMC"
    } else if device.starts_with("vd") {
        "VirtIO"
    } else {
        UNKNOWN
    }
}

fn collect_network() -> Result<Vec<NetworkAdapter>, CollectError> {
    let networks = Networks::new_with_refreshed_list();

    let mut adapters: Vec<NetworkAdapter> = networks
        .iter()
        .map(|(name, data)| NetworkAdapter {
            name: name.clone(),
            mac_address: data.mac_address().to_string(),
            ip_address: data
                .ip_networks()
                .first()
                .map(|network| network.addr.to_string())
                .unwrap_or_default(),
            status: linux::link_status(name),
            kind: adapter_kind(name),
        })
        .collect();
    adapters.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(adapters)
}

fn adapter_kind(name: &str) -> AdapterKind {
    let name = name.to_ascii_lowercase();
    if name.starts_with("wl") || name.contains("wi-fi") || name.contains("wireless") {
        AdapterKind::Wifi
    } else if name.starts_with("en") || name.starts_with("eth") || name.contains("ethernet") {
        AdapterKind::Ethernet
    } else {
        AdapterKind::Other
    }
}

/// Decodes the three-letter PNP manufacturer id from an EDID blob.
fn edid_manufacturer(edid: &[u8]) -> Option<String> {
    let raw = u16::from_be_bytes([*edid.get(8)?, *edid.get(9)?]);
    let letters = [(raw >> 10) & 0x1f, (raw >> 5) & 0x1f, raw & 0x1f];
    letters
        .iter()
        .map(|&code| match code {
            1..=26 => Some(char::from(b'A' + code as u8 - 1)),
            _ => None,
        })
        .collect()
}

/// Physical size from EDID bytes 21 and 22, converted from cm to mm.
fn edid_physical_size_mm(edid: &[u8]) -> Option<(u32, u32)> {
    let width = u32::from(*edid.get(21)?) * 10;
    let height = u32::from(*edid.get(22)?) * 10;
    (width > 0 && height > 0).then_some((width, height))
}

fn aspect_ratio(width: u32, height: u32) -> String {
    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 { a } else { gcd(b, a % b) }
    }
    match gcd(width, height) {
        0 => UNKNOWN.to_string(),
        divisor => format!("{}:{}", width / divisor, height / divisor),
    }
}

fn screen_size(width_mm: u32, height_mm: u32) -> String {
    if width_mm == 0 || height_mm == 0 {
        return UNKNOWN.to_string();
    }
    let diagonal = f64::from(width_mm).hypot(f64::from(height_mm)) / 25.4;
    format!("{diagonal:.1}\"")
}

/// Parses a DRM mode line such as `1920x1080` or `1920x1080i`.
fn parse_mode(mode: &str) -> Option<(u32, u32)> {
    let (width, height) = mode.trim().split_once('x')?;
    let height: String = height.chars().take_while(char::is_ascii_digit).collect();
    Some((width.parse().ok()?, height.parse().ok()?))
}

/// Parses `/proc/asound/cards` into `(driver, name)` rows.
fn parse_asound_cards(text: &str) -> Vec<AudioDevice> {
    text.lines()
        .filter(|line| {
            line.trim_start()
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        })
        .filter_map(|line| {
            let (_, description) = line.split_once("]:")?;
            let (driver, name) = description.split_once(" - ")?;
            Some(AudioDevice {
                name: name.trim().to_string(),
                manufacturer: driver.trim().to_string(),
            })
        })
        .collect()
}

fn gpu_vendor(vendor_id: &str) -> Option<(&'static str, bool)> {
    match vendor_id.trim().to_ascii_lowercase().as_str() {
        "0x8086" => Some(("Intel Graphics", true)),
        "0x1002" => Some(("AMD Radeon", false)),
        "0x10de" => Some(("NVIDIA", false)),
        _ => None,
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::fs;
    use std::io;
    use std::path::Path;

    use super::*;

    fn read_trimmed(path: impl AsRef<Path>) -> Option<String> {
        fs::read_to_string(path)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn read_dir_sorted(domain: Domain, root: &str) -> Result<Vec<fs::DirEntry>, CollectError> {
        let mut entries: Vec<_> = fs::read_dir(root)
            .map_err(|source| CollectError::Io { domain, source })?
            .flatten()
            .collect();
        entries.sort_by_key(|entry| entry.file_name());
        Ok(entries)
    }

    pub fn motherboard() -> Result<MotherboardInformation, CollectError> {
        let root = Path::new("/sys/class/dmi/id");
        if !root.is_dir() {
            return Err(CollectError::Unavailable {
                domain: Domain::Motherboard,
                reason: "no DMI information exposed".to_string(),
            });
        }
        let field = |name: &str| read_trimmed(root.join(name)).unwrap_or_else(|| UNKNOWN.into());

        Ok(MotherboardInformation {
            manufacturer: field("board_vendor"),
            product: field("board_name"),
            serial_number: field("board_serial"),
            bios_version: field("bios_version"),
            bios_serial: field("product_serial"),
            system_sku: field("product_sku"),
        })
    }

    pub fn audio_devices() -> Result<Vec<AudioDevice>, CollectError> {
        match fs::read_to_string("/proc/asound/cards") {
            Ok(text) => Ok(parse_asound_cards(&text)),
            // no sound subsystem loaded
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(CollectError::Io {
                domain: Domain::Audio,
                source,
            }),
        }
    }

    pub fn displays() -> Result<Vec<DisplayInformation>, CollectError> {
        let mut displays = Vec::new();

        for entry in read_dir_sorted(Domain::Monitors, "/sys/class/drm")? {
            let connector = entry.file_name().to_string_lossy().to_string();
            // connectors look like card0-HDMI-A-1
            if !connector.starts_with("card") || !connector.contains('-') {
                continue;
            }
            let path = entry.path();
            if read_trimmed(path.join("status")).as_deref() != Some("connected") {
                continue;
            }

            let modes = fs::read_to_string(path.join("modes")).unwrap_or_default();
            let (width, height) = modes.lines().next().and_then(parse_mode).unwrap_or((0, 0));
            let edid = fs::read(path.join("edid")).unwrap_or_default();
            let (physical_width_mm, physical_height_mm) =
                edid_physical_size_mm(&edid).unwrap_or((0, 0));
            let resolution = format!("{width}x{height}");

            displays.push(DisplayInformation {
                is_primary: displays.is_empty(),
                width,
                height,
                current_resolution: resolution.clone(),
                native_resolution: resolution,
                aspect_ratio: aspect_ratio(width, height),
                refresh_rate: 0,
                screen_size: screen_size(physical_width_mm, physical_height_mm),
                physical_width_mm,
                physical_height_mm,
                manufacturer: edid_manufacturer(&edid).unwrap_or_else(|| UNKNOWN.into()),
                device_id: connector,
            });
        }

        Ok(displays)
    }

    pub fn drm_gpus() -> Result<Vec<GpuInformation>, CollectError> {
        let mut gpus = Vec::new();

        for entry in read_dir_sorted(Domain::Gpu, "/sys/class/drm")? {
            let card = entry.file_name().to_string_lossy().to_string();
            if !card.starts_with("card") || card.contains('-') {
                continue;
            }
            let device = entry.path().join("device");
            let Some((name, integrated)) =
                read_trimmed(device.join("vendor")).and_then(|id| gpu_vendor(&id))
            else {
                continue;
            };
            let memory = |file: &str| {
                read_trimmed(device.join(file))
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(0)
            };

            gpus.push(GpuInformation {
                name: name.to_string(),
                dedicated_memory_bytes: memory("mem_info_vram_total"),
                shared_memory_bytes: memory("mem_info_gtt_total"),
                integrated,
            });
        }

        Ok(gpus)
    }

    pub fn battery() -> Result<BatteryInformation, CollectError> {
        let root = "/sys/class/power_supply";
        let entries = match read_dir_sorted(Domain::Battery, root) {
            Ok(entries) => entries,
            Err(CollectError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(BatteryInformation::desktop());
            }
            Err(e) => return Err(e),
        };

        let mut battery = None;
        let mut mains_online = false;
        for entry in entries {
            let path = entry.path();
            match read_trimmed(path.join("type")).as_deref() {
                Some("Battery") if battery.is_none() => {
                    let percent = read_trimmed(path.join("capacity"))
                        .and_then(|value| value.parse::<u8>().ok())
                        .unwrap_or(0)
                        .min(100);
                    let status = read_trimmed(path.join("status")).unwrap_or_default();
                    battery = Some((percent, status));
                }
                Some("Mains") => {
                    mains_online |= read_trimmed(path.join("online")).as_deref() == Some("1");
                }
                _ => {}
            }
        }

        Ok(match battery {
            Some((percent, status)) => BatteryInformation {
                is_desktop: false,
                percent,
                power_plugged: mains_online || status != "Discharging",
            },
            None => BatteryInformation::desktop(),
        })
    }

    pub fn link_status(interface: &str) -> String {
        match read_trimmed(format!("/sys/class/net/{interface}/operstate")).as_deref() {
            Some("up") => "Connected".to_string(),
            Some("down") | Some("dormant") | Some("lowerlayerdown") => "Disconnected".to_string(),
            _ => UNKNOWN.to_string(),
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod linux {
    use super::*;

    fn unsupported(domain: Domain) -> CollectError {
        CollectError::Unavailable {
            domain,
            reason: "not supported on this platform".to_string(),
        }
    }

    pub fn motherboard() -> Result<MotherboardInformation, CollectError> {
        Ok(MotherboardInformation {
            manufacturer: UNKNOWN.into(),
            product: UNKNOWN.into(),
            serial_number: UNKNOWN.into(),
            bios_version: UNKNOWN.into(),
            bios_serial: UNKNOWN.into(),
            system_sku: UNKNOWN.into(),
        })
    }

    pub fn audio_devices() -> Result<Vec<AudioDevice>, CollectError> {
        Err(unsupported(Domain::Audio))
    }

    pub fn displays() -> Result<Vec<DisplayInformation>, CollectError> {
        Err(unsupported(Domain::Monitors))
    }

    pub fn drm_gpus() -> Result<Vec<GpuInformation>, CollectError> {
        Ok(Vec::new())
    }

    pub fn battery() -> Result<BatteryInformation, CollectError> {
        Ok(BatteryInformation::desktop())
    }

    pub fn link_status(_interface: &str) -> String {
        UNKNOWN.to_string()
    }
}
