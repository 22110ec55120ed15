use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time capture of aggregate host metrics. Never mutated once
/// built; a newer snapshot replaces it.
///
/// Disk I/O and network figures are cumulative since boot. Rates require
/// diffing two snapshots.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub swap: SwapStats,
    pub disk: DiskStats,
    pub network: NetworkStats,
    pub host: HostInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuStats>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CpuStats {
    pub percent: f32,
    pub cores: CoreCounts,
    pub per_core: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CoreCounts {
    pub physical: usize,
    pub logical: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SwapStats {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DiskStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f32,
    pub io: DiskIo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DiskIo {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GpuStats {
    pub name: String,
    pub load: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub memory_percent: f32,
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    pub os: String,
    pub uptime_seconds: u64,
}

/// `part / whole` as a percentage clamped to [0, 100]; 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 100.0).clamp(0.0, 100.0) as f32
}
