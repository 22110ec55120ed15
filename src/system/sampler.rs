use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::platform::{CpuReading, DiskReading, HostProbe, MemoryReading, NetworkReading, ProbeError};
use super::snapshot::{
    CoreCounts, CpuStats, DiskIo, DiskStats, GpuStats, HostInfo, MemoryStats, NetworkStats,
    SwapStats, SystemSnapshot, percent,
};

#[derive(Default)]
struct LastKnown {
    cpu: Option<CpuReading>,
    memory: Option<MemoryReading>,
    disk: Option<DiskReading>,
    network: Option<NetworkReading>,
}

/// Reads host counters and assembles one [`SystemSnapshot`] per call.
///
/// A counter that fails to read falls back to its last good value (zero if
/// there never was one); it never fails the snapshot.
pub struct Sampler {
    probe: Box<dyn HostProbe>,
    cpu_window: Duration,
    last: LastKnown,
}

impl Sampler {
    /// `cpu_window` of zero reads CPU usage since the previous call;
    /// anything larger primes the counters and measures over that window.
    /// Callers keep it below the snapshot cache TTL.
    pub fn new(probe: Box<dyn HostProbe>, cpu_window: Duration) -> Self {
        Sampler {
            probe,
            cpu_window,
            last: LastKnown::default(),
        }
    }

    pub fn produce(&mut self, now: DateTime<Utc>) -> SystemSnapshot {
        let _span = tracing::debug_span!("sampler.produce").entered();

        let cpu_read = if self.cpu_window.is_zero() {
            self.probe.refresh_cpu()
        } else {
            let _ = self.probe.refresh_cpu();
            thread::sleep(self.cpu_window);
            self.probe.refresh_cpu()
        };
        let cpu = degrade("cpu", cpu_read, &mut self.last.cpu);
        let memory = degrade("memory", self.probe.memory(), &mut self.last.memory);
        let disk = degrade("disk", self.probe.disk(), &mut self.last.disk);
        let network = degrade("network", self.probe.network(), &mut self.last.network);
        let gpu = self.probe.gpu().map(|g| GpuStats {
            memory_percent: percent(g.memory_used, g.memory_total),
            load: g.load.clamp(0.0, 100.0),
            name: g.name,
            memory_used: g.memory_used,
            memory_total: g.memory_total,
            temperature: g.temperature,
        });

        let logical = cpu.logical_cores.max(cpu.per_core.len());
        let disk_used = disk.total.saturating_sub(disk.available);

        SystemSnapshot {
            timestamp: now,
            cpu: CpuStats {
                percent: cpu.usage.clamp(0.0, 100.0),
                cores: CoreCounts {
                    physical: cpu.physical_cores.unwrap_or(logical),
                    logical,
                },
                per_core: cpu.per_core.iter().map(|c| c.clamp(0.0, 100.0)).collect(),
            },
            memory: MemoryStats {
                total: memory.total,
                used: memory.used,
                available: memory.available,
                percent: percent(memory.used, memory.total),
            },
            swap: SwapStats {
                total: memory.swap_total,
                used: memory.swap_used,
                percent: percent(memory.swap_used, memory.swap_total),
            },
            disk: DiskStats {
                total: disk.total,
                used: disk_used,
                free: disk.available.min(disk.total),
                percent: percent(disk_used, disk.total),
                io: DiskIo {
                    read_bytes: disk.read_bytes,
                    write_bytes: disk.written_bytes,
                },
            },
            network: NetworkStats {
                bytes_sent: network.bytes_sent,
                bytes_recv: network.bytes_recv,
            },
            host: HostInfo {
                os: std::env::consts::OS.to_string(),
                uptime_seconds: self.probe.uptime_secs(),
            },
            gpu,
        }
    }
}

fn degrade<T: Clone + Default>(
    field: &'static str,
    read: Result<T, ProbeError>,
    last: &mut Option<T>,
) -> T {
    match read {
        Ok(value) => {
            *last = Some(value.clone());
            value
        }
        Err(err) => {
            tracing::warn!(field, error = %err, "counter read failed, using last known value");
            last.clone().unwrap_or_default()
        }
    }
}
