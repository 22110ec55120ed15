use std::thread;
use std::time::Duration;

use super::platform::{HostProbe, ProbeError, RawProcess};
use super::process::{CpuStrategy, ProcessDetail, ProcessRecord};
use super::protection::ProtectionPolicy;

/// Walks the native process table and normalizes each row into a
/// [`ProcessRecord`]. Records are rebuilt on every call.
pub struct ProcessEnumerator {
    probe: Box<dyn HostProbe>,
    policy: ProtectionPolicy,
    precise_window: Duration,
}

impl ProcessEnumerator {
    pub fn new(probe: Box<dyn HostProbe>, policy: ProtectionPolicy, precise_window: Duration) -> Self {
        ProcessEnumerator {
            probe,
            policy,
            precise_window,
        }
    }

    pub fn list_processes(&mut self, strategy: CpuStrategy) -> Vec<ProcessRecord> {
        let _span = tracing::debug_span!("enumerator.list_processes", ?strategy).entered();

        let entries = match strategy {
            CpuStrategy::Fast => self.probe.refresh_processes(),
            CpuStrategy::Precise => {
                // The first walk only primes the per-process counters.
                let _ = self.probe.refresh_processes();
                thread::sleep(self.precise_window);
                self.probe.refresh_processes()
            }
        };

        let cores = self.probe.logical_cores();
        let total_memory = self.probe.memory().map(|m| m.total).unwrap_or(0);

        let mut skipped = 0usize;
        let mut records: Vec<ProcessRecord> = entries
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(raw) => Some(self.to_record(raw, strategy, cores, total_memory)),
                Err(err) => {
                    skipped += 1;
                    tracing::trace!(error = %err, "skipping unreadable process");
                    None
                }
            })
            .collect();

        if skipped > 0 {
            tracing::debug!(skipped, listed = records.len(), "some processes were unreadable");
        }

        records.sort_by(|a, b| {
            b.cpu_percent
                .total_cmp(&a.cpu_percent)
                .then(a.pid.cmp(&b.pid))
        });
        records
    }

    /// Single process, CPU measured with the precise strategy.
    pub fn detail(&mut self, pid: u32) -> Result<ProcessDetail, ProbeError> {
        let _span = tracing::debug_span!("enumerator.detail", pid).entered();

        self.probe.process(pid)?;
        thread::sleep(self.precise_window);
        let raw = self.probe.process(pid)?;

        let cores = self.probe.logical_cores();
        let total_memory = self.probe.memory().map(|m| m.total).unwrap_or(0);
        let virtual_memory_bytes = raw.virtual_memory_bytes;
        let run_time_secs = raw.run_time;
        let open_files = raw.open_files;
        let extras = self.probe.process_extras(pid);

        Ok(ProcessDetail {
            record: self.to_record(raw, CpuStrategy::Precise, cores, total_memory),
            virtual_memory_bytes,
            run_time_secs,
            priority: extras.priority,
            cgroup: extras.cgroup,
            io: extras.io,
            open_files,
            connections: extras.connections,
        })
    }

    fn to_record(
        &self,
        raw: RawProcess,
        strategy: CpuStrategy,
        cores: usize,
        total_memory: u64,
    ) -> ProcessRecord {
        let cpu = normalize_cpu(raw.cpu_usage, strategy, cores);
        let protected = self.policy.is_protected(&raw.name, raw.pid);
        ProcessRecord::from_raw(raw, cpu, total_memory, protected)
    }
}

pub fn normalize_cpu(raw: f32, strategy: CpuStrategy, logical_cores: usize) -> f32 {
    let raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
    match strategy {
        CpuStrategy::Fast => raw,
        CpuStrategy::Precise => (raw / logical_cores.max(1) as f32).min(100.0),
    }
}
