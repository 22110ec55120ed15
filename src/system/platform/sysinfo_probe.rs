use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::Path;

use sysinfo::{Disks, Networks, Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System, Users};

use super::gpu::GpuReader;
use super::{
    CpuReading, DiskReading, GpuReading, HostProbe, MemoryReading, NetworkReading, ProbeError,
    ProcessExtras, ProcessSignal, RawProcess,
};
use crate::system::process::ProcessStatus;

/// [`HostProbe`] backed by `sysinfo`.
///
/// CPU figures are deltas between consecutive refreshes of the same
/// instance, so each consumer (sampler, enumerator, controller) owns its own.
pub struct SysinfoProbe {
    sys: System,
    disks: Option<Disks>,
    networks: Option<Networks>,
    users: Users,
    gpu: Option<GpuReader>,
}

impl SysinfoProbe {
    pub fn new(with_gpu: bool) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        SysinfoProbe {
            sys,
            disks: None,
            networks: None,
            users: Users::new_with_refreshed_list(),
            gpu: if with_gpu { GpuReader::detect() } else { None },
        }
    }
}

impl HostProbe for SysinfoProbe {
    fn refresh_cpu(&mut self) -> Result<CpuReading, ProbeError> {
        self.sys.refresh_cpu_usage();
        let cpus = self.sys.cpus();
        if cpus.is_empty() {
            return Err(ProbeError::Unavailable("cpu counters"));
        }
        Ok(CpuReading {
            usage: self.sys.global_cpu_usage(),
            per_core: cpus.iter().map(|cpu| cpu.cpu_usage()).collect(),
            physical_cores: System::physical_core_count(),
            logical_cores: cpus.len(),
        })
    }

    fn memory(&mut self) -> Result<MemoryReading, ProbeError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(ProbeError::Unavailable("memory counters"));
        }
        Ok(MemoryReading {
            total,
            used: self.sys.used_memory(),
            available: self.sys.available_memory(),
            swap_total: self.sys.total_swap(),
            swap_used: self.sys.used_swap(),
        })
    }

    fn disk(&mut self) -> Result<DiskReading, ProbeError> {
        let listed = self.disks.is_some();
        let disks = self.disks.get_or_insert_with(Disks::new_with_refreshed_list);
        if listed {
            disks.refresh(true);
        }
        if disks.list().is_empty() {
            return Err(ProbeError::Unavailable("disk counters"));
        }

        let mut tally = DiskTally::default();
        for disk in disks.list() {
            let usage = disk.usage();
            tally.add(
                disk.name(),
                disk.total_space(),
                disk.available_space(),
                usage.total_read_bytes,
                usage.total_written_bytes,
            );
        }
        Ok(tally.reading)
    }

    fn network(&mut self) -> Result<NetworkReading, ProbeError> {
        let listed = self.networks.is_some();
        let networks = self.networks.get_or_insert_with(Networks::new_with_refreshed_list);
        if listed {
            networks.refresh(true);
        }
        Ok(networks
            .iter()
            .fold(NetworkReading::default(), |acc, (_name, data)| NetworkReading {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_recv: acc.bytes_recv + data.total_received(),
            }))
    }

    fn gpu(&mut self) -> Option<GpuReading> {
        self.gpu.as_ref().and_then(GpuReader::read)
    }

    fn uptime_secs(&self) -> u64 {
        System::uptime()
    }

    fn logical_cores(&self) -> usize {
        self.sys.cpus().len().max(1)
    }

    fn refresh_processes(&mut self) -> Vec<Result<RawProcess, ProbeError>> {
        let _span = tracing::debug_span!("probe.refresh_processes").entered();

        self.users = Users::new_with_refreshed_list();
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        self.sys
            .processes()
            .values()
            .map(|process| Ok(raw_process(process, &self.users)))
            .collect()
    }

    fn process(&mut self, pid: u32) -> Result<RawProcess, ProbeError> {
        let sys_pid = Pid::from_u32(pid);
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        self.sys
            .process(sys_pid)
            .map(|process| raw_process(process, &self.users))
            .ok_or(ProbeError::NoSuchProcess(pid))
    }

    fn process_extras(&self, pid: u32) -> ProcessExtras {
        ProcessExtras {
            cgroup: super::process_group_name(pid),
            priority: super::process_priority(pid),
            io: super::process_io(pid),
            connections: super::process_connections(pid),
        }
    }

    fn signal(&mut self, pid: u32, signal: ProcessSignal) -> Result<(), ProbeError> {
        super::send_signal(pid, signal)
    }
}

/// Sums mounts, counting each (device name, capacity) pair once. Bind mounts
/// repeat both; unrelated `tmpfs` or `overlay` mounts share only the name.
#[derive(Default)]
struct DiskTally {
    seen: HashSet<(OsString, u64)>,
    reading: DiskReading,
}

impl DiskTally {
    fn add(&mut self, name: &OsStr, total: u64, available: u64, read: u64, written: u64) {
        if !self.seen.insert((name.to_os_string(), total)) {
            return;
        }
        self.reading.total += total;
        self.reading.available += available;
        self.reading.read_bytes += read;
        self.reading.written_bytes += written;
    }
}

fn raw_process(process: &Process, users: &Users) -> RawProcess {
    RawProcess {
        pid: process.pid().as_u32(),
        parent_pid: process.parent().map(|p| p.as_u32()),
        name: process.name().to_string_lossy().to_string(),
        owner: process
            .user_id()
            .and_then(|uid| users.get_user_by_id(uid))
            .map(|user| user.name().to_string()),
        status: map_status(process.status()),
        cpu_usage: process.cpu_usage(),
        memory_bytes: process.memory(),
        virtual_memory_bytes: process.virtual_memory(),
        thread_count: process.tasks().map(|t| t.len().max(1)).unwrap_or(1),
        executable_path: process.exe().map(Path::to_path_buf),
        working_directory: process.cwd().map(Path::to_path_buf),
        command_line: process
            .cmd()
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect(),
        start_time: process.start_time(),
        run_time: process.run_time(),
        open_files: process.open_files(),
    }
}

fn map_status(status: sysinfo::ProcessStatus) -> ProcessStatus {
    use sysinfo::ProcessStatus as Native;

    match status {
        Native::Run => ProcessStatus::Running,
        Native::Stop | Native::Tracing => ProcessStatus::Stopped,
        Native::Zombie => ProcessStatus::Zombie,
        Native::UninterruptibleDiskSleep => ProcessStatus::DiskSleep,
        Native::Dead => ProcessStatus::Dead,
        _ => ProcessStatus::Sleeping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_visible() {
        let mut probe = SysinfoProbe::new(false);
        let me = probe.process(std::process::id()).unwrap();
        assert_eq!(me.pid, std::process::id());
        assert!(me.memory_bytes > 0);
        assert!(me.thread_count >= 1);
    }

    #[test]
    fn missing_process_is_reported() {
        let mut probe = SysinfoProbe::new(false);
        assert!(matches!(
            probe.process(999_999_999),
            Err(ProbeError::NoSuchProcess(999_999_999))
        ));
    }

    #[test]
    fn disk_tally_keeps_same_named_mounts_of_different_size() {
        let mut tally = DiskTally::default();
        tally.add(OsStr::new("tmpfs"), 100, 50, 0, 0);
        tally.add(OsStr::new("tmpfs"), 200, 150, 0, 0);
        tally.add(OsStr::new("/dev/sda1"), 1000, 400, 7, 9);
        // bind mount of the same device
        tally.add(OsStr::new("/dev/sda1"), 1000, 400, 7, 9);

        assert_eq!(tally.reading.total, 1300);
        assert_eq!(tally.reading.available, 600);
        assert_eq!(tally.reading.read_bytes, 7);
        assert_eq!(tally.reading.written_bytes, 9);
    }

    #[test]
    fn counters_are_internally_consistent() {
        let mut probe = SysinfoProbe::new(false);
        let cpu = probe.refresh_cpu().unwrap();
        assert_eq!(cpu.per_core.len(), cpu.logical_cores);
        let mem = probe.memory().unwrap();
        assert!(mem.used <= mem.total);
    }
}
