use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{
    CpuReading, DiskReading, GpuReading, HostProbe, MemoryReading, NetworkReading, ProbeError,
    ProcessExtras, ProcessSignal, RawProcess,
};
use crate::system::process::ProcessStatus;

/// Scripted host for tests. Clones share state, so a test keeps one handle
/// for inspection while another is boxed into the component under test.
#[derive(Clone, Default)]
pub(crate) struct FakeHost {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub cpu: Option<CpuReading>,
    pub memory: Option<MemoryReading>,
    pub disk: Option<DiskReading>,
    pub network: Option<NetworkReading>,
    pub gpu: Option<GpuReading>,
    pub processes: BTreeMap<u32, RawProcess>,
    pub extras: HashMap<u32, ProcessExtras>,
    pub unreadable: HashSet<u32>,
    pub denied: HashSet<u32>,
    pub ignores_terminate: HashSet<u32>,
    pub stop_unsupported: bool,
    pub cpu_delay: Duration,
    pub cpu_refreshes: usize,
    pub process_walks: usize,
    pub signals: Vec<(u32, ProcessSignal)>,
}

impl FakeHost {
    pub fn healthy() -> Self {
        let host = FakeHost::default();
        {
            let mut state = host.state();
            state.cpu = Some(CpuReading {
                usage: 45.2,
                per_core: vec![40.0, 50.4],
                physical_cores: Some(1),
                logical_cores: 2,
            });
            state.memory = Some(MemoryReading {
                total: 1000,
                used: 531,
                available: 469,
                swap_total: 0,
                swap_used: 0,
            });
            state.disk = Some(DiskReading {
                total: 2000,
                available: 500,
                read_bytes: 10,
                written_bytes: 20,
            });
            state.network = Some(NetworkReading {
                bytes_sent: 7,
                bytes_recv: 9,
            });
        }
        host
    }

    pub fn with_processes(processes: impl IntoIterator<Item = RawProcess>) -> Self {
        let host = Self::healthy();
        host.state()
            .processes
            .extend(processes.into_iter().map(|p| (p.pid, p)));
        host
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn boxed(&self) -> Box<dyn HostProbe> {
        Box::new(self.clone())
    }
}

pub(crate) fn raw(pid: u32, name: &str, cpu_usage: f32, memory_bytes: u64) -> RawProcess {
    RawProcess {
        pid,
        parent_pid: Some(1),
        name: name.to_string(),
        owner: Some("tester".to_string()),
        status: ProcessStatus::Running,
        cpu_usage,
        memory_bytes,
        virtual_memory_bytes: memory_bytes * 2,
        thread_count: 1,
        executable_path: Some(PathBuf::from(format!("/usr/bin/{name}"))),
        working_directory: Some(PathBuf::from("/")),
        command_line: vec![name.to_string()],
        start_time: 1_700_000_000 + pid as u64,
        run_time: 60,
        open_files: Some(3),
    }
}

impl HostProbe for FakeHost {
    fn refresh_cpu(&mut self) -> Result<CpuReading, ProbeError> {
        let delay = self.state().cpu_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut state = self.state();
        state.cpu_refreshes += 1;
        state.cpu.clone().ok_or(ProbeError::Unavailable("cpu counters"))
    }

    fn memory(&mut self) -> Result<MemoryReading, ProbeError> {
        self.state()
            .memory
            .ok_or(ProbeError::Unavailable("memory counters"))
    }

    fn disk(&mut self) -> Result<DiskReading, ProbeError> {
        self.state().disk.ok_or(ProbeError::Unavailable("disk counters"))
    }

    fn network(&mut self) -> Result<NetworkReading, ProbeError> {
        self.state()
            .network
            .ok_or(ProbeError::Unavailable("network counters"))
    }

    fn gpu(&mut self) -> Option<GpuReading> {
        self.state().gpu.clone()
    }

    fn uptime_secs(&self) -> u64 {
        3600
    }

    fn logical_cores(&self) -> usize {
        self.state()
            .cpu
            .as_ref()
            .map(|c| c.logical_cores)
            .unwrap_or(1)
    }

    fn refresh_processes(&mut self) -> Vec<Result<RawProcess, ProbeError>> {
        let mut state = self.state();
        state.process_walks += 1;
        state
            .processes
            .values()
            .map(|p| {
                if state.unreadable.contains(&p.pid) {
                    Err(ProbeError::PermissionDenied(p.pid))
                } else {
                    Ok(p.clone())
                }
            })
            .collect()
    }

    fn process(&mut self, pid: u32) -> Result<RawProcess, ProbeError> {
        self.state()
            .processes
            .get(&pid)
            .cloned()
            .ok_or(ProbeError::NoSuchProcess(pid))
    }

    fn process_extras(&self, pid: u32) -> ProcessExtras {
        self.state().extras.get(&pid).cloned().unwrap_or_default()
    }

    fn signal(&mut self, pid: u32, signal: ProcessSignal) -> Result<(), ProbeError> {
        let mut state = self.state();
        if !state.processes.contains_key(&pid) {
            return Err(ProbeError::NoSuchProcess(pid));
        }
        if state.denied.contains(&pid) {
            return Err(ProbeError::PermissionDenied(pid));
        }
        if matches!(signal, ProcessSignal::Stop | ProcessSignal::Continue) && state.stop_unsupported
        {
            return Err(ProbeError::Unsupported("suspend"));
        }
        state.signals.push((pid, signal));
        match signal {
            ProcessSignal::Terminate => {
                if !state.ignores_terminate.contains(&pid) {
                    state.processes.remove(&pid);
                }
            }
            ProcessSignal::Kill => {
                state.processes.remove(&pid);
            }
            ProcessSignal::Stop => {
                if let Some(p) = state.processes.get_mut(&pid) {
                    p.status = ProcessStatus::Stopped;
                }
            }
            ProcessSignal::Continue => {
                if let Some(p) = state.processes.get_mut(&pid) {
                    p.status = ProcessStatus::Running;
                }
            }
        }
        Ok(())
    }
}
