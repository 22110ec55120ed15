//! Native introspection capability.
//!
//! Everything that touches OS counters, the process table or signal
//! primitives goes through [`HostProbe`]. The native backing is chosen once
//! by [`native_probe`]; per-OS differences stay inside this module.

#[cfg(test)]
pub(crate) mod fake;
mod gpu;
mod sysinfo_probe;
#[cfg(unix)]
mod unix;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub use sysinfo_probe::SysinfoProbe;

use super::process::ProcessStatus;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no such process: {0}")]
    NoSuchProcess(u32),

    #[error("permission denied for process {0}")]
    PermissionDenied(u32),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("{0} unavailable")]
    Unavailable(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Terminate,
    Kill,
    Stop,
    Continue,
}

impl ProcessSignal {
    pub fn name(self) -> &'static str {
        match self {
            ProcessSignal::Terminate => "SIGTERM",
            ProcessSignal::Kill => "SIGKILL",
            ProcessSignal::Stop => "SIGSTOP",
            ProcessSignal::Continue => "SIGCONT",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuReading {
    /// Busy share of the whole machine since the previous refresh, 0..=100.
    pub usage: f32,
    pub per_core: Vec<f32>,
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReading {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskReading {
    pub total: u64,
    pub available: u64,
    pub read_bytes: u64,
    pub written_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkReading {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    pub name: String,
    pub load: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub temperature: Option<f32>,
}

/// One row of the native process table, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: u32,
    pub parent_pid: Option<u32>,
    pub name: String,
    pub owner: Option<String>,
    pub status: ProcessStatus,
    /// Per-process busy share since the previous refresh, not divided by
    /// core count.
    pub cpu_usage: f32,
    pub memory_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub thread_count: usize,
    pub executable_path: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    pub command_line: Vec<String>,
    pub start_time: u64,
    pub run_time: u64,
    pub open_files: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct IoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Optional per-OS details only the detail view asks for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessExtras {
    pub cgroup: Option<String>,
    pub priority: Option<i32>,
    pub io: Option<IoStats>,
    /// Open sockets held by the process.
    pub connections: Option<usize>,
}

/// Small capability surface over the host: counters, process table, signals.
pub trait HostProbe: Send {
    /// Refresh CPU counters and return usage since the previous refresh.
    fn refresh_cpu(&mut self) -> Result<CpuReading, ProbeError>;
    fn memory(&mut self) -> Result<MemoryReading, ProbeError>;
    /// Capacity plus cumulative-since-boot I/O counters.
    fn disk(&mut self) -> Result<DiskReading, ProbeError>;
    /// Cumulative-since-boot byte counters across all interfaces.
    fn network(&mut self) -> Result<NetworkReading, ProbeError>;
    /// `None` when no compatible device is present.
    fn gpu(&mut self) -> Option<GpuReading>;
    fn uptime_secs(&self) -> u64;
    fn logical_cores(&self) -> usize;

    /// Walk the whole process table once. A process that cannot be read
    /// yields an `Err` entry instead of aborting the walk.
    fn refresh_processes(&mut self) -> Vec<Result<RawProcess, ProbeError>>;
    /// Refresh and read a single process.
    fn process(&mut self, pid: u32) -> Result<RawProcess, ProbeError>;

    fn process_extras(&self, _pid: u32) -> ProcessExtras {
        ProcessExtras::default()
    }

    fn signal(&mut self, pid: u32, signal: ProcessSignal) -> Result<(), ProbeError>;
}

pub trait PlatformExtensions {
    fn process_group_name(pid: u32) -> Option<String>;
    fn process_priority(pid: u32) -> Option<i32>;
    fn process_io(pid: u32) -> Option<IoStats>;
    fn process_connections(pid: u32) -> Option<usize>;
    fn send_signal(pid: u32, signal: ProcessSignal) -> Result<(), ProbeError>;
}

pub fn process_group_name(pid: u32) -> Option<String> {
    platform_impl::Platform::process_group_name(pid)
}

pub fn process_priority(pid: u32) -> Option<i32> {
    platform_impl::Platform::process_priority(pid)
}

pub fn process_io(pid: u32) -> Option<IoStats> {
    platform_impl::Platform::process_io(pid)
}

pub fn process_connections(pid: u32) -> Option<usize> {
    platform_impl::Platform::process_connections(pid)
}

pub fn send_signal(pid: u32, signal: ProcessSignal) -> Result<(), ProbeError> {
    platform_impl::Platform::send_signal(pid, signal)
}

/// Native backing for this host, selected once at startup.
pub fn native_probe(with_gpu: bool) -> Box<dyn HostProbe> {
    Box::new(SysinfoProbe::new(with_gpu))
}
