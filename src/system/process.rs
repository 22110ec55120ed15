use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::platform::{IoStats, RawProcess};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    DiskSleep,
    Dead,
}

impl ProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Zombie => "zombie",
            ProcessStatus::DiskSleep => "disk-sleep",
            ProcessStatus::Dead => "dead",
        }
    }

    /// Zombie and dead entries only linger in the table; the process itself is gone.
    pub fn has_exited(self) -> bool {
        matches!(self, ProcessStatus::Zombie | ProcessStatus::Dead)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How per-process CPU is normalized. The two are never mixed in one listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuStrategy {
    /// Single cheap read, not divided by core count. Sums may exceed 100.
    #[default]
    Fast,
    /// Extra sampling window, divided by logical cores so the sum tracks
    /// total system CPU.
    Precise,
}

impl FromStr for CpuStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(CpuStrategy::Fast),
            "precise" => Ok(CpuStrategy::Precise),
            other => Err(format!("unknown cpu mode `{other}` (expected fast or precise)")),
        }
    }
}

/// Stable identity of one process incarnation; pids alone are recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub creation_time: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub owner: Option<String>,
    pub status: ProcessStatus,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub memory_percent: f32,
    pub thread_count: usize,
    pub parent_pid: Option<u32>,
    pub executable_path: Option<String>,
    pub working_directory: Option<String>,
    pub command_line: Vec<String>,
    /// Seconds since the Unix epoch.
    pub creation_time: u64,
    pub protected: bool,
}

impl ProcessRecord {
    pub(crate) fn from_raw(
        raw: RawProcess,
        cpu_percent: f32,
        total_memory: u64,
        protected: bool,
    ) -> Self {
        let memory_percent = if total_memory > 0 {
            ((raw.memory_bytes as f64 / total_memory as f64) * 100.0).clamp(0.0, 100.0) as f32
        } else {
            0.0
        };
        ProcessRecord {
            pid: raw.pid,
            name: raw.name,
            owner: raw.owner,
            status: raw.status,
            cpu_percent,
            memory_bytes: raw.memory_bytes,
            memory_percent,
            thread_count: raw.thread_count,
            parent_pid: raw.parent_pid,
            executable_path: raw.executable_path.map(|p| p.display().to_string()),
            working_directory: raw.working_directory.map(|p| p.display().to_string()),
            command_line: raw.command_line,
            creation_time: raw.start_time,
            protected,
        }
    }

    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity {
            pid: self.pid,
            creation_time: self.creation_time,
        }
    }
}

/// Everything the detail view shows for one process.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessDetail {
    #[serde(flatten)]
    pub record: ProcessRecord,
    pub virtual_memory_bytes: u64,
    pub run_time_secs: u64,
    pub priority: Option<i32>,
    pub cgroup: Option<String>,
    pub io: Option<IoStats>,
    pub open_files: Option<usize>,
    pub connections: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Precise".parse::<CpuStrategy>(), Ok(CpuStrategy::Precise));
        assert_eq!("fast".parse::<CpuStrategy>(), Ok(CpuStrategy::Fast));
        assert!("slow".parse::<CpuStrategy>().is_err());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&ProcessStatus::DiskSleep).unwrap();
        assert_eq!(json, "\"disk-sleep\"");
        assert!(ProcessStatus::Zombie.has_exited());
        assert!(!ProcessStatus::Stopped.has_exited());
    }
}
