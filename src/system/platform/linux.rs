use super::{IoStats, PlatformExtensions, ProbeError, ProcessSignal};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn process_group_name(pid: u32) -> Option<String> {
        // cgroup v2 is a single "0::/path" line; v1 lists "id:controllers:path"
        let contents = std::fs::read_to_string(format!("/proc/{pid}/cgroup")).ok()?;
        contents.lines().rev().find_map(|line| {
            let path = line.splitn(3, ':').nth(2)?.trim_start_matches('/');
            let leaf = path.rsplit('/').next()?;
            (!leaf.is_empty()).then(|| leaf.to_string())
        })
    }

    fn process_priority(pid: u32) -> Option<i32> {
        let contents = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        // comm may contain spaces and parens; fields resume after the last ')'
        let after_comm = contents.rfind(')')? + 1;
        // state(0) ppid(1) ... cstime(14) priority(15) nice(16)
        contents[after_comm..]
            .split_whitespace()
            .nth(15)?
            .parse()
            .ok()
    }

    fn process_io(pid: u32) -> Option<IoStats> {
        let contents = std::fs::read_to_string(format!("/proc/{pid}/io")).ok()?;
        let field = |key: &str| {
            contents
                .lines()
                .find_map(|line| line.strip_prefix(key))
                .and_then(|val| val.trim().parse().ok())
        };
        Some(IoStats {
            read_bytes: field("read_bytes:")?,
            write_bytes: field("write_bytes:")?,
        })
    }

    fn process_connections(pid: u32) -> Option<usize> {
        let entries = std::fs::read_dir(format!("/proc/{pid}/fd")).ok()?;
        let sockets = entries
            .flatten()
            .filter_map(|entry| std::fs::read_link(entry.path()).ok())
            .filter(|target| target.to_string_lossy().starts_with("socket:"))
            .count();
        Some(sockets)
    }

    fn send_signal(pid: u32, signal: ProcessSignal) -> Result<(), ProbeError> {
        super::unix::send_signal(pid, signal)
    }
}
