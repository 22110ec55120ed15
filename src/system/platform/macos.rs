use libproc::libproc::proc_pid;

use super::{IoStats, PlatformExtensions, ProbeError, ProcessSignal};

pub struct Platform;

/// `getpriority` may legitimately return -1, so errno is cleared before the
/// call and consulted after it.
fn nice_value(pid: u32) -> Option<i32> {
    let who = libc::id_t::try_from(pid).ok()?;
    let value = unsafe {
        *libc::__error() = 0;
        libc::getpriority(libc::PRIO_PROCESS, who)
    };
    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    if value == -1 && errno != 0 {
        return None;
    }
    Some(value)
}

impl PlatformExtensions for Platform {
    fn process_group_name(pid: u32) -> Option<String> {
        let pid = i32::try_from(pid).ok()?;
        proc_pid::name(pid).ok().filter(|name| !name.is_empty())
    }

    fn process_priority(pid: u32) -> Option<i32> {
        nice_value(pid)
    }

    fn process_connections(_pid: u32) -> Option<usize> {
        None
    }

    fn process_io(_pid: u32) -> Option<IoStats> {
        None
    }

    fn send_signal(pid: u32, signal: ProcessSignal) -> Result<(), ProbeError> {
        super::unix::send_signal(pid, signal)
    }
}
