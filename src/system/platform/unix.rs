use std::io;

use super::{ProbeError, ProcessSignal};

pub(super) fn send_signal(pid: u32, signal: ProcessSignal) -> Result<(), ProbeError> {
    // Non-positive pid_t values address process groups, never a single process.
    let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
        return Err(ProbeError::NoSuchProcess(pid));
    };
    if raw_pid <= 0 {
        return Err(ProbeError::NoSuchProcess(pid));
    }

    let signo = match signal {
        ProcessSignal::Terminate => libc::SIGTERM,
        ProcessSignal::Kill => libc::SIGKILL,
        ProcessSignal::Stop => libc::SIGSTOP,
        ProcessSignal::Continue => libc::SIGCONT,
    };

    let rc = unsafe { libc::kill(raw_pid, signo) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Err(ProbeError::NoSuchProcess(pid)),
        Some(libc::EPERM) => Err(ProbeError::PermissionDenied(pid)),
        _ => Err(ProbeError::Io(err)),
    }
}
