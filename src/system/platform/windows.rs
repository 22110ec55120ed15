use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, GetLastError, HANDLE,
};
use windows_sys::Win32::System::Threading::{
    GetPriorityClass, GetProcessIoCounters, IO_COUNTERS, OpenProcess, PROCESS_ACCESS_RIGHTS,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE, TerminateProcess,
};

use super::{IoStats, PlatformExtensions, ProbeError, ProcessSignal};

pub struct Platform;

/// Process handle closed on drop.
struct OwnedProcess(HANDLE);

impl OwnedProcess {
    fn open(pid: u32, access: PROCESS_ACCESS_RIGHTS) -> Result<Self, ProbeError> {
        let handle = unsafe { OpenProcess(access, 0, pid) };
        if handle.is_null() {
            Err(last_error_for(pid))
        } else {
            Ok(OwnedProcess(handle))
        }
    }
}

impl Drop for OwnedProcess {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

fn last_error_for(pid: u32) -> ProbeError {
    match unsafe { GetLastError() } {
        ERROR_ACCESS_DENIED => ProbeError::PermissionDenied(pid),
        ERROR_INVALID_PARAMETER => ProbeError::NoSuchProcess(pid),
        code => ProbeError::Io(std::io::Error::from_raw_os_error(code as i32)),
    }
}

impl PlatformExtensions for Platform {
    fn process_group_name(_pid: u32) -> Option<String> {
        None
    }

    fn process_priority(pid: u32) -> Option<i32> {
        let process = OwnedProcess::open(pid, PROCESS_QUERY_LIMITED_INFORMATION).ok()?;
        match unsafe { GetPriorityClass(process.0) } {
            0 => None,
            class => Some(class as i32),
        }
    }

    fn process_connections(_pid: u32) -> Option<usize> {
        None
    }

    fn process_io(pid: u32) -> Option<IoStats> {
        let process = OwnedProcess::open(pid, PROCESS_QUERY_LIMITED_INFORMATION).ok()?;
        let mut counters: IO_COUNTERS = unsafe { std::mem::zeroed() };
        if unsafe { GetProcessIoCounters(process.0, &mut counters) } == 0 {
            return None;
        }
        Some(IoStats {
            read_bytes: counters.ReadTransferCount,
            write_bytes: counters.WriteTransferCount,
        })
    }

    /// Windows has no cooperative termination for arbitrary processes, so
    /// both termination signals end in `TerminateProcess`.
    fn send_signal(pid: u32, signal: ProcessSignal) -> Result<(), ProbeError> {
        match signal {
            ProcessSignal::Terminate | ProcessSignal::Kill => {
                let process = OwnedProcess::open(pid, PROCESS_TERMINATE)?;
                if unsafe { TerminateProcess(process.0, 1) } == 0 {
                    return Err(last_error_for(pid));
                }
                Ok(())
            }
            ProcessSignal::Stop => Err(ProbeError::Unsupported("suspend")),
            ProcessSignal::Continue => Err(ProbeError::Unsupported("resume")),
        }
    }
}
