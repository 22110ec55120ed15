/// Critical process names matched case-insensitively as substrings.
pub const DEFAULT_PROTECTED_NAMES: &[&str] = &[
    "system",
    "system idle process",
    "registry",
    "smss.exe",
    "csrss.exe",
    "wininit.exe",
    "services.exe",
    "lsass.exe",
    "winlogon.exe",
    "dwm.exe",
    "svchost.exe",
    "explorer.exe",
    "systemd",
    "kthreadd",
    "launchd",
    "kernel_task",
    "windowserver",
];

/// Pids at or below this are kernel/init territory.
pub const DEFAULT_MAX_RESERVED_PID: u32 = 10;

/// Decides which processes destructive operations must never touch.
///
/// Pure: no I/O, no shared mutable state. The same inputs always produce
/// the same answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectionPolicy {
    names: Vec<String>,
    max_reserved_pid: u32,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_NAMES.iter().copied(), DEFAULT_MAX_RESERVED_PID)
    }
}

impl ProtectionPolicy {
    pub fn new<I, S>(names: I, max_reserved_pid: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            // an empty needle would match every name
            .filter(|n| !n.is_empty())
            .collect();
        ProtectionPolicy {
            names,
            max_reserved_pid,
        }
    }

    /// Built-in list plus operator-supplied names.
    pub fn with_extra_names<I, S>(extra: I, max_reserved_pid: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let builtin = DEFAULT_PROTECTED_NAMES.iter().map(|s| s.to_string());
        let extra = extra.into_iter().map(|s| s.as_ref().to_string());
        Self::new(builtin.chain(extra), max_reserved_pid)
    }

    pub fn protects_pid(&self, pid: u32) -> bool {
        pid <= self.max_reserved_pid
    }

    pub fn matches_name(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.names.iter().any(|needle| lowered.contains(needle.as_str()))
    }

    pub fn is_protected(&self, name: &str, pid: u32) -> bool {
        self.protects_pid(pid) || self.matches_name(name)
    }
}
