use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::process::ProcessRecord;

/// Core OS shells that stay visible but are never offered for closing.
pub const DEFAULT_SYSTEM_APPS: &[&str] = &[
    "explorer",
    "svchost",
    "dwm",
    "csrss",
    "winlogon",
    "systemd",
    "dbus-daemon",
    "gnome-shell",
    "plasmashell",
    "kwin_wayland",
    "kwin_x11",
    "xorg",
    "xwayland",
    "launchd",
    "windowserver",
    "loginwindow",
    "dock",
    "finder",
];

/// Processes aggregated under one executable identity. Rebuilt on every
/// enumeration, never stored.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppGroup {
    pub name: String,
    /// Ascending.
    pub pids: Vec<u32>,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub process_count: usize,
    pub closeable: bool,
    pub executable_path: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppGrouper {
    system_apps: HashSet<String>,
}

impl Default for AppGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_APPS.iter().copied())
    }
}

impl AppGrouper {
    pub fn new<I, S>(system_apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        AppGrouper {
            system_apps: system_apps
                .into_iter()
                .map(|name| normalize_name(name.as_ref()))
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn is_system_app(&self, key: &str) -> bool {
        self.system_apps.contains(key)
    }

    /// Every input record lands in exactly one group.
    pub fn group(&self, processes: &[ProcessRecord]) -> Vec<AppGroup> {
        let _span = tracing::debug_span!("apps.group", processes = processes.len()).entered();

        let mut buckets: HashMap<String, Vec<&ProcessRecord>> = HashMap::new();
        for process in processes {
            let key = app_key(&process.name, process.executable_path.as_deref());
            buckets.entry(key).or_default().push(process);
        }

        let mut groups: Vec<AppGroup> = buckets
            .into_iter()
            .map(|(name, mut members)| {
                members.sort_by_key(|m| m.pid);
                let closeable =
                    !self.is_system_app(&name) && members.iter().all(|m| !m.protected);
                AppGroup {
                    pids: members.iter().map(|m| m.pid).collect(),
                    cpu_percent: members.iter().map(|m| m.cpu_percent).sum(),
                    memory_bytes: members.iter().map(|m| m.memory_bytes).sum(),
                    process_count: members.len(),
                    closeable,
                    executable_path: members.iter().find_map(|m| m.executable_path.clone()),
                    name,
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            b.cpu_percent
                .total_cmp(&a.cpu_percent)
                .then(b.memory_bytes.cmp(&a.memory_bytes))
                .then_with(|| a.name.cmp(&b.name))
        });
        groups
    }
}

/// Grouping key: base executable name, case-folded, `.exe` suffix removed.
/// Falls back to the process name when the executable path is unknown.
pub fn app_key(name: &str, executable_path: Option<&str>) -> String {
    let from_path = executable_path
        .and_then(|path| path.rsplit(['/', '\\']).next())
        .map(normalize_name)
        .filter(|key| !key.is_empty());
    match from_path {
        Some(key) => key,
        None => {
            let key = normalize_name(name);
            if key.is_empty() { "unknown".to_string() } else { key }
        }
    }
}

fn normalize_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    // Linux reports replaced binaries as "<path> (deleted)"
    let lowered = lowered.strip_suffix(" (deleted)").unwrap_or(&lowered);
    lowered
        .strip_suffix(".exe")
        .unwrap_or(lowered)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::process::ProcessStatus;

    fn record(pid: u32, name: &str, cpu: f32, mem: u64) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.to_string(),
            owner: None,
            status: ProcessStatus::Running,
            cpu_percent: cpu,
            memory_bytes: mem,
            memory_percent: 0.0,
            thread_count: 1,
            parent_pid: None,
            executable_path: None,
            working_directory: None,
            command_line: Vec::new(),
            creation_time: 0,
            protected: false,
        }
    }

    #[test]
    fn same_executable_forms_one_group() {
        let procs = vec![
            record(10, "chrome", 1.0, 100),
            record(11, "chrome", 2.0, 200),
            record(12, "chrome", 3.0, 300),
        ];
        let groups = AppGrouper::default().group(&procs);
        assert_eq!(groups.len(), 1);
        let chrome = &groups[0];
        assert_eq!(chrome.name, "chrome");
        assert_eq!(chrome.process_count, 3);
        assert_eq!(chrome.pids, vec![10, 11, 12]);
        assert_eq!(chrome.memory_bytes, 600);
        assert!(chrome.closeable);
    }

    #[test]
    fn key_folds_case_and_strips_suffix() {
        assert_eq!(app_key("Chrome.EXE", None), "chrome");
        assert_eq!(
            app_key("ignored", Some(r"C:\Program Files\Google\Chrome.exe")),
            "chrome"
        );
        assert_eq!(app_key("x", Some("/usr/bin/python3 (deleted)")), "python3");
        assert_eq!(app_key("kworker/0:1", Some("")), "kworker/0:1");
        assert_eq!(app_key("", None), "unknown");
    }

    #[test]
    fn system_apps_are_listed_but_not_closeable() {
        let procs = vec![record(500, "explorer.exe", 0.0, 10), record(600, "editor", 0.0, 10)];
        let groups = AppGrouper::default().group(&procs);
        let explorer = groups.iter().find(|g| g.name == "explorer").unwrap();
        assert!(!explorer.closeable);
        let editor = groups.iter().find(|g| g.name == "editor").unwrap();
        assert!(editor.closeable);
    }

    #[test]
    fn one_protected_member_blocks_closing() {
        let mut procs = vec![record(700, "agent", 0.0, 10), record(701, "agent", 0.0, 10)];
        procs[1].protected = true;
        let groups = AppGrouper::default().group(&procs);
        assert!(!groups[0].closeable);
    }

    #[test]
    fn groups_sorted_by_cpu_then_memory() {
        let procs = vec![
            record(20, "idle", 0.0, 5),
            record(21, "busy", 9.0, 1),
            record(22, "fat", 0.0, 50),
        ];
        let names: Vec<String> = AppGrouper::default()
            .group(&procs)
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["busy", "fat", "idle"]);
    }
}
