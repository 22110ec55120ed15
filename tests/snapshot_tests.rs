use hostwatch::system::apps::AppGrouper;
use hostwatch::system::process::{ProcessRecord, ProcessStatus};
use insta::assert_debug_snapshot;

fn mock_process(pid: u32, name: &str, exe: Option<&str>, cpu: f32, memory_bytes: u64) -> ProcessRecord {
    ProcessRecord {
        pid,
        name: name.to_string(),
        owner: Some("tester".to_string()),
        status: ProcessStatus::Running,
        cpu_percent: cpu,
        memory_bytes,
        memory_percent: 0.0,
        thread_count: 4,
        parent_pid: Some(1),
        executable_path: exe.map(str::to_string),
        working_directory: None,
        command_line: vec![name.to_string()],
        creation_time: 1_700_000_000,
        protected: false,
    }
}

#[test]
fn grouped_apps_snapshot() {
    let mut agent = mock_process(401, "agent", None, 0.5, 10);
    agent.protected = true;
    let procs = vec![
        mock_process(102, "chrome", Some("/opt/google/chrome/chrome"), 2.0, 200),
        mock_process(101, "chrome", Some("/opt/google/chrome/chrome"), 1.5, 300),
        mock_process(205, "Code.exe", Some(r"C:\Program Files\Microsoft VS Code\Code.exe"), 5.0, 700),
        mock_process(300, "explorer.exe", None, 0.0, 50),
        agent,
        mock_process(402, "agent", None, 0.5, 10),
    ];

    let rows: Vec<(String, Vec<u32>, usize, u64, bool)> = AppGrouper::default()
        .group(&procs)
        .into_iter()
        .map(|g| (g.name, g.pids, g.process_count, g.memory_bytes, g.closeable))
        .collect();

    assert_debug_snapshot!(rows);
}
