use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use serde::Serialize;

use hostwatch::config::{Config, load_config, load_config_from_path};
use hostwatch::error::Error;
use hostwatch::format::{cell, format_bytes, format_percent, format_uptime};
use hostwatch::logging;
use hostwatch::service::Monitor;
use hostwatch::system::apps::AppGroup;
use hostwatch::system::control::{BatchResult, TerminateOutcome};
use hostwatch::system::process::{CpuStrategy, ProcessDetail, ProcessRecord};
use hostwatch::system::snapshot::SystemSnapshot;

#[derive(Parser)]
#[command(
    name = "hostwatch",
    about = "Host telemetry sampler and process control"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Poll period of `watch` in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// Snapshot cache TTL in milliseconds
    #[arg(long)]
    ttl: Option<u64>,

    /// Log filter, e.g. `debug` or `hostwatch=trace`
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = Output::Json, global = true)]
    output: Output,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Json,
    Table,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate host metrics
    Snapshot,
    /// Every readable process
    Processes {
        /// fast: single read, raw per-core scale. precise: sampled and
        /// normalized to total capacity
        #[arg(long, default_value = "fast")]
        mode: CpuStrategy,
    },
    /// Processes grouped by executable
    Apps,
    /// Detail for one process
    Info { pid: u32 },
    /// Terminate a process, escalating after the grace period
    Kill {
        pid: u32,
        /// Skip the grace period
        #[arg(long)]
        force: bool,
    },
    Suspend { pid: u32 },
    Resume { pid: u32 },
    /// Terminate every member of an application group
    CloseApp {
        #[arg(required = true)]
        pids: Vec<u32>,
    },
    /// Print a snapshot every refresh period
    Watch {
        /// Stop after this many samples
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Operation(#[from] Error),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    logging::init(&config.logging)?;

    let monitor = Monitor::from_config(&config);
    match run(&cli, &config, &monitor).await {
        Ok(code) => Ok(code),
        Err(CliError::Operation(err)) => {
            report_failure(&err);
            Ok(ExitCode::FAILURE)
        }
        Err(err @ CliError::Encode(_)) => Err(err.into()),
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(ttl) = cli.ttl {
        config.sampler.cache_ttl_ms = ttl;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    config
}

async fn run(cli: &Cli, config: &Config, monitor: &Monitor) -> Result<ExitCode, CliError> {
    let table = cli.output == Output::Table;
    match &cli.command {
        Command::Snapshot => {
            let snapshot = monitor.get_snapshot().await?;
            if table {
                print_snapshot(&snapshot);
            } else {
                print_json(&*snapshot)?;
            }
        }
        Command::Processes { mode } => {
            let processes = monitor.list_processes(*mode).await?;
            if table {
                print_processes(&processes);
            } else {
                print_json(&processes)?;
            }
        }
        Command::Apps => {
            let apps = monitor.list_apps().await?;
            if table {
                print_apps(&apps);
            } else {
                print_json(&apps)?;
            }
        }
        Command::Info { pid } => {
            let detail = monitor.get_process_detail(*pid).await?;
            if table {
                print_detail(&detail);
            } else {
                print_json(&detail)?;
            }
        }
        Command::Kill { pid, force } => {
            let outcome = monitor.terminate(*pid, *force).await?;
            print_action(table, *pid, "terminate", Some(outcome))?;
        }
        Command::Suspend { pid } => {
            monitor.suspend(*pid).await?;
            print_action(table, *pid, "suspend", None)?;
        }
        Command::Resume { pid } => {
            monitor.resume(*pid).await?;
            print_action(table, *pid, "resume", None)?;
        }
        Command::CloseApp { pids } => {
            let batch = monitor.close_app(pids.clone()).await?;
            print_batch(table, &batch)?;
            if batch.failed() > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Watch { count } => {
            let period = Duration::from_millis(config.general.refresh_rate_ms.max(1));
            let mut ticker = tokio::time::interval(period);
            let mut taken = 0u64;
            while count.is_none_or(|limit| taken < limit) {
                ticker.tick().await;
                let snapshot = monitor.get_snapshot().await?;
                if table {
                    println!("{}", summary_line(&snapshot));
                } else {
                    println!("{}", serde_json::to_string(&*snapshot)?);
                }
                taken += 1;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report_failure(err: &Error) {
    eprintln!("{}: {}", err.transport_status().as_str(), err.public_message());
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct ActionView {
    pid: u32,
    action: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<TerminateOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_action(
    table: bool,
    pid: u32,
    action: &'static str,
    outcome: Option<TerminateOutcome>,
) -> Result<(), serde_json::Error> {
    if table {
        match outcome {
            Some(outcome) => println!("{action} {pid}: ok ({})", outcome_label(outcome)),
            None => println!("{action} {pid}: ok"),
        }
        return Ok(());
    }
    print_json(&ActionView {
        pid,
        action,
        ok: true,
        outcome,
        status: None,
        error: None,
    })
}

fn print_batch(table: bool, batch: &BatchResult) -> Result<(), serde_json::Error> {
    let views: Vec<ActionView> = batch
        .outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(outcome) => ActionView {
                pid: o.pid,
                action: "terminate",
                ok: true,
                outcome: Some(*outcome),
                status: None,
                error: None,
            },
            Err(err) => ActionView {
                pid: o.pid,
                action: "terminate",
                ok: false,
                outcome: None,
                status: Some(err.transport_status().as_str()),
                error: Some(err.public_message()),
            },
        })
        .collect();

    if !table {
        return print_json(&views);
    }
    for view in &views {
        match (&view.outcome, &view.error) {
            (Some(outcome), _) => println!("{:>8}  ok ({})", view.pid, outcome_label(*outcome)),
            (None, Some(error)) => println!(
                "{:>8}  {}: {error}",
                view.pid,
                view.status.unwrap_or("failed")
            ),
            (None, None) => println!("{:>8}  failed", view.pid),
        }
    }
    println!("{} closed, {} failed", batch.succeeded(), batch.failed());
    Ok(())
}

fn outcome_label(outcome: TerminateOutcome) -> &'static str {
    match outcome {
        TerminateOutcome::Exited => "exited",
        TerminateOutcome::Escalated => "killed",
    }
}

fn summary_line(s: &SystemSnapshot) -> String {
    format!(
        "{}  cpu {}  mem {}  disk {}  net {}/{}",
        s.timestamp.format("%H:%M:%S"),
        format_percent(s.cpu.percent),
        format_percent(s.memory.percent),
        format_percent(s.disk.percent),
        format_bytes(s.network.bytes_sent),
        format_bytes(s.network.bytes_recv),
    )
}

fn print_snapshot(s: &SystemSnapshot) {
    println!("{}", s.timestamp.to_rfc3339());
    println!(
        "cpu      {}  ({} physical / {} logical)",
        format_percent(s.cpu.percent),
        s.cpu.cores.physical,
        s.cpu.cores.logical
    );
    println!(
        "memory   {} / {}  ({})",
        format_bytes(s.memory.used),
        format_bytes(s.memory.total),
        format_percent(s.memory.percent)
    );
    println!(
        "swap     {} / {}  ({})",
        format_bytes(s.swap.used),
        format_bytes(s.swap.total),
        format_percent(s.swap.percent)
    );
    println!(
        "disk     {} / {}  ({})  read {} write {}",
        format_bytes(s.disk.used),
        format_bytes(s.disk.total),
        format_percent(s.disk.percent),
        format_bytes(s.disk.io.read_bytes),
        format_bytes(s.disk.io.write_bytes)
    );
    println!(
        "network  sent {}  recv {}",
        format_bytes(s.network.bytes_sent),
        format_bytes(s.network.bytes_recv)
    );
    println!("host     {}  up {}", s.host.os, format_uptime(s.host.uptime_seconds));
    if let Some(gpu) = &s.gpu {
        println!(
            "gpu      {}  load {}  vram {} / {}",
            gpu.name,
            format_percent(gpu.load),
            format_bytes(gpu.memory_used),
            format_bytes(gpu.memory_total)
        );
    }
}

fn print_processes(processes: &[ProcessRecord]) {
    println!(
        "{:>8}  {}  {}  {}  {:>7}  {:>9}",
        "PID",
        cell("NAME", 24),
        cell("USER", 12),
        cell("STATUS", 10),
        "CPU%",
        "MEM"
    );
    for p in processes {
        println!(
            "{:>8}  {}  {}  {}  {:>7}  {:>9}",
            p.pid,
            cell(&p.name, 24),
            cell(p.owner.as_deref().unwrap_or("-"), 12),
            cell(p.status.as_str(), 10),
            format!("{:.1}", p.cpu_percent),
            format_bytes(p.memory_bytes)
        );
    }
}

fn print_apps(apps: &[AppGroup]) {
    println!(
        "{}  {:>5}  {:>7}  {:>9}  CLOSEABLE",
        cell("APP", 28),
        "PROCS",
        "CPU%",
        "MEM"
    );
    for app in apps {
        println!(
            "{}  {:>5}  {:>7}  {:>9}  {}",
            cell(&app.name, 28),
            app.process_count,
            format!("{:.1}", app.cpu_percent),
            format_bytes(app.memory_bytes),
            if app.closeable { "yes" } else { "no" }
        );
    }
}

fn print_detail(d: &ProcessDetail) {
    let r = &d.record;
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!("pid        {}", r.pid);
    println!("name       {}", r.name);
    println!("status     {}", r.status);
    println!("user       {}", or_dash(r.owner.clone()));
    println!("parent     {}", or_dash(r.parent_pid.map(|p| p.to_string())));
    println!("cpu        {}", format_percent(r.cpu_percent));
    println!(
        "memory     {} ({})  virtual {}",
        format_bytes(r.memory_bytes),
        format_percent(r.memory_percent),
        format_bytes(d.virtual_memory_bytes)
    );
    println!("threads    {}", r.thread_count);
    println!("exe        {}", or_dash(r.executable_path.clone()));
    println!("cwd        {}", or_dash(r.working_directory.clone()));
    println!("command    {}", r.command_line.join(" "));
    println!("running    {}", format_uptime(d.run_time_secs));
    println!("priority   {}", or_dash(d.priority.map(|p| p.to_string())));
    println!("cgroup     {}", or_dash(d.cgroup.clone()));
    println!("files      {}", or_dash(d.open_files.map(|n| n.to_string())));
    println!("sockets    {}", or_dash(d.connections.map(|n| n.to_string())));
    if let Some(io) = &d.io {
        println!(
            "io         read {}  write {}",
            format_bytes(io.read_bytes),
            format_bytes(io.write_bytes)
        );
    }
    println!("protected  {}", if r.protected { "yes" } else { "no" });
}
