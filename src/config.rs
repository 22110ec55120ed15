use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::system::apps::DEFAULT_SYSTEM_APPS;
use crate::system::control::GracePolicy;
use crate::system::protection::DEFAULT_MAX_RESERVED_PID;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub sampler: SamplerConfig,
    pub processes: ProcessesConfig,
    pub control: ControlConfig,
    pub protection: ProtectionConfig,
    pub apps: AppsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Poll period of the `watch` loop.
    pub refresh_rate_ms: u64,
    /// Upper bound on concurrent blocking OS jobs.
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 2000,
            worker_threads: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub cache_ttl_ms: u64,
    pub cpu_window_ms: u64,
    pub gpu: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            cache_ttl_ms: 500,
            cpu_window_ms: 100,
            gpu: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProcessesConfig {
    pub precise_window_ms: u64,
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        ProcessesConfig {
            precise_window_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub grace_period_ms: u64,
    pub poll_interval_ms: u64,
    pub kill_wait_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            grace_period_ms: 3000,
            poll_interval_ms: 50,
            kill_wait_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Added to the built-in list of critical names.
    pub extra_names: Vec<String>,
    pub max_reserved_pid: u32,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        ProtectionConfig {
            extra_names: Vec::new(),
            max_reserved_pid: DEFAULT_MAX_RESERVED_PID,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    pub system_apps: Vec<String>,
}

impl Default for AppsConfig {
    fn default() -> Self {
        AppsConfig {
            system_apps: DEFAULT_SYSTEM_APPS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.sampler.cache_ttl_ms)
    }

    /// CPU sampling window, never longer than the cache TTL so refreshes
    /// cannot queue up behind it.
    pub fn sampler_window(&self) -> Duration {
        Duration::from_millis(self.sampler.cpu_window_ms).min(self.cache_ttl())
    }

    pub fn precise_window(&self) -> Duration {
        Duration::from_millis(self.processes.precise_window_ms)
    }

    pub fn grace_policy(&self) -> GracePolicy {
        GracePolicy {
            grace_period: Duration::from_millis(self.control.grace_period_ms),
            poll_interval: Duration::from_millis(self.control.poll_interval_ms.max(1)),
            kill_wait: Duration::from_millis(self.control.kill_wait_ms),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hostwatch").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
