use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::system::apps::{AppGroup, AppGrouper};
use crate::system::cache::SnapshotCache;
use crate::system::control::{BatchResult, ProcessController, TerminateOutcome};
use crate::system::enumerator::ProcessEnumerator;
use crate::system::platform::{self, HostProbe};
use crate::system::process::{CpuStrategy, ProcessDetail, ProcessRecord};
use crate::system::protection::ProtectionPolicy;
use crate::system::sampler::Sampler;
use crate::system::snapshot::SystemSnapshot;
use crate::worker::WorkerPool;

/// One native probe per consumer; CPU deltas are tracked per instance.
pub struct Probes {
    pub sampler: Box<dyn HostProbe>,
    pub enumerator: Box<dyn HostProbe>,
    pub controller: Box<dyn HostProbe>,
}

impl Probes {
    pub fn native(with_gpu: bool) -> Self {
        Probes {
            sampler: platform::native_probe(with_gpu),
            enumerator: platform::native_probe(false),
            controller: platform::native_probe(false),
        }
    }
}

/// Composition root: owns the cache, enumerator, controller and worker pool
/// and exposes the read and action operations an outer boundary consumes.
///
/// Sampling and enumeration share the bounded pool. Lifecycle actions get a
/// single-permit pool of their own, so a termination sitting in its grace
/// period never holds a permit the cache refresh needs, and the controller
/// only ever acts on one pid at a time.
pub struct Monitor {
    cache: SnapshotCache,
    enumerator: Arc<Mutex<ProcessEnumerator>>,
    controller: Arc<Mutex<ProcessController>>,
    grouper: AppGrouper,
    pool: WorkerPool,
    actions: WorkerPool,
}

impl Monitor {
    pub fn from_config(config: &Config) -> Self {
        Self::with_probes(Probes::native(config.sampler.gpu), config)
    }

    pub fn with_probes(probes: Probes, config: &Config) -> Self {
        let pool = WorkerPool::new(config.general.worker_threads);
        let policy = ProtectionPolicy::with_extra_names(
            &config.protection.extra_names,
            config.protection.max_reserved_pid,
        );

        let sampler = Sampler::new(probes.sampler, config.sampler_window());
        let cache = SnapshotCache::new(sampler, config.cache_ttl(), pool.clone());
        let enumerator =
            ProcessEnumerator::new(probes.enumerator, policy.clone(), config.precise_window());
        let controller = ProcessController::new(probes.controller, policy, config.grace_policy());

        tracing::debug!(
            ttl_ms = config.sampler.cache_ttl_ms,
            workers = config.general.worker_threads,
            "monitor ready"
        );

        Monitor {
            cache,
            enumerator: Arc::new(Mutex::new(enumerator)),
            controller: Arc::new(Mutex::new(controller)),
            grouper: AppGrouper::new(&config.apps.system_apps),
            pool,
            actions: WorkerPool::new(1),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub async fn get_snapshot(&self) -> Result<Arc<SystemSnapshot>> {
        self.cache.get_or_refresh().await
    }

    pub async fn list_processes(&self, mode: CpuStrategy) -> Result<Vec<ProcessRecord>> {
        self.with_enumerator(move |e| e.list_processes(mode)).await
    }

    /// Apps are built from a precise listing so group shares compare
    /// against total capacity.
    pub async fn list_apps(&self) -> Result<Vec<AppGroup>> {
        let processes = self.list_processes(CpuStrategy::Precise).await?;
        Ok(self.grouper.group(&processes))
    }

    pub async fn get_process_detail(&self, pid: u32) -> Result<ProcessDetail> {
        self.with_enumerator(move |e| e.detail(pid))
            .await?
            .map_err(|err| Error::from_probe(pid, err))
    }

    pub async fn terminate(&self, pid: u32, force: bool) -> Result<TerminateOutcome> {
        self.with_controller(move |c| c.terminate(pid, force)).await?
    }

    pub async fn suspend(&self, pid: u32) -> Result<()> {
        self.with_controller(move |c| c.suspend(pid)).await?
    }

    pub async fn resume(&self, pid: u32) -> Result<()> {
        self.with_controller(move |c| c.resume(pid)).await?
    }

    /// Per-pid results; the outer `Err` only signals that the batch could not
    /// be scheduled at all.
    pub async fn close_app(&self, pids: Vec<u32>) -> Result<BatchResult> {
        self.with_controller(move |c| c.close_app(&pids)).await
    }

    async fn with_enumerator<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut ProcessEnumerator) -> T + Send + 'static,
        T: Send + 'static,
    {
        let enumerator = Arc::clone(&self.enumerator);
        self.pool
            .run(move || {
                let mut guard = enumerator.lock().unwrap_or_else(PoisonError::into_inner);
                job(&mut guard)
            })
            .await
    }

    async fn with_controller<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut ProcessController) -> T + Send + 'static,
        T: Send + 'static,
    {
        let controller = Arc::clone(&self.controller);
        self.actions
            .run(move || {
                let mut guard = controller.lock().unwrap_or_else(PoisonError::into_inner);
                job(&mut guard)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::error::ErrorKind;
    use crate::system::platform::fake::{FakeHost, raw};
    use crate::system::process::ProcessStatus;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.processes.precise_window_ms = 0;
        config.sampler.cpu_window_ms = 0;
        config.control.grace_period_ms = 20;
        config.control.poll_interval_ms = 5;
        config.control.kill_wait_ms = 20;
        config
    }

    fn monitor(host: &FakeHost) -> Monitor {
        monitor_with(host, &test_config())
    }

    fn monitor_with(host: &FakeHost, config: &Config) -> Monitor {
        let probes = Probes {
            sampler: host.boxed(),
            enumerator: host.boxed(),
            controller: host.boxed(),
        };
        Monitor::with_probes(probes, config)
    }

    #[tokio::test]
    async fn snapshot_is_served_from_cache() {
        let host = FakeHost::healthy();
        let monitor = monitor(&host);
        let a = monitor.get_snapshot().await.unwrap();
        let b = monitor.get_snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn apps_group_same_named_processes() {
        let host = FakeHost::with_processes([
            raw(10, "chrome", 2.0, 100),
            raw(11, "chrome", 2.0, 100),
            raw(12, "chrome", 2.0, 100),
            raw(40, "editor", 1.0, 50),
        ]);
        let apps = monitor(&host).list_apps().await.unwrap();
        let chrome = apps.iter().find(|a| a.name == "chrome").unwrap();
        assert_eq!(chrome.pids, vec![10, 11, 12]);
        assert_eq!(chrome.process_count, 3);
        // pid 10 is within the reserved range
        assert!(!chrome.closeable);
        assert_eq!(apps.len(), 2);
    }

    #[tokio::test]
    async fn reserved_pid_termination_is_forbidden() {
        let host = FakeHost::with_processes([raw(4, "kthread", 0.0, 0)]);
        let err = monitor(&host).terminate(4, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protected);
        assert_eq!(err.transport_status().as_str(), "forbidden");
        assert!(host.state().signals.is_empty());
    }

    #[tokio::test]
    async fn unknown_pid_maps_to_not_found() {
        let host = FakeHost::healthy();
        let monitor = monitor(&host);
        let err = monitor.terminate(9_999_999, false).await.unwrap_err();
        assert_eq!(err.transport_status().as_str(), "not found");
        let err = monitor.get_process_detail(9_999_999).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn suspend_resume_round_trip_is_visible_in_listing() {
        let host = FakeHost::with_processes([raw(300, "encoder", 0.0, 10)]);
        let monitor = monitor(&host);

        monitor.suspend(300).await.unwrap();
        let listed = monitor.list_processes(CpuStrategy::Fast).await.unwrap();
        assert_eq!(listed[0].status, ProcessStatus::Stopped);

        monitor.resume(300).await.unwrap();
        let listed = monitor.list_processes(CpuStrategy::Fast).await.unwrap();
        assert_eq!(listed[0].status, ProcessStatus::Running);
    }

    #[tokio::test]
    async fn close_app_isolates_failures() {
        let host = FakeHost::with_processes([
            raw(110, "chrome", 0.0, 1),
            raw(111, "chrome", 0.0, 1),
            raw(112, "chrome", 0.0, 1),
        ]);
        host.state().denied.insert(111);
        let batch = monitor(&host).close_app(vec![110, 111, 112]).await.unwrap();
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.failed(), 1);
        assert_eq!(batch.outcomes[1].pid, 111);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_terminations_do_not_starve_snapshot_reads() {
        let host = FakeHost::with_processes([
            raw(100, "stubborn", 0.0, 1),
            raw(101, "stubborn", 0.0, 1),
        ]);
        host.state().ignores_terminate.extend([100, 101]);
        let mut config = test_config();
        config.general.worker_threads = 2;
        config.control.grace_period_ms = 800;
        let monitor = Arc::new(monitor_with(&host, &config));

        let actions: Vec<_> = [100, 101]
            .into_iter()
            .map(|pid| {
                let monitor = Arc::clone(&monitor);
                tokio::spawn(async move { monitor.terminate(pid, false).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        monitor.get_snapshot().await.unwrap();
        let waited = started.elapsed();
        assert!(waited < Duration::from_millis(200), "snapshot waited {waited:?}");

        for action in actions {
            assert_eq!(action.await.unwrap().unwrap(), TerminateOutcome::Escalated);
        }
    }
}
