use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::platform::{HostProbe, ProbeError, ProcessSignal, RawProcess};
use super::process::{ProcessIdentity, ProcessStatus};
use super::protection::ProtectionPolicy;
use crate::error::{Error, Result};

/// Bounds for waiting on a process to leave the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GracePolicy {
    /// How long a cooperative termination gets before escalation.
    pub grace_period: Duration,
    pub poll_interval: Duration,
    /// How long to watch for exit after a forced kill.
    pub kill_wait: Duration,
}

impl Default for GracePolicy {
    fn default() -> Self {
        GracePolicy {
            grace_period: Duration::from_secs(3),
            poll_interval: Duration::from_millis(50),
            kill_wait: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateOutcome {
    /// Left on its own within the grace period.
    Exited,
    /// Force-killed, either on request or after the grace period ran out.
    Escalated,
}

#[derive(Debug)]
pub struct PidOutcome {
    pub pid: u32,
    pub result: Result<TerminateOutcome>,
}

/// One entry per requested pid, in request order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<PidOutcome>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (u32, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.pid, e)))
    }
}

/// Executes lifecycle transitions on single processes.
///
/// ```text
/// Running --suspend--> Stopped --resume--> Running
/// Running | Stopped --terminate--> Terminated
/// ```
///
/// Protection is checked before any signal is sent.
pub struct ProcessController {
    probe: Box<dyn HostProbe>,
    policy: ProtectionPolicy,
    grace: GracePolicy,
}

impl ProcessController {
    pub fn new(probe: Box<dyn HostProbe>, policy: ProtectionPolicy, grace: GracePolicy) -> Self {
        ProcessController {
            probe,
            policy,
            grace,
        }
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    pub fn terminate(&mut self, pid: u32, force: bool) -> Result<TerminateOutcome> {
        let target = self.resolve(pid)?;
        let identity = identity_of(&target);
        tracing::info!(pid, name = %target.name, force, "terminating process");

        if force {
            self.send(pid, ProcessSignal::Kill)?;
            self.wait_for_exit(identity, self.grace.kill_wait);
            return Ok(TerminateOutcome::Escalated);
        }

        self.send(pid, ProcessSignal::Terminate)?;
        if target.status == ProcessStatus::Stopped {
            // a stopped process only acts on the signal once continued
            if let Err(err) = self.probe.signal(pid, ProcessSignal::Continue) {
                tracing::debug!(pid, error = %err, "continue after terminate failed");
            }
        }
        if self.wait_for_exit(identity, self.grace.grace_period) {
            return Ok(TerminateOutcome::Exited);
        }

        tracing::warn!(
            pid,
            grace_ms = self.grace.grace_period.as_millis() as u64,
            "grace period elapsed, escalating to kill"
        );
        match self.probe.signal(pid, ProcessSignal::Kill) {
            Ok(()) => {}
            Err(ProbeError::NoSuchProcess(_)) => return Ok(TerminateOutcome::Exited),
            Err(err) => return Err(Error::from_probe(pid, err)),
        }
        self.wait_for_exit(identity, self.grace.kill_wait);
        Ok(TerminateOutcome::Escalated)
    }

    pub fn suspend(&mut self, pid: u32) -> Result<()> {
        let target = self.resolve(pid)?;
        if target.status == ProcessStatus::Stopped {
            return Ok(());
        }
        tracing::info!(pid, name = %target.name, "suspending process");
        self.send(pid, ProcessSignal::Stop)
    }

    pub fn resume(&mut self, pid: u32) -> Result<()> {
        let target = self.resolve(pid)?;
        tracing::info!(pid, name = %target.name, "resuming process");
        self.send(pid, ProcessSignal::Continue)
    }

    /// Terminates every member pid, one at a time. A failure on one pid is
    /// recorded and the rest are still attempted.
    pub fn close_app(&mut self, pids: &[u32]) -> BatchResult {
        let _span = tracing::debug_span!("control.close_app", count = pids.len()).entered();

        let mut seen = std::collections::HashSet::new();
        let mut batch = BatchResult::default();
        for &pid in pids.iter().filter(|pid| seen.insert(**pid)) {
            let result = self.terminate(pid, false);
            if let Err(err) = &result {
                tracing::warn!(pid, error = %err, "close_app member failed");
            }
            batch.outcomes.push(PidOutcome { pid, result });
        }
        batch
    }

    fn resolve(&mut self, pid: u32) -> Result<RawProcess> {
        if self.policy.protects_pid(pid) {
            return Err(Error::Protected {
                pid,
                name: "reserved pid".to_string(),
            });
        }
        let process = self
            .probe
            .process(pid)
            .map_err(|err| Error::from_probe(pid, err))?;
        if process.status.has_exited() {
            return Err(Error::NotFound(pid));
        }
        if self.policy.matches_name(&process.name) {
            return Err(Error::Protected {
                pid,
                name: process.name,
            });
        }
        Ok(process)
    }

    fn send(&mut self, pid: u32, signal: ProcessSignal) -> Result<()> {
        self.probe.signal(pid, signal).map_err(|err| {
            tracing::debug!(pid, signal = signal.name(), error = %err, "signal failed");
            Error::from_probe(pid, err)
        })
    }

    /// True once the incarnation identified by `identity` is gone.
    fn wait_for_exit(&mut self, identity: ProcessIdentity, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.probe.process(identity.pid) {
                Err(ProbeError::NoSuchProcess(_)) => return true,
                // the pid now belongs to someone else
                Ok(p) if p.start_time != identity.creation_time || p.status.has_exited() => {
                    return true;
                }
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(self.grace.poll_interval.min(deadline - now));
        }
    }
}

fn identity_of(process: &RawProcess) -> ProcessIdentity {
    ProcessIdentity {
        pid: process.pid,
        creation_time: process.start_time,
    }
}
