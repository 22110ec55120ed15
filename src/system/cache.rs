use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;

use super::sampler::Sampler;
use super::snapshot::SystemSnapshot;
use crate::error::{Error, Result};
use crate::worker::WorkerPool;

type Published = Option<Arc<SystemSnapshot>>;

struct Cached {
    snapshot: Arc<SystemSnapshot>,
    taken_at: Instant,
}

#[derive(Default)]
struct CacheState {
    latest: Option<Cached>,
    /// Present while a refresh is running; late callers subscribe to it.
    in_flight: Option<watch::Receiver<Published>>,
}

struct Inner {
    ttl: Duration,
    sampler: Mutex<Sampler>,
    pool: WorkerPool,
    state: Mutex<CacheState>,
}

/// Time-bounded cache in front of the [`Sampler`].
///
/// Fresh hits only take the state lock long enough to clone an `Arc`. A
/// stale read starts at most one refresh; every caller arriving while it
/// runs waits for that same sample.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<Inner>,
}

impl SnapshotCache {
    pub fn new(sampler: Sampler, ttl: Duration, pool: WorkerPool) -> Self {
        SnapshotCache {
            inner: Arc::new(Inner {
                ttl,
                sampler: Mutex::new(sampler),
                pool,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Last published snapshot regardless of age.
    pub fn peek(&self) -> Option<Arc<SystemSnapshot>> {
        self.state().latest.as_ref().map(|c| Arc::clone(&c.snapshot))
    }

    pub async fn get_or_refresh(&self) -> Result<Arc<SystemSnapshot>> {
        let mut rx = {
            let mut state = self.state();
            if let Some(cached) = &state.latest {
                if cached.taken_at.elapsed() < self.inner.ttl {
                    return Ok(Arc::clone(&cached.snapshot));
                }
            }
            match &state.in_flight {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.in_flight = Some(rx.clone());
                    self.spawn_refresh(tx);
                    rx
                }
            }
        };

        let published = rx
            .wait_for(|snapshot| snapshot.is_some())
            .await
            .map(|snapshot| snapshot.clone());
        match published {
            Ok(Some(snapshot)) => Ok(snapshot),
            _ => Err(Error::internal("snapshot refresh did not complete")),
        }
    }

    /// The refresh runs as its own task so a caller that gives up waiting
    /// cannot strand the others.
    fn spawn_refresh(&self, tx: watch::Sender<Published>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let job_inner = Arc::clone(&inner);
            let outcome = inner
                .pool
                .run(move || {
                    let mut sampler = job_inner
                        .sampler
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    sampler.produce(Utc::now())
                })
                .await;

            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight = None;
            match outcome {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    state.latest = Some(Cached {
                        snapshot: Arc::clone(&snapshot),
                        taken_at: Instant::now(),
                    });
                    drop(state);
                    let _ = tx.send(Some(snapshot));
                }
                Err(err) => {
                    drop(state);
                    // dropping `tx` wakes the waiters with an error
                    tracing::error!(error = %err, "snapshot refresh failed");
                }
            }
        });
    }

    fn state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
