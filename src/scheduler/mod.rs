//! Scheduler module: the probe → merge → store cycle.

mod retention;

pub use retention::*;

use crate::config::ServerConfig;
use crate::probe::{ProbeError, Prober};
use crate::store::{update_message, RemoteStore, Sample, StoreError};
use crate::targets::{RegistryError, Target, TargetRegistry};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// Errors that end a cycle early. Probe failures never do.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("failed to load targets: {0}")]
    Targets(#[from] RegistryError),
    #[error("failed to store samples: {0}")]
    Store(#[from] StoreError),
}

impl CycleError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CycleError::Store(e) if e.is_conflict())
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Samples captured this cycle, in registry order.
    pub samples: Vec<Sample>,
    /// Length of the series that was written.
    pub stored: usize,
    /// Version of the document after the write.
    pub version: Option<String>,
}

/// Drives the probe cycle at a fixed cadence.
pub struct Scheduler {
    registry: TargetRegistry,
    prober: Prober,
    store: RemoteStore,
    retention: RetentionPolicy,
    interval: Duration,
    concurrency: usize,
    stop: Mutex<Option<broadcast::Sender<()>>>,
}

impl Scheduler {
    /// Create a new scheduler writing to `store`.
    pub fn new(
        cfg: &ServerConfig,
        registry: TargetRegistry,
        store: RemoteStore,
    ) -> Result<Self, ProbeError> {
        Ok(Self {
            registry,
            prober: Prober::new(&cfg.store.user_agent, cfg.probe_timeout)?,
            store,
            retention: cfg.retention,
            // tokio's interval rejects a zero period.
            interval: cfg.interval.max(Duration::from_millis(1)),
            concurrency: cfg.probe_concurrency.max(1),
            stop: Mutex::new(None),
        })
    }

    /// Start the cycle loop in a background task.
    ///
    /// The first cycle runs immediately. Cycles never overlap: ticks that
    /// fall due while a cycle is still running are skipped.
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let (tx, mut rx) = broadcast::channel(1);
        *self.stop.lock().await = Some(tx);

        tracing::info!(
            "Starting scheduler: every {:?}, retention {}, writing to {}",
            self.interval,
            self.retention,
            self.store.repo()
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        scheduler.tick().await;
                    }
                }
            }

            tracing::info!("Scheduler: stopped");
        })
    }

    /// Stop the cycle loop once the current cycle finishes.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }

    /// Stop the loop and wait up to `grace` for an in-flight cycle to finish.
    ///
    /// Returns false if the task did not finish in time or panicked.
    pub async fn shutdown(&self, handle: JoinHandle<()>, grace: Duration) -> bool {
        self.stop().await;
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Scheduler: task failed: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!("Scheduler: cycle still running after {:?}, abandoning it", grace);
                false
            }
        }
    }

    /// Run one cycle and log its outcome.
    async fn tick(&self) {
        match self.run_cycle().await {
            Ok(report) => tracing::info!(
                "Scheduler: stored {} new samples ({} total, version {})",
                report.samples.len(),
                report.stored,
                report.version.as_deref().unwrap_or("unknown")
            ),
            Err(e) if e.is_conflict() => {
                tracing::warn!("Scheduler: cycle dropped, document changed concurrently: {}", e)
            }
            Err(e) => tracing::error!("Scheduler: cycle failed: {}", e),
        }
    }

    /// Probe every target, merge into the stored series, and write it back.
    ///
    /// One read and one conditional write per cycle. A conflicting write is
    /// not retried; the cycle's samples are dropped.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let targets = self.registry.load()?;
        let samples = self.probe_all(&targets).await;

        let snapshot = self.store.read().await;
        let series = merge(snapshot.samples, samples.clone(), self.retention, Utc::now());
        let message = update_message(&samples);

        let version = self
            .store
            .write(&series, snapshot.version.as_deref(), &message)
            .await?;

        Ok(CycleReport {
            samples,
            stored: series.len(),
            version,
        })
    }

    /// Probe targets concurrently, returning samples in registry order.
    pub async fn probe_all(&self, targets: &[Target]) -> Vec<Sample> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (i, target) in targets.iter().cloned().enumerate() {
            let prober = self.prober.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (i, prober.probe(&target).await)
            });
        }

        let mut results = Vec::with_capacity(targets.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!("Scheduler: probe task failed: {}", e),
            }
        }

        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, sample)| sample).collect()
    }
}
