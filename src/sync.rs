use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogClient;
use crate::checkpoint::{CheckpointStore, RunCheckpoint};
use crate::config::SyncConfig;
use crate::domain::{DatasetDescriptor, DatasetId};
use crate::error::SyncError;
use crate::selector::plan_work;
use crate::worker::{SyncOutcome, Worker};

/// Cooperative stop signal shared between the orchestrator, its workers and
/// whoever wants to interrupt the run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

/// Receives run progress. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedDataset {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDataset {
    pub id: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub theme: String,
    pub started_at: Option<DateTime<Utc>>,
    pub succeeded: Vec<SyncedDataset>,
    pub failed: Vec<FailedDataset>,
    pub skipped: Vec<String>,
    /// Selected datasets a cancelled run never started.
    pub not_started: Vec<String>,
}

impl RunSummary {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.not_started.is_empty()
    }
}

/// Drives one incremental sync: list, select, fetch-transform in a bounded
/// pool, then record the run in the checkpoint.
pub struct Synchronizer<C: CatalogClient> {
    config: SyncConfig,
    client: C,
    store: CheckpointStore,
    cancel: CancelToken,
    clock: fn() -> DateTime<Utc>,
}

impl<C: CatalogClient> Synchronizer<C> {
    pub fn new(config: SyncConfig, client: C) -> Self {
        let store = CheckpointStore::new(config.checkpoint_path.clone());
        Self {
            config,
            client,
            store,
            cancel: CancelToken::new(),
            clock: Utc::now,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn run(&self, theme: &str, sink: &dyn ProgressSink) -> Result<RunSummary, SyncError> {
        let started_at = (self.clock)();
        let start = Instant::now();

        sink.event(ProgressEvent::new("phase=Resolve; loading checkpoint"));
        let checkpoint = self.store.load()?;
        info!(
            path = %self.store.path(),
            last_run = ?checkpoint.last_run,
            synchronized = checkpoint.downloaded_datasets.len(),
            "checkpoint loaded"
        );

        sink.event(ProgressEvent::new(format!("phase=Resolve; listing theme {theme}")));
        let descriptors = self.list_with_retry(theme)?;

        let plan = plan_work(&descriptors, &checkpoint);
        info!(
            theme,
            listed = descriptors.len(),
            selected = plan.selected.len(),
            skipped = plan.skipped.len(),
            "work set computed"
        );
        for descriptor in &plan.skipped {
            debug!(dataset = %descriptor.id, "skipping, not modified since last run");
            sink.event(ProgressEvent::new(format!(
                "skip {} (not modified since last run)",
                descriptor.id
            )));
        }

        let (outcomes, not_started) = self.dispatch(plan.selected, sink);

        let summary = summarize(theme, started_at, &outcomes, &plan.skipped, &not_started);
        if self.cancel.is_cancelled() {
            warn!(
                completed = outcomes.len(),
                not_started = not_started.len(),
                "run cancelled, checkpoint not written"
            );
            return Err(SyncError::Cancelled {
                summary: Box::new(summary),
            });
        }

        sink.event(ProgressEvent::new("phase=Store; writing checkpoint"));
        let updated = merge_checkpoint(&checkpoint, &outcomes, started_at);
        if let Err(err) = self.store.save(&updated) {
            error!(path = %self.store.path(), error = %err, "checkpoint write failed");
            return Err(err.with_summary(summary));
        }

        info!(
            succeeded = summary.succeeded_count(),
            failed = summary.failed_count(),
            skipped = summary.skipped_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run complete"
        );
        sink.event(ProgressEvent {
            message: "phase=Done; run complete".to_string(),
            elapsed: Some(start.elapsed()),
        });
        Ok(summary)
    }

    /// Lists the catalog, retrying a failed call exactly once.
    fn list_with_retry(&self, theme: &str) -> Result<Vec<DatasetDescriptor>, SyncError> {
        match self.client.list_datasets(theme) {
            Ok(descriptors) => Ok(descriptors),
            Err(err) => {
                warn!(theme, error = %err, "catalog request failed, retrying once");
                thread::sleep(Duration::from_millis(self.config.catalog_retry_delay_ms));
                self.client
                    .list_datasets(theme)
                    .map_err(|err| match err {
                        SyncError::CatalogUnavailable(_) => err,
                        other => SyncError::CatalogUnavailable(other.to_string()),
                    })
            }
        }
    }

    /// Runs one worker per selected dataset on at most `concurrency_limit`
    /// threads. Returns every outcome plus the datasets never started because
    /// the run was cancelled.
    fn dispatch(
        &self,
        work: Vec<DatasetDescriptor>,
        sink: &dyn ProgressSink,
    ) -> (Vec<SyncOutcome>, Vec<DatasetId>) {
        if work.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let threads = self.config.concurrency_limit.clamp(1, work.len());
        info!(datasets = work.len(), threads, "dispatching workers");

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<DatasetDescriptor>();
        for descriptor in work {
            if job_tx.send(descriptor).is_err() {
                break;
            }
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<SyncOutcome>();
        let worker = Worker::new(&self.client, &self.config.output_dir);
        thread::scope(|scope| {
            for _ in 0..threads {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let worker = &worker;
                let cancel = &self.cancel;
                scope.spawn(move || {
                    while !cancel.is_cancelled() {
                        let Ok(descriptor) = job_rx.recv() else {
                            break;
                        };
                        sink.event(ProgressEvent::new(format!("fetch {}", descriptor.id)));
                        let start = Instant::now();
                        let outcome = worker.process(&descriptor);
                        report(&outcome, start.elapsed(), sink);
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let outcomes = result_rx.try_iter().collect();
        let not_started = job_rx.try_iter().map(|descriptor| descriptor.id).collect();
        (outcomes, not_started)
    }
}

fn report(outcome: &SyncOutcome, elapsed: Duration, sink: &dyn ProgressSink) {
    match outcome {
        SyncOutcome::Success { id, path } => {
            info!(dataset = %id, path = %path, "dataset synchronized");
            sink.event(ProgressEvent {
                message: format!("done {id}"),
                elapsed: Some(elapsed),
            });
        }
        SyncOutcome::Failure { id, error } => {
            warn!(dataset = %id, kind = error.kind(), error = %error, "dataset failed");
            sink.event(ProgressEvent {
                message: format!("failed {id}: {error}"),
                elapsed: Some(elapsed),
            });
        }
    }
}

/// Next checkpoint after a completed run: `last_run` moves to `run_at` and
/// only successful datasets join the synchronized set.
pub fn merge_checkpoint(
    previous: &RunCheckpoint,
    outcomes: &[SyncOutcome],
    run_at: DateTime<Utc>,
) -> RunCheckpoint {
    let mut downloaded_datasets = previous.downloaded_datasets.clone();
    downloaded_datasets.extend(
        outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(|outcome| outcome.id().clone()),
    );
    RunCheckpoint {
        last_run: Some(run_at),
        downloaded_datasets,
    }
}

fn summarize(
    theme: &str,
    started_at: DateTime<Utc>,
    outcomes: &[SyncOutcome],
    skipped: &[DatasetDescriptor],
    not_started: &[DatasetId],
) -> RunSummary {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            SyncOutcome::Success { id, path } => succeeded.push(SyncedDataset {
                id: id.to_string(),
                path: path.to_string(),
            }),
            SyncOutcome::Failure { id, error } => failed.push(FailedDataset {
                id: id.to_string(),
                kind: error.kind().to_string(),
                message: error.to_string(),
            }),
        }
    }
    succeeded.sort_by(|a, b| a.id.cmp(&b.id));
    failed.sort_by(|a, b| a.id.cmp(&b.id));

    RunSummary {
        theme: theme.to_string(),
        started_at: Some(started_at),
        succeeded,
        failed,
        skipped: skipped
            .iter()
            .map(|descriptor| descriptor.id.to_string())
            .collect(),
        not_started: not_started.iter().map(ToString::to_string).collect(),
    }
}
