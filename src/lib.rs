//! `queuectl` is a single-host background job orchestrator. It persists
//! user-submitted shell commands in a durable SQLite queue, dispatches them
//! to a pool of concurrent workers, enforces priority and scheduling policy,
//! retries transient failures with exponential backoff, and isolates
//! permanently broken jobs in a dead letter queue. The crate uses [`sqlx`]
//! for database access and forbids `unsafe`.
//!
//! ## Highlights
//! - Durable SQLite-backed storage (WAL journaling) so jobs survive restarts
//!   and crashes; several worker-pool processes can share one store.
//! - An atomic claim protocol: a guarded `UPDATE … RETURNING` guarantees a
//!   job is in flight on at most one worker at a time.
//! - Automatic exponential backoff (`backoff_base ^ attempts`) with a dead
//!   letter queue once the retry budget is exhausted, plus manual DLQ retry.
//! - Priority scheduling with FIFO tie-break and one-shot delayed execution
//!   via `run_at`.
//! - Graceful shutdown: workers finalize their current job before exiting,
//!   and orphaned rows left by killed workers are repaired at startup.
//!
//! ## Core concepts
//! - **Queue service** – [`Queue`] owns the store and exposes enqueue,
//!   inspection, DLQ, and config operations.
//! - **Enqueue spec** – [`EnqueueSpec`] is the strict JSON payload; unknown
//!   keys are rejected and omitted fields fall back to persisted
//!   [`QueueConfig`] defaults.
//! - **Worker pool** – [`WorkerPool`] runs `worker-1 … worker-N`, each
//!   looping claim → execute → finalize until cancelled.
//! - **Executor** – [`ShellExecutor`] runs one attempt through `sh -c` with
//!   a wall-clock timeout and capped output capture; [`CommandExecutor`] is
//!   the seam for scripted outcomes in tests.
//!
//! ## Example
//!
//! ```no_run
//! use queuectl::{EnqueueSpec, Queue, QueueSvcConfig};
//!
//! # async fn example() -> Result<(), queuectl::error::QueueError> {
//! let config = QueueSvcConfig::builder()
//!     .data_dir("data")
//!     .build()
//!     .expect("config");
//! let queue = Queue::init(config).await?;
//!
//! let spec = EnqueueSpec::from_json(r#"{"id":"j1","command":"echo hi"}"#)?;
//! queue.enqueue(spec).await?;
//!
//! let pool = queue.start_workers(2);
//! // ... later:
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]
#![forbid(unsafe_code)]

mod config;
mod entity;
mod executor;
mod pool;
mod repo;
mod status;
mod time;
mod worker;

pub mod dashboard;
pub mod error;

use tracing::instrument;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use config::{QueueSvcConfig, QueueSvcConfigBuilder, WorkerPoolConfig};
pub use entity::{EnqueueSpec, Job, JobLogs, JobState, QueueConfig};
pub use executor::{CommandExecutor, OUTPUT_CAP_BYTES, Outcome, ShellExecutor};
pub use pool::{WorkerPool, install_shutdown_handler};
pub use status::{MetricsSnapshot, StatusSummary};
pub use time::Clock;

use entity::{NewJob, parse_run_at};
use error::QueueError;
use repo::JobRepo;

/// Primary entry point. Owns the store handle and provides the semantic
/// operations the CLI, the dashboard, and the worker pool are built on.
#[derive(Clone)]
pub struct Queue {
    repo: JobRepo,
    clock: Clock,
    worker_config: WorkerPoolConfig,
    logs_dir: PathBuf,
    active_workers: Arc<AtomicUsize>,
}

impl Queue {
    /// Open (or create) the store, apply the schema, and repair any rows a
    /// crashed worker left in `processing`.
    pub async fn init(config: QueueSvcConfig) -> Result<Self, QueueError> {
        let logs_dir = config.logs_dir();
        let repo = match &config.pool {
            Some(pool) => JobRepo::new(pool),
            None => {
                std::fs::create_dir_all(config.data_dir())?;
                JobRepo::connect(&config.db_path(), config.max_connections).await?
            }
        };
        std::fs::create_dir_all(&logs_dir)?;

        let clock = config.clock.clone();
        repo.init(clock.now()).await?;
        repo.reap_orphans(config.worker_config.orphan_grace, clock.now())
            .await?;

        Ok(Self {
            repo,
            clock,
            worker_config: config.worker_config,
            logs_dir,
            active_workers: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Validate the spec, fill defaults from the persisted config, and
    /// insert the job as `pending`.
    ///
    /// # Errors
    ///
    /// [`QueueError::DuplicateId`] if a job with the same id already exists,
    /// in any state. Re-running a finished job takes a fresh id (or
    /// [`Queue::dlq_retry`] if it is dead).
    #[instrument(name = "queue.enqueue", skip(self, spec), fields(job_id = %spec.id), err)]
    pub async fn enqueue(&self, spec: EnqueueSpec) -> Result<Job, QueueError> {
        spec.validate()?;
        let defaults = self.repo.get_config().await?;
        let now = self.clock.now();
        let run_at = parse_run_at(spec.run_at.as_deref(), now)?;
        let new_job = NewJob::builder()
            .id(spec.id)
            .command(spec.command)
            .priority(spec.priority.unwrap_or(defaults.default_priority))
            .timeout_s(spec.timeout.unwrap_or(defaults.default_timeout))
            .max_retries(spec.max_retries.unwrap_or(defaults.max_retries))
            .run_at(run_at)
            .created_at(now)
            .build()
            .expect("all NewJob fields set");
        let job = self.repo.insert(new_job).await?;
        tracing::info!(job_id = %job.id, priority = job.priority, run_at = %job.run_at, "job enqueued");
        Ok(job)
    }

    /// Fetch the current snapshot of a job by id.
    #[instrument(name = "queue.find", skip(self))]
    pub async fn find(&self, id: &str) -> Result<Job, QueueError> {
        self.repo.find_by_id(id).await
    }

    /// List jobs, optionally filtered by state, newest first.
    pub async fn list(&self, state: Option<JobState>, limit: i64) -> Result<Vec<Job>, QueueError> {
        self.repo.list(state, limit).await
    }

    /// Job counts per state plus this process's active worker count.
    pub async fn status(&self) -> Result<StatusSummary, QueueError> {
        let agg = self.repo.aggregate().await?;
        Ok(StatusSummary::from_aggregate(
            &agg,
            self.active_workers.load(Ordering::SeqCst),
        ))
    }

    /// Totals per state and the mean completed runtime.
    pub async fn metrics(&self) -> Result<MetricsSnapshot, QueueError> {
        let agg = self.repo.aggregate().await?;
        Ok(MetricsSnapshot::from_aggregate(
            &agg,
            self.active_workers.load(Ordering::SeqCst),
        ))
    }

    /// Captured output of the job's most recent attempt.
    pub async fn logs(&self, id: &str) -> Result<JobLogs, QueueError> {
        let job = self.repo.find_by_id(id).await?;
        Ok(JobLogs {
            exit_code: job.exit_code,
            stdout: job.stdout,
            stderr: job.stderr,
        })
    }

    /// The dead letter queue, most recently buried first.
    pub async fn dlq_list(&self) -> Result<Vec<Job>, QueueError> {
        self.repo.list_dead().await
    }

    /// Reset a dead job to `pending` with a fresh retry budget.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotDead`] if the job exists but is not in the DLQ.
    #[instrument(name = "queue.dlq_retry", skip(self), err)]
    pub async fn dlq_retry(&self, id: &str) -> Result<Job, QueueError> {
        self.repo.retry_from_dlq(id, self.clock.now()).await
    }

    /// Current persisted queue options.
    pub async fn config_get(&self) -> Result<QueueConfig, QueueError> {
        self.repo.get_config().await
    }

    /// Raw `(key, value)` config entries ordered by key.
    pub async fn config_entries(&self) -> Result<Vec<(String, String)>, QueueError> {
        self.repo.config_entries().await
    }

    /// Validate and persist one queue option.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<(), QueueError> {
        self.repo.set_config(key, value, self.clock.now()).await
    }

    /// Repair `processing` rows whose worker has disappeared. Runs
    /// automatically at init; callable on demand. Returns the repaired ids.
    pub async fn reap_orphans(&self) -> Result<Vec<String>, QueueError> {
        self.repo
            .reap_orphans(self.worker_config.orphan_grace, self.clock.now())
            .await
    }

    /// Spawn `count` shell-executing workers against this store.
    pub fn start_workers(&self, count: usize) -> WorkerPool {
        self.start_workers_with(count, Arc::new(ShellExecutor))
    }

    /// Spawn workers with a custom executor (test seam).
    pub fn start_workers_with<E: CommandExecutor>(
        &self,
        count: usize,
        executor: Arc<E>,
    ) -> WorkerPool {
        WorkerPool::start(
            count,
            self.repo.clone(),
            executor,
            self.clock.clone(),
            self.worker_config.clone(),
            self.logs_dir.clone(),
            Arc::clone(&self.active_workers),
        )
    }

    /// Directory holding the informational per-job log files.
    pub fn logs_dir(&self) -> &std::path::Path {
        &self.logs_dir
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
