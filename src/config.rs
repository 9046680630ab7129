//! Service and worker-pool configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use std::path::PathBuf;
use std::time::Duration;

use crate::time::Clock;

#[serde_with::serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
/// Controls how workers poll, back off on store errors, and shut down.
pub struct WorkerPoolConfig {
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "default_poll_interval")]
    /// Base sleep between polls when the queue is empty.
    pub poll_interval: Duration,
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "default_poll_jitter")]
    /// Upper bound of the random jitter added to each empty-queue sleep.
    pub poll_jitter: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_shutdown_timeout")]
    /// How long to wait for in-flight jobs to finalize during shutdown.
    pub shutdown_timeout: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_orphan_grace")]
    /// Slack added to a job's own timeout before a `processing` row left
    /// behind by a dead worker is considered orphaned.
    pub orphan_grace: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            poll_jitter: default_poll_jitter(),
            shutdown_timeout: default_shutdown_timeout(),
            orphan_grace: default_orphan_grace(),
        }
    }
}

#[derive(Builder, Debug, Clone)]
#[builder(build_fn(skip))]
/// Configuration consumed by [`Queue::init`](crate::Queue::init).
/// Build with [`QueueSvcConfig::builder`](Self::builder).
///
/// By default the store lives at `<data_dir>/queuectl.db` with per-job log
/// files under `<data_dir>/logs`. Tests may inject an existing
/// `sqlx::SqlitePool` instead; the data dir then only hosts the log files.
pub struct QueueSvcConfig {
    #[builder(setter(into, strip_option), default)]
    /// Directory holding the database file and the per-job logs. Defaults to `data`.
    pub(crate) data_dir: Option<PathBuf>,
    #[builder(setter(into, strip_option), default)]
    /// Inject an existing `sqlx::SqlitePool` instead of opening the file store.
    pub(crate) pool: Option<sqlx::SqlitePool>,
    #[builder(setter(into, strip_option), default)]
    /// Override the maximum number of connections the internally managed pool may open.
    pub(crate) max_connections: Option<u32>,
    #[builder(default)]
    /// Worker polling and shutdown behaviour.
    pub worker_config: WorkerPoolConfig,
    #[builder(default)]
    /// Clock handle for time operations. Realtime unless a manual clock is injected.
    pub clock: Clock,
}

impl QueueSvcConfig {
    /// Create a [`QueueSvcConfigBuilder`] with defaults for all settings.
    pub fn builder() -> QueueSvcConfigBuilder {
        QueueSvcConfigBuilder::default()
    }

    pub(crate) fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    pub(crate) fn db_path(&self) -> PathBuf {
        self.data_dir().join("queuectl.db")
    }

    pub(crate) fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

impl QueueSvcConfigBuilder {
    /// Validate and construct a [`QueueSvcConfig`].
    pub fn build(&mut self) -> Result<QueueSvcConfig, String> {
        let worker_config = self.worker_config.clone().unwrap_or_default();
        if worker_config.poll_interval.is_zero() {
            return Err("poll_interval must be non-zero".to_string());
        }
        Ok(QueueSvcConfig {
            data_dir: self.data_dir.clone().flatten(),
            pool: self.pool.clone().flatten(),
            max_connections: self.max_connections.flatten(),
            worker_config,
            clock: self.clock.clone().unwrap_or_default(),
        })
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(300)
}

fn default_poll_jitter() -> Duration {
    Duration::from_millis(200)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_orphan_grace() -> Duration {
    Duration::from_secs(30)
}
