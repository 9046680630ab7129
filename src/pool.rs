//! Spawns and supervises the worker pool.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::WorkerPoolConfig;
use crate::executor::CommandExecutor;
use crate::repo::JobRepo;
use crate::time::Clock;
use crate::worker::Worker;

/// A running pool of workers sharing one cancellation token.
///
/// The active-worker count is process-local: it reflects the workers spawned
/// by this pool, not workers of other processes using the same store.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    active: Arc<AtomicUsize>,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    pub(crate) fn start<E: CommandExecutor>(
        count: usize,
        repo: JobRepo,
        executor: Arc<E>,
        clock: Clock,
        config: WorkerPoolConfig,
        logs_dir: PathBuf,
        active: Arc<AtomicUsize>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let shutdown_timeout = config.shutdown_timeout;
        let mut handles = Vec::with_capacity(count);
        for n in 1..=count {
            let worker = Worker::new(
                format!("worker-{n}"),
                repo.clone(),
                Arc::clone(&executor),
                clock.clone(),
                config.clone(),
                logs_dir.clone(),
                cancel.clone(),
            );
            let active = Arc::clone(&active);
            handles.push(tokio::spawn(async move {
                active.fetch_add(1, Ordering::SeqCst);
                worker.run().await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        tracing::info!(count, "worker pool started");
        Self {
            handles,
            cancel,
            active,
            shutdown_timeout,
        }
    }

    /// Token shared with every worker; cancelling it begins shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Cancel all workers and wait for them to finalize and exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.drain().await;
    }

    /// Block until the pool's token is cancelled (e.g. by the signal
    /// handler), then wait for the workers to exit.
    pub async fn wait(self) {
        self.cancel.clone().cancelled().await;
        self.drain().await;
    }

    /// Workers get the shutdown window to finalize their current job; any
    /// straggler is aborted and its row left to the next orphan sweep.
    async fn drain(mut self) {
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        let handles = std::mem::take(&mut self.handles);
        futures::future::join_all(handles.into_iter().map(|mut handle| async move {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                tracing::warn!("worker did not stop within shutdown timeout, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }))
        .await;
        tracing::info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Install SIGINT/SIGTERM handlers that cancel `token`.
pub fn install_shutdown_handler(token: CancellationToken) {
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, initiating graceful shutdown");
            }
        }
        token.cancel();
    });
}
