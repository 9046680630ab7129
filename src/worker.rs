//! Worker loop: claim a ready job, run it, write the outcome back.

use chrono::TimeDelta;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{Span, instrument};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::WorkerPoolConfig;
use crate::entity::Job;
use crate::error::QueueError;
use crate::executor::{CommandExecutor, Outcome};
use crate::repo::JobRepo;
use crate::time::Clock;

const MAX_BACKOFF_SECS: i64 = 60 * 60 * 24 * 365;

pub(crate) struct Worker<E> {
    id: String,
    repo: JobRepo,
    executor: Arc<E>,
    clock: Clock,
    config: WorkerPoolConfig,
    logs_dir: PathBuf,
    cancel: CancellationToken,
}

impl<E: CommandExecutor> Worker<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        repo: JobRepo,
        executor: Arc<E>,
        clock: Clock,
        config: WorkerPoolConfig,
        logs_dir: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            repo,
            executor,
            clock,
            config,
            logs_dir,
            cancel,
        }
    }

    /// Run until cancelled. A claimed job is always finalized before the
    /// loop exits, even when cancellation lands mid-execution.
    pub async fn run(self) {
        tracing::info!(worker_id = %self.id, "worker started");
        let mut failures: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.repo.claim_next(&self.id, self.clock.now()).await {
                Ok(Some(job)) => {
                    failures = 0;
                    if let Err(e) = self.process(job).await {
                        tracing::error!(worker_id = %self.id, error = %e, "failed to finalize job");
                    }
                }
                Ok(None) => {
                    failures = 0;
                    self.idle().await;
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(worker_id = %self.id, error = %e, failures, "claim error");
                    let backoff = Duration::from_millis(50u64 << failures.min(6));
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
        tracing::info!(worker_id = %self.id, "worker stopped");
    }

    /// Jittered sleep between polls of an empty queue.
    async fn idle(&self) {
        let jitter_ms = self.config.poll_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        let sleep = self.config.poll_interval + Duration::from_millis(jitter);
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(sleep) => {}
        }
    }

    #[instrument(
        name = "worker.process_job",
        skip(self, job),
        fields(
            worker_id = %self.id,
            job_id = %job.id,
            attempt = job.attempts,
            conclusion = tracing::field::Empty,
            will_retry = tracing::field::Empty,
        ),
        err
    )]
    async fn process(&self, job: Job) -> Result<(), QueueError> {
        let timeout = Duration::from_secs(job.timeout_s.max(1) as u64);
        let outcome = self
            .executor
            .run(&job.command, timeout, &self.cancel)
            .await;
        self.write_log_file(&job.id, &outcome).await;

        let span = Span::current();
        let now = self.clock.now();
        if outcome.succeeded() {
            span.record("conclusion", "completed");
            self.repo
                .finalize_success(&job.id, &self.id, &outcome, now)
                .await?;
            tracing::info!(job_id = %job.id, duration = ?outcome.duration, "job completed");
        } else {
            let reason = failure_reason(&outcome, job.timeout_s);
            span.record("conclusion", "failed");
            if job.attempts <= job.max_retries {
                // Read-through: the backoff base may have changed since enqueue.
                let base = self.repo.get_config().await?.backoff_base;
                let next_attempt_at = now + backoff_delay(base, job.attempts);
                span.record("will_retry", true);
                self.repo
                    .reschedule_retry(&job.id, &self.id, next_attempt_at, &reason, &outcome, now)
                    .await?;
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    error = %reason,
                    retry_at = %next_attempt_at,
                    "attempt failed, retry scheduled"
                );
            } else {
                span.record("will_retry", false);
                self.repo
                    .move_to_dead(&job.id, &self.id, &reason, &outcome, now)
                    .await?;
                tracing::error!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    error = %reason,
                    "job moved to dead letter queue"
                );
            }
        }
        Ok(())
    }

    /// Informational per-job log file; the store row stays authoritative.
    async fn write_log_file(&self, job_id: &str, outcome: &Outcome) {
        let path = self.logs_dir.join(format!("{job_id}.log"));
        let exit = outcome
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-1".to_string());
        let body = format!(
            "=== EXIT CODE ===\n{exit}\n\n=== STDOUT ===\n{}\n\n=== STDERR ===\n{}\n",
            outcome.stdout, outcome.stderr
        );
        if let Err(e) = tokio::fs::write(&path, body).await {
            tracing::warn!(job_id, error = %e, "failed to write job log file");
        }
    }
}

/// `backoff_base ^ attempts` seconds, using the attempt count stored on the
/// row after the claim. Saturates at one year rather than overflowing.
pub(crate) fn backoff_delay(base: i64, attempts: i64) -> TimeDelta {
    let exponent = u32::try_from(attempts).unwrap_or(u32::MAX).min(64);
    let secs = base
        .max(2)
        .checked_pow(exponent)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    TimeDelta::seconds(secs)
}

fn failure_reason(outcome: &Outcome, timeout_s: i64) -> String {
    if let Some(e) = &outcome.spawn_error {
        format!("spawn failed: {e}")
    } else if outcome.terminated_by_timeout {
        format!("timeout expired ({timeout_s}s)")
    } else {
        match outcome.exit_code {
            Some(code) => format!("command exited with code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(2, 1), TimeDelta::seconds(2));
        assert_eq!(backoff_delay(2, 2), TimeDelta::seconds(4));
        assert_eq!(backoff_delay(2, 3), TimeDelta::seconds(8));
        assert_eq!(backoff_delay(3, 2), TimeDelta::seconds(9));
    }

    #[test]
    fn backoff_saturates() {
        assert_eq!(
            backoff_delay(2, 10_000),
            TimeDelta::seconds(MAX_BACKOFF_SECS)
        );
        assert_eq!(
            backoff_delay(i64::MAX, 3),
            TimeDelta::seconds(MAX_BACKOFF_SECS)
        );
    }

    #[test]
    fn failure_reasons_name_the_cause() {
        let spawn = Outcome {
            spawn_error: Some("no such file".into()),
            ..Outcome::default()
        };
        assert_eq!(failure_reason(&spawn, 30), "spawn failed: no such file");

        let timeout = Outcome {
            terminated_by_timeout: true,
            ..Outcome::default()
        };
        assert_eq!(failure_reason(&timeout, 30), "timeout expired (30s)");

        let nonzero = Outcome {
            exit_code: Some(7),
            ..Outcome::default()
        };
        assert_eq!(failure_reason(&nonzero, 30), "command exited with code 7");

        let signalled = Outcome::default();
        assert_eq!(failure_reason(&signalled, 30), "terminated by signal");
    }
}
