//! SQLite-backed store: the single source of truth for jobs and config.
//!
//! All state transitions are guarded single-statement updates so that two
//! workers racing for the same row can never both win.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::instrument;

use std::path::Path;
use std::time::Duration;

use crate::entity::{Job, JobState, NewJob, QueueConfig};
use crate::error::QueueError;
use crate::executor::Outcome;
use crate::time::dt_to_ms;

/// How long a writer waits on a locked database before the error surfaces.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    command TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0,
    timeout_s INTEGER NOT NULL DEFAULT 300,
    max_retries INTEGER NOT NULL DEFAULT 3,
    attempts INTEGER NOT NULL DEFAULT 0,
    run_at INTEGER NOT NULL,
    next_attempt_at INTEGER NOT NULL,
    claimed_by TEXT,
    started_at INTEGER,
    finished_at INTEGER,
    exit_code INTEGER,
    stdout TEXT,
    stderr TEXT,
    error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_claim
ON jobs(state, priority DESC, next_attempt_at, created_at);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

#[derive(Clone)]
pub(crate) struct JobRepo {
    pool: SqlitePool,
}

impl JobRepo {
    pub fn new(pool: &SqlitePool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Open (creating if missing) the database file with WAL journaling and
    /// a bounded busy timeout, so concurrent worker pools can share it.
    pub async fn connect(path: &Path, max_connections: Option<u32>) -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(5))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the schema and seed default config values. Idempotent.
    pub async fn init(&self, now: DateTime<Utc>) -> Result<(), QueueError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        let defaults = QueueConfig::default();
        for (key, value) in [
            ("backoff_base", defaults.backoff_base),
            ("default_priority", defaults.default_priority),
            ("default_timeout", defaults.default_timeout),
            ("max_retries", defaults.max_retries),
        ] {
            sqlx::query("INSERT OR IGNORE INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)")
                .bind(key)
                .bind(value.to_string())
                .bind(dt_to_ms(now))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    #[instrument(name = "store.insert", skip(self, new), fields(job_id = %new.id), err)]
    pub async fn insert(&self, new: NewJob) -> Result<Job, QueueError> {
        let result = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, command, state, priority, timeout_s, max_retries,
                              attempts, run_at, next_attempt_at, created_at, updated_at)
            VALUES (?1, ?2, 'pending', ?3, ?4, ?5, 0, ?6, ?6, ?7, ?7)
            RETURNING *
            "#,
        )
        .bind(&new.id)
        .bind(&new.command)
        .bind(new.priority)
        .bind(new.timeout_s)
        .bind(new.max_retries)
        .bind(dt_to_ms(new.run_at))
        .bind(dt_to_ms(new.created_at))
        .fetch_one(&self.pool)
        .await;
        match result {
            Ok(job) => Ok(job),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(QueueError::DuplicateId(new.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Job, QueueError> {
        self.maybe_find(id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))
    }

    pub async fn maybe_find(&self, id: &str) -> Result<Option<Job>, QueueError> {
        Ok(sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Snapshot listing, newest first.
    pub async fn list(&self, state: Option<JobState>, limit: i64) -> Result<Vec<Job>, QueueError> {
        let jobs = match state {
            Some(state) => {
                sqlx::query_as::<_, Job>(
                    "SELECT * FROM jobs WHERE state = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
                )
                .bind(state.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Job>(
                    "SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(jobs)
    }

    /// The dead letter queue, most recently buried first.
    pub async fn list_dead(&self) -> Result<Vec<Job>, QueueError> {
        Ok(sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE state = 'dead' ORDER BY updated_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Atomically claim the next ready job for `worker_id`.
    ///
    /// The subselect picks the best candidate (`priority DESC, created_at
    /// ASC`) among rows that are `pending`, or `failed` with an elapsed
    /// backoff; the outer `state IN (…)` guard makes the update a no-op if a
    /// competing worker got there first, in which case `None` is returned.
    #[instrument(name = "store.claim_next", level = "debug", skip(self), err)]
    pub async fn claim_next(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET state = 'processing',
                claimed_by = ?1,
                started_at = ?2,
                attempts = attempts + 1,
                updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE state IN ('pending', 'failed')
                  AND next_attempt_at <= ?2
                  AND run_at <= ?2
                ORDER BY priority DESC, created_at ASC, id ASC
                LIMIT 1
            )
            AND state IN ('pending', 'failed')
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(dt_to_ms(now))
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// `processing → completed`. Guarded on the claiming worker.
    pub async fn finalize_success(
        &self,
        id: &str,
        worker_id: &str,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'completed', claimed_by = NULL, finished_at = ?3,
                exit_code = ?4, stdout = ?5, stderr = ?6, error = NULL, updated_at = ?3
            WHERE id = ?1 AND claimed_by = ?2 AND state = 'processing'
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(dt_to_ms(now))
        .bind(outcome.exit_code)
        .bind(&outcome.stdout)
        .bind(&outcome.stderr)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            tracing::warn!(job_id = id, worker_id, "claim lost before completion");
        }
        Ok(())
    }

    /// `processing → failed` with the retry scheduled at `next_attempt_at`.
    pub async fn reschedule_retry(
        &self,
        id: &str,
        worker_id: &str,
        next_attempt_at: DateTime<Utc>,
        error: &str,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed', claimed_by = NULL, finished_at = ?3, next_attempt_at = ?4,
                exit_code = ?5, stdout = ?6, stderr = ?7, error = ?8, updated_at = ?3
            WHERE id = ?1 AND claimed_by = ?2 AND state = 'processing'
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(dt_to_ms(now))
        .bind(dt_to_ms(next_attempt_at))
        .bind(outcome.exit_code)
        .bind(&outcome.stdout)
        .bind(&outcome.stderr)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            tracing::warn!(job_id = id, worker_id, "claim lost before retry scheduling");
        }
        Ok(())
    }

    /// `processing → dead`: the retry budget is exhausted.
    pub async fn move_to_dead(
        &self,
        id: &str,
        worker_id: &str,
        error: &str,
        outcome: &Outcome,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'dead', claimed_by = NULL, finished_at = ?3,
                exit_code = ?4, stdout = ?5, stderr = ?6, error = ?7, updated_at = ?3
            WHERE id = ?1 AND claimed_by = ?2 AND state = 'processing'
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(dt_to_ms(now))
        .bind(outcome.exit_code)
        .bind(&outcome.stdout)
        .bind(&outcome.stderr)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            tracing::warn!(job_id = id, worker_id, "claim lost before DLQ move");
        }
        Ok(())
    }

    /// `dead → pending`, resetting the attempt counter.
    #[instrument(name = "store.retry_from_dlq", skip(self), err)]
    pub async fn retry_from_dlq(&self, id: &str, now: DateTime<Utc>) -> Result<Job, QueueError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET state = 'pending', attempts = 0, claimed_by = NULL,
                next_attempt_at = ?2, error = NULL, updated_at = ?2
            WHERE id = ?1 AND state = 'dead'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(dt_to_ms(now))
        .fetch_optional(&self.pool)
        .await?;
        match job {
            Some(job) => Ok(job),
            None => match self.maybe_find(id).await? {
                Some(_) => Err(QueueError::NotDead(id.to_string())),
                None => Err(QueueError::JobNotFound(id.to_string())),
            },
        }
    }

    /// Repair rows stuck in `processing` by a worker that disappeared.
    ///
    /// A row is orphaned once `started_at + timeout_s + grace` has passed.
    /// Rows with retry budget left go back to `failed` and become claimable
    /// immediately; rows that had already exhausted it are buried.
    #[instrument(name = "store.reap_orphans", skip(self), fields(n_reaped), err)]
    pub async fn reap_orphans(
        &self,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, QueueError> {
        let grace_s = grace.as_secs() as i64;
        let mut tx = self.pool.begin().await?;
        let retriable = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed', claimed_by = NULL, error = 'orphaned',
                next_attempt_at = ?1, updated_at = ?1
            WHERE state = 'processing'
              AND started_at + (timeout_s + ?2) * 1000 < ?1
              AND attempts <= max_retries
            RETURNING id
            "#,
        )
        .bind(dt_to_ms(now))
        .bind(grace_s)
        .fetch_all(&mut *tx)
        .await?;
        let exhausted = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'dead', claimed_by = NULL, error = 'orphaned', updated_at = ?1
            WHERE state = 'processing'
              AND started_at + (timeout_s + ?2) * 1000 < ?1
              AND attempts > max_retries
            RETURNING id
            "#,
        )
        .bind(dt_to_ms(now))
        .bind(grace_s)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let ids: Vec<String> = retriable
            .iter()
            .chain(exhausted.iter())
            .map(|row| row.get::<String, _>("id"))
            .collect();
        tracing::Span::current().record("n_reaped", ids.len());
        for id in &ids {
            tracing::warn!(job_id = %id, "reset orphaned job");
        }
        Ok(ids)
    }

    /// Counts per state plus the mean runtime of completed jobs.
    pub async fn aggregate(&self) -> Result<StoreAggregate, QueueError> {
        let counts = sqlx::query(
            r#"
            SELECT
                SUM(CASE WHEN state = 'pending' THEN 1 ELSE 0 END) AS pending,
                SUM(CASE WHEN state = 'processing' THEN 1 ELSE 0 END) AS processing,
                SUM(CASE WHEN state = 'completed' THEN 1 ELSE 0 END) AS completed,
                SUM(CASE WHEN state = 'failed' THEN 1 ELSE 0 END) AS failed,
                SUM(CASE WHEN state = 'dead' THEN 1 ELSE 0 END) AS dead
            FROM jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let avg_runtime: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG(finished_at - started_at) / 1000.0
            FROM jobs
            WHERE state = 'completed' AND started_at IS NOT NULL AND finished_at IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreAggregate {
            pending: counts.get::<Option<i64>, _>("pending").unwrap_or(0),
            processing: counts.get::<Option<i64>, _>("processing").unwrap_or(0),
            completed: counts.get::<Option<i64>, _>("completed").unwrap_or(0),
            failed: counts.get::<Option<i64>, _>("failed").unwrap_or(0),
            dead: counts.get::<Option<i64>, _>("dead").unwrap_or(0),
            avg_runtime_seconds: avg_runtime,
        })
    }

    /// Current persisted options, defaults filled for any missing key.
    pub async fn get_config(&self) -> Result<QueueConfig, QueueError> {
        let rows = sqlx::query("SELECT key, value FROM config")
            .fetch_all(&self.pool)
            .await?;
        let mut config = QueueConfig::default();
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            if let Ok(parsed) = value.parse::<i64>() {
                config.apply(&key, parsed);
            }
        }
        Ok(config)
    }

    /// Validate and persist one config option.
    pub async fn set_config(
        &self,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let parsed = QueueConfig::validate_entry(key, value)?;
        sqlx::query(
            r#"
            INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(parsed.to_string())
        .bind(dt_to_ms(now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Raw `(key, value)` pairs ordered by key, for `config show`.
    pub async fn config_entries(&self) -> Result<Vec<(String, String)>, QueueError> {
        let rows = sqlx::query("SELECT key, value FROM config ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }
}

/// Read-only aggregate over the jobs table.
#[derive(Debug, Clone)]
pub(crate) struct StoreAggregate {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead: i64,
    pub avg_runtime_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    async fn test_repo() -> (JobRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = JobRepo::connect(&dir.path().join("test.db"), None)
            .await
            .expect("connect");
        repo.init(Utc::now()).await.expect("init");
        (repo, dir)
    }

    fn new_job(id: &str, priority: i64, now: DateTime<Utc>) -> NewJob {
        NewJob::builder()
            .id(id)
            .command("true")
            .priority(priority)
            .timeout_s(30)
            .max_retries(1)
            .run_at(now)
            .created_at(now)
            .build()
            .expect("new job")
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        repo.insert(new_job("dup", 0, now)).await.expect("first");
        let err = repo.insert(new_job("dup", 0, now)).await.unwrap_err();
        assert!(matches!(err, QueueError::DuplicateId(id) if id == "dup"));
    }

    #[tokio::test]
    async fn claim_respects_priority_then_fifo() {
        let (repo, _dir) = test_repo().await;
        let t0 = Utc::now();
        repo.insert(new_job("older-low", 0, t0)).await.unwrap();
        repo.insert(new_job("newer-low", 0, t0 + TimeDelta::milliseconds(5)))
            .await
            .unwrap();
        repo.insert(new_job("high", 9, t0 + TimeDelta::milliseconds(10)))
            .await
            .unwrap();

        let now = t0 + TimeDelta::seconds(1);
        let first = repo.claim_next("worker-1", now).await.unwrap().unwrap();
        assert_eq!(first.id, "high");
        assert_eq!(first.attempts, 1);
        assert_eq!(first.state, JobState::Processing);
        assert_eq!(first.claimed_by.as_deref(), Some("worker-1"));

        let second = repo.claim_next("worker-2", now).await.unwrap().unwrap();
        assert_eq!(second.id, "older-low");
        let third = repo.claim_next("worker-1", now).await.unwrap().unwrap();
        assert_eq!(third.id, "newer-low");
        assert!(repo.claim_next("worker-2", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_skips_jobs_scheduled_in_the_future() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        let mut job = new_job("later", 0, now);
        job.run_at = now + TimeDelta::seconds(60);
        repo.insert(job).await.unwrap();

        assert!(repo.claim_next("worker-1", now).await.unwrap().is_none());
        let claimed = repo
            .claim_next("worker-1", now + TimeDelta::seconds(61))
            .await
            .unwrap();
        assert_eq!(claimed.unwrap().id, "later");
    }

    #[tokio::test]
    async fn failed_job_becomes_claimable_after_backoff() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        repo.insert(new_job("retry-me", 0, now)).await.unwrap();
        let job = repo.claim_next("worker-1", now).await.unwrap().unwrap();

        let outcome = Outcome {
            exit_code: Some(1),
            ..Outcome::default()
        };
        let next = now + TimeDelta::seconds(2);
        repo.reschedule_retry(&job.id, "worker-1", next, "command exited with code 1", &outcome, now)
            .await
            .unwrap();

        let job = repo.find_by_id("retry-me").await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.claimed_by.is_none());

        assert!(
            repo.claim_next("worker-1", now + TimeDelta::seconds(1))
                .await
                .unwrap()
                .is_none()
        );
        let reclaimed = repo.claim_next("worker-1", next).await.unwrap().unwrap();
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn dlq_retry_resets_and_errors_when_not_dead() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        repo.insert(new_job("doomed", 0, now)).await.unwrap();
        let job = repo.claim_next("worker-1", now).await.unwrap().unwrap();
        let outcome = Outcome {
            exit_code: Some(1),
            ..Outcome::default()
        };
        repo.move_to_dead(&job.id, "worker-1", "command exited with code 1", &outcome, now)
            .await
            .unwrap();

        let revived = repo.retry_from_dlq("doomed", now).await.unwrap();
        assert_eq!(revived.state, JobState::Pending);
        assert_eq!(revived.attempts, 0);
        assert!(revived.error.is_none());

        let err = repo.retry_from_dlq("doomed", now).await.unwrap_err();
        assert!(matches!(err, QueueError::NotDead(_)));
        let err = repo.retry_from_dlq("ghost", now).await.unwrap_err();
        assert!(matches!(err, QueueError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn orphan_sweep_respects_retry_budget() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        repo.insert(new_job("fresh", 0, now)).await.unwrap();
        repo.insert(new_job("spent", 0, now)).await.unwrap();
        repo.claim_next("worker-1", now).await.unwrap().unwrap();
        repo.claim_next("worker-1", now).await.unwrap().unwrap();
        // Exhaust the budget of one row: attempts > max_retries (=1).
        sqlx::query("UPDATE jobs SET attempts = 2 WHERE id = 'spent'")
            .execute(repo.pool())
            .await
            .unwrap();

        // Not yet past timeout + grace: nothing to reap.
        let reaped = repo.reap_orphans(Duration::from_secs(30), now).await.unwrap();
        assert!(reaped.is_empty());

        let later = now + TimeDelta::seconds(120);
        let mut reaped = repo.reap_orphans(Duration::from_secs(30), later).await.unwrap();
        reaped.sort();
        assert_eq!(reaped, vec!["fresh".to_string(), "spent".to_string()]);

        let fresh = repo.find_by_id("fresh").await.unwrap();
        assert_eq!(fresh.state, JobState::Failed);
        assert_eq!(fresh.error.as_deref(), Some("orphaned"));
        let spent = repo.find_by_id("spent").await.unwrap();
        assert_eq!(spent.state, JobState::Dead);
    }

    #[tokio::test]
    async fn aggregate_counts_and_avg_runtime() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        repo.insert(new_job("a", 0, now)).await.unwrap();
        repo.insert(new_job("b", 0, now)).await.unwrap();
        let job = repo.claim_next("worker-1", now).await.unwrap().unwrap();
        let outcome = Outcome {
            exit_code: Some(0),
            ..Outcome::default()
        };
        repo.finalize_success(&job.id, "worker-1", &outcome, now + TimeDelta::seconds(3))
            .await
            .unwrap();

        let agg = repo.aggregate().await.unwrap();
        assert_eq!(agg.pending, 1);
        assert_eq!(agg.completed, 1);
        assert_eq!(agg.processing, 0);
        let avg = agg.avg_runtime_seconds.unwrap();
        assert!((avg - 3.0).abs() < 0.01, "avg runtime was {avg}");
    }

    #[tokio::test]
    async fn config_round_trip_and_validation() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        assert_eq!(repo.get_config().await.unwrap(), QueueConfig::default());

        repo.set_config("backoff_base", "3", now).await.unwrap();
        repo.set_config("default_timeout", "60", now).await.unwrap();
        let config = repo.get_config().await.unwrap();
        assert_eq!(config.backoff_base, 3);
        assert_eq!(config.default_timeout, 60);

        assert!(repo.set_config("backoff_base", "1", now).await.is_err());
        assert!(repo.set_config("bogus", "1", now).await.is_err());

        let entries = repo.config_entries().await.unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}
