//! Job rows, enqueue payloads, and persisted queue options.

use chrono::{DateTime, NaiveDateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::QueueError;
use crate::time::ms_to_dt;

/// Lifecycle state of a job.
///
/// `pending` and `failed` rows are claimable once their `next_attempt_at`
/// arrives; `completed` and `dead` are terminal except for an explicit DLQ
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// One persisted unit of work. Timestamps are UTC; `stdout`/`stderr` hold the
/// (capped) capture of the most recent attempt.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub priority: i64,
    pub timeout_s: i64,
    pub max_retries: i64,
    pub attempts: i64,
    pub state: JobState,
    pub run_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for Job {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let state: String = row.try_get("state")?;
        let state = state
            .parse::<JobState>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        Ok(Job {
            id: row.try_get("id")?,
            command: row.try_get("command")?,
            priority: row.try_get("priority")?,
            timeout_s: row.try_get("timeout_s")?,
            max_retries: row.try_get("max_retries")?,
            attempts: row.try_get("attempts")?,
            state,
            run_at: ms_to_dt(row.try_get("run_at")?),
            next_attempt_at: ms_to_dt(row.try_get("next_attempt_at")?),
            claimed_by: row.try_get("claimed_by")?,
            started_at: row.try_get::<Option<i64>, _>("started_at")?.map(ms_to_dt),
            finished_at: row.try_get::<Option<i64>, _>("finished_at")?.map(ms_to_dt),
            exit_code: row.try_get("exit_code")?,
            stdout: row.try_get("stdout")?,
            stderr: row.try_get("stderr")?,
            error: row.try_get("error")?,
            created_at: ms_to_dt(row.try_get("created_at")?),
            updated_at: ms_to_dt(row.try_get("updated_at")?),
        })
    }
}

/// Captured output of a job's most recent attempt.
#[derive(Debug, Clone, Serialize)]
pub struct JobLogs {
    pub exit_code: Option<i64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// The enqueue payload as submitted over the wire.
///
/// Unknown keys are rejected outright; optional fields fall back to the
/// persisted [`QueueConfig`] defaults at enqueue time.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnqueueSpec {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub max_retries: Option<i64>,
    #[serde(default)]
    pub run_at: Option<String>,
}

impl EnqueueSpec {
    pub fn from_json(payload: &str) -> Result<Self, QueueError> {
        let spec: EnqueueSpec = serde_json::from_str(payload)
            .map_err(|e| QueueError::InvalidPayload(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.id.trim().is_empty() {
            return Err(QueueError::InvalidPayload("'id' must not be empty".into()));
        }
        if self.command.trim().is_empty() {
            return Err(QueueError::InvalidPayload(
                "'command' must not be empty".into(),
            ));
        }
        if let Some(timeout) = self.timeout
            && timeout < 1
        {
            return Err(QueueError::InvalidPayload(
                "'timeout' must be a positive integer".into(),
            ));
        }
        if let Some(max_retries) = self.max_retries
            && max_retries < 0
        {
            return Err(QueueError::InvalidPayload(
                "'max_retries' must be a non-negative integer".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a `run_at` value: RFC 3339, `"2025-11-05T15:00:00"` or
/// `"2025-11-05 15:00:00"` (both read as UTC), `"now"`, or absent.
pub(crate) fn parse_run_at(
    run_at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, QueueError> {
    let Some(raw) = run_at else { return Ok(now) };
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(QueueError::InvalidRunAt(raw.to_string()))
}

/// Fully resolved job about to be inserted, all defaults applied.
#[derive(Debug, Builder)]
pub struct NewJob {
    #[builder(setter(into))]
    pub(crate) id: String,
    #[builder(setter(into))]
    pub(crate) command: String,
    pub(crate) priority: i64,
    pub(crate) timeout_s: i64,
    pub(crate) max_retries: i64,
    pub(crate) run_at: DateTime<Utc>,
    pub(crate) created_at: DateTime<Utc>,
}

impl NewJob {
    pub fn builder() -> NewJobBuilder {
        NewJobBuilder::default()
    }
}

/// Queue-wide options persisted in the `config` table. Read-through: every
/// enqueue and every retry consults the stored values, never a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueConfig {
    pub backoff_base: i64,
    pub default_priority: i64,
    pub default_timeout: i64,
    pub max_retries: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backoff_base: 2,
            default_priority: 0,
            default_timeout: 300,
            max_retries: 3,
        }
    }
}

impl QueueConfig {
    pub const KEYS: [&'static str; 4] = [
        "backoff_base",
        "default_priority",
        "default_timeout",
        "max_retries",
    ];

    /// Validate one `config set` entry, returning the parsed value.
    pub fn validate_entry(key: &str, value: &str) -> Result<i64, QueueError> {
        let parsed: i64 = value.parse().map_err(|_| QueueError::InvalidConfigValue {
            key: key.to_string(),
            reason: format!("'{value}' is not an integer"),
        })?;
        let range_err = |reason: &str| QueueError::InvalidConfigValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        match key {
            "backoff_base" if parsed < 2 => Err(range_err("must be at least 2")),
            "default_timeout" if parsed < 1 => Err(range_err("must be at least 1")),
            "max_retries" if parsed < 0 => Err(range_err("must be non-negative")),
            "backoff_base" | "default_timeout" | "max_retries" | "default_priority" => Ok(parsed),
            other => Err(QueueError::UnknownConfigKey(other.to_string())),
        }
    }

    pub(crate) fn apply(&mut self, key: &str, value: i64) {
        match key {
            "backoff_base" => self.backoff_base = value,
            "default_priority" => self.default_priority = value,
            "default_timeout" => self.default_timeout = value,
            "max_retries" => self.max_retries = value,
            _ => {}
        }
    }
}
