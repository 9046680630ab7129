mod helpers;

use std::time::Duration;

use queuectl::error::QueueError;
use queuectl::{EnqueueSpec, JobState};

#[tokio::test]
async fn enqueue_round_trip_fills_defaults() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    let spec = EnqueueSpec::from_json(r#"{"id":"j1","command":"echo hi"}"#)?;
    queue.enqueue(spec).await?;

    let job = queue.find("j1").await?;
    assert_eq!(job.command, "echo hi");
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.priority, 0);
    assert_eq!(job.timeout_s, 300);
    assert_eq!(job.max_retries, 3);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.next_attempt_at, job.run_at);
    assert!(job.claimed_by.is_none());
    assert!(job.updated_at >= job.created_at);
    Ok(())
}

#[tokio::test]
async fn duplicate_id_is_always_an_error() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    let spec = EnqueueSpec::from_json(r#"{"id":"dup","command":"echo one"}"#)?;
    queue.enqueue(spec).await?;

    let again = EnqueueSpec::from_json(r#"{"id":"dup","command":"echo two"}"#)?;
    let err = queue.enqueue(again).await.unwrap_err();
    assert!(matches!(err, QueueError::DuplicateId(ref id) if id == "dup"));
    assert!(err.is_user_error());
    Ok(())
}

#[tokio::test]
async fn malformed_run_at_is_rejected() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    let spec =
        EnqueueSpec::from_json(r#"{"id":"j1","command":"echo hi","run_at":"yesterday"}"#)?;
    let err = queue.enqueue(spec).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidRunAt(_)));
    assert!(queue.find("j1").await.is_err());
    Ok(())
}

#[tokio::test]
async fn config_is_read_through_at_enqueue_time() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    queue.config_set("default_priority", "7").await?;
    queue.config_set("default_timeout", "60").await?;
    queue.config_set("max_retries", "1").await?;

    let spec = EnqueueSpec::from_json(r#"{"id":"tuned","command":"echo hi"}"#)?;
    let job = queue.enqueue(spec).await?;
    assert_eq!(job.priority, 7);
    assert_eq!(job.timeout_s, 60);
    assert_eq!(job.max_retries, 1);

    // Explicit fields still win over the configured defaults.
    let spec = EnqueueSpec::from_json(r#"{"id":"explicit","command":"echo hi","priority":-1}"#)?;
    let job = queue.enqueue(spec).await?;
    assert_eq!(job.priority, -1);
    assert_eq!(job.timeout_s, 60);
    Ok(())
}

#[tokio::test]
async fn config_set_validates_key_and_range() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    assert!(matches!(
        queue.config_set("backoff_base", "1").await.unwrap_err(),
        QueueError::InvalidConfigValue { .. }
    ));
    assert!(matches!(
        queue.config_set("nope", "3").await.unwrap_err(),
        QueueError::UnknownConfigKey(_)
    ));

    let entries = queue.config_entries().await?;
    let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "backoff_base",
            "default_priority",
            "default_timeout",
            "max_retries"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn list_filters_by_state_and_honors_limit() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    for n in 1..=3 {
        let spec = EnqueueSpec::from_json(&format!(
            r#"{{"id":"j{n}","command":"echo {n}"}}"#
        ))?;
        queue.enqueue(spec).await?;
        // Separate the created_at timestamps so the newest-first order is fixed.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let all = queue.list(None, 50).await?;
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, "j3");

    let limited = queue.list(Some(JobState::Pending), 2).await?;
    assert_eq!(limited.len(), 2);
    assert!(queue.list(Some(JobState::Dead), 50).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn status_reflects_counts_and_local_workers() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    queue
        .enqueue(EnqueueSpec::from_json(r#"{"id":"a","command":"echo a"}"#)?)
        .await?;
    queue
        .enqueue(EnqueueSpec::from_json(r#"{"id":"b","command":"echo b"}"#)?)
        .await?;

    let status = queue.status().await?;
    assert_eq!(status.pending, 2);
    assert_eq!(status.completed, 0);
    assert_eq!(status.active_workers, 0);
    Ok(())
}

#[tokio::test]
async fn dlq_retry_succeeds_once_then_errors() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    queue
        .enqueue(EnqueueSpec::from_json(
            r#"{"id":"bad","command":"exit 1","max_retries":0}"#,
        )?)
        .await?;

    let pool = queue.start_workers(1);
    let job = helpers::wait_for_state(&queue, "bad", JobState::Dead, Duration::from_secs(5)).await?;
    pool.shutdown().await;
    assert_eq!(job.attempts, 1);

    let revived = queue.dlq_retry("bad").await?;
    assert_eq!(revived.state, JobState::Pending);
    assert_eq!(revived.attempts, 0);

    let err = queue.dlq_retry("bad").await.unwrap_err();
    assert!(matches!(err, QueueError::NotDead(_)));
    let err = queue.dlq_retry("missing").await.unwrap_err();
    assert!(matches!(err, QueueError::JobNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn logs_return_last_attempt_capture() -> anyhow::Result<()> {
    let (queue, _dir) = helpers::init_queue().await?;

    queue
        .enqueue(EnqueueSpec::from_json(
            r#"{"id":"noisy","command":"echo out; echo err >&2"}"#,
        )?)
        .await?;

    let pool = queue.start_workers(1);
    helpers::wait_for_state(&queue, "noisy", JobState::Completed, Duration::from_secs(5)).await?;
    pool.shutdown().await;

    let logs = queue.logs("noisy").await?;
    assert_eq!(logs.exit_code, Some(0));
    assert!(logs.stdout.unwrap_or_default().contains("out"));
    assert!(logs.stderr.unwrap_or_default().contains("err"));

    assert!(matches!(
        queue.logs("missing").await.unwrap_err(),
        QueueError::JobNotFound(_)
    ));
    Ok(())
}
