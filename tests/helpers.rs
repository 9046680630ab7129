use std::time::Duration;

use queuectl::{Job, JobState, Queue, QueueSvcConfig};

/// Bootstrap a queue backed by a throwaway data directory. The directory
/// guard must stay alive for the duration of the test.
pub async fn init_queue() -> anyhow::Result<(Queue, tempfile::TempDir)> {
    let dir = tempfile::tempdir()?;
    let queue = init_queue_at(dir.path()).await?;
    Ok((queue, dir))
}

pub async fn init_queue_at(data_dir: &std::path::Path) -> anyhow::Result<Queue> {
    let config = QueueSvcConfig::builder()
        .data_dir(data_dir)
        .build()
        .map_err(anyhow::Error::msg)?;
    Ok(Queue::init(config).await?)
}

/// Poll until the job reaches `state` or the timeout elapses.
pub async fn wait_for_state(
    queue: &Queue,
    id: &str,
    state: JobState,
    timeout: Duration,
) -> anyhow::Result<Job> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = queue.find(id).await?;
        if job.state == state {
            return Ok(job);
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "job '{id}' did not reach {state} within {timeout:?} (currently {})",
                job.state
            );
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
