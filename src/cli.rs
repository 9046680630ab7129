//! Command-line surface over the queue service.
//!
//! Exit codes: 0 success, 1 user-input error, 2 system error, 130 after a
//! worker pool concludes via cancellation.

use clap::{Parser, Subcommand};

use std::path::PathBuf;
use std::process::ExitCode;

use queuectl::error::QueueError;
use queuectl::{
    EnqueueSpec, JobState, Queue, QueueSvcConfig, dashboard, install_shutdown_handler,
};

#[derive(Parser, Debug)]
#[command(name = "queuectl")]
#[command(about = "A CLI-based background job orchestration system")]
pub struct Cli {
    /// Directory holding the database and per-job logs
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the database and data directories
    Init,
    /// Enqueue a new job from a JSON payload
    Enqueue {
        /// Job payload, e.g. '{"id":"j1","command":"echo hi"}'
        payload: String,
    },
    /// List jobs
    List {
        /// Filter by state (pending/processing/completed/failed/dead)
        #[arg(long)]
        state: Option<JobState>,
        /// Maximum number of jobs to show
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show queue status
    Status,
    /// Show the captured output of a job's last attempt
    Logs { job_id: String },
    /// Worker management
    Worker {
        #[command(subcommand)]
        command: WorkerCommand,
    },
    /// Show performance metrics
    Metrics,
    /// Dead letter queue management
    Dlq {
        #[command(subcommand)]
        command: DlqCommand,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Dashboard management
    Dashboard {
        #[command(subcommand)]
        command: DashboardCommand,
    },
}

#[derive(Subcommand, Debug)]
enum WorkerCommand {
    /// Start workers and run until interrupted
    Start {
        /// Number of concurrent workers
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Subcommand, Debug)]
enum DlqCommand {
    /// List dead jobs
    List,
    /// Move a dead job back to pending with a fresh retry budget
    Retry { job_id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show all configuration values
    Show,
    /// Set a configuration value
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum DashboardCommand {
    /// Start the read-only web dashboard on loopback
    Start {
        #[arg(long, default_value_t = 5000)]
        port: u16,
    },
}

pub async fn run(cli: Cli) -> ExitCode {
    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_user_error() {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

async fn init_queue(data_dir: &PathBuf) -> Result<Queue, QueueError> {
    let config = QueueSvcConfig::builder()
        .data_dir(data_dir.clone())
        .build()
        .map_err(QueueError::Config)?;
    Queue::init(config).await
}

async fn execute(cli: Cli) -> Result<ExitCode, QueueError> {
    let queue = init_queue(&cli.data_dir).await?;

    match cli.command {
        Command::Init => {
            println!("initialized queuectl");
            println!("  database: {}", cli.data_dir.join("queuectl.db").display());
            println!("  logs:     {}", queue.logs_dir().display());
        }
        Command::Enqueue { payload } => {
            let spec = EnqueueSpec::from_json(&payload)?;
            let job = queue.enqueue(spec).await?;
            println!(
                "enqueued job '{}' (priority={}, run_at={})",
                job.id,
                job.priority,
                job.run_at.to_rfc3339()
            );
        }
        Command::List { state, limit } => {
            let jobs = queue.list(state, limit).await?;
            if jobs.is_empty() {
                println!("no jobs found");
                return Ok(ExitCode::SUCCESS);
            }
            println!(
                "{:<20} {:<12} {:>8} {:>10} {:<25}",
                "ID", "STATE", "PRIORITY", "ATTEMPTS", "CREATED"
            );
            for job in jobs {
                println!(
                    "{:<20} {:<12} {:>8} {:>7}/{:<2} {:<25}",
                    job.id,
                    job.state.to_string(),
                    job.priority,
                    job.attempts,
                    job.max_retries + 1,
                    job.created_at.to_rfc3339()
                );
            }
        }
        Command::Status => {
            let status = queue.status().await?;
            println!("pending:     {}", status.pending);
            println!("processing:  {}", status.processing);
            println!("completed:   {}", status.completed);
            println!("failed:      {}", status.failed);
            println!("dead (dlq):  {}", status.dead);
            println!("workers:     {}", status.active_workers);
        }
        Command::Logs { job_id } => {
            let logs = queue.logs(&job_id).await?;
            let exit = logs
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("=== EXIT CODE ===\n{exit}\n");
            println!("=== STDOUT ===\n{}\n", logs.stdout.unwrap_or_default());
            println!("=== STDERR ===\n{}", logs.stderr.unwrap_or_default());
        }
        Command::Worker {
            command: WorkerCommand::Start { count },
        } => {
            let count = count.max(1);
            let pool = queue.start_workers(count);
            install_shutdown_handler(pool.cancellation_token());
            println!("started {count} worker(s); press Ctrl+C to stop");
            pool.wait().await;
            return Ok(ExitCode::from(130));
        }
        Command::Metrics => {
            let metrics = queue.metrics().await?;
            println!("total jobs:     {}", metrics.total_jobs);
            println!("completed:      {}", metrics.completed);
            println!("failed:         {}", metrics.failed);
            println!("dead:           {}", metrics.dead);
            println!("avg runtime:    {:.2}s", metrics.avg_runtime_seconds);
            println!("active workers: {}", metrics.active_workers);
        }
        Command::Dlq { command } => match command {
            DlqCommand::List => {
                let jobs = queue.dlq_list().await?;
                if jobs.is_empty() {
                    println!("dlq is empty");
                    return Ok(ExitCode::SUCCESS);
                }
                println!("{:<20} {:<40} {:<25}", "ID", "ERROR", "UPDATED");
                for job in jobs {
                    let mut error = job.error.unwrap_or_default();
                    if error.len() > 40 {
                        error.truncate(37);
                        error.push_str("...");
                    }
                    println!(
                        "{:<20} {:<40} {:<25}",
                        job.id,
                        error,
                        job.updated_at.to_rfc3339()
                    );
                }
            }
            DlqCommand::Retry { job_id } => {
                queue.dlq_retry(&job_id).await?;
                println!("retrying job '{job_id}' from dlq");
            }
        },
        Command::Config { command } => match command {
            ConfigCommand::Show => {
                for (key, value) in queue.config_entries().await? {
                    println!("{key:<20} = {value}");
                }
            }
            ConfigCommand::Set { key, value } => {
                queue.config_set(&key, &value).await?;
                println!("set {key} = {value}");
            }
        },
        Command::Dashboard {
            command: DashboardCommand::Start { port },
        } => {
            println!("starting dashboard at http://127.0.0.1:{port} (Ctrl+C to stop)");
            dashboard::run_dashboard(port, queue).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
