//! Read-only HTTP dashboard.
//!
//! Serves a single embedded page plus JSON endpoints mirroring the `status`,
//! `list`, and `metrics` CLI commands. No authentication; the caller binds
//! it to loopback only.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use std::net::{Ipv4Addr, SocketAddr};

use crate::error::QueueError;
use crate::{Job, JobState, MetricsSnapshot, Queue, StatusSummary};

#[derive(Clone)]
struct DashboardState {
    queue: Queue,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn internal_error(e: QueueError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

/// Serve the dashboard on `127.0.0.1:port` until the process exits.
pub async fn run_dashboard(port: u16, queue: Queue) -> Result<(), QueueError> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/jobs/{id}", get(job_detail_handler))
        .route("/api/metrics", get(metrics_handler))
        .layer(cors)
        .with_state(DashboardState { queue });

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    tracing::info!(addr = %addr, "starting dashboard server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

async fn status_handler(
    State(state): State<DashboardState>,
) -> Result<Json<StatusSummary>, ApiError> {
    state.queue.status().await.map(Json).map_err(internal_error)
}

#[derive(Deserialize)]
struct JobsQuery {
    state: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct JobsResponse {
    jobs: Vec<Job>,
}

async fn list_jobs_handler(
    State(state): State<DashboardState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, ApiError> {
    let filter = match query.state.as_deref() {
        None | Some("all") => None,
        Some(raw) => Some(raw.parse::<JobState>().map_err(|e| {
            (StatusCode::BAD_REQUEST, Json(ErrorBody { error: e }))
        })?),
    };
    let jobs = state
        .queue
        .list(filter, query.limit.unwrap_or(50))
        .await
        .map_err(internal_error)?;
    Ok(Json(JobsResponse { jobs }))
}

#[derive(Serialize)]
struct JobDetailResponse {
    #[serde(flatten)]
    job: Job,
    log_content: Option<String>,
}

async fn job_detail_handler(
    State(state): State<DashboardState>,
    Path(id): Path<String>,
) -> Result<Json<JobDetailResponse>, ApiError> {
    let job = match state.queue.find(&id).await {
        Ok(job) => job,
        Err(e @ QueueError::JobNotFound(_)) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            ));
        }
        Err(e) => return Err(internal_error(e)),
    };
    let log_path = state.queue.logs_dir().join(format!("{id}.log"));
    let log_content = tokio::fs::read_to_string(&log_path).await.ok();
    Ok(Json(JobDetailResponse { job, log_content }))
}

async fn metrics_handler(
    State(state): State<DashboardState>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    state
        .queue
        .metrics()
        .await
        .map(Json)
        .map_err(internal_error)
}
