//! Read-only aggregates shared by the CLI and the dashboard.

use serde::Serialize;

use crate::repo::StoreAggregate;

/// Queue status: job counts per state plus this process's worker count.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead: i64,
    pub active_workers: usize,
}

impl StatusSummary {
    pub(crate) fn from_aggregate(agg: &StoreAggregate, active_workers: usize) -> Self {
        Self {
            pending: agg.pending,
            processing: agg.processing,
            completed: agg.completed,
            failed: agg.failed,
            dead: agg.dead,
            active_workers,
        }
    }
}

/// Performance metrics computed on demand from the jobs table.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_jobs: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead: i64,
    /// Mean `finished_at - started_at` over completed jobs, in seconds.
    pub avg_runtime_seconds: f64,
    pub active_workers: usize,
}

impl MetricsSnapshot {
    pub(crate) fn from_aggregate(agg: &StoreAggregate, active_workers: usize) -> Self {
        Self {
            total_jobs: agg.pending + agg.processing + agg.completed + agg.failed + agg.dead,
            pending: agg.pending,
            processing: agg.processing,
            completed: agg.completed,
            failed: agg.failed,
            dead: agg.dead,
            avg_runtime_seconds: agg.avg_runtime_seconds.unwrap_or(0.0),
            active_workers,
        }
    }
}
