//! Liveness, welcome and metrics endpoints.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use sysinfo::{Disks, System};

use crate::errors::AppError;
use crate::state::AppState;

/// Host resource sampler. CPU usage is a delta between refreshes, so the
/// `System` is kept across calls; the first sample after startup reads 0.
#[derive(Clone)]
pub struct SystemMonitor {
    system: Arc<Mutex<System>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub platform: String,
    pub cpu_usage_percent: f32,
    pub memory_usage_percent: f64,
    pub disk_usage_percent: f64,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Arc::new(Mutex::new(system)),
        }
    }

    pub fn snapshot(&self) -> anyhow::Result<SystemSnapshot> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow!("system monitor mutex poisoned"))?;
        system.refresh_cpu();
        system.refresh_memory();

        Ok(SystemSnapshot {
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_usage_percent: percent(system.used_memory(), system.total_memory()),
            disk_usage_percent: root_disk_usage(),
        })
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Usage of the root filesystem, or of all disks together when `/` is not a mount.
fn root_disk_usage() -> f64 {
    let disks = Disks::new_with_refreshed_list();
    let (total, available) = match disks.list().iter().find(|d| d.mount_point() == Path::new("/")) {
        Some(root) => (root.total_space(), root.available_space()),
        None => disks.list().iter().fold((0, 0), |(t, a), d| {
            (t + d.total_space(), a + d.available_space())
        }),
    };
    percent(total.saturating_sub(available), total)
}

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Cover Letter Generator API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
/// Liveness plus a CPU/memory/disk snapshot of the host.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let monitor = state.system.clone();
    let snapshot = tokio::task::spawn_blocking(move || monitor.snapshot())
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    Ok(Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "environment": state.config.environment.as_str(),
        "timestamp": Utc::now().to_rfc3339(),
        "system": snapshot,
    })))
}

/// GET /metrics
/// Prometheus text exposition of the application registry.
pub async fn metrics_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    )
        .into_response())
}
