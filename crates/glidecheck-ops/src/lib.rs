//! Operational helpers: logging, event history, run reports.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use glidecheck_types::{
    config::OpsConfig, events::PipelineEvent, report::AnnotationRun, GlideError, Result,
};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| GlideError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| GlideError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// In-memory history of events and completed runs.
#[derive(Clone, Default)]
pub struct ReportStore {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
    runs: Arc<Mutex<Vec<AnnotationRun>>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_event(&self, event: PipelineEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }

    pub async fn record_run(&self, run: AnnotationRun) -> Result<()> {
        self.runs.lock().await.push(run);
        Ok(())
    }

    pub async fn snapshot_events(&self) -> Vec<PipelineEvent> {
        self.events.lock().await.clone()
    }

    pub async fn snapshot_runs(&self) -> Vec<AnnotationRun> {
        self.runs.lock().await.clone()
    }
}

pub fn ensure_report_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    std::fs::create_dir_all(&dir)
        .map_err(|err| GlideError::Ops(format!("failed to create report dir: {err}")))?;
    info!("Report directory ready at {:?}", dir);
    Ok(dir)
}

/// Persists `run` as pretty JSON under `dir` and returns the file path.
pub fn write_run_report(dir: &Path, run: &AnnotationRun) -> Result<PathBuf> {
    let name = format!(
        "run_{}_{}.json",
        run.started_at.format("%Y%m%d_%H%M%S"),
        &Uuid::new_v4().simple().to_string()[..8]
    );
    let path = dir.join(name);
    let body = serde_json::to_string_pretty(run)
        .map_err(|err| GlideError::Ops(format!("failed to serialize report: {err}")))?;
    std::fs::write(&path, body)
        .map_err(|err| GlideError::Ops(format!("failed to write report {:?}: {err}", path)))?;
    info!("Run report written to {:?}", path);
    Ok(path)
}
