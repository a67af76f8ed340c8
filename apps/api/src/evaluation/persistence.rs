use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

/// Writes `report` as pretty JSON to `<dir>/<call_id>.json`, or
/// `<dir>/evaluation_<unix-ts>.json` when no usable call id is given.
pub async fn save_report<T: Serialize>(
    dir: &Path,
    call_id: Option<&str>,
    report: &T,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;

    let path = dir.join(report_file_name(call_id));
    let body = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write report '{}'", path.display()))?;

    info!("Saved evaluation report to {}", path.display());
    Ok(path)
}

/// Best-effort variant for request handlers: failures are logged and dropped.
pub async fn save_report_logged<T: Serialize>(dir: &Path, call_id: Option<&str>, report: &T) {
    if let Err(e) = save_report(dir, call_id, report).await {
        warn!("Could not persist evaluation report: {e:#}");
    }
}

fn report_file_name(call_id: Option<&str>) -> String {
    match call_id.map(sanitize_call_id).filter(|id| !id.is_empty()) {
        Some(id) => format!("{id}.json"),
        None => format!("evaluation_{}.json", Utc::now().timestamp()),
    }
}

/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `_`.
fn sanitize_call_id(call_id: &str) -> String {
    call_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
