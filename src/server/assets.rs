use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use super::AppState;

/// GET / — the homepage template
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<Vec<u8>>, ApiError> {
    let path = &state.config.web.index_path;
    match tokio::fs::read(path).await {
        Ok(body) => Ok(Html(body)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Err(ApiError::NotFound(format!("File {} not found", name)))
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("Failed to read {}", path.display()))
            .into()),
    }
}

/// GET /static/{*path}
pub async fn static_file(
    State(state): State<Arc<AppState>>,
    UrlPath(requested): UrlPath<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound("Path not found".to_string());

    let file = match resolve_static_path(&state.config.web.static_dir, &requested) {
        Ok(file) => file,
        Err(e) => {
            debug!("Rejected static path '{}': {:#}", requested, e);
            return Err(not_found());
        }
    };

    let body = match tokio::fs::read(&file).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}", file.display()))
                .into())
        }
    };

    let content_type = content_type(file.extension().and_then(|e| e.to_str()));
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// Resolve `requested` below `root`, refusing anything that escapes it.
/// Returns the canonical path of an existing regular file.
fn resolve_static_path(root: &Path, requested: &str) -> Result<PathBuf> {
    let root_canonical = root
        .canonicalize()
        .with_context(|| format!("Static directory not found: {}", root.display()))?;

    let relative = requested.trim_start_matches('/');
    if relative.is_empty() {
        anyhow::bail!("Empty static path");
    }

    let candidate = root_canonical
        .join(relative)
        .canonicalize()
        .context("Static file not found")?;

    if !candidate.starts_with(&root_canonical) {
        anyhow::bail!(
            "Access denied: '{}' is outside the static directory '{}'",
            requested,
            root.display()
        );
    }
    if !candidate.is_file() {
        anyhow::bail!("'{}' is not a file", requested);
    }

    Ok(candidate)
}

fn content_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("js" | "mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
