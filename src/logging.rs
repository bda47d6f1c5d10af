use crate::config::Config;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, Request, Response, header};
use axum::middleware::Next;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const PREVIEW_LIMIT: usize = 16 * 1024;
const BUFFER_LIMIT: usize = 64 * 1024;

/// Keep guards alive for the lifetime of the app.
pub struct LogGuards {
    _file_guard: WorkerGuard,
}

fn split_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("incident-report.log"))
        .to_string_lossy()
        .to_string();
    (dir, file)
}

pub fn init_logging(config: &Config) -> LogGuards {
    let filter = EnvFilter::new(config.log_filter());

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .compact()
        .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()));

    let (dir, file) = split_path(&config.log_file);
    let appender = tracing_appender::rolling::never(dir, file);
    let (nb, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_timer(fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_writer(nb);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    LogGuards { _file_guard: guard }
}

fn request_id<B>(req: &Request<B>) -> String {
    req.headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// One line per request: method, path, status and latency.
pub async fn access_log(req: Request<Body>, next: Next) -> Response<Body> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let req_id = request_id(&req);

    let res = next.run(req).await;

    tracing::info!(
        request_id = %req_id,
        %method,
        %path,
        status = %res.status(),
        latency_ms = %started.elapsed().as_millis(),
        "request"
    );
    res
}

fn preview(bytes: &[u8]) -> String {
    if bytes.len() > PREVIEW_LIMIT {
        format!(
            "{}… [truncated]",
            String::from_utf8_lossy(&bytes[..PREVIEW_LIMIT])
        )
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

/// Whether a body is worth a debug preview: textual, and with a known length
/// small enough to hold in memory.
#[must_use]
pub fn previewable(content_type: &str, len: Option<u64>) -> bool {
    let textual = content_type.is_empty()
        || content_type.starts_with("text/")
        || content_type.starts_with("application/json")
        || content_type.starts_with("application/x-www-form-urlencoded");
    textual && len.is_some_and(|n| usize::try_from(n).is_ok_and(|n| n <= BUFFER_LIMIT))
}

/// Logs request & response bodies at debug level.
/// Only small textual bodies are buffered; uploads, PDFs and staged files
/// stream through untouched. Does nothing unless debug logging is on.
pub async fn log_payloads(req: Request<Body>, next: Next) -> Response<Body> {
    if !tracing::enabled!(Level::DEBUG) {
        return next.run(req).await;
    }

    let req_id = request_id(&req);
    let req_ct = content_type(req.headers());
    let req_len = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let (req_parts, req_body) = req.into_parts();
    let req = if previewable(&req_ct, req_len) {
        match axum::body::to_bytes(req_body, BUFFER_LIMIT).await {
            Ok(bytes) => {
                tracing::debug!(request_id=%req_id, request_body=%preview(&bytes), "request body");
                Request::from_parts(req_parts, Body::from(bytes))
            }
            Err(e) => {
                tracing::warn!(request_id=%req_id, error=%e, "failed reading request body");
                Request::from_parts(req_parts, Body::empty())
            }
        }
    } else {
        Request::from_parts(req_parts, req_body)
    };

    let res: Response<Body> = next.run(req).await;

    let res_ct = content_type(res.headers());
    if !previewable(&res_ct, res.body().size_hint().exact()) {
        return res;
    }

    let (res_parts, res_body) = res.into_parts();
    match axum::body::to_bytes(res_body, BUFFER_LIMIT).await {
        Ok(bytes) => {
            tracing::debug!(request_id=%req_id, response_body=%preview(&bytes), "response body");
            Response::from_parts(res_parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!(request_id=%req_id, error=%e, "failed reading response body");
            Response::from_parts(res_parts, Body::empty())
        }
    }
}
