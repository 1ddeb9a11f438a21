//! Logging utilities for wiwb.
//!
//! Structured `tracing` helpers shared by the CLI and the web layer. Log output goes to
//! stderr so that `wiwb sample` can write its table to stdout.

use std::time::Instant;
use tracing::{debug, error, info, warn, Level};

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use uuid::Uuid;

use crate::error::WiwbError;

/// Tracing layer for the HTTP API: one span per request, latency on the response
pub fn create_http_trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    DefaultMakeSpan,
    DefaultOnRequest,
    DefaultOnResponse,
> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}

/// Install the global subscriber. `RUST_LOG` overrides `log_level`.
pub fn init_tracing(log_level: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

pub fn log_operation_start(operation: &str, details: Option<&str>) {
    match details {
        Some(details) => info!(operation, details, "Starting"),
        None => info!(operation, "Starting"),
    }
}

/// Log the outcome of an operation started at `start_time`
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_millis() as u64;
    if success {
        info!(operation, duration_ms, "Finished");
    } else {
        warn!(operation, duration_ms, "Failed");
    }
}

/// Run `f`, logging its duration and whether it returned an error
pub fn log_timed_operation<T, F>(operation: &str, f: F) -> crate::error::Result<T>
where
    F: FnOnce() -> crate::error::Result<T>,
{
    let start = Instant::now();
    debug!(operation, "Starting");

    let result = f();
    log_operation_end(operation, start, result.is_ok());
    result
}

/// Log the shape of a sampled table
pub fn log_sample_stats(operation: &str, rows: usize, columns: usize, statistics: &[&str]) {
    info!(
        operation,
        rows,
        columns,
        statistics = %statistics.join(","),
        "Sampled table"
    );
}

pub fn log_error(error: &WiwbError, context: &str) {
    error!(error = %error, context, status = error.status_code(), "Error");
}

/// Log a failed API request with the parameters it was called with
pub fn log_request_error(error: &WiwbError, endpoint: &str, request_id: &str, params: Option<&str>) {
    let status = error.status_code();
    if status < 500 {
        warn!(
            error = %error,
            endpoint,
            request_id,
            params = params.unwrap_or("none"),
            status,
            "Request rejected"
        );
    } else {
        error!(
            error = %error,
            endpoint,
            request_id,
            params = params.unwrap_or("none"),
            status,
            "Request failed"
        );
    }
}

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Run `f` under a subscriber that records warnings and errors, and return what it wrote
#[cfg(test)]
pub(crate) fn capture_warnings<F: FnOnce()>(f: F) -> String {
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(Level::WARN)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
