/*!
 * Operation Tracing
 * Structured tracing for clipboard operations using the tracing crate
 *
 * Features:
 * - Trace ID per operation for correlating loop and caller logs
 * - JSON-formatted logs for structured parsing
 * - Slow operation warnings (owners that take long to answer)
 */

use crate::core::limits::SLOW_OPERATION_THRESHOLD;
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - CLIPSEL_TRACE_JSON: Enable JSON output (default: false)
///
/// Calling it twice is harmless; the second subscriber is ignored.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("CLIPSEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        let initialized = registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok();
        if initialized {
            info!("Structured tracing initialized with JSON output");
        }
    } else {
        let initialized = registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .is_ok();
        if initialized {
            debug!("Structured tracing initialized");
        }
    }
}

/// Generate a unique trace ID for request correlation
#[must_use]
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span around one clipboard operation, timed on drop
pub struct OperationSpan {
    span: tracing::Span,
    start: Instant,
    operation: &'static str,
    trace_id: String,
}

impl OperationSpan {
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "operation",
            trace_id = %trace_id,
            operation = operation,
            board = tracing::field::Empty,
            format = tracing::field::Empty,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            items_processed = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            operation,
            trace_id,
        }
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record a declared field (`board`, `format`, `result`, `error`)
    pub fn record(&self, key: &str, value: &str) {
        self.span.record(key, value);
    }

    /// Record a field with any Debug-compatible type
    pub fn record_debug<V: std::fmt::Debug>(&self, key: &str, value: V) {
        self.span.record(key, format!("{value:?}").as_str());
    }

    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
        self.span.record("result", "error");
    }

    /// Record bytes or options handled
    pub fn record_items_processed(&self, count: usize) {
        self.span.record("items_processed", count);
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration > SLOW_OPERATION_THRESHOLD {
            warn!(
                trace_id = %self.trace_id,
                operation = self.operation,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow clipboard operation"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                operation = self.operation,
                duration_us = duration.as_micros() as u64,
                "operation completed"
            );
        }
    }
}

/// Helper to create an operation span
#[inline]
#[must_use]
pub fn span_operation(name: &'static str) -> OperationSpan {
    OperationSpan::new(name)
}
