//! Operation metrics shared by the storage backends.

use std::time::Instant;

/// Records the outcome of one store operation.
///
/// Emits `knowstore_operations_total` and `knowstore_operation_duration_ms`,
/// both labelled by backend, operation and status (`success` or `error`).
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "knowstore_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "knowstore_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Runs `f` and records its outcome.
pub fn timed<T, E>(
    backend: &'static str,
    operation: &'static str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let start = Instant::now();
    let result = f();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
    result
}
