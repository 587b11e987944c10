//! Tracing and logging (shared setup).

/// Tracing configuration (filters, formats).
pub mod tracing;

/// Initialize process-wide observability with human-readable logs.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize process-wide observability with JSON logs.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_json() {
    tracing::init_json();
}
