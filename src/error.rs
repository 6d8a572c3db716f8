use thiserror::Error;

/// Failures inside the instrumentation layer itself.
///
/// None of these ever reach the caller of an intercepted method; the
/// diagnostic logger swallows them after a debug-level note.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("runtime metrics unavailable: {0}")]
    MetricsUnavailable(String),

    #[error("runtime metrics reported no memory regions")]
    NoMemoryRegion,

    #[error("diagnostic sink rejected record: {0}")]
    Sink(String),

    #[error("invalid warn threshold {0}: must be finite and non-negative")]
    InvalidThreshold(f64),
}
