//! Tracing/logging setup shared by the replenishment binaries.

/// Initialize process-wide tracing with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(LogFormat::Json);
}

pub use self::tracing::{LogFormat, init_with};

/// Tracing configuration (filters, formats).
pub mod tracing;
