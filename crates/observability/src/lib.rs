//! Process-wide observability wiring.

/// Structured logging setup (JSON lines, `RUST_LOG` filtering).
pub mod tracing;

pub use self::tracing::init;
