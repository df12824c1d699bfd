//! Structured logging for the storefront binaries.

use tracing_subscriber::EnvFilter;

/// Directives applied when `RUST_LOG` is not set.
///
/// `info` keeps request and commit logs; retry chatter from the cart service
/// sits at `debug` and stays quiet by default.
const DEFAULT_DIRECTIVES: &str = "info";

/// Install the process-wide subscriber: JSON lines on stdout, filtered
/// through `RUST_LOG` when present.
///
/// Calling it again is harmless; only the first call wins.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn repeated_init_is_a_no_op() {
        super::init();
        super::init();
    }
}
