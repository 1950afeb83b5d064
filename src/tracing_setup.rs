//! Log subscriber bootstrap.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the fmt subscriber for this process.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `info`. Calling this
/// more than once is a no-op, so embedding applications and test binaries can
/// both call it without fighting over the global subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("smriti_memory=info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
