use crate::verbosity::Verbosity;
use tracing_subscriber::EnvFilter;

/// Initializes the process-wide `tracing` subscriber exactly once (spec §5
/// "Process-wide state... the logging subsystem are process-wide.
/// Initialise once at startup, tear down once at exit").
///
/// `RUST_LOG` takes precedence over `verbosity` when set, matching the
/// convention every crate in this workspace uses `tracing-subscriber` for.
/// Calling this more than once is harmless; only the first call installs a
/// subscriber.
pub fn init(verbosity: Verbosity) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(verbosity.level_filter().to_string()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    });
}
