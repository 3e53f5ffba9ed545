//! Process-wide logging initialization.
//!
//! All modules log through the `log` facade; this installs a tracing
//! subscriber bridging it, with a verbosity-driven default filter that
//! `RUST_LOG` can still override.

use once_cell::sync::OnceCell;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: OnceCell<()> = OnceCell::new();

/// Initializes logging once. `verbose`: 0 -> info, 1 -> debug, 2+ -> trace.
pub fn init(verbose: u8) {
    INIT.get_or_init(|| {
        let default = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = LogTracer::init();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    });
}
