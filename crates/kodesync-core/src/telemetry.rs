//! Log subscriber setup for the KodeSync binaries.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide tracing subscriber.
///
/// `level` is the fallback verbosity; a `RUST_LOG` filter in the
/// environment takes precedence. With `json` set, log lines come out as
/// newline-delimited JSON instead of the human format. A process carries
/// at most one subscriber, so repeat calls are no-ops rather than errors.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let base = tracing_subscriber::registry().with(filter);

    if json {
        base.with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        base.with(fmt::layer().with_target(false)).try_init().ok();
    }
}
