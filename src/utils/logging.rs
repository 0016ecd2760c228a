use std::fmt;
use std::fmt::Write;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt::time::FormatTime};

use super::error::Result;

pub mod prelude {
    pub use tracing::{debug, error, info, trace, warn};
    pub use tracing::{debug_span, error_span, info_span, trace_span, warn_span};
    pub use tracing::instrument;
}

/// Installs the global `tracing` subscriber. The returned guard must be held
/// for the lifetime of the embedding process; dropping it flushes the
/// non-blocking writer.
pub fn setup() -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::try_from_env("RJMS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(IsoTimeFormat)
        .with_writer(writer)
        .try_init()?;

    Ok(guard)
}

struct IsoTimeFormat;

impl FormatTime for IsoTimeFormat {
    fn format_time(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}
