use std::env;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "hearthlist.log";

// The non-blocking writer stops flushing once its guard drops; pin it for
// the process lifetime.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn env_filter() -> EnvFilter {
    // RUST_LOG wins; HEARTHLIST_LOG is the app-specific fallback.
    let spec = env::var("RUST_LOG")
        .or_else(|_| env::var("HEARTHLIST_LOG"))
        .unwrap_or_else(|_| String::from("info"));
    EnvFilter::new(spec)
}

/// Install the stdout subscriber and the log-to-tracing bridge. Safe to
/// call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Like `init`, plus a daily-rolling JSON file sink under `logs_dir`.
pub fn init_with_file(logs_dir: &Path) -> anyhow::Result<()> {
    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let _ = tracing_log::LogTracer::init();
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()
        .map_err(|err| anyhow::anyhow!("install tracing subscriber: {err}"))
}
