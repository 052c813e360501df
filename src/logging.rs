use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";

/// Keeps the background log writer alive; drop it last.
pub struct LoggingHandle {
    pub log_path: PathBuf,
    _guard: WorkerGuard,
}

fn log_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".local/share")
        });
    base.join("uplink").join("logs")
}

/// Route tracing to a file so stdout stays free for the console.
/// Filter: `UPLINK_LOG`, then `RUST_LOG`, then the built-in default.
pub fn init_logging(verbose: bool) -> anyhow::Result<LoggingHandle> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;
    let log_path = dir.join("uplink.log");

    let filter = std::env::var("UPLINK_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| {
            if verbose {
                EnvFilter::new("debug,reqwest=info,hyper=info")
            } else {
                EnvFilter::new(DEFAULT_FILTER)
            }
        });

    let file_appender = tracing_appender::rolling::never(&dir, "uplink.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()?;

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_path.display(),
        pid = std::process::id(),
    );

    Ok(LoggingHandle { log_path, _guard: guard })
}
