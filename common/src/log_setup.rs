use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::{MakeWriterExt, Tee, WithMaxLevel, WithMinLevel};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging destinations for calibration runs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directives, e.g. `"info"` or `"unwarp::margin=debug,info"`.
    /// `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Directory for daily rolling log files. Console only when `None`.
    pub directory: Option<PathBuf>,
    /// Rolled files kept on disk.
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
            max_files: 5,
        }
    }
}

impl LogConfig {
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Parse `filter` unless `RUST_LOG` overrides it.
fn build_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|e| panic!("Invalid log filter {:?}: {}", filter, e))
}

/// Info and more verbose records go to `out`; warnings and errors to `err`.
fn console_writer<O, E>(out: O, err: E) -> Tee<WithMinLevel<O>, WithMaxLevel<E>>
where
    O: for<'a> MakeWriter<'a>,
    E: for<'a> MakeWriter<'a>,
{
    out.with_min_level(Level::INFO).and(err.with_max_level(Level::WARN))
}

/// Install the global subscriber.
///
/// Console output goes to stdout, except warnings and errors, which go to
/// stderr only. When a directory is configured, records are also written to
/// `unwarp.*.log` files there; keep the returned guard alive until exit so
/// they get flushed.
pub fn setup_logging(config: &LogConfig) -> Option<WorkerGuard> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(console_writer(std::io::stdout, std::io::stderr));

    let mut guard = None;
    let file_layer = config.directory.as_ref().map(|dir| {
        std::fs::create_dir_all(dir)
            .unwrap_or_else(|e| panic!("Failed to create log directory {:?}: {}", dir, e));
        let appender = tracing_appender::rolling::Builder::new()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("unwarp")
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(dir)
            .unwrap_or_else(|e| panic!("Failed to create log file appender: {}", e));
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);

        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(build_filter(&config.filter))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .unwrap_or_else(|e| panic!("Logger initialization failed: {}", e));

    guard
}
