use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{prelude::*, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize logging: a stdout layer plus an optional rolling file layer,
/// both rendered in the configured format.
///
/// Uses `try_init` so a second initialization (unit tests, embedding) is a
/// no-op instead of a panic.
pub fn init_with_config(cfg: &LoggingConfig) {
    let stdout_ansi = cfg.format == LogFormat::Text;
    let mut layers = vec![render_layer(cfg.format, std::io::stdout, stdout_ansi)];

    if cfg.enable_file_logging {
        if let Some(writer) = open_log_writer(cfg) {
            layers.push(render_layer(cfg.format, writer, false));
        }
    }

    let _ = tracing_subscriber::registry()
        .with(log_filter(cfg))
        .with(layers)
        .try_init();
}

/// Filter precedence: explicit config level, then RUST_LOG, then "info".
fn log_filter(cfg: &LoggingConfig) -> EnvFilter {
    cfg.level
        .map(|level| EnvFilter::new(level.as_str()))
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// One rendering layer over an arbitrary writer, boxed so stdout and file
/// layers can share a vec despite their differing writer types.
fn render_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(ansi)
        .with_writer(writer);
    match format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Text => base.boxed(),
    }
}

/// Build the non-blocking rolling-file writer, or fall back to stdout-only
/// logging when the log directory cannot be created.
fn open_log_writer(cfg: &LoggingConfig) -> Option<tracing_appender::non_blocking::NonBlocking> {
    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Cannot create log directory '{}': {err}; file logging disabled",
            cfg.dir
        );
        return None;
    }

    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };
    let appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // The guard flushes buffered records when dropped; it must live for the
    // rest of the process.
    std::mem::forget(guard);
    Some(writer)
}
