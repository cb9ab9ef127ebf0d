use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

// Poll scans and object-store requests log per file at debug
const QUIET_DEPENDENCIES: &[&str] = &["notify=warn", "opendal=warn", "hyper=info"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(format: &str) -> anyhow::Result<Self> {
        match format.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!("Invalid log format: {other}")),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level`. JSON output carries span context and
/// source locations for log shippers; pretty output is for terminals. With
/// `logging.file_path` set, lines are appended to that file instead of stdout.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;
    let format = LogFormat::parse(&config.format)?;
    let filter = build_filter(level);

    let file = config
        .file_path
        .as_deref()
        .map(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(Arc::new)
                .map_err(|e| anyhow::anyhow!("Failed to open log file {path}: {e}"))
        })
        .transpose()?;

    let layer = match (format, file) {
        (LogFormat::Json, Some(file)) => json_layer().with_writer(file).boxed(),
        (LogFormat::Json, None) => json_layer().boxed(),
        (LogFormat::Pretty, Some(file)) => fmt::layer()
            .pretty()
            .with_ansi(false)
            .with_line_number(true)
            .with_writer(file)
            .boxed(),
        (LogFormat::Pretty, None) => fmt::layer().pretty().with_line_number(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    Ok(())
}

fn json_layer<S>() -> fmt::Layer<S, fmt::format::JsonFields, fmt::format::Format<fmt::format::Json>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_line_number(true)
        .with_file(true)
}

fn build_filter(level: Level) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directives = std::iter::once(level.to_string().to_lowercase())
        .chain(QUIET_DEPENDENCIES.iter().map(ToString::to_string))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
