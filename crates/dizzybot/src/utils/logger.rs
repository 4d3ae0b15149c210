use anyhow::Result;
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Install the global subscriber: stdout plus a daily rolling file in
/// `config.directory`. `RUST_LOG` wins over `config.filter` when set.
pub fn init_logger(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(vec![
            output_layer(config.format, std::io::stdout, true),
            output_layer(config.format, file_appender, false),
        ])
        .try_init()?;

    Ok(())
}

/// One fmt layer. Json is the same on every sink; pretty output is only
/// used on the terminal, files get plain uncoloured lines.
fn output_layer<S, W>(format: LogFormat, writer: W, terminal: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_level(true);

    match (format, terminal) {
        (LogFormat::Json, _) => layer.json().with_thread_ids(true).boxed(),
        (LogFormat::Pretty, true) => layer.pretty().boxed(),
        (LogFormat::Pretty, false) => layer.with_ansi(false).boxed(),
    }
}
