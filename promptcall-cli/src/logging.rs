use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

/// Initialize logging on stderr so stdout stays machine readable.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Filter out noisy template logs
    if let Ok(directive) = "handlebars=off".parse() {
        filter = filter.add_directive(directive);
    }

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NONE)
        .event_format(
            tracing_subscriber::fmt::format()
                .compact()
                .without_time()
                .with_ansi(false),
        );

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();
}
