use tracing_subscriber::{
    fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Pretty, timestamp-free events on stderr so stdout stays clean for JSON and CSV.
/// `RUST_LOG` replaces the default filter entirely.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "drive_meter=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
