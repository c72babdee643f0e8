use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive for a `-v` count
pub fn level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the stderr subscriber. Call once per process.
pub fn init(verbosity: u8) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new(level(verbosity)))
        .init();
}
