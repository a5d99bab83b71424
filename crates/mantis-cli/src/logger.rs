//! Diagnostics for the `mantis` binary.
//!
//! The engine crates log through the `log` facade. `tracing-subscriber`
//! bridges those records into its formatter on stderr, next to the CLI's own
//! `tracing` events.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Filter for a `-v` count. Non-empty `directives` (`RUST_LOG` syntax)
/// replace the verbosity default.
pub fn filter_for(verbosity: u8, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Install the subscriber; a second call keeps the first one.
pub fn init(verbosity: u8) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbosity, directives.as_deref()))
        .with_writer(std::io::stderr)
        .try_init();
}
