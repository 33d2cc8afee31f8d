/*!
Logging setup: verbosity flags map to a tracing level, `RUST_LOG` wins
when set.
*/

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map `-v` counts and `-q` onto a log level. Quiet wins over verbose.
pub fn derive_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber. Called once, before dispatch.
pub fn init_logging(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
