//! echoline: a single-connection TCP line-echo server.
//!
//! A peer that connects receives a greeting, sends one newline-terminated
//! line, and gets back a label, the first `capacity` bytes of that line,
//! and a farewell, after which the connection is closed. One connection is
//! serviced at a time on a single-threaded cooperative event loop.

use echoline::config::Config;
use echoline::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        capacity = config.capacity,
        "Starting echoline server"
    );

    runtime::run(&config)?;
    Ok(())
}
