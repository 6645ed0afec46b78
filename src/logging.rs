//! Tracing subscriber setup for the binary

use std::error::Error;
use std::io;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
/// Logs go to stderr so stdout stays free for forwarded messages.
pub fn init_logging(level: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_writer(io::stderr)).try_init()?;
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).try_init()?;
    }
    Ok(())
}
