use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initializes a logger writing to `stderr`.
///
/// `RUST_LOG` takes precedence over the verbosity given on the command line.
pub(crate) fn init_logger(verbosity: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_filter(verbosity))?,
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(stderr_layer).try_init()?;
    Ok(())
}

/// Filter directives for a number of `-v` flags.
pub(crate) fn log_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "food_explorer=warn,food_catalog=warn",
        1 => "food_explorer=info,food_catalog=info",
        2 => "food_explorer=debug,food_catalog=debug",
        _ => "food_explorer=trace,food_catalog=trace",
    }
}
