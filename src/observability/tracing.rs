use anyhow::{Error, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Initialize the global tracing subscriber exactly once.
///
/// Respects `RUST_LOG` if set; otherwise defaults to `info`, or `debug` when
/// `debug` is requested via the `LOG_DEBUG` config flag.
///
/// # Errors
/// Returns an error if the subscriber has already been installed by another
/// crate in the process.
pub fn init(debug: bool) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let default_level = if debug { "debug" } else { "info" };
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|error| Error::msg(error.to_string()))?;

        tracing::info!(debug, "tracing initialized");

        Ok::<(), Error>(())
    })?;
    Ok(())
}

/// Install a panic hook that routes panic payloads through `tracing::error!`
/// instead of letting them print unstructured to stderr.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            tracing::error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            tracing::error!(thread = thread_name, message, "panic occurred without location");
        }
    }));
}
