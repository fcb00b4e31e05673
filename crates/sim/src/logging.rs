use std::env;
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging to stderr. `RUST_LOG` overrides the default filter;
/// `verbose` raises the default to `debug`.
pub fn init(verbose: bool) {
    let level = if verbose || cfg!(debug_assertions) { Level::DEBUG } else { Level::INFO };
    let default_filter = Targets::new()
        .with_target("quadpwm_sim", level)
        .with_target("quadpwm_core", level);
    let filter = match env::var("RUST_LOG") {
        Ok(filter) => filter.parse::<Targets>().unwrap_or(default_filter),
        Err(_) => default_filter,
    };

    let registry = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .compact()
            .with_line_number(true)
            .with_writer(std::io::stderr),
    );
    if let Err(err) = registry.try_init() {
        eprintln!("setting tracing default failed: {err:?}");
    }
}
