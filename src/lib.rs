pub mod aggregate; // Grouping, counts and means for display
pub mod capture; // EDC form core
pub mod config;
pub mod error;
pub mod generator; // Synthetic visit log
pub mod models;
pub mod randomness;
pub mod remote; // randomnumberapi.com client
pub mod risk; // BMI -> cardiac event
pub mod store; // Append-only CSV row store

use tracing_subscriber::EnvFilter;

pub use error::CoreError;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise [`config::default_log_filter`].
/// Call once from the binary. Library code never installs a subscriber.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);
}
