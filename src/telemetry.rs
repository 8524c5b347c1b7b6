// Logging setup for binaries and tests embedding the booking client

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "prepper_booking=info";

// Installs an env-filtered fmt subscriber unless the host already set one
// RUST_LOG wins over the default filter
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
