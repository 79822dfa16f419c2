//! Bootstrap utilities for processes embedding sse-fanout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ServerConfig, LOG_ENV_VAR};

/// Server id prefix used when the host name cannot be resolved.
pub const UNKNOWN_SERVER: &str = "unknown-server";

/// Initialize tracing with the SSE_FANOUT_LOG environment variable.
///
/// Defaults to "info" level if SSE_FANOUT_LOG is not set. A subscriber that
/// is already installed is left in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Identifier of this process as recorded on its subscriptions.
///
/// `host:port`, or `unknown-server:port` when the host name is unavailable.
pub fn resolve_server_id(server: &ServerConfig) -> String {
    if let Some(id) = server.server_id.as_deref().filter(|id| !id.trim().is_empty()) {
        return id.to_string();
    }
    server_id_for(local_hostname(), server.port)
}

fn server_id_for(hostname: Option<String>, port: u16) -> String {
    match hostname {
        Some(host) if !host.is_empty() => format!("{}:{}", host, port),
        _ => format!("{}:{}", UNKNOWN_SERVER, port),
    }
}

#[cfg(unix)]
fn local_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
}

#[cfg(not(unix))]
fn local_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .ok()
}
