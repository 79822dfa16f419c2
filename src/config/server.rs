//! Server identity configuration.

use serde::Deserialize;

/// Server configuration.
///
/// The transport layer binds the listener; this crate only needs the values
/// to derive the owning-process identifier recorded on each subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Listening port of the transport layer.
    pub port: u16,
    /// Explicit owning-process identifier. Derived from host name and port when unset.
    pub server_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            server_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let server = ServerConfig::default();
        assert_eq!(server.port, 8080);
        assert!(server.server_id.is_none());
    }
}
