use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::keys::KeyStore;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_BIND_PORT: u16 = 8000;
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/mcp";
pub const DEFAULT_PRIVATE_KEY_PATH: &str = "private.pem";
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "public.pem";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub bind_port: u16,
    pub keys: KeyStore,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub keys: KeyStore,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
    #[error("MCP_ENDPOINT must be a valid URL")]
    InvalidEndpoint,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_BIND_PORT);

        let config = Self {
            bind_addr,
            bind_port,
            keys: key_store_from_env(),
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = env::var("MCP_ENDPOINT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        endpoint
            .parse::<reqwest::Url>()
            .map_err(|_| ConfigError::InvalidEndpoint)?;

        Ok(Self {
            endpoint,
            keys: key_store_from_env(),
        })
    }
}

/// Both roles share one key-material layout: inline PEM from the
/// environment, else the configured file paths. Empty values count as
/// unset.
fn key_store_from_env() -> KeyStore {
    KeyStore::new(
        non_empty_env("PRIVATE_KEY_PEM"),
        non_empty_env("PUBLIC_KEY_PEM"),
        PathBuf::from(
            env::var("PRIVATE_KEY_PATH").unwrap_or_else(|_| DEFAULT_PRIVATE_KEY_PATH.to_string()),
        ),
        PathBuf::from(
            env::var("PUBLIC_KEY_PATH").unwrap_or_else(|_| DEFAULT_PUBLIC_KEY_PATH.to_string()),
        ),
    )
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    use super::*;

    // from_env reads process-global state, so these tests take a lock to
    // keep their env mutations from interleaving.
    fn env_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_env() {
        for name in [
            "BIND_ADDR",
            "BIND_PORT",
            "MCP_ENDPOINT",
            "PRIVATE_KEY_PEM",
            "PUBLIC_KEY_PEM",
            "PRIVATE_KEY_PATH",
            "PUBLIC_KEY_PATH",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn server_defaults_bind_all_interfaces_on_8000() {
        let _guard = env_lock();
        clear_env();

        let config = ServerConfig::from_env().expect("config should parse");
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.bind_port, 8000);
        assert_eq!(
            config.bind_socket().expect("socket"),
            "0.0.0.0:8000".parse().expect("addr")
        );
    }

    #[test]
    fn bind_overrides_are_honored() {
        let _guard = env_lock();
        clear_env();
        env::set_var("BIND_ADDR", "127.0.0.1");
        env::set_var("BIND_PORT", "9123");

        let config = ServerConfig::from_env().expect("config should parse");
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 9123);
    }

    #[test]
    fn invalid_port_fails() {
        let _guard = env_lock();
        clear_env();
        env::set_var("BIND_PORT", "not-a-port");

        let err = ServerConfig::from_env().expect_err("expected invalid port error");
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn invalid_bind_addr_fails_socket_validation() {
        let _guard = env_lock();
        clear_env();
        env::set_var("BIND_ADDR", "not an address");

        let err = ServerConfig::from_env().expect_err("expected invalid socket error");
        assert!(matches!(err, ConfigError::InvalidSocket));
    }

    #[test]
    fn client_defaults_to_localhost_endpoint() {
        let _guard = env_lock();
        clear_env();

        let config = ClientConfig::from_env().expect("config should parse");
        assert_eq!(config.endpoint, "http://localhost:8000/mcp");
    }

    #[test]
    fn client_endpoint_override_is_honored() {
        let _guard = env_lock();
        clear_env();
        env::set_var("MCP_ENDPOINT", "http://10.1.2.3:9000/mcp");

        let config = ClientConfig::from_env().expect("config should parse");
        assert_eq!(config.endpoint, "http://10.1.2.3:9000/mcp");
    }

    #[test]
    fn invalid_endpoint_fails() {
        let _guard = env_lock();
        clear_env();
        env::set_var("MCP_ENDPOINT", "not a url");

        let err = ClientConfig::from_env().expect_err("expected invalid endpoint error");
        assert!(matches!(err, ConfigError::InvalidEndpoint));
    }

    #[test]
    fn empty_env_pem_counts_as_unset() {
        let _guard = env_lock();
        clear_env();
        env::set_var("PRIVATE_KEY_PEM", "   ");

        assert_eq!(non_empty_env("PRIVATE_KEY_PEM"), None);
    }
}
