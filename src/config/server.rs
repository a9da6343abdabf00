//! HTTP server settings read from the environment.

use crate::errors::{Error, Result};
use std::net::SocketAddr;

/// Address used when `BIND_ADDR` is not set.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Settings for the HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket address the API listens on
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    /// Reads `BIND_ADDR` from the environment, falling back to [`DEFAULT_BIND_ADDR`].
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the address cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<Self> {
        let bind_addr = raw.trim().parse().map_err(|e| Error::Config {
            message: format!("Invalid BIND_ADDR '{raw}': {e}"),
        })?;
        Ok(Self { bind_addr })
    }
}
