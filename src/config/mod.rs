/// Catalog seed loading from catalog.toml
pub mod catalog;

/// Database configuration and connection management
pub mod database;

/// HTTP listener settings from environment variables
pub mod server;
