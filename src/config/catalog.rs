//! Catalog seed configuration loaded from catalog.toml
//!
//! This module loads an initial set of products and flavors from a TOML file.
//! The seed is only applied to an empty database, so restarting the server
//! never duplicates products or overwrites admin edits.

use crate::{
    core::product::{self, NewProduct},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Seed file used when `CATALOG_SEED_PATH` is not set.
pub const DEFAULT_SEED_PATH: &str = "catalog.toml";

/// Configuration structure representing the entire catalog.toml file
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    /// Products to create, each with its flavors
    #[serde(default)]
    pub products: Vec<NewProduct>,
}

/// Loads the catalog seed from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_seed<P: AsRef<Path>>(path: P) -> Result<CatalogSeed> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!(
            "Failed to read catalog seed {}: {e}",
            path.as_ref().display()
        ),
    })?;

    toml::from_str(&contents).map_err(Into::into)
}

/// Path of the seed file, from `CATALOG_SEED_PATH` or [`DEFAULT_SEED_PATH`].
#[must_use]
pub fn seed_path() -> String {
    std::env::var("CATALOG_SEED_PATH").unwrap_or_else(|_| DEFAULT_SEED_PATH.to_string())
}

/// Creates every seeded product if the store has no products yet.
///
/// Returns the number of products created.
///
/// # Errors
/// Returns an error if a seeded product is invalid or the database write fails.
pub async fn seed_catalog(db: &DatabaseConnection, seed: CatalogSeed) -> Result<usize> {
    let existing = product::count_products(db).await?;
    if existing > 0 {
        info!(existing, "catalog already populated; skipping seed");
        return Ok(0);
    }

    let total = seed.products.len();
    for new_product in seed.products {
        product::create_product(db, new_product).await?;
    }
    info!(total, "seeded catalog");
    Ok(total)
}
