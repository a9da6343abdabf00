//! Shared test utilities for the catalog service.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test products and flavors with sensible defaults.

use crate::{
    core::product::{self, CatalogProduct, NewFlavor, NewProduct},
    entities::{self, Product},
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// In-memory product row that was never stored.
///
/// # Defaults
/// * `manufacturer`: `"Test Brand"`
/// * `category`: `"Test Category"`
/// * `created_at`: now
pub fn product_fixture(id: i64, name: &str) -> entities::product::Model {
    let now = Utc::now();
    entities::product::Model {
        id,
        manufacturer: "Test Brand".to_string(),
        name: name.to_string(),
        category: "Test Category".to_string(),
        description: None,
        canadian: false,
        created_at: now,
        updated_at: now,
    }
}

/// In-memory flavor row that was never stored.
///
/// # Defaults
/// * `product_id`: 1
/// * `price`: 10.0, no sale, unranked
/// * `units_available`: 10
pub fn flavor_fixture(id: i64, name: &str) -> entities::flavor::Model {
    entities::flavor::Model {
        id,
        product_id: 1,
        name: name.to_string(),
        image_url_product: format!("https://cdn.example.com/{id}.png"),
        image_url_nutrition: String::new(),
        size: None,
        servings: None,
        units_available: 10,
        price: 10.0,
        sale_price: None,
        popularity: None,
    }
}

/// Flavor input with the given pricing and popularity.
pub fn new_flavor(
    name: &str,
    price: f64,
    sale_price: Option<f64>,
    popularity: Option<i64>,
) -> NewFlavor {
    NewFlavor {
        name: name.to_string(),
        image_url_product: format!("https://cdn.example.com/{}.png", name.to_lowercase()),
        image_url_nutrition: String::new(),
        size: Some("2 lb".to_string()),
        servings: Some("30".to_string()),
        units_available: 10,
        price,
        sale_price,
        popularity,
    }
}

/// Product input with the given flavors.
pub fn new_product(
    name: &str,
    manufacturer: &str,
    category: &str,
    flavors: Vec<NewFlavor>,
) -> NewProduct {
    NewProduct {
        manufacturer: manufacturer.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        description: None,
        canadian: false,
        flavors,
    }
}

/// Creates a stored product with `flavor_count` plain flavors.
///
/// # Defaults
/// * `manufacturer`: `"Test Brand"`
/// * `category`: `"Protein"`
/// * flavors: `"Flavor 1"`, `"Flavor 2"`, ... priced 10.0, unranked
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    flavor_count: usize,
) -> Result<CatalogProduct> {
    let flavors = (1..=flavor_count)
        .map(|i| new_flavor(&format!("Flavor {i}"), 10.0, None, None))
        .collect();
    product::create_product(db, new_product(name, "Test Brand", "Protein", flavors)).await
}

/// Moves a stored product's creation time `days` into the past.
pub async fn backdate_product(db: &DatabaseConnection, product_id: i64, days: i64) -> Result<()> {
    let mut active: entities::product::ActiveModel = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?
        .into();
    active.created_at = Set(Utc::now() - Duration::days(days));
    active.update(db).await?;
    Ok(())
}
