//! Flavor entity - A purchasable variant of a product.
//!
//! Each flavor has its own images, size, stock and pricing. A `None`
//! `sale_price` means "not on sale" and a `None` `popularity` means "never
//! ranked"; both differ from an explicit zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Flavor database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flavors")]
pub struct Model {
    /// Unique identifier for the flavor
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the product that owns this flavor
    pub product_id: i64,
    /// Flavor name (e.g., "Double Rich Chocolate")
    pub name: String,
    /// Product photo URL, may be empty
    pub image_url_product: String,
    /// Nutrition label photo URL, may be empty
    pub image_url_nutrition: String,
    /// Package size (e.g., "5 lb")
    pub size: Option<String>,
    /// Servings per package as displayed (e.g., "74")
    pub servings: Option<String>,
    /// Units in stock
    pub units_available: i32,
    /// Regular price in CAD
    pub price: f64,
    /// Sale price in CAD; only meaningful when greater than zero
    pub sale_price: Option<f64>,
    /// Opaque popularity rank, higher is more popular
    pub popularity: Option<i64>,
}

/// Defines relationships between Flavor and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each flavor belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Model {
    /// Sale price if the flavor is actually discounted (strictly positive).
    #[must_use]
    pub fn active_sale_price(&self) -> Option<f64> {
        self.sale_price.filter(|sale| *sale > 0.0)
    }

    /// Whether the flavor has a usable product photo.
    #[must_use]
    pub fn has_product_image(&self) -> bool {
        !self.image_url_product.trim().is_empty()
    }
}

impl ActiveModelBehavior for ActiveModel {}
