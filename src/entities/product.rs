//! Product entity - Represents a catalog product sold in one or more flavors.
//!
//! A product carries the descriptive fields shown on listings (manufacturer,
//! name, category). Prices, stock and images live on its flavors, so a product
//! without flavors has nothing to sell. Deleting a product deletes its flavors.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Brand that makes the product (e.g., "Optimum Nutrition")
    pub manufacturer: String,
    /// Display name (e.g., "Gold Standard 100% Whey")
    pub name: String,
    /// Stored category (e.g., "Protein", "Creatine")
    pub category: String,
    /// Free-form marketing description
    pub description: Option<String>,
    /// Whether the product is made in Canada
    pub canadian: bool,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many flavors
    #[sea_orm(has_many = "super::flavor::Entity")]
    Flavors,
}

impl Related<super::flavor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flavors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
