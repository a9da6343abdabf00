//! Core business logic - framework-agnostic catalog, variant and product operations.

/// Product cards and detail views built from catalog products
pub mod card;
/// Catalog query composition for search and virtual categories
pub mod catalog;
/// Product and flavor storage
pub mod product;
/// Representative flavor selection and display pricing
pub mod variant;

pub use catalog::{CAROUSEL_SIZE, CatalogContext};
pub use product::CatalogProduct;
pub use variant::{DisplayPricing, SelectionPolicy};
