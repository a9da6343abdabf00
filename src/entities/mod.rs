//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod flavor;
pub mod product;

// Re-export specific types to avoid conflicts
pub use flavor::{Column as FlavorColumn, Entity as Flavor, Model as FlavorModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
