//! Product storage - creating, loading, updating and deleting products with their flavors.
//!
//! A product and its flavors are always written and read as one unit
//! ([`CatalogProduct`]). Creation inserts the product row and then every flavor
//! row inside one database transaction; updates replace the whole flavor list
//! rather than merging individual flavors; deletion removes the flavors and
//! then the product. The read-side queries at the bottom of the module are the
//! storage half of the catalog composer in [`crate::core::catalog`].

use crate::{
    entities::{Flavor, Product, flavor, product},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    Condition, LoaderTrait, PaginatorTrait, QueryOrder, Select, Set, TransactionTrait,
    prelude::*,
    sea_query::{Alias, Expr, Func, LikeExpr, Query, SimpleExpr},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// A product together with its flavors, ordered by flavor id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogProduct {
    /// The product row
    pub product: product::Model,
    /// Every flavor owned by the product
    pub flavors: Vec<flavor::Model>,
}

impl CatalogProduct {
    fn new(product: product::Model, mut flavors: Vec<flavor::Model>) -> Self {
        flavors.sort_by_key(|f| f.id);
        Self { product, flavors }
    }

    /// Highest popularity among the flavors. Unranked flavors count as 0, and
    /// so does a product without flavors.
    #[must_use]
    pub fn max_popularity(&self) -> i64 {
        self.flavors
            .iter()
            .map(|f| f.popularity.unwrap_or(0))
            .max()
            .unwrap_or(0)
    }

    /// Highest active sale price among the flavors, `None` when nothing is on sale.
    #[must_use]
    pub fn max_sale_price(&self) -> Option<f64> {
        self.flavors
            .iter()
            .filter_map(flavor::Model::active_sale_price)
            .max_by(f64::total_cmp)
    }
}

/// Input for one flavor of a product being created or replaced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewFlavor {
    /// Flavor name
    pub name: String,
    /// Product photo URL
    #[serde(default)]
    pub image_url_product: String,
    /// Nutrition label photo URL
    #[serde(default)]
    pub image_url_nutrition: String,
    /// Package size
    #[serde(default)]
    pub size: Option<String>,
    /// Servings per package
    #[serde(default)]
    pub servings: Option<String>,
    /// Units in stock
    #[serde(default)]
    pub units_available: i32,
    /// Regular price
    #[serde(default)]
    pub price: f64,
    /// Sale price, if discounted
    #[serde(default)]
    pub sale_price: Option<f64>,
    /// Popularity rank
    #[serde(default)]
    pub popularity: Option<i64>,
}

/// Input for creating a product and all of its flavors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewProduct {
    /// Brand name
    pub manufacturer: String,
    /// Product name
    pub name: String,
    /// Stored category
    pub category: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Made in Canada
    #[serde(default)]
    pub canadian: bool,
    /// Flavors to create with the product
    #[serde(default)]
    pub flavors: Vec<NewFlavor>,
}

/// Changes to an existing product. `None` fields are left untouched.
///
/// When `flavors` is present the product's flavor list is replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductUpdate {
    /// New brand name
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// New product name
    #[serde(default)]
    pub name: Option<String>,
    /// New category
    #[serde(default)]
    pub category: Option<String>,
    /// New description; an empty string clears it
    #[serde(default)]
    pub description: Option<String>,
    /// New made-in-Canada flag
    #[serde(default)]
    pub canadian: Option<bool>,
    /// Replacement flavor list
    #[serde(default)]
    pub flavors: Option<Vec<NewFlavor>>,
}

fn require_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(amount)
}

impl NewFlavor {
    /// Returns a trimmed copy, or the first validation failure.
    fn normalized(&self) -> Result<Self> {
        let price = validate_amount(self.price)?;
        let sale_price = self.sale_price.map(validate_amount).transpose()?;
        if self.units_available < 0 {
            return Err(Error::validation(
                "units_available",
                format!("must not be negative, got {}", self.units_available),
            ));
        }
        if let Some(sale) = sale_price.filter(|s| *s > 0.0 && *s >= price) {
            warn!(
                flavor = %self.name,
                price,
                sale_price = sale,
                "sale price is not below regular price"
            );
        }

        Ok(Self {
            name: require_text("flavor name", &self.name)?,
            image_url_product: self.image_url_product.trim().to_string(),
            image_url_nutrition: self.image_url_nutrition.trim().to_string(),
            size: optional_text(self.size.as_deref()),
            servings: optional_text(self.servings.as_deref()),
            units_available: self.units_available,
            price,
            sale_price,
            popularity: self.popularity,
        })
    }

    fn into_active_model(self, product_id: i64) -> flavor::ActiveModel {
        flavor::ActiveModel {
            product_id: Set(product_id),
            name: Set(self.name),
            image_url_product: Set(self.image_url_product),
            image_url_nutrition: Set(self.image_url_nutrition),
            size: Set(self.size),
            servings: Set(self.servings),
            units_available: Set(self.units_available),
            price: Set(self.price),
            sale_price: Set(self.sale_price),
            popularity: Set(self.popularity),
            ..Default::default()
        }
    }
}

fn normalize_flavors(flavors: &[NewFlavor]) -> Result<Vec<NewFlavor>> {
    flavors.iter().map(NewFlavor::normalized).collect()
}

async fn insert_flavors<C>(
    db: &C,
    product_id: i64,
    flavors: Vec<NewFlavor>,
) -> Result<Vec<flavor::Model>>
where
    C: ConnectionTrait,
{
    let mut inserted = Vec::with_capacity(flavors.len());
    for new_flavor in flavors {
        inserted.push(new_flavor.into_active_model(product_id).insert(db).await?);
    }
    Ok(inserted)
}

async fn flavors_for<C>(db: &C, product_id: i64) -> Result<Vec<flavor::Model>>
where
    C: ConnectionTrait,
{
    Flavor::find()
        .filter(flavor::Column::ProductId.eq(product_id))
        .order_by_asc(flavor::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a product and all of its flavors in a single database transaction.
///
/// # Errors
/// Returns an error if:
/// - The manufacturer, name, category or any flavor name is blank
/// - A price or sale price is negative or not finite
/// - A flavor's stock is negative
/// - The database insert fails (nothing is written in that case)
#[instrument(skip(db, new_product), fields(name = %new_product.name))]
pub async fn create_product(
    db: &DatabaseConnection,
    new_product: NewProduct,
) -> Result<CatalogProduct> {
    let manufacturer = require_text("manufacturer", &new_product.manufacturer)?;
    let name = require_text("name", &new_product.name)?;
    let category = require_text("category", &new_product.category)?;
    let flavors = normalize_flavors(&new_product.flavors)?;

    let now = Utc::now();
    let txn = db.begin().await?;

    let product = product::ActiveModel {
        manufacturer: Set(manufacturer),
        name: Set(name),
        category: Set(category),
        description: Set(optional_text(new_product.description.as_deref())),
        canadian: Set(new_product.canadian),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let flavors = insert_flavors(&txn, product.id, flavors).await?;
    txn.commit().await?;

    info!(
        product_id = product.id,
        flavor_count = flavors.len(),
        "created product"
    );
    Ok(CatalogProduct::new(product, flavors))
}

/// Updates a product's fields and, when given, replaces its entire flavor list.
///
/// Flavor replacement deletes every existing flavor row and inserts the new
/// set; flavor ids therefore change on every replacement.
///
/// # Errors
/// Returns an error if:
/// - Any provided text field is blank, or a replacement flavor is invalid
/// - The product does not exist
/// - The database update fails (nothing is written in that case)
#[instrument(skip(db, update))]
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    update: ProductUpdate,
) -> Result<CatalogProduct> {
    let manufacturer = update
        .manufacturer
        .as_deref()
        .map(|v| require_text("manufacturer", v))
        .transpose()?;
    let name = update
        .name
        .as_deref()
        .map(|v| require_text("name", v))
        .transpose()?;
    let category = update
        .category
        .as_deref()
        .map(|v| require_text("category", v))
        .transpose()?;
    let replacement = update.flavors.as_deref().map(normalize_flavors).transpose()?;

    let txn = db.begin().await?;

    let mut active: product::ActiveModel = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?
        .into();

    if let Some(manufacturer) = manufacturer {
        active.manufacturer = Set(manufacturer);
    }
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(category) = category {
        active.category = Set(category);
    }
    if let Some(description) = update.description.as_deref() {
        active.description = Set(optional_text(Some(description)));
    }
    if let Some(canadian) = update.canadian {
        active.canadian = Set(canadian);
    }
    active.updated_at = Set(Utc::now());
    let product = active.update(&txn).await?;

    let flavors = if let Some(replacement) = replacement {
        let removed = Flavor::delete_many()
            .filter(flavor::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        debug!(removed = removed.rows_affected, "replacing flavors");
        insert_flavors(&txn, product_id, replacement).await?
    } else {
        flavors_for(&txn, product_id).await?
    };

    txn.commit().await?;
    info!(product_id, flavor_count = flavors.len(), "updated product");
    Ok(CatalogProduct::new(product, flavors))
}

/// Deletes a product and every flavor it owns.
///
/// # Errors
/// Returns an error if the product does not exist or the delete fails.
#[instrument(skip(db))]
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let txn = db.begin().await?;

    let product = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    Flavor::delete_many()
        .filter(flavor::Column::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    Product::delete_by_id(product_id).exec(&txn).await?;

    txn.commit().await?;
    info!(product_id, "deleted product");
    Ok(product)
}

/// Loads a single product with its flavors.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_with_flavors(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<CatalogProduct>> {
    let Some(product) = Product::find_by_id(product_id).one(db).await? else {
        return Ok(None);
    };
    let flavors = flavors_for(db, product_id).await?;
    Ok(Some(CatalogProduct::new(product, flavors)))
}

/// Number of products in the store.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn count_products(db: &DatabaseConnection) -> Result<u64> {
    Product::find().count(db).await.map_err(Into::into)
}

/// Admin lookup: products whose name, category or manufacturer contains
/// `search` (case-insensitive), ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
#[instrument(skip(db))]
pub async fn admin_search(db: &DatabaseConnection, search: &str) -> Result<Vec<CatalogProduct>> {
    let search = search.trim();
    let condition = Condition::any()
        .add(contains_ci(product::Column::Name, search))
        .add(contains_ci(product::Column::Category, search))
        .add(contains_ci(product::Column::Manufacturer, search));

    let products = load_with_flavors(
        db,
        Product::find()
            .filter(condition)
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id),
    )
    .await?;
    debug!(count = products.len(), "admin search finished");
    Ok(products)
}

// ---------------------------------------------------------------------------
// Catalog read queries
// ---------------------------------------------------------------------------

/// Escapes LIKE wildcards so `needle` matches literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// `lower(column) LIKE '%needle%'`
fn contains_ci<C>(column: C, needle: &str) -> SimpleExpr
where
    C: ColumnTrait + 'static,
{
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(like_pattern(needle)).escape('\\'))
}

async fn load_with_flavors(
    db: &DatabaseConnection,
    select: Select<Product>,
) -> Result<Vec<CatalogProduct>> {
    let products = select.all(db).await?;
    let flavors = products.load_many(Flavor, db).await?;
    Ok(products
        .into_iter()
        .zip(flavors)
        .map(|(product, flavors)| CatalogProduct::new(product, flavors))
        .collect())
}

/// Every product with its flavors, in id order.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn fetch_all_with_flavors(db: &DatabaseConnection) -> Result<Vec<CatalogProduct>> {
    load_with_flavors(db, Product::find().order_by_asc(product::Column::Id)).await
}

/// Products whose name, description, manufacturer, category or any flavor
/// name contains `query`, case-insensitively, in id order. Case folding
/// covers ASCII only.
///
/// # Errors
/// Returns an error if the database query fails.
#[instrument(skip(db))]
pub async fn fetch_matching_text(
    db: &DatabaseConnection,
    query: &str,
) -> Result<Vec<CatalogProduct>> {
    let flavor_match = Query::select()
        .column(flavor::Column::ProductId)
        .from(Flavor)
        .and_where(contains_ci(flavor::Column::Name, query))
        .to_owned();

    let condition = Condition::any()
        .add(contains_ci(product::Column::Name, query))
        .add(contains_ci(product::Column::Description, query))
        .add(contains_ci(product::Column::Manufacturer, query))
        .add(contains_ci(product::Column::Category, query))
        .add(product::Column::Id.in_subquery(flavor_match));

    load_with_flavors(
        db,
        Product::find()
            .filter(condition)
            .order_by_asc(product::Column::Id),
    )
    .await
}

/// Products whose trimmed `column` equals `value` case-insensitively,
/// excluding `exclude_id`, in id order. Case folding covers ASCII only.
///
/// # Errors
/// Returns an error if the database query fails.
#[instrument(skip(db))]
pub async fn fetch_related(
    db: &DatabaseConnection,
    column: product::Column,
    value: &str,
    exclude_id: i64,
) -> Result<Vec<CatalogProduct>> {
    let trimmed = Func::cust(Alias::new("trim")).arg(Expr::col(column));
    let same_value = Expr::expr(Func::lower(trimmed)).eq(value.trim().to_lowercase());

    load_with_flavors(
        db,
        Product::find()
            .filter(same_value)
            .filter(product::Column::Id.ne(exclude_id))
            .order_by_asc(product::Column::Id),
    )
    .await
}

/// Products with at least one flavor priced above zero on sale, in id order.
///
/// The flavors are returned unfiltered; narrowing to the sale flavors is the
/// composer's job.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn fetch_on_sale(db: &DatabaseConnection) -> Result<Vec<CatalogProduct>> {
    let on_sale = Query::select()
        .column(flavor::Column::ProductId)
        .from(Flavor)
        .and_where(flavor::Column::SalePrice.gt(0.0))
        .to_owned();

    load_with_flavors(
        db,
        Product::find()
            .filter(product::Column::Id.in_subquery(on_sale))
            .order_by_asc(product::Column::Id),
    )
    .await
}
