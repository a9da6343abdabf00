//! Product cards and detail views.
//!
//! Flattens a [`CatalogProduct`] into what a storefront page needs: the
//! representative flavor's image and prices, sale and "new" badges, and
//! preformatted CAD price strings.

use crate::{
    core::{
        product::CatalogProduct,
        variant::{DisplayPricing, SelectionPolicy, rank_by_popularity, select_top_flavor},
    },
    entities::{flavor, product},
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Image shown when a product has no usable photo.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.png";

/// How long a product keeps its "New" badge.
pub const NEW_BADGE_DAYS: i64 = 7;

/// Most units a shopper can pick for one flavor at a time.
pub const MAX_PURCHASE_QUANTITY: i32 = 5;

/// Formats a price the way the storefront shows it, e.g. `CAD 1,234.50`.
#[must_use]
pub fn format_price(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("CAD {sign}{grouped}.{cents}")
}

/// Whether a product created at `created_at` still counts as new at `now`.
#[must_use]
pub fn is_new(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(created_at) < Duration::days(NEW_BADGE_DAYS)
}

/// Summary card for one product in a listing or carousel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCard {
    /// Product id, used for the detail link
    pub id: i64,
    /// Product name
    pub name: String,
    /// Manufacturer name
    pub manufacturer: String,
    /// Made in Canada
    pub canadian: bool,
    /// Id of the representative flavor, if any
    pub flavor_id: Option<i64>,
    /// Representative flavor's photo, or [`PLACEHOLDER_IMAGE`]
    pub image_url: String,
    /// Prices and sale badge
    pub pricing: DisplayPricing,
    /// Regular price, formatted
    pub price_label: String,
    /// Sale price, formatted, when on sale
    pub sale_price_label: Option<String>,
    /// Created within the last [`NEW_BADGE_DAYS`] days
    pub is_new: bool,
}

impl ProductCard {
    /// Builds the card for `item`, choosing its flavor with `policy`.
    #[must_use]
    pub fn build(item: &CatalogProduct, policy: SelectionPolicy, now: DateTime<Utc>) -> Self {
        let top = select_top_flavor(&item.flavors, policy);
        let pricing = DisplayPricing::for_selection(top);

        let image_url = top
            .filter(|f| f.has_product_image())
            .map_or_else(|| PLACEHOLDER_IMAGE.to_string(), |f| f.image_url_product.clone());

        Self {
            id: item.product.id,
            name: item.product.name.clone(),
            manufacturer: item.product.manufacturer.clone(),
            canadian: item.product.canadian,
            flavor_id: top.map(|f| f.id),
            image_url,
            pricing,
            price_label: format_price(pricing.price),
            sale_price_label: pricing
                .has_sale
                .then(|| format_price(pricing.effective_price)),
            is_new: is_new(item.product.created_at, now),
        }
    }

    /// Cards for a whole listing.
    #[must_use]
    pub fn build_all(
        items: &[CatalogProduct],
        policy: SelectionPolicy,
        now: DateTime<Utc>,
    ) -> Vec<Self> {
        items
            .iter()
            .map(|item| Self::build(item, policy, now))
            .collect()
    }
}

/// One selectable flavor on the product detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlavorOption {
    /// The flavor row
    #[serde(flatten)]
    pub flavor: flavor::Model,
    /// Prices and sale badge
    pub pricing: DisplayPricing,
    /// Most units that can be picked, never more than in stock
    pub purchase_limit: i32,
}

impl FlavorOption {
    fn new(flavor: flavor::Model) -> Self {
        let pricing = DisplayPricing::for_flavor(&flavor);
        let purchase_limit = flavor.units_available.clamp(0, MAX_PURCHASE_QUANTITY);
        Self {
            flavor,
            pricing,
            purchase_limit,
        }
    }
}

/// Full product page: the product and its flavors, most popular first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    /// The product row
    pub product: product::Model,
    /// Flavors ranked by popularity; the first one is preselected
    pub flavors: Vec<FlavorOption>,
    /// Created within the last [`NEW_BADGE_DAYS`] days
    pub is_new: bool,
}

impl ProductDetail {
    /// Builds the detail view for `item`.
    #[must_use]
    pub fn build(item: &CatalogProduct, now: DateTime<Utc>) -> Self {
        Self {
            product: item.product.clone(),
            flavors: rank_by_popularity(&item.flavors)
                .into_iter()
                .map(FlavorOption::new)
                .collect(),
            is_new: is_new(item.product.created_at, now),
        }
    }
}
