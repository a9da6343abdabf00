//! Variant selection and display pricing.
//!
//! A product can be sold in many flavors, but a listing card shows exactly one.
//! This module picks that representative flavor under a [`SelectionPolicy`] and
//! derives the price, sale flag and discount shown next to it. Everything here
//! is a pure function over borrowed slices: inputs are never sorted or mutated
//! in place, so the same flavor list can back several views of one request.

use crate::entities::flavor;
use serde::Serialize;
use std::cmp::Ordering;

/// How the representative flavor of a product is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Highest popularity, earliest flavor on ties.
    MostPopular,
    /// Like [`SelectionPolicy::MostPopular`], restricted to flavors with a
    /// product photo. Falls back to the full list when no flavor has one.
    MostPopularWithImage,
    /// Highest sale price among flavors on sale. Falls back to
    /// [`SelectionPolicy::MostPopular`] when nothing is on sale.
    HighestSalePrice,
}

/// Orders two popularity ranks. An unranked flavor orders like a rank of 0,
/// so it ties with `Some(0)` and the earlier one wins.
pub(crate) fn compare_popularity(a: Option<i64>, b: Option<i64>) -> Ordering {
    a.unwrap_or(0).cmp(&b.unwrap_or(0))
}

/// Returns the first element with the maximal key.
///
/// `Iterator::max_by` keeps the *last* maximum, which would break the
/// "earliest wins" tie rule, so this folds manually.
fn first_max_by<'a, I, F>(candidates: I, mut compare: F) -> Option<&'a flavor::Model>
where
    I: IntoIterator<Item = &'a flavor::Model>,
    F: FnMut(&flavor::Model, &flavor::Model) -> Ordering,
{
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if compare(candidate, current) != Ordering::Greater => Some(current),
        _ => Some(candidate),
    })
}

fn most_popular<'a, I>(candidates: I) -> Option<&'a flavor::Model>
where
    I: IntoIterator<Item = &'a flavor::Model>,
{
    first_max_by(candidates, |a, b| compare_popularity(a.popularity, b.popularity))
}

/// Picks the flavor that represents a product under `policy`.
///
/// Returns `None` only when `flavors` is empty; callers render a placeholder
/// image and a zero price in that case.
#[must_use]
pub fn select_top_flavor(
    flavors: &[flavor::Model],
    policy: SelectionPolicy,
) -> Option<&flavor::Model> {
    match policy {
        SelectionPolicy::MostPopular => most_popular(flavors),
        SelectionPolicy::MostPopularWithImage => {
            most_popular(flavors.iter().filter(|f| f.has_product_image()))
                .or_else(|| most_popular(flavors))
        }
        SelectionPolicy::HighestSalePrice => first_max_by(
            flavors.iter().filter(|f| f.active_sale_price().is_some()),
            |a, b| {
                let a = a.active_sale_price().unwrap_or_default();
                let b = b.active_sale_price().unwrap_or_default();
                a.total_cmp(&b)
            },
        )
        .or_else(|| most_popular(flavors)),
    }
}

/// Returns a copy of `flavors` ordered by popularity, most popular first.
///
/// The sort is stable, so flavors with equal rank keep their relative order.
#[must_use]
pub fn rank_by_popularity(flavors: &[flavor::Model]) -> Vec<flavor::Model> {
    let mut ranked = flavors.to_vec();
    ranked.sort_by(|a, b| compare_popularity(b.popularity, a.popularity));
    ranked
}

/// Price information derived from a single flavor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayPricing {
    /// Regular price
    pub price: f64,
    /// Price actually charged: the sale price when on sale, otherwise `price`
    pub effective_price: f64,
    /// Whether a sale badge should be shown
    pub has_sale: bool,
    /// Rounded discount percentage, 0 when not on sale
    pub discount_percent: u8,
    /// The record had a sale price at or above its regular price
    pub malformed: bool,
}

impl DisplayPricing {
    /// Pricing for a listing that has no representative flavor.
    pub const EMPTY: Self = Self {
        price: 0.0,
        effective_price: 0.0,
        has_sale: false,
        discount_percent: 0,
        malformed: false,
    };

    /// Derives display pricing for `flavor`.
    ///
    /// A zero price never shows a sale. A sale price that is not below the
    /// regular price is reported as malformed and shown without a discount.
    #[must_use]
    pub fn for_flavor(flavor: &flavor::Model) -> Self {
        let price = flavor.price;
        let Some(sale) = flavor.active_sale_price() else {
            return Self {
                price,
                effective_price: price,
                ..Self::EMPTY
            };
        };

        if price <= 0.0 {
            return Self {
                price,
                effective_price: price,
                ..Self::EMPTY
            };
        }

        if sale >= price {
            tracing::warn!(
                flavor_id = flavor.id,
                product_id = flavor.product_id,
                price,
                sale_price = sale,
                "sale price is not below regular price; ignoring sale"
            );
            return Self {
                price,
                effective_price: price,
                malformed: true,
                ..Self::EMPTY
            };
        }

        Self {
            price,
            effective_price: sale,
            has_sale: true,
            discount_percent: discount_percent(price, sale),
            malformed: false,
        }
    }

    /// Pricing for an optional representative flavor.
    #[must_use]
    pub fn for_selection(flavor: Option<&flavor::Model>) -> Self {
        flavor.map_or(Self::EMPTY, Self::for_flavor)
    }
}

/// `round((price - sale) / price * 100)`, kept inside `1..=99`.
///
/// Callers guarantee `0 < sale < price`; the clamp only matters when the
/// discount rounds to 0 or 100.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn discount_percent(price: f64, sale: f64) -> u8 {
    let percent = ((price - sale) / price * 100.0).round();
    percent.clamp(1.0, 99.0) as u8
}
