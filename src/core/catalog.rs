//! Catalog query composition.
//!
//! Turns a [`CatalogContext`] into the ordered list of products a catalog view
//! shows. [`compose`] asks storage for a narrowed candidate set and then runs
//! [`shape`], the pure half that filters, sorts and deduplicates an in-memory
//! snapshot. `shape` applies the full context rules on its own, so it gives
//! the same answer for a prefiltered candidate set and for the whole catalog.
//!
//! `SQLite` folds case for ASCII letters only, so a query or reference value
//! with non-ASCII text skips the storage filter and loads the whole catalog.
//!
//! Every sort here is stable: products with equal keys keep the order storage
//! returned them in (product id ascending).

use crate::{
    core::{
        product::{self as storage, CatalogProduct},
        variant::SelectionPolicy,
    },
    entities::product,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use std::{cmp::Reverse, collections::HashSet};
use tracing::{debug, instrument};

/// Number of products shown in a carousel strip.
pub const CAROUSEL_SIZE: usize = 4;

/// The catalog view being requested.
///
/// Virtual categories are explicit variants chosen by the router, so a literal
/// search for "sale" is a [`CatalogContext::FreeText`] like any other query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogContext {
    /// Free-text search; an empty query lists the whole catalog.
    FreeText(String),
    /// Everything, most popular first.
    BestSellers,
    /// Products with at least one discounted flavor, narrowed to those flavors.
    Sale,
    /// Other products in the same category as the reference product.
    SimilarTo(product::Model),
    /// Other products from the same manufacturer as the reference product.
    ByManufacturer(product::Model),
}

impl CatalogContext {
    /// Policy used to pick each product's card flavor in this view.
    #[must_use]
    pub const fn selection_policy(&self) -> SelectionPolicy {
        match self {
            Self::Sale => SelectionPolicy::HighestSalePrice,
            _ => SelectionPolicy::MostPopular,
        }
    }

    /// Policy used for carousel strips, which prefer flavors with a photo.
    #[must_use]
    pub const fn carousel_policy(&self) -> SelectionPolicy {
        match self.selection_policy() {
            SelectionPolicy::MostPopular => SelectionPolicy::MostPopularWithImage,
            other => other,
        }
    }

    /// Heading shown above the view.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::FreeText(query) => query.trim().to_string(),
            Self::BestSellers => "Best Sellers".to_string(),
            Self::Sale => "Sale".to_string(),
            Self::SimilarTo(_) => "Similar Products".to_string(),
            Self::ByManufacturer(reference) => reference.manufacturer.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        let (reference, field, value) = match self {
            Self::SimilarTo(reference) => (reference, "category", &reference.category),
            Self::ByManufacturer(reference) => {
                (reference, "manufacturer", &reference.manufacturer)
            }
            _ => return Ok(()),
        };

        if reference.id <= 0 {
            return Err(Error::InvalidReferenceProduct {
                reason: format!("product id {} has not been stored", reference.id),
            });
        }
        if value.trim().is_empty() {
            return Err(Error::InvalidReferenceProduct {
                reason: format!("product {} has no {field}", reference.id),
            });
        }
        Ok(())
    }
}

/// Fetches and shapes the products for `context`.
///
/// # Errors
/// Returns [`Error::InvalidReferenceProduct`] when a relation context is built
/// from an unusable reference, or a database error from storage.
#[instrument(skip(db))]
pub async fn compose(
    db: &DatabaseConnection,
    context: &CatalogContext,
) -> Result<Vec<CatalogProduct>> {
    context.validate()?;

    let candidates = match context {
        CatalogContext::FreeText(query) => {
            let query = query.trim();
            if query.is_empty() || !query.is_ascii() {
                storage::fetch_all_with_flavors(db).await?
            } else {
                storage::fetch_matching_text(db, query).await?
            }
        }
        CatalogContext::BestSellers => storage::fetch_all_with_flavors(db).await?,
        CatalogContext::Sale => storage::fetch_on_sale(db).await?,
        CatalogContext::SimilarTo(reference) => {
            related_candidates(db, product::Column::Category, &reference.category, reference.id)
                .await?
        }
        CatalogContext::ByManufacturer(reference) => {
            related_candidates(
                db,
                product::Column::Manufacturer,
                &reference.manufacturer,
                reference.id,
            )
            .await?
        }
    };

    debug!(candidates = candidates.len(), "fetched catalog candidates");
    shape(candidates, context)
}

async fn related_candidates(
    db: &DatabaseConnection,
    column: product::Column,
    value: &str,
    exclude_id: i64,
) -> Result<Vec<CatalogProduct>> {
    if value.trim().is_ascii() {
        storage::fetch_related(db, column, value, exclude_id).await
    } else {
        storage::fetch_all_with_flavors(db).await
    }
}

/// Like [`compose`], keeping only the first [`CAROUSEL_SIZE`] products.
///
/// # Errors
/// Same as [`compose`].
pub async fn carousel(
    db: &DatabaseConnection,
    context: &CatalogContext,
) -> Result<Vec<CatalogProduct>> {
    let mut products = compose(db, context).await?;
    products.truncate(CAROUSEL_SIZE);
    Ok(products)
}

/// Applies the rules of `context` to an in-memory snapshot.
///
/// # Errors
/// Returns [`Error::InvalidReferenceProduct`] for an unusable reference product.
pub fn shape(
    candidates: Vec<CatalogProduct>,
    context: &CatalogContext,
) -> Result<Vec<CatalogProduct>> {
    context.validate()?;

    let shaped = match context {
        CatalogContext::FreeText(query) => {
            let needle = query.trim().to_lowercase();
            let matching = candidates
                .into_iter()
                .filter(|p| needle.is_empty() || matches_text(p, &needle))
                .collect();
            newest_distinct_by_name(matching)
        }
        CatalogContext::BestSellers => by_popularity(candidates),
        CatalogContext::Sale => by_sale_price(narrow_to_sale(candidates)),
        CatalogContext::SimilarTo(reference) => by_popularity(related(
            candidates,
            reference,
            |p| &p.category,
        )),
        CatalogContext::ByManufacturer(reference) => by_popularity(related(
            candidates,
            reference,
            |p| &p.manufacturer,
        )),
    };
    Ok(shaped)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// `needle` must already be lowercase.
fn matches_text(candidate: &CatalogProduct, needle: &str) -> bool {
    let product = &candidate.product;
    contains_ci(&product.name, needle)
        || product
            .description
            .as_deref()
            .is_some_and(|d| contains_ci(d, needle))
        || contains_ci(&product.manufacturer, needle)
        || contains_ci(&product.category, needle)
        || candidate.flavors.iter().any(|f| contains_ci(&f.name, needle))
}

/// Newest first, keeping only the newest product of each name.
fn newest_distinct_by_name(mut products: Vec<CatalogProduct>) -> Vec<CatalogProduct> {
    products.sort_by(|a, b| b.product.created_at.cmp(&a.product.created_at));
    let mut seen = HashSet::new();
    products.retain(|p| seen.insert(p.product.name.clone()));
    products
}

fn by_popularity(mut products: Vec<CatalogProduct>) -> Vec<CatalogProduct> {
    products.sort_by_key(|p| Reverse(p.max_popularity()));
    products
}

/// Drops flavors that are not on sale, then products left without flavors.
fn narrow_to_sale(products: Vec<CatalogProduct>) -> Vec<CatalogProduct> {
    products
        .into_iter()
        .filter_map(|mut p| {
            p.flavors.retain(|f| f.active_sale_price().is_some());
            (!p.flavors.is_empty()).then_some(p)
        })
        .collect()
}

fn by_sale_price(products: Vec<CatalogProduct>) -> Vec<CatalogProduct> {
    let mut keyed: Vec<(f64, CatalogProduct)> = products
        .into_iter()
        .map(|p| (p.max_sale_price().unwrap_or_default(), p))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| b.total_cmp(a));
    keyed.into_iter().map(|(_, p)| p).collect()
}

fn related<F>(
    products: Vec<CatalogProduct>,
    reference: &product::Model,
    field: F,
) -> Vec<CatalogProduct>
where
    F: Fn(&product::Model) -> &String,
{
    let wanted = field(reference).trim().to_lowercase();
    products
        .into_iter()
        .filter(|p| p.product.id != reference.id)
        .filter(|p| field(&p.product).trim().to_lowercase() == wanted)
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{
            product::{create_product, delete_product},
            variant::{DisplayPricing, select_top_flavor},
        },
        entities::flavor,
        test_utils::*,
    };
    use chrono::{Duration, Utc};

    fn names(products: &[CatalogProduct]) -> Vec<&str> {
        products.iter().map(|p| p.product.name.as_str()).collect()
    }

    fn with_popularity(id: i64, name: &str, popularity: &[Option<i64>]) -> CatalogProduct {
        let flavors = popularity
            .iter()
            .enumerate()
            .map(|(i, pop)| flavor::Model {
                product_id: id,
                popularity: *pop,
                ..flavor_fixture(id * 100 + i64::try_from(i).unwrap(), "Flavor")
            })
            .collect();
        CatalogProduct {
            product: product_fixture(id, name),
            flavors,
        }
    }

    #[test]
    fn test_best_sellers_sorted_by_max_popularity_stably() {
        let snapshot = vec![
            with_popularity(1, "Low", &[Some(1), Some(2)]),
            with_popularity(2, "High", &[Some(3), Some(9)]),
            with_popularity(3, "Empty", &[]),
            with_popularity(4, "Also High", &[Some(9)]),
            with_popularity(5, "Zero", &[Some(0)]),
        ];

        let shaped = shape(snapshot, &CatalogContext::BestSellers).unwrap();
        assert_eq!(names(&shaped), vec!["High", "Also High", "Low", "Empty", "Zero"]);
        assert_eq!(shaped[2].flavors.len(), 2);
    }

    #[test]
    fn test_sale_narrows_flavors_and_sorts_by_sale_price() {
        let sale_flavor = |id, product_id, price, sale| flavor::Model {
            product_id,
            price,
            sale_price: sale,
            ..flavor_fixture(id, "Flavor")
        };
        let snapshot = vec![
            CatalogProduct {
                product: product_fixture(1, "Cheap Sale"),
                flavors: vec![
                    sale_flavor(10, 1, 100.0, Some(0.0)),
                    sale_flavor(11, 1, 80.0, Some(60.0)),
                ],
            },
            CatalogProduct {
                product: product_fixture(2, "No Sale"),
                flavors: vec![sale_flavor(20, 2, 30.0, None)],
            },
            CatalogProduct {
                product: product_fixture(3, "Big Sale"),
                flavors: vec![sale_flavor(30, 3, 120.0, Some(90.0))],
            },
        ];

        let shaped = shape(snapshot, &CatalogContext::Sale).unwrap();
        assert_eq!(names(&shaped), vec!["Big Sale", "Cheap Sale"]);

        let cheap = &shaped[1];
        assert_eq!(cheap.flavors.len(), 1);
        assert_eq!(cheap.flavors[0].id, 11);

        let top = select_top_flavor(&cheap.flavors, CatalogContext::Sale.selection_policy());
        let pricing = DisplayPricing::for_selection(top);
        assert_eq!(pricing.discount_percent, 25);
    }

    #[test]
    fn test_free_text_sorts_newest_first_and_dedupes_names() {
        let now = Utc::now();
        let aged = |id, name, days| {
            let mut product = CatalogProduct {
                product: product_fixture(id, name),
                flavors: vec![],
            };
            product.product.created_at = now - Duration::days(days);
            product
        };
        let snapshot = vec![
            aged(1, "Whey", 10),
            aged(2, "Creatine", 1),
            aged(3, "Whey", 2),
            aged(4, "BCAA", 5),
        ];

        let shaped = shape(snapshot, &CatalogContext::FreeText(String::new())).unwrap();
        assert_eq!(names(&shaped), vec!["Creatine", "Whey", "BCAA"]);
        assert_eq!(shaped[1].product.id, 3);
    }

    #[test]
    fn test_free_text_matches_flavor_names() {
        let mut protein = with_popularity(1, "Gold Standard", &[Some(1)]);
        protein.flavors[0].name = "Whey Isolate Chocolate".to_string();
        let creatine = with_popularity(2, "Creatine", &[Some(1)]);

        let shaped = shape(
            vec![protein, creatine],
            &CatalogContext::FreeText("WHEY".to_string()),
        )
        .unwrap();
        assert_eq!(names(&shaped), vec!["Gold Standard"]);
    }

    #[test]
    fn test_related_contexts_exclude_reference() {
        let mut reference = product_fixture(1, "Reference");
        reference.category = "Protein".to_string();
        reference.manufacturer = "Dymatize".to_string();

        let mut same_category = with_popularity(2, "Same Category", &[Some(1)]);
        same_category.product.category = "protein ".to_string();
        let mut same_brand = with_popularity(3, "Same Brand", &[Some(5)]);
        same_brand.product.manufacturer = "DYMATIZE".to_string();
        same_brand.product.category = "Creatine".to_string();
        let mut itself = with_popularity(1, "Reference", &[Some(100)]);
        itself.product = reference.clone();

        let snapshot = vec![itself, same_category, same_brand];

        let similar = shape(
            snapshot.clone(),
            &CatalogContext::SimilarTo(reference.clone()),
        )
        .unwrap();
        assert_eq!(names(&similar), vec!["Same Category"]);

        let by_brand = shape(snapshot, &CatalogContext::ByManufacturer(reference)).unwrap();
        assert_eq!(names(&by_brand), vec!["Same Brand"]);
    }

    #[test]
    fn test_invalid_reference_product() {
        let mut unsaved = product_fixture(0, "Unsaved");
        unsaved.category = "Protein".to_string();
        let result = shape(vec![], &CatalogContext::SimilarTo(unsaved));
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidReferenceProduct { .. }
        ));

        let mut no_brand = product_fixture(7, "No Brand");
        no_brand.manufacturer = "  ".to_string();
        let result = shape(vec![], &CatalogContext::ByManufacturer(no_brand));
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidReferenceProduct { .. }
        ));
    }

    #[test]
    fn test_context_titles_and_policies() {
        let reference = product_fixture(1, "Ref");
        assert_eq!(CatalogContext::BestSellers.title(), "Best Sellers");
        assert_eq!(
            CatalogContext::ByManufacturer(reference.clone()).title(),
            reference.manufacturer
        );
        assert_eq!(
            CatalogContext::Sale.selection_policy(),
            SelectionPolicy::HighestSalePrice
        );
        assert_eq!(
            CatalogContext::FreeText("sale".to_string()).selection_policy(),
            SelectionPolicy::MostPopular
        );
        assert_eq!(
            CatalogContext::BestSellers.carousel_policy(),
            SelectionPolicy::MostPopularWithImage
        );
        assert_eq!(
            CatalogContext::Sale.carousel_policy(),
            SelectionPolicy::HighestSalePrice
        );
    }

    #[tokio::test]
    async fn test_empty_query_returns_all_newest_first() -> Result<()> {
        let db = setup_test_db().await?;
        let mut ids = Vec::new();
        for i in 0..10 {
            let created = create_test_product(&db, &format!("Product {i}"), 1).await?;
            backdate_product(&db, created.product.id, i64::from(10 - i)).await?;
            ids.push(created.product.id);
        }

        let products = compose(&db, &CatalogContext::FreeText(String::new())).await?;
        assert_eq!(products.len(), 10);
        let returned: Vec<i64> = products.iter().map(|p| p.product.id).collect();
        ids.reverse();
        assert_eq!(returned, ids);
        assert!(products.iter().all(|p| p.flavors.len() == 1));
        Ok(())
    }

    #[tokio::test]
    async fn test_literal_sale_search_is_not_the_sale_category() -> Result<()> {
        let db = setup_test_db().await?;
        create_product(
            &db,
            new_product(
                "Discounted Whey",
                "Brand",
                "Protein",
                vec![new_flavor("Vanilla", 50.0, Some(40.0), None)],
            ),
        )
        .await?;
        create_product(
            &db,
            new_product(
                "Garage Sale Creatine",
                "Brand",
                "Creatine",
                vec![new_flavor("Plain", 20.0, None, None)],
            ),
        )
        .await?;

        let searched = compose(&db, &CatalogContext::FreeText("sale".to_string())).await?;
        assert_eq!(names(&searched), vec!["Garage Sale Creatine"]);

        let on_sale = compose(&db, &CatalogContext::Sale).await?;
        assert_eq!(names(&on_sale), vec!["Discounted Whey"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_whey_matches_flavor_name_only() -> Result<()> {
        let db = setup_test_db().await?;
        create_product(
            &db,
            new_product(
                "Gold Standard",
                "Optimum Nutrition",
                "Protein",
                vec![new_flavor("Whey Isolate Chocolate", 80.0, None, Some(3))],
            ),
        )
        .await?;
        create_test_product(&db, "Creatine", 2).await?;

        let found = compose(&db, &CatalogContext::FreeText("whey".to_string())).await?;
        assert_eq!(names(&found), vec!["Gold Standard"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_compose_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        for (name, popularity) in [("A", 3), ("B", 7), ("C", 3), ("D", 7)] {
            create_product(
                &db,
                new_product(
                    name,
                    "Brand",
                    "Protein",
                    vec![new_flavor("Plain", 10.0, Some(5.0), Some(popularity))],
                ),
            )
            .await?;
        }

        for context in [
            CatalogContext::BestSellers,
            CatalogContext::Sale,
            CatalogContext::FreeText("plain".to_string()),
        ] {
            let first = compose(&db, &context).await?;
            let second = compose(&db, &context).await?;
            assert_eq!(first, second);
        }

        let best = compose(&db, &CatalogContext::BestSellers).await?;
        assert_eq!(names(&best), vec!["B", "D", "A", "C"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_similar_and_manufacturer_carousels() -> Result<()> {
        let db = setup_test_db().await?;
        let reference = create_product(
            &db,
            new_product("Reference", "Dymatize", "Protein", vec![]),
        )
        .await?;
        for i in 0..6 {
            create_product(
                &db,
                new_product(
                    &format!("Protein {i}"),
                    "Other",
                    "protein",
                    vec![new_flavor("Plain", 10.0, None, Some(i))],
                ),
            )
            .await?;
        }
        create_product(&db, new_product("Creatine", "DYMATIZE", "Creatine", vec![])).await?;

        let similar = carousel(&db, &CatalogContext::SimilarTo(reference.product.clone())).await?;
        assert_eq!(similar.len(), CAROUSEL_SIZE);
        assert_eq!(
            names(&similar),
            vec!["Protein 5", "Protein 4", "Protein 3", "Protein 2"]
        );

        let by_brand = compose(&db, &CatalogContext::ByManufacturer(reference.product)).await?;
        assert_eq!(names(&by_brand), vec!["Creatine"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_accented_text_folds_case() -> Result<()> {
        let db = setup_test_db().await?;
        let pure = create_product(
            &db,
            new_product(
                "CRÉATINE PURE",
                "ÉLITE LABS",
                "CRÉATINE",
                vec![new_flavor("Nature", 30.0, None, Some(2))],
            ),
        )
        .await?;
        backdate_product(&db, pure.product.id, 1).await?;
        create_test_product(&db, "Creatine Plain", 1).await?;
        let reference = create_product(
            &db,
            new_product(
                "Créatine Citron",
                "élite labs",
                "créatine",
                vec![new_flavor("Citron", 30.0, None, Some(1))],
            ),
        )
        .await?;

        for query in ["créatine pure", "CRÉATINE PURE", "Créatine Pure"] {
            let found = compose(&db, &CatalogContext::FreeText(query.to_string())).await?;
            assert_eq!(names(&found), vec!["CRÉATINE PURE"], "{query}");
        }

        let accented = compose(&db, &CatalogContext::FreeText("élite".to_string())).await?;
        assert_eq!(names(&accented), vec!["Créatine Citron", "CRÉATINE PURE"]);

        let similar = compose(&db, &CatalogContext::SimilarTo(reference.product.clone())).await?;
        assert_eq!(names(&similar), vec!["CRÉATINE PURE"]);

        let by_brand = compose(&db, &CatalogContext::ByManufacturer(reference.product)).await?;
        assert_eq!(names(&by_brand), vec!["CRÉATINE PURE"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_compose_agrees_with_shape_over_whole_catalog() -> Result<()> {
        let db = setup_test_db().await?;
        for (name, manufacturer, category) in [
            ("PROTÉINE DE LACTOSÉRUM", "Kaizen", "PROTÉINE"),
            ("Whey Isolate", "Kaizen", "Protein"),
            ("Beurre d'arachide", "Noix", "Collation"),
        ] {
            create_product(
                &db,
                new_product(
                    name,
                    manufacturer,
                    category,
                    vec![new_flavor("Nature", 10.0, None, None)],
                ),
            )
            .await?;
        }
        let reference = create_product(
            &db,
            new_product("Protéine Végé", "Vega", "protéine", vec![]),
        )
        .await?;

        for context in [
            CatalogContext::FreeText("protéine".to_string()),
            CatalogContext::FreeText("lactosérum".to_string()),
            CatalogContext::FreeText("kaizen".to_string()),
            CatalogContext::SimilarTo(reference.product.clone()),
        ] {
            let composed = compose(&db, &context).await?;
            let shaped = shape(
                crate::core::product::fetch_all_with_flavors(&db).await?,
                &context,
            )?;
            assert_eq!(composed, shaped, "{context:?}");
            assert!(!composed.is_empty(), "{context:?}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_related_ignores_surrounding_whitespace() -> Result<()> {
        use sea_orm::{ActiveModelTrait, Set};

        let db = setup_test_db().await?;
        let reference = create_test_product(&db, "Reference", 1).await?;
        let now = Utc::now();
        product::ActiveModel {
            manufacturer: Set(" Test Brand ".to_string()),
            name: Set("Padded".to_string()),
            category: Set("protein  ".to_string()),
            description: Set(None),
            canadian: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let similar = compose(&db, &CatalogContext::SimilarTo(reference.product.clone())).await?;
        assert_eq!(names(&similar), vec!["Padded"]);

        let by_brand = compose(&db, &CatalogContext::ByManufacturer(reference.product)).await?;
        assert_eq!(names(&by_brand), vec!["Padded"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_products_leave_catalog() -> Result<()> {
        let db = setup_test_db().await?;
        let gone = create_test_product(&db, "Gone", 2).await?;
        create_test_product(&db, "Stays", 2).await?;
        delete_product(&db, gone.product.id).await?;

        let all = compose(&db, &CatalogContext::BestSellers).await?;
        assert_eq!(names(&all), vec!["Stays"]);
        Ok(())
    }
}
