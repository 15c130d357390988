//! Listing submission and queries.
//!
//! Submission validates everything it can before touching the store, fills the
//! seller's blanks from the pricing heuristic and inserts the row as `pending`.
//! Moderation moves are in [`crate::core::lifecycle`].

use crate::{
    core::{
        images::validate_image_count,
        lifecycle::TransitionOutcome,
        notification, pricing,
        pricing::PRICE_CEILING,
        profile,
    },
    entities::{
        Category, ChoiceType, Condition, ImageUrls, Listing, ListingStatus, listing,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument, warn};

/// What the seller wants for the item.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingChoice {
    /// Sell; a missing `suggested_price` is filled by the heuristic.
    Sell {
        /// Price originally paid
        original_price: f64,
        /// Seller's ask
        suggested_price: Option<f64>,
    },
    /// Give away for recycling; a missing idea is filled by the heuristic.
    Recycle {
        /// Seller's recycling idea
        idea: Option<String>,
    },
}

/// Submission form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    /// Short title
    pub title: String,
    /// Free text
    pub description: String,
    /// Category
    pub category: Category,
    /// Declared condition; inferred when `None`
    pub condition: Option<Condition>,
    /// Weight in kilograms
    pub weight: Option<f64>,
    /// Already-uploaded image URLs
    pub images: Vec<String>,
    /// Sell or recycle
    pub choice: ListingChoice,
}

/// Rejects non-positive or non-finite prices and prices above the ceiling.
pub fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    if price > PRICE_CEILING {
        return Err(Error::PriceCeilingExceeded {
            price,
            ceiling: PRICE_CEILING,
        });
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn prepare(seller_id: &str, new: NewListing) -> Result<listing::ActiveModel> {
    let title = new.title.trim().to_string();
    if title.is_empty() {
        return Err(Error::Validation {
            message: "عنوان المنتج مطلوب".to_string(),
        });
    }
    if let Some(weight) = new.weight.filter(|w| !w.is_finite() || *w <= 0.0) {
        return Err(Error::InvalidAmount { amount: weight });
    }
    validate_image_count(new.images.len())?;
    if new.images.iter().any(|url| url.trim().is_empty()) {
        return Err(Error::InvalidImage {
            message: "رابط صورة فارغ".to_string(),
        });
    }

    let description = new.description.trim().to_string();
    let mut model = listing::ActiveModel {
        user_id: Set(seller_id.to_string()),
        category: Set(new.category),
        weight: Set(new.weight),
        images: Set(ImageUrls(new.images)),
        status: Set(ListingStatus::Pending),
        negotiated_price: Set(None),
        final_price: Set(None),
        rejection_reason: Set(None),
        negotiation_note: Set(None),
        seller_rejected_negotiation: Set(false),
        revision: Set(0),
        created_at: Set(chrono::Utc::now()),
        approved_at: Set(None),
        ..Default::default()
    };

    match new.choice {
        ListingChoice::Sell {
            original_price,
            suggested_price,
        } => {
            validate_price(original_price)?;
            let analysis =
                pricing::analyze_product(&title, &description, new.category, original_price);
            let suggested = suggested_price.unwrap_or(analysis.suggested_price);
            validate_price(suggested)?;
            if suggested > original_price {
                return Err(Error::Validation {
                    message: "السعر المقترح لا يمكن أن يتجاوز السعر الأصلي".to_string(),
                });
            }
            model.choice_type = Set(ChoiceType::Sell);
            model.condition = Set(new.condition.unwrap_or(analysis.condition));
            model.original_price = Set(Some(original_price));
            model.suggested_price = Set(Some(suggested));
            model.discount_percentage = Set(Some(pricing::discount_percentage(
                original_price,
                suggested,
            )));
            model.recycle_idea = Set(None);
        }
        ListingChoice::Recycle { idea } => {
            let condition = new.condition.unwrap_or_else(|| {
                pricing::detect_condition(&title, &description, new.category)
            });
            let idea = non_blank(idea)
                .or_else(|| {
                    pricing::recycle_idea(&title, &description, new.category).map(str::to_string)
                })
                .ok_or_else(|| Error::Validation {
                    message: "أضف فكرة لإعادة التدوير".to_string(),
                })?;
            model.choice_type = Set(ChoiceType::Recycle);
            model.condition = Set(condition);
            model.original_price = Set(None);
            model.suggested_price = Set(None);
            model.discount_percentage = Set(None);
            model.recycle_idea = Set(Some(idea));
        }
    }

    model.title = Set(title);
    model.description = Set(description);
    Ok(model)
}

/// Submits a listing for review and notifies every moderator.
///
/// # Errors
/// Returns a validation error (missing title, bad image count, price above the
/// ceiling, ...) before any store call, [`Error::ProfileNotFound`] for an
/// unknown seller, or a database error from the insert.
#[instrument(skip(db, new), fields(title = %new.title))]
pub async fn submit_listing(
    db: &DatabaseConnection,
    seller_id: &str,
    new: NewListing,
) -> Result<TransitionOutcome> {
    let model = prepare(seller_id, new)?;
    profile::require_profile(db, seller_id).await?;

    let created = model.insert(db).await?;
    info!(listing = created.id, seller = %seller_id, "Listing submitted");

    let notifications = match profile::list_admins(db).await {
        Ok(admins) => notification::deliver(db, notification::plan_submitted(&created, &admins)).await,
        Err(e) => {
            warn!("Could not load moderators to notify: {e}");
            Vec::new()
        }
    };

    Ok(TransitionOutcome {
        listing: created,
        notifications,
    })
}

/// Finds a listing by id.
pub async fn get_listing_by_id<C>(db: &C, listing_id: i64) -> Result<Option<listing::Model>>
where
    C: ConnectionTrait,
{
    Listing::find_by_id(listing_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a listing by id, failing when absent.
pub async fn require_listing<C>(db: &C, listing_id: i64) -> Result<listing::Model>
where
    C: ConnectionTrait,
{
    get_listing_by_id(db, listing_id)
        .await?
        .ok_or(Error::ListingNotFound { id: listing_id })
}

/// Listings in `status`, newest first.
pub async fn listings_by_status(
    db: &DatabaseConnection,
    status: ListingStatus,
) -> Result<Vec<listing::Model>> {
    Listing::find()
        .filter(listing::Column::Status.eq(status))
        .order_by_desc(listing::Column::CreatedAt)
        .order_by_desc(listing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A seller's own listings in every status, newest first.
pub async fn listings_for_seller(
    db: &DatabaseConnection,
    seller_id: &str,
) -> Result<Vec<listing::Model>> {
    Listing::find()
        .filter(listing::Column::UserId.eq(seller_id))
        .order_by_desc(listing::Column::CreatedAt)
        .order_by_desc(listing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Published listings, optionally limited to one category, newest approval first.
pub async fn approved_listings(
    db: &DatabaseConnection,
    category: Option<Category>,
) -> Result<Vec<listing::Model>> {
    let mut query = Listing::find().filter(listing::Column::Status.eq(ListingStatus::Approved));
    if let Some(category) = category {
        query = query.filter(listing::Column::Category.eq(category));
    }
    query
        .order_by_desc(listing::Column::ApprovedAt)
        .order_by_desc(listing::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::NotificationType;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_submit_validation_runs_before_store() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let mut form = sell_form("كرسي", Category::Furniture, 600.0);
        let result = submit_listing(&db, "seller", form.clone()).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::PriceCeilingExceeded { price, .. } if price == 600.0
        ));

        form.choice = ListingChoice::Sell {
            original_price: 200.0,
            suggested_price: None,
        };
        form.title = "   ".to_string();
        let result = submit_listing(&db, "seller", form.clone()).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        form.title = "كرسي".to_string();
        form.images = Vec::new();
        let result = submit_listing(&db, "seller", form.clone()).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidImage { .. }));

        form.images = (0..11).map(|i| format!("https://img/{i}.jpg")).collect();
        let result = submit_listing(&db, "seller", form).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidImage { .. }));
    }

    #[tokio::test]
    async fn test_submit_rejects_ask_above_original() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let mut form = sell_form("كرسي", Category::Furniture, 100.0);
        form.choice = ListingChoice::Sell {
            original_price: 100.0,
            suggested_price: Some(150.0),
        };
        let result = submit_listing(&db, "seller", form).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
    }

    #[test]
    fn test_validate_price_bounds() {
        assert!(validate_price(500.0).is_ok());
        assert!(validate_price(0.5).is_ok());
        assert!(matches!(
            validate_price(500.01),
            Err(Error::PriceCeilingExceeded { .. })
        ));
        assert!(matches!(validate_price(0.0), Err(Error::InvalidAmount { .. })));
        assert!(matches!(
            validate_price(f64::NAN),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_fills_heuristic_and_notifies_admins() -> Result<()> {
        let db = setup_test_db().await?;
        let seller = create_test_seller(&db, "seller", "Cairo").await?;
        create_test_admin(&db, "admin1").await?;
        create_test_admin(&db, "admin2").await?;

        let outcome = submit_listing(
            &db,
            &seller.id,
            sell_form("فستان استعمال خفيف", Category::Clothes, 200.0),
        )
        .await?;

        let listing = &outcome.listing;
        assert_eq!(listing.status, ListingStatus::Pending);
        assert_eq!(listing.condition, Condition::VeryGood);
        assert_eq!(listing.suggested_price, Some(78.0));
        assert_eq!(listing.discount_percentage, Some(61));
        assert!(listing.final_price.is_none());
        assert!(listing.recycle_idea.is_none());

        assert_eq!(outcome.notifications_sent(), 2);
        assert!(
            outcome
                .notifications
                .iter()
                .all(|n| n.kind == NotificationType::NewProductSubmitted)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_one_pound_item_without_ask() -> Result<()> {
        let db = setup_test_db().await?;
        let seller = create_test_seller(&db, "seller", "Cairo").await?;

        let listing = submit_listing(
            &db,
            &seller.id,
            sell_form("قميص قديم", Category::Clothes, 1.0),
        )
        .await?
        .listing;
        assert_eq!(listing.status, ListingStatus::Pending);
        assert_eq!(listing.condition, Condition::Acceptable);
        assert_eq!(listing.suggested_price, Some(0.15));
        assert_eq!(listing.discount_percentage, Some(85));
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_keeps_seller_values() -> Result<()> {
        let db = setup_test_db().await?;
        let seller = create_test_seller(&db, "seller", "Cairo").await?;
        let mut form = sell_form("كرسي", Category::Furniture, 300.0);
        form.condition = Some(Condition::Fair);
        form.choice = ListingChoice::Sell {
            original_price: 300.0,
            suggested_price: Some(150.0),
        };

        let listing = submit_listing(&db, &seller.id, form).await?.listing;
        assert_eq!(listing.condition, Condition::Fair);
        assert_eq!(listing.suggested_price, Some(150.0));
        assert_eq!(listing.discount_percentage, Some(50));
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_recycle_uses_suggested_idea() -> Result<()> {
        let db = setup_test_db().await?;
        let seller = create_test_seller(&db, "seller", "Cairo").await?;
        let form = NewListing {
            choice: ListingChoice::Recycle { idea: None },
            ..sell_form("ترابيزة خشب قديمة", Category::Furniture, 1.0)
        };

        let listing = submit_listing(&db, &seller.id, form).await?.listing;
        assert_eq!(listing.choice_type, ChoiceType::Recycle);
        assert!(listing.original_price.is_none());
        assert!(listing.suggested_price.is_none());
        assert_eq!(
            listing.recycle_idea.as_deref(),
            Some("اعمل منه رفوف أو صناديق تخزين خشبية")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_recycle_without_idea_for_clothes_fails() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let form = NewListing {
            choice: ListingChoice::Recycle { idea: None },
            ..sell_form("قميص", Category::Clothes, 1.0)
        };
        let result = submit_listing(&db, "seller", form).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_submit_unknown_seller() -> Result<()> {
        let db = setup_test_db().await?;
        let result = submit_listing(&db, "ghost", sell_form("كرسي", Category::Furniture, 100.0)).await;
        assert!(matches!(result.unwrap_err(), Error::ProfileNotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_queries_by_status_and_seller() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_seller(&db, "a", "Cairo").await?;
        let b = create_test_seller(&db, "b", "Cairo").await?;
        submit_test_listing(&db, &a.id).await?;
        submit_test_listing(&db, &a.id).await?;
        submit_test_listing(&db, &b.id).await?;

        assert_eq!(listings_by_status(&db, ListingStatus::Pending).await?.len(), 3);
        assert_eq!(listings_for_seller(&db, &a.id).await?.len(), 2);
        assert!(approved_listings(&db, None).await?.is_empty());
        assert!(get_listing_by_id(&db, 999).await?.is_none());
        assert!(matches!(
            require_listing(&db, 999).await.unwrap_err(),
            Error::ListingNotFound { id: 999 }
        ));
        Ok(())
    }
}
