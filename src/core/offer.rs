//! Promotional offers.
//!
//! Offers never touch stored listing prices. [`price_with_offers`] applies the
//! best live offer when listings are read.

use crate::{
    core::{notification, profile},
    entities::{Category, ChoiceType, Offer, listing, notification as notification_entity, offer},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Smallest discount an offer may carry, in percent.
pub const MIN_DISCOUNT: f64 = 1.0;
/// Largest discount an offer may carry, in percent.
pub const MAX_DISCOUNT: f64 = 90.0;

/// Offer form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOffer {
    /// Headline
    pub title: String,
    /// Longer text
    pub description: Option<String>,
    /// Banner image URL
    pub image: Option<String>,
    /// Discount in percent, 1 to 90
    pub discount_percentage: f64,
    /// Category scope
    pub category: Option<Category>,
    /// Location scope for the announcement
    pub target_location: Option<String>,
    /// Expiry, must lie in the future
    pub end_date: Option<DateTime<Utc>>,
}

/// A listing together with the price shown to buyers.
#[derive(Debug, Clone, Serialize)]
pub struct PricedListing {
    /// Listing as stored
    pub listing: listing::Model,
    /// Offer that produced `display_price`, if any
    pub applied_offer: Option<i64>,
    /// Final price after the best live offer; `None` for recycle listings
    pub display_price: Option<f64>,
}

fn validate(new: &NewOffer, now: DateTime<Utc>) -> Result<()> {
    if new.title.trim().is_empty() {
        return Err(Error::Validation {
            message: "عنوان العرض مطلوب".to_string(),
        });
    }
    let discount = new.discount_percentage;
    if !discount.is_finite() || !(MIN_DISCOUNT..=MAX_DISCOUNT).contains(&discount) {
        return Err(Error::InvalidAmount { amount: discount });
    }
    if new.end_date.is_some_and(|end| end <= now) {
        return Err(Error::Validation {
            message: "تاريخ انتهاء العرض يجب أن يكون في المستقبل".to_string(),
        });
    }
    Ok(())
}

/// Publishes an offer and announces it to every profile in its target
/// location, or to everyone when it has none.
#[instrument(skip(db, new), fields(title = %new.title))]
pub async fn publish_offer(
    db: &DatabaseConnection,
    moderator_id: &str,
    new: NewOffer,
) -> Result<(offer::Model, Vec<notification_entity::Model>)> {
    let now = Utc::now();
    validate(&new, now)?;
    profile::require_admin(db, moderator_id, "publish offers").await?;

    let target_location = new
        .target_location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    let created = offer::ActiveModel {
        title: Set(new.title.trim().to_string()),
        description: Set(new.description),
        image: Set(new.image),
        discount_percentage: Set(new.discount_percentage),
        category: Set(new.category),
        target_location: Set(target_location),
        end_date: Set(new.end_date),
        is_active: Set(true),
        created_by: Set(moderator_id.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(offer = created.id, moderator = %moderator_id, "Offer published");

    let notifications = match profile::profiles_in(db, created.target_location.as_deref()).await {
        Ok(recipients) => {
            notification::deliver(db, notification::plan_offer_published(&created, &recipients))
                .await
        }
        Err(e) => {
            warn!(offer = created.id, "Could not load offer recipients: {e}");
            Vec::new()
        }
    };
    Ok((created, notifications))
}

/// Offers that are switched on and not expired at `now`.
pub async fn active_offers(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<Vec<offer::Model>> {
    let offers = Offer::find()
        .filter(offer::Column::IsActive.eq(true))
        .order_by_desc(offer::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(offers.into_iter().filter(|o| o.is_live(now)).collect())
}

/// Switches an offer off.
#[instrument(skip(db))]
pub async fn deactivate_offer(db: &DatabaseConnection, moderator_id: &str, offer_id: i64) -> Result<()> {
    profile::require_admin(db, moderator_id, "deactivate offers").await?;
    let result = Offer::update_many()
        .col_expr(offer::Column::IsActive, Expr::value(false))
        .filter(offer::Column::Id.eq(offer_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::OfferNotFound { id: offer_id });
    }
    info!(offer = offer_id, moderator = %moderator_id, "Offer deactivated");
    Ok(())
}

/// The live offer with the largest discount covering the listing's category.
#[must_use]
pub fn best_offer_for<'a>(
    listing: &listing::Model,
    offers: &'a [offer::Model],
    now: DateTime<Utc>,
) -> Option<&'a offer::Model> {
    if listing.choice_type == ChoiceType::Recycle {
        return None;
    }
    offers
        .iter()
        .filter(|o| o.is_live(now) && o.covers(listing.category))
        .max_by(|a, b| a.discount_percentage.total_cmp(&b.discount_percentage))
}

/// The stored price of an approved listing, or its ask before approval.
fn base_price(listing: &listing::Model) -> Option<f64> {
    listing.final_price.or(listing.suggested_price)
}

/// Attaches the display price to each listing.
#[must_use]
pub fn price_with_offers(
    listings: Vec<listing::Model>,
    offers: &[offer::Model],
    now: DateTime<Utc>,
) -> Vec<PricedListing> {
    listings
        .into_iter()
        .map(|listing| {
            let base = base_price(&listing);
            let (applied_offer, display_price) = match (best_offer_for(&listing, offers, now), base) {
                (Some(offer), Some(price)) => (
                    Some(offer.id),
                    Some((price * (1.0 - offer.discount_percentage / 100.0)).round()),
                ),
                _ => (None, base),
            };
            PricedListing {
                listing,
                applied_offer,
                display_price,
            }
        })
        .collect()
}

/// Earliest end date among the offers that produced a display price in
/// `priced`. Cached catalogue pages must not outlive it.
#[must_use]
pub fn earliest_applied_expiry(
    priced: &[PricedListing],
    offers: &[offer::Model],
) -> Option<DateTime<Utc>> {
    offers
        .iter()
        .filter(|o| priced.iter().any(|p| p.applied_offer == Some(o.id)))
        .filter_map(|o| o.end_date)
        .min()
}
