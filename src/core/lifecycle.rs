//! Listing lifecycle - the moderation state machine and the seller/moderator
//! price negotiation.
//!
//! ```text
//!            approve(price)            reject(reason)
//!  approved <-------------- pending --------------> rejected
//!                           |   ^
//!       negotiate(price)    |   |  seller accepts / declines
//!                           v   |
//!                      awaiting_seller
//! ```
//!
//! Every move is a single conditional update guarded by the status and the
//! revision observed when the row was read. If another actor moved the listing first the update
//! changes nothing and the caller gets [`Error::StaleState`]. Notifications are
//! sent after the update succeeds and never undo it.
//!
//! A moderator may delete a listing from any state.

use crate::{
    core::{listing::require_listing, listing::validate_price, notification, profile},
    entities::{
        ChoiceType, Listing, ListingStatus, listing, listing::SELLER_ACCEPTED_NOTE,
        listing::SELLER_REJECTED_NOTE, notification as notification_entity,
    },
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// A move in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingAction {
    /// Moderator publishes the listing at a price
    Approve,
    /// Moderator refuses the listing
    Reject,
    /// Moderator proposes a different price
    Negotiate,
    /// Seller takes the proposed price
    SellerAccept,
    /// Seller turns the proposed price down
    SellerReject,
}

impl ListingAction {
    /// Verb used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Negotiate => "negotiate",
            Self::SellerAccept => "accept the counter-offer on",
            Self::SellerReject => "decline the counter-offer on",
        }
    }
}

/// The transition table. Anything not listed is refused.
pub fn next_status(current: ListingStatus, action: ListingAction) -> Result<ListingStatus> {
    use ListingAction as A;
    use ListingStatus as S;

    match (current, action) {
        (S::Pending, A::Approve) => Ok(S::Approved),
        (S::Pending, A::Reject) => Ok(S::Rejected),
        (S::Pending, A::Negotiate) => Ok(S::AwaitingSeller),
        (S::AwaitingSeller, A::SellerAccept | A::SellerReject) => Ok(S::Pending),
        (S::Approved | S::Rejected, _)
        | (S::Pending, A::SellerAccept | A::SellerReject)
        | (S::AwaitingSeller, A::Approve | A::Reject | A::Negotiate) => {
            Err(Error::InvalidTransition {
                from: current.to_string(),
                action: action.as_str().to_string(),
            })
        }
    }
}

/// Where a listing stands in the negotiation, folding the status together
/// with the seller-response flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStage {
    /// Fresh submission waiting for a moderator
    AwaitingReview,
    /// Moderator proposed a price, seller has not answered
    CounterOffered,
    /// Seller took the proposed price, moderator sign-off pending
    SellerAccepted,
    /// Seller turned a proposed price down, new negotiation needed
    SellerDeclined,
    /// Published
    Approved,
    /// Refused
    Rejected,
}

/// Derives the negotiation stage of a listing.
#[must_use]
pub fn stage(listing: &listing::Model) -> NegotiationStage {
    match listing.status {
        ListingStatus::Approved => NegotiationStage::Approved,
        ListingStatus::Rejected => NegotiationStage::Rejected,
        ListingStatus::AwaitingSeller => NegotiationStage::CounterOffered,
        ListingStatus::Pending
            if listing.final_price.is_some()
                && listing.negotiation_note.as_deref() == Some(SELLER_ACCEPTED_NOTE) =>
        {
            NegotiationStage::SellerAccepted
        }
        ListingStatus::Pending if listing.seller_rejected_negotiation => {
            NegotiationStage::SellerDeclined
        }
        ListingStatus::Pending => NegotiationStage::AwaitingReview,
    }
}

/// The listing after a move plus the notifications that were written.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// Listing as stored after the move
    pub listing: listing::Model,
    /// Notification rows delivered
    pub notifications: Vec<notification_entity::Model>,
}

impl TransitionOutcome {
    /// Number of notifications delivered.
    #[must_use]
    pub fn notifications_sent(&self) -> usize {
        self.notifications.len()
    }
}

/// A removed listing.
#[derive(Debug, Clone)]
pub struct DeletedListing {
    /// The row as it was before removal
    pub listing: listing::Model,
    /// Notifications removed with it
    pub notifications_removed: u64,
}

/// Writes `changes` only if the row is still the one observed in `current`:
/// same status and same revision. The revision is bumped with the write.
async fn compare_and_set<C>(
    db: &C,
    current: &listing::Model,
    mut changes: listing::ActiveModel,
) -> Result<listing::Model>
where
    C: ConnectionTrait,
{
    changes.revision = Set(current.revision + 1);
    let result = Listing::update_many()
        .set(changes)
        .filter(listing::Column::Id.eq(current.id))
        .filter(listing::Column::Status.eq(current.status))
        .filter(listing::Column::Revision.eq(current.revision))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let actual = require_listing(db, current.id).await?;
        warn!(
            listing = current.id,
            expected = %current.status,
            actual = %actual.status,
            expected_revision = current.revision,
            actual_revision = actual.revision,
            "Listing changed concurrently"
        );
        return Err(Error::StaleState {
            id: current.id,
            expected: current.status.to_string(),
            actual: actual.status.to_string(),
        });
    }

    require_listing(db, current.id).await
}

fn require_seller(listing: &listing::Model, seller_id: &str, action: ListingAction) -> Result<()> {
    if listing.user_id == seller_id {
        Ok(())
    } else {
        Err(Error::Unauthorized {
            user_id: seller_id.to_string(),
            action: format!("{} listing {}", action.as_str(), listing.id),
        })
    }
}

async fn notify_admins<F>(db: &DatabaseConnection, plan: F) -> Vec<notification_entity::Model>
where
    F: FnOnce(&[crate::entities::ProfileModel]) -> Vec<notification::NotificationDraft>,
{
    match profile::list_admins(db).await {
        Ok(admins) => notification::deliver(db, plan(&admins)).await,
        Err(e) => {
            warn!("Could not load moderators to notify: {e}");
            Vec::new()
        }
    }
}

/// Approves a pending listing. This is also the final sign-off after the
/// seller accepted a counter-offer.
///
/// `price` is required for `sell` listings and must be `None` for `recycle`
/// listings. The seller and every other profile in the seller's location are
/// notified.
#[instrument(skip(db))]
pub async fn approve_listing(
    db: &DatabaseConnection,
    moderator_id: &str,
    listing_id: i64,
    price: Option<f64>,
) -> Result<TransitionOutcome> {
    if let Some(price) = price {
        validate_price(price)?;
    }
    profile::require_admin(db, moderator_id, "approve listings").await?;
    let current = require_listing(db, listing_id).await?;
    let next = next_status(current.status, ListingAction::Approve)?;

    match (current.choice_type, price) {
        (ChoiceType::Sell, None) => {
            return Err(Error::Validation {
                message: "حدد السعر النهائي للمنتج".to_string(),
            });
        }
        (ChoiceType::Recycle, Some(_)) => {
            return Err(Error::Validation {
                message: "منتجات إعادة التدوير ليس لها سعر".to_string(),
            });
        }
        _ => {}
    }

    let changes = listing::ActiveModel {
        status: Set(next),
        final_price: Set(price),
        approved_at: Set(Some(chrono::Utc::now())),
        rejection_reason: Set(None),
        ..Default::default()
    };
    let updated = compare_and_set(db, &current, changes).await?;
    info!(listing = listing_id, moderator = %moderator_id, ?price, "Listing approved");

    let neighbors = match profile::get_profile(db, &updated.user_id).await {
        Ok(Some(seller)) => match seller.location.as_deref() {
            Some(location) => profile::neighbors_of(db, location, &seller.id)
                .await
                .unwrap_or_else(|e| {
                    warn!("Could not load neighbors to notify: {e}");
                    Vec::new()
                }),
            None => Vec::new(),
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Could not load seller profile: {e}");
            Vec::new()
        }
    };
    let drafts = notification::plan_approved(&updated, price, &neighbors);
    let notifications = notification::deliver(db, drafts).await;

    Ok(TransitionOutcome {
        listing: updated,
        notifications,
    })
}

/// Rejects a pending listing with a reason the seller will see.
#[instrument(skip(db))]
pub async fn reject_listing(
    db: &DatabaseConnection,
    moderator_id: &str,
    listing_id: i64,
    reason: &str,
) -> Result<TransitionOutcome> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::Validation {
            message: "سبب الرفض مطلوب".to_string(),
        });
    }
    profile::require_admin(db, moderator_id, "reject listings").await?;
    let current = require_listing(db, listing_id).await?;
    let next = next_status(current.status, ListingAction::Reject)?;

    let changes = listing::ActiveModel {
        status: Set(next),
        rejection_reason: Set(Some(reason.to_string())),
        final_price: Set(None),
        ..Default::default()
    };
    let updated = compare_and_set(db, &current, changes).await?;
    info!(listing = listing_id, moderator = %moderator_id, "Listing rejected");

    let notifications = notification::deliver(db, notification::plan_rejected(&updated, reason)).await;
    Ok(TransitionOutcome {
        listing: updated,
        notifications,
    })
}

/// Proposes a different price to the seller.
///
/// Clears any earlier decline so the listing reads as a fresh negotiation.
#[instrument(skip(db))]
pub async fn negotiate_listing(
    db: &DatabaseConnection,
    moderator_id: &str,
    listing_id: i64,
    price: f64,
    note: Option<&str>,
) -> Result<TransitionOutcome> {
    validate_price(price)?;
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    profile::require_admin(db, moderator_id, "negotiate prices").await?;
    let current = require_listing(db, listing_id).await?;
    let next = next_status(current.status, ListingAction::Negotiate)?;
    if current.choice_type == ChoiceType::Recycle {
        return Err(Error::Validation {
            message: "منتجات إعادة التدوير ليس لها سعر".to_string(),
        });
    }

    let changes = listing::ActiveModel {
        status: Set(next),
        negotiated_price: Set(Some(price)),
        negotiation_note: Set(note.map(str::to_string)),
        seller_rejected_negotiation: Set(false),
        final_price: Set(None),
        ..Default::default()
    };
    let updated = compare_and_set(db, &current, changes).await?;
    info!(listing = listing_id, moderator = %moderator_id, price, "Counter-offer sent");

    let notifications =
        notification::deliver(db, notification::plan_negotiated(&updated, price, note)).await;
    Ok(TransitionOutcome {
        listing: updated,
        notifications,
    })
}

/// Seller takes the counter-offer. The listing returns to `pending` with the
/// agreed price recorded and waits for moderator sign-off.
#[instrument(skip(db))]
pub async fn accept_negotiation(
    db: &DatabaseConnection,
    seller_id: &str,
    listing_id: i64,
) -> Result<TransitionOutcome> {
    let current = require_listing(db, listing_id).await?;
    require_seller(&current, seller_id, ListingAction::SellerAccept)?;
    let next = next_status(current.status, ListingAction::SellerAccept)?;
    let agreed = current.negotiated_price.ok_or_else(|| Error::Validation {
        message: "لا يوجد سعر مقترح للموافقة عليه".to_string(),
    })?;

    let changes = listing::ActiveModel {
        status: Set(next),
        final_price: Set(Some(agreed)),
        negotiation_note: Set(Some(SELLER_ACCEPTED_NOTE.to_string())),
        seller_rejected_negotiation: Set(false),
        ..Default::default()
    };
    let updated = compare_and_set(db, &current, changes).await?;
    info!(listing = listing_id, seller = %seller_id, agreed, "Seller accepted counter-offer");

    let notifications = notify_admins(db, |admins| {
        notification::plan_seller_accepted(&updated, agreed, admins)
    })
    .await;
    Ok(TransitionOutcome {
        listing: updated,
        notifications,
    })
}

/// Seller turns the counter-offer down. The listing returns to `pending`
/// flagged so moderators know a new negotiation is needed.
#[instrument(skip(db))]
pub async fn reject_negotiation(
    db: &DatabaseConnection,
    seller_id: &str,
    listing_id: i64,
) -> Result<TransitionOutcome> {
    let current = require_listing(db, listing_id).await?;
    require_seller(&current, seller_id, ListingAction::SellerReject)?;
    let next = next_status(current.status, ListingAction::SellerReject)?;

    let changes = listing::ActiveModel {
        status: Set(next),
        seller_rejected_negotiation: Set(true),
        negotiated_price: Set(None),
        final_price: Set(None),
        negotiation_note: Set(Some(SELLER_REJECTED_NOTE.to_string())),
        ..Default::default()
    };
    let updated = compare_and_set(db, &current, changes).await?;
    info!(listing = listing_id, seller = %seller_id, "Seller declined counter-offer");

    let notifications = match profile::require_profile(db, seller_id).await {
        Ok(seller) => {
            notify_admins(db, |admins| {
                notification::plan_seller_rejected(&updated, &seller, admins)
            })
            .await
        }
        Err(e) => {
            warn!("Could not load seller profile: {e}");
            Vec::new()
        }
    };
    Ok(TransitionOutcome {
        listing: updated,
        notifications,
    })
}

/// Removes a listing in any state together with the notifications that
/// reference it. Irreversible.
#[instrument(skip(db))]
pub async fn delete_listing(
    db: &DatabaseConnection,
    moderator_id: &str,
    listing_id: i64,
) -> Result<DeletedListing> {
    profile::require_admin(db, moderator_id, "delete listings").await?;

    let txn = db.begin().await?;
    let current = require_listing(&txn, listing_id).await?;
    let notifications_removed = notification::delete_for_listing(&txn, listing_id).await?;
    Listing::delete_by_id(listing_id).exec(&txn).await?;
    txn.commit().await?;

    info!(
        listing = listing_id,
        moderator = %moderator_id,
        notifications_removed,
        "Listing deleted"
    );
    Ok(DeletedListing {
        listing: current,
        notifications_removed,
    })
}
