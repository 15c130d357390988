//! Notification fan-out and inbox operations.
//!
//! Each `plan_*` function is a pure mapping from a completed transition to the
//! rows it should produce. [`deliver`] inserts them after the primary change has
//! been written; a failed insert is logged and skipped, never rolled back into
//! the listing change. Delivery is best-effort.

use crate::{
    entities::{
        Notification, NotificationType, listing, notification, offer, profile,
    },
    errors::Result,
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, warn};

/// A notification row not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    /// Recipient profile id
    pub user_id: String,
    /// Listing reference
    pub product_id: Option<i64>,
    /// Text shown to the recipient
    pub message: String,
    /// Kind tag
    pub kind: NotificationType,
}

impl NotificationDraft {
    fn about(listing: &listing::Model, user_id: &str, kind: NotificationType, message: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            product_id: Some(listing.id),
            message,
            kind,
        }
    }
}

/// Seller hears about the approval; everyone else in the seller's location
/// hears about a new listing nearby. `price` is `None` for recycle listings.
#[must_use]
pub fn plan_approved(
    listing: &listing::Model,
    price: Option<f64>,
    neighbors: &[profile::Model],
) -> Vec<NotificationDraft> {
    let price = price.map_or_else(
        || "لإعادة التدوير".to_string(),
        |p| format!("بسعر {p} جنيه"),
    );
    let mut drafts = vec![NotificationDraft::about(
        listing,
        &listing.user_id,
        NotificationType::ProductApproved,
        format!("تمت الموافقة على منتجك \"{}\" {price}", listing.title),
    )];
    drafts.extend(
        neighbors
            .iter()
            .filter(|p| p.id != listing.user_id)
            .map(|p| {
                NotificationDraft::about(
                    listing,
                    &p.id,
                    NotificationType::NewProductNearby,
                    format!("منتج جديد في منطقتك: \"{}\" {price}", listing.title),
                )
            }),
    );
    drafts
}

/// Seller hears the rejection reason.
#[must_use]
pub fn plan_rejected(listing: &listing::Model, reason: &str) -> Vec<NotificationDraft> {
    vec![NotificationDraft::about(
        listing,
        &listing.user_id,
        NotificationType::ProductRejected,
        format!("تم رفض منتجك \"{}\". السبب: {reason}", listing.title),
    )]
}

/// Seller hears the counter-offer.
#[must_use]
pub fn plan_negotiated(
    listing: &listing::Model,
    price: f64,
    note: Option<&str>,
) -> Vec<NotificationDraft> {
    let mut message = format!(
        "اقترح المشرف سعر {price} جنيه لمنتجك \"{}\"",
        listing.title
    );
    if let Some(note) = note {
        message.push_str(&format!(" - ملاحظة: {note}"));
    }
    vec![NotificationDraft::about(
        listing,
        &listing.user_id,
        NotificationType::PriceNegotiation,
        message,
    )]
}

/// Every moderator hears that the seller accepted and sign-off is due.
#[must_use]
pub fn plan_seller_accepted(
    listing: &listing::Model,
    price: f64,
    admins: &[profile::Model],
) -> Vec<NotificationDraft> {
    admins
        .iter()
        .map(|admin| {
            NotificationDraft::about(
                listing,
                &admin.id,
                NotificationType::SellerAcceptedPrice,
                format!(
                    "وافق البائع على السعر المقترح {price} جنيه للمنتج \"{}\" ويحتاج موافقة نهائية",
                    listing.title
                ),
            )
        })
        .collect()
}

/// Every moderator hears that the seller declined, with the seller's phone.
#[must_use]
pub fn plan_seller_rejected(
    listing: &listing::Model,
    seller: &profile::Model,
    admins: &[profile::Model],
) -> Vec<NotificationDraft> {
    let phone = seller.phone.as_deref().unwrap_or("غير متوفر");
    admins
        .iter()
        .map(|admin| {
            NotificationDraft::about(
                listing,
                &admin.id,
                NotificationType::SellerRejectedPrice,
                format!(
                    "رفض البائع السعر المقترح للمنتج \"{}\". رقم البائع: {phone}",
                    listing.title
                ),
            )
        })
        .collect()
}

/// Every moderator hears about a new submission.
#[must_use]
pub fn plan_submitted(listing: &listing::Model, admins: &[profile::Model]) -> Vec<NotificationDraft> {
    admins
        .iter()
        .map(|admin| {
            NotificationDraft::about(
                listing,
                &admin.id,
                NotificationType::NewProductSubmitted,
                format!("منتج جديد بانتظار المراجعة: \"{}\"", listing.title),
            )
        })
        .collect()
}

/// Every recipient in the offer's scope hears about it.
#[must_use]
pub fn plan_offer_published(
    offer: &offer::Model,
    recipients: &[profile::Model],
) -> Vec<NotificationDraft> {
    recipients
        .iter()
        .map(|p| NotificationDraft {
            user_id: p.id.clone(),
            product_id: None,
            message: format!(
                "عرض جديد: {} - خصم {}%",
                offer.title, offer.discount_percentage
            ),
            kind: NotificationType::NewOffer,
        })
        .collect()
}

/// Inserts `drafts` one by one and returns the rows that were written.
///
/// Failures are logged and skipped.
pub async fn deliver(
    db: &DatabaseConnection,
    drafts: Vec<NotificationDraft>,
) -> Vec<notification::Model> {
    let total = drafts.len();
    let mut delivered = Vec::with_capacity(total);
    for draft in drafts {
        let recipient = draft.user_id.clone();
        let row = notification::ActiveModel {
            user_id: Set(draft.user_id),
            product_id: Set(draft.product_id),
            message: Set(draft.message),
            kind: Set(draft.kind),
            read: Set(false),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        match row.insert(db).await {
            Ok(model) => delivered.push(model),
            Err(e) => warn!(%recipient, kind = ?draft.kind, "Notification not delivered: {e}"),
        }
    }
    debug!("Delivered {} of {total} notifications", delivered.len());
    delivered
}

/// A user's notifications, newest first.
pub async fn notifications_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<notification::Model>> {
    Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of unread notifications for the badge.
pub async fn unread_count(db: &DatabaseConnection, user_id: &str) -> Result<u64> {
    Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::Read.eq(false))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Marks one of the user's notifications read. Returns whether a row changed.
pub async fn mark_read(db: &DatabaseConnection, user_id: &str, notification_id: i64) -> Result<bool> {
    let result = Notification::update_many()
        .col_expr(notification::Column::Read, Expr::value(true))
        .filter(notification::Column::Id.eq(notification_id))
        .filter(notification::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Marks every notification of the user read.
pub async fn mark_all_read(db: &DatabaseConnection, user_id: &str) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(notification::Column::Read, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::Read.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Removes the notifications that reference a listing.
pub async fn delete_for_listing<C>(db: &C, listing_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Notification::delete_many()
        .filter(notification::Column::ProductId.eq(listing_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::*;

    fn profile(id: &str, location: Option<&str>, role: Role) -> profile::Model {
        profile::Model {
            id: id.to_string(),
            username: id.to_string(),
            email: format!("{id}@example.org"),
            phone: Some("01000000000".to_string()),
            location: location.map(str::to_string),
            role,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_plan_approved_counts_seller_and_neighbors() {
        let listing = sample_listing(1, "seller");
        let neighbors = vec![
            profile("n1", Some("Cairo"), Role::User),
            profile("n2", Some("Cairo"), Role::User),
            profile("seller", Some("Cairo"), Role::User),
        ];
        let drafts = plan_approved(&listing, Some(60.0), &neighbors);
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].user_id, "seller");
        assert_eq!(drafts[0].kind, NotificationType::ProductApproved);
        assert!(drafts[0].message.contains("60"));
        assert!(
            drafts[1..]
                .iter()
                .all(|d| d.kind == NotificationType::NewProductNearby)
        );
    }

    #[test]
    fn test_plan_negotiated_includes_optional_note() {
        let listing = sample_listing(1, "seller");
        let with_note = plan_negotiated(&listing, 60.0, Some("لسه شوية قديم"));
        assert!(with_note[0].message.contains("لسه شوية قديم"));
        let without = plan_negotiated(&listing, 60.0, None);
        assert!(!without[0].message.contains("ملاحظة"));
    }

    #[test]
    fn test_plan_seller_rejected_embeds_phone() {
        let listing = sample_listing(1, "seller");
        let mut seller = profile("seller", Some("Cairo"), Role::User);
        seller.phone = Some("01234567890".to_string());
        let admins = vec![profile("a1", None, Role::Admin), profile("a2", None, Role::Admin)];

        let drafts = plan_seller_rejected(&listing, &seller, &admins);
        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(|d| d.message.contains("01234567890")));

        seller.phone = None;
        let drafts = plan_seller_rejected(&listing, &seller, &admins);
        assert!(drafts[0].message.contains("غير متوفر"));
    }

    #[tokio::test]
    async fn test_deliver_and_inbox() -> Result<()> {
        let db = setup_test_db().await?;
        let seller = create_test_seller(&db, "seller", "Cairo").await?;
        let listing = submit_test_listing(&db, &seller.id).await?;

        let drafts = plan_rejected(&listing, "الصور غير واضحة");
        let delivered = deliver(&db, drafts).await;
        assert_eq!(delivered.len(), 1);

        let inbox = notifications_for_user(&db, "seller").await?;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationType::ProductRejected);
        assert_eq!(unread_count(&db, "seller").await?, 1);

        assert!(mark_read(&db, "seller", inbox[0].id).await?);
        assert!(!mark_read(&db, "someone-else", inbox[0].id).await?);
        assert_eq!(unread_count(&db, "seller").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_deliver_skips_failed_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let seller = create_test_seller(&db, "seller", "Cairo").await?;
        let listing = submit_test_listing(&db, &seller.id).await?;

        // Recipient without a profile violates the foreign key
        let mut drafts = plan_rejected(&listing, "x");
        drafts.push(NotificationDraft {
            user_id: "ghost".to_string(),
            product_id: Some(listing.id),
            message: "x".to_string(),
            kind: NotificationType::ProductRejected,
        });
        let delivered = deliver(&db, drafts).await;
        assert_eq!(delivered.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_all_read() -> Result<()> {
        let db = setup_test_db().await?;
        let seller = create_test_seller(&db, "seller", "Cairo").await?;
        let listing = submit_test_listing(&db, &seller.id).await?;
        deliver(&db, plan_negotiated(&listing, 50.0, None)).await;
        deliver(&db, plan_rejected(&listing, "y")).await;

        assert_eq!(mark_all_read(&db, "seller").await?, 2);
        assert_eq!(unread_count(&db, "seller").await?, 0);
        Ok(())
    }
}
