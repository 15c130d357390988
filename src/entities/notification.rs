//! Notification entity - A message addressed to one user.
//!
//! Rows are only ever created as a side effect of a listing transition or an
//! offer publication. Deleting a listing removes the rows that reference it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Seller's listing was approved
    #[sea_orm(string_value = "product_approved")]
    ProductApproved,
    /// A listing was approved in the recipient's area
    #[sea_orm(string_value = "new_product_nearby")]
    NewProductNearby,
    /// Seller's listing was rejected
    #[sea_orm(string_value = "product_rejected")]
    ProductRejected,
    /// Moderator proposed a new price
    #[sea_orm(string_value = "price_negotiation")]
    PriceNegotiation,
    /// Seller accepted a counter-offer
    #[sea_orm(string_value = "seller_accepted_price")]
    SellerAcceptedPrice,
    /// Seller declined a counter-offer
    #[sea_orm(string_value = "seller_rejected_price")]
    SellerRejectedPrice,
    /// A new listing waits for review
    #[sea_orm(string_value = "new_product_submitted")]
    NewProductSubmitted,
    /// A promotional offer was published
    #[sea_orm(string_value = "new_offer")]
    NewOffer,
}

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Recipient profile id
    pub user_id: String,
    /// Listing this notification is about, if any
    pub product_id: Option<i64>,
    /// Human-readable message
    #[sea_orm(column_type = "Text")]
    pub message: String,
    /// Notification kind
    #[sea_orm(column_name = "type")]
    pub kind: NotificationType,
    /// Whether the recipient has seen it
    pub read: bool,
    /// Creation time
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Notification and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each notification is addressed to one profile
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,
    /// Optional listing reference, removed together with the listing
    #[sea_orm(
        belongs_to = "super::listing::Entity",
        from = "Column::ProductId",
        to = "super::listing::Column::Id",
        on_delete = "Cascade"
    )]
    Listing,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipient.def()
    }
}

impl Related<super::listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
