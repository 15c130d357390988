//! Listing entity - One item offered by a seller, stored in the `products` table.
//!
//! A listing is created `pending` by the seller and moved through its
//! moderation states by [`crate::core::lifecycle`]. Prices are only present for
//! `sell` listings; `recycle` listings carry a `recycle_idea` instead.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker note stored when the seller accepts a counter-offer.
pub const SELLER_ACCEPTED_NOTE: &str = "seller accepted, needs final approval";
/// Marker note stored when the seller declines a counter-offer.
pub const SELLER_REJECTED_NOTE: &str = "seller rejected, needs new negotiation";

/// Moderation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Waiting for a moderator
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Published
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused by a moderator
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Moderator proposed a price, seller must answer
    #[sea_orm(string_value = "awaiting_seller")]
    AwaitingSeller,
}

impl ListingStatus {
    /// Stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AwaitingSeller => "awaiting_seller",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// أثاث
    #[sea_orm(string_value = "furniture")]
    Furniture,
    /// إلكترونيات
    #[sea_orm(string_value = "electronics")]
    Electronics,
    /// كتب
    #[sea_orm(string_value = "books")]
    Books,
    /// ملابس
    #[sea_orm(string_value = "clothes")]
    Clothes,
    /// ألعاب
    #[sea_orm(string_value = "toys")]
    Toys,
    /// أخرى
    #[sea_orm(string_value = "other")]
    Other,
}

impl Category {
    /// Parses the stored string value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "furniture" => Some(Self::Furniture),
            "electronics" => Some(Self::Electronics),
            "books" => Some(Self::Books),
            "clothes" => Some(Self::Clothes),
            "toys" => Some(Self::Toys),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Declared item condition, best first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// ممتازة
    #[sea_orm(string_value = "excellent")]
    Excellent,
    /// جيدة جداً
    #[sea_orm(string_value = "very_good")]
    VeryGood,
    /// جيدة
    #[sea_orm(string_value = "good")]
    Good,
    /// متوسطة
    #[sea_orm(string_value = "fair")]
    Fair,
    /// مقبولة
    #[sea_orm(string_value = "acceptable")]
    Acceptable,
}

impl Condition {
    /// Arabic label shown to users.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "ممتازة",
            Self::VeryGood => "جيدة جداً",
            Self::Good => "جيدة",
            Self::Fair => "متوسطة",
            Self::Acceptable => "مقبولة",
        }
    }
}

/// What the seller wants done with the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ChoiceType {
    /// Sell at a price
    #[sea_orm(string_value = "sell")]
    Sell,
    /// Give away for recycling
    #[sea_orm(string_value = "recycle")]
    Recycle,
}

/// Ordered public image URLs, stored as a JSON array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ImageUrls(pub Vec<String>);

/// Listing database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the listing
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning seller's profile id
    pub user_id: String,
    /// Short title
    pub title: String,
    /// Free-text description
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Listing category
    pub category: Category,
    /// Declared or inferred condition
    pub condition: Condition,
    /// Optional weight in kilograms
    pub weight: Option<f64>,
    /// 1 to 10 image URLs
    #[sea_orm(column_type = "Json")]
    pub images: ImageUrls,
    /// `sell` or `recycle`
    pub choice_type: ChoiceType,
    /// Price the seller originally paid, at most the platform ceiling
    pub original_price: Option<f64>,
    /// Seller's ask
    pub suggested_price: Option<f64>,
    /// Moderator counter-offer
    pub negotiated_price: Option<f64>,
    /// Agreed price
    pub final_price: Option<f64>,
    /// Discount from the original price, in whole percent
    pub discount_percentage: Option<i32>,
    /// Moderation status
    pub status: ListingStatus,
    /// Why a moderator refused the listing
    pub rejection_reason: Option<String>,
    /// Moderator's note or a seller-response marker
    pub negotiation_note: Option<String>,
    /// Seller already turned down one counter-offer
    pub seller_rejected_negotiation: bool,
    /// Recycling suggestion for `recycle` listings
    pub recycle_idea: Option<String>,
    /// Bumped by every lifecycle move; guards conditional updates
    pub revision: i32,
    /// Submission time
    pub created_at: DateTimeUtc,
    /// Set on approval
    pub approved_at: Option<DateTimeUtc>,
}

/// Defines relationships between Listing and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each listing belongs to one seller
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::Id"
    )]
    Seller,
    /// One listing is referenced by many notifications
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
