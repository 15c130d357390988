//! Offer entity - A promotional discount published by a moderator.
//!
//! An offer without a category applies to every category; an offer without a
//! target location is announced to every profile. The discount is applied when
//! listings are read and is never written back onto a listing.

use super::listing::Category;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Offer database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Headline
    pub title: String,
    /// Optional longer text
    pub description: Option<String>,
    /// Optional banner image URL
    pub image: Option<String>,
    /// Discount in percent
    pub discount_percentage: f64,
    /// Category scope; `None` means every category
    pub category: Option<Category>,
    /// Location scope for announcements; `None` means everyone
    pub target_location: Option<String>,
    /// Expiry; `None` means open-ended
    pub end_date: Option<DateTimeUtc>,
    /// Manual on/off switch
    pub is_active: bool,
    /// Moderator who published it
    pub created_by: String,
    /// Publication time
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether the offer is switched on and not expired at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTimeUtc) -> bool {
        self.is_active && self.end_date.is_none_or(|end| end > now)
    }

    /// Whether the offer covers listings of `category`.
    #[must_use]
    pub fn covers(&self, category: Category) -> bool {
        self.category.is_none_or(|scoped| scoped == category)
    }
}

/// Defines relationships between Offer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Publishing moderator
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::CreatedBy",
        to = "super::profile::Column::Id"
    )]
    Creator,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
