//! Profile entity - One row per identity issued by the identity provider.
//!
//! The `location` string drives same-location notification fan-out, so it is
//! compared exactly as stored.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular buyer/seller
    #[sea_orm(string_value = "user")]
    User,
    /// Moderator
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// Profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    /// Opaque identity id from the identity provider
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Unique login name
    #[sea_orm(unique)]
    pub username: String,
    /// Unique email, used for sign-in
    #[sea_orm(unique)]
    pub email: String,
    /// Contact phone number
    pub phone: Option<String>,
    /// Free-text area name
    pub location: Option<String>,
    /// Account role
    pub role: Role,
    /// When the profile was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether this profile may moderate listings.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Defines relationships between Profile and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One profile owns many listings
    #[sea_orm(has_many = "super::listing::Entity")]
    Listings,
    /// One profile receives many notifications
    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listings.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
