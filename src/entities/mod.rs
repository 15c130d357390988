//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities mirror the marketplace tables: profiles, products (listings),
//! offers and notifications. Closed string sets are stored as `DeriveActiveEnum`s.

pub mod listing;
pub mod notification;
pub mod offer;
pub mod profile;

// Re-export specific types to avoid conflicts
pub use listing::{
    Category, ChoiceType, Column as ListingColumn, Condition, Entity as Listing, ImageUrls,
    ListingStatus, Model as ListingModel,
};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
    NotificationType,
};
pub use offer::{Column as OfferColumn, Entity as Offer, Model as OfferModel};
pub use profile::{Column as ProfileColumn, Entity as Profile, Model as ProfileModel, Role};
