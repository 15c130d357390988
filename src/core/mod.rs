/// Change feed - table change events fanned out to filtered subscribers
pub mod feed;
/// Image validation and the object store
pub mod images;
/// Listing state machine and price negotiation
pub mod lifecycle;
/// Listing submission and queries
pub mod listing;
/// Notification fan-out and inbox
pub mod notification;
/// Promotional offers and read-time pricing
pub mod offer;
/// Price and condition heuristic
pub mod pricing;
/// Profiles, roles and identity lookups
pub mod profile;
/// Request deadlines
pub mod request;
