//! Shared test utilities for Bekya.
//!
//! Helpers for setting up an in-memory database and creating profiles and
//! listings with sensible defaults.

use crate::{
    core::{
        listing::{ListingChoice, NewListing, submit_listing},
        profile::{NewProfile, create_profile},
    },
    entities::{
        Category, ChoiceType, Condition, ImageUrls, ListingStatus, Role, listing, profile,
    },
    errors::Result,
};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Sign-up fields with email `<username>@example.org` and a phone number.
#[must_use]
pub fn new_profile(id: &str, username: &str, location: Option<&str>) -> NewProfile {
    NewProfile {
        id: id.to_string(),
        username: username.to_string(),
        email: format!("{username}@example.org"),
        phone: Some("01012345678".to_string()),
        location: location.map(str::to_string),
    }
}

/// Creates a regular profile whose id equals `username`.
pub async fn create_test_seller(
    db: &DatabaseConnection,
    username: &str,
    location: &str,
) -> Result<profile::Model> {
    create_profile(db, new_profile(username, username, Some(location)), Role::User).await
}

/// Creates a moderator without a location.
pub async fn create_test_admin(db: &DatabaseConnection, username: &str) -> Result<profile::Model> {
    create_profile(db, new_profile(username, username, None), Role::Admin).await
}

/// Database with seller `seller` in Cairo and moderator `admin`.
pub async fn setup_marketplace() -> Result<(DatabaseConnection, profile::Model, profile::Model)> {
    let db = setup_test_db().await?;
    let seller = create_test_seller(&db, "seller", "Cairo").await?;
    let admin = create_test_admin(&db, "admin").await?;
    Ok((db, seller, admin))
}

/// A sell form with one image, letting the heuristic pick the price.
#[must_use]
pub fn sell_form(title: &str, category: Category, original_price: f64) -> NewListing {
    NewListing {
        title: title.to_string(),
        description: "للبيع".to_string(),
        category,
        condition: None,
        weight: None,
        images: vec!["https://cdn.example.org/products/1.jpg".to_string()],
        choice: ListingChoice::Sell {
            original_price,
            suggested_price: None,
        },
    }
}

/// Submits a 200 EGP furniture listing for `seller_id`.
pub async fn submit_test_listing(
    db: &DatabaseConnection,
    seller_id: &str,
) -> Result<listing::Model> {
    let outcome = submit_listing(db, seller_id, sell_form("كرسي", Category::Furniture, 200.0)).await?;
    Ok(outcome.listing)
}

/// A pending listing row that is never stored.
#[must_use]
pub fn sample_listing(id: i64, user_id: &str) -> listing::Model {
    listing::Model {
        id,
        user_id: user_id.to_string(),
        title: "كرسي".to_string(),
        description: String::new(),
        category: Category::Furniture,
        condition: Condition::Good,
        weight: None,
        images: ImageUrls(vec!["https://cdn.example.org/products/1.jpg".to_string()]),
        choice_type: ChoiceType::Sell,
        original_price: Some(200.0),
        suggested_price: Some(100.0),
        negotiated_price: None,
        final_price: None,
        discount_percentage: Some(50),
        status: ListingStatus::Pending,
        rejection_reason: None,
        negotiation_note: None,
        seller_rejected_negotiation: false,
        recycle_idea: None,
        revision: 0,
        created_at: chrono::Utc::now(),
        approved_at: None,
    }
}
