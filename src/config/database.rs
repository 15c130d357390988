//! Database configuration module for Bekya.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models.

use crate::entities::{Listing, Notification, Offer, Profile};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Default `SQLite` location when neither `DATABASE_URL` nor the settings name one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/bekya.sqlite?mode=rwc";

/// Gets the database URL from the environment, falling back to `configured`.
#[must_use]
pub fn get_database_url(configured: &str) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| configured.to_string())
}

/// Establishes a connection to the database at `url`.
#[instrument]
pub async fn create_connection(url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database");
    Database::connect(url).await.map_err(Into::into)
}

/// Creates all tables in dependency order: profiles, listings, offers, notifications.
///
/// Existing tables are left untouched.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Profile),
        schema.create_table_from_entity(Listing),
        schema.create_table_from_entity(Offer),
        schema.create_table_from_entity(Notification),
    ];

    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    info!("Database tables ensured");
    Ok(())
}
