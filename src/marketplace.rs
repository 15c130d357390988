//! The marketplace service object.
//!
//! [`Marketplace`] owns the store handle, the read caches, the change feed and
//! the object store. It is constructed explicitly, started once to spawn the
//! cache sweepers and shut down to stop them. Every store call goes through a
//! local deadline; every mutation publishes feed events and drops the cached
//! reads it makes stale.

use crate::{
    cache::{TtlCache, cache_key},
    config::settings::Settings,
    core::{
        feed::{ChangeEvent, ChangeFeed, ChangeKind, FeedFilter, Subscription},
        images::{ImageUpload, LocalObjectStore, object_path, validate_image_set},
        lifecycle::{self, DeletedListing, TransitionOutcome},
        listing::{self, NewListing},
        notification,
        offer::{self, NewOffer, PricedListing},
        profile::{self, NewProfile},
        request::with_timeout,
    },
    entities::{
        Category, ListingStatus, Role, listing as listing_entity,
        notification as notification_entity, offer as offer_entity, profile as profile_entity,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Cache endpoint for the public catalogue.
pub const APPROVED_ENDPOINT: &str = "approved_listings";
/// Cache endpoint for a seller's own listings.
pub const SELLER_ENDPOINT: &str = "seller_listings";

/// Marketplace backend handle.
#[derive(Debug)]
pub struct Marketplace {
    db: DatabaseConnection,
    settings: Settings,
    catalogue: Arc<TtlCache<Vec<PricedListing>>>,
    own_listings: Arc<TtlCache<Vec<listing_entity::Model>>>,
    feed: ChangeFeed,
    store: LocalObjectStore,
    sweepers: Vec<JoinHandle<()>>,
}

impl Marketplace {
    /// Builds the service around an open connection. Nothing runs until
    /// [`Marketplace::start`].
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings) -> Self {
        let store = LocalObjectStore::new(
            settings.storage.root.clone(),
            &settings.storage.public_base_url,
        );
        Self {
            catalogue: Arc::new(TtlCache::new(settings.cache.default_ttl())),
            own_listings: Arc::new(TtlCache::new(settings.cache.own_listings_ttl())),
            feed: ChangeFeed::default(),
            store,
            sweepers: Vec::new(),
            db,
            settings,
        }
    }

    /// Spawns the cache sweepers. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if !self.sweepers.is_empty() {
            return;
        }
        let interval = self.settings.cache.sweep_interval();
        self.sweepers = vec![
            TtlCache::spawn_sweeper(Arc::clone(&self.catalogue), interval),
            TtlCache::spawn_sweeper(Arc::clone(&self.own_listings), interval),
        ];
        info!(?interval, "Marketplace started");
    }

    /// Stops the sweepers and closes the store connection.
    pub async fn shutdown(self) -> Result<()> {
        for sweeper in &self.sweepers {
            sweeper.abort();
        }
        self.db.close().await?;
        info!("Marketplace shut down");
        Ok(())
    }

    /// The underlying connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Loaded settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Registers for change events.
    #[must_use]
    pub fn subscribe(&self, filter: FeedFilter) -> Subscription {
        self.feed.subscribe(filter)
    }

    const fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.requests.timeout_secs)
    }

    const fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.requests.upload_timeout_secs)
    }

    fn publish_notifications(&self, rows: &[notification_entity::Model]) {
        for row in rows {
            self.feed
                .publish(ChangeEvent::notification(row.id, &row.user_id));
        }
    }

    async fn listing_changed(&self, kind: ChangeKind, outcome: &TransitionOutcome) {
        let listing = &outcome.listing;
        self.feed.publish(ChangeEvent::listing(
            kind,
            listing.id,
            &listing.user_id,
            Some(listing.status),
        ));
        self.publish_notifications(&outcome.notifications);
        self.invalidate_listings().await;
    }

    async fn invalidate_listings(&self) {
        self.catalogue.invalidate_endpoint(APPROVED_ENDPOINT).await;
        self.own_listings.invalidate_endpoint(SELLER_ENDPOINT).await;
    }

    /// Creates the configured moderator profiles.
    pub async fn seed_admins(&self) -> Result<usize> {
        with_timeout(
            self.timeout(),
            profile::seed_admins(&self.db, &self.settings.admins),
        )
        .await
    }

    /// Stores the profile of a newly signed-up user.
    pub async fn register(&self, new: NewProfile) -> Result<profile_entity::Model> {
        with_timeout(self.timeout(), profile::create_profile(&self.db, new, Role::User)).await
    }

    /// Maps a login identifier (username or email) to the email to sign in with.
    pub async fn resolve_login_email(&self, identifier: &str) -> Result<String> {
        with_timeout(
            self.timeout(),
            profile::resolve_login_email(&self.db, identifier),
        )
        .await
    }

    /// Validates and stores listing images, returning their public URLs.
    #[instrument(skip(self, images), fields(count = images.len()))]
    pub async fn upload_listing_images(
        &self,
        owner_id: &str,
        images: Vec<ImageUpload>,
    ) -> Result<Vec<String>> {
        validate_image_set(&images)?;
        let timestamp_ms = Utc::now().timestamp_millis();
        let upload = async {
            let mut urls = Vec::with_capacity(images.len());
            for (index, image) in images.iter().enumerate() {
                let path = object_path(owner_id, timestamp_ms, index, &image.content_type)?;
                urls.push(self.store.upload(&path, &image.bytes).await?);
            }
            Ok::<_, Error>(urls)
        };
        with_timeout(self.upload_timeout(), upload).await
    }

    /// Submits a listing for review.
    pub async fn submit_listing(&self, seller_id: &str, new: NewListing) -> Result<TransitionOutcome> {
        let outcome = with_timeout(
            self.timeout(),
            listing::submit_listing(&self.db, seller_id, new),
        )
        .await?;
        self.listing_changed(ChangeKind::Insert, &outcome).await;
        Ok(outcome)
    }

    /// Moderator approval, with the final price for `sell` listings.
    pub async fn approve(
        &self,
        moderator_id: &str,
        listing_id: i64,
        price: Option<f64>,
    ) -> Result<TransitionOutcome> {
        let outcome = with_timeout(
            self.timeout(),
            lifecycle::approve_listing(&self.db, moderator_id, listing_id, price),
        )
        .await?;
        self.listing_changed(ChangeKind::Update, &outcome).await;
        Ok(outcome)
    }

    /// Moderator refusal.
    pub async fn reject(
        &self,
        moderator_id: &str,
        listing_id: i64,
        reason: &str,
    ) -> Result<TransitionOutcome> {
        let outcome = with_timeout(
            self.timeout(),
            lifecycle::reject_listing(&self.db, moderator_id, listing_id, reason),
        )
        .await?;
        self.listing_changed(ChangeKind::Update, &outcome).await;
        Ok(outcome)
    }

    /// Moderator counter-offer.
    pub async fn negotiate(
        &self,
        moderator_id: &str,
        listing_id: i64,
        price: f64,
        note: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let outcome = with_timeout(
            self.timeout(),
            lifecycle::negotiate_listing(&self.db, moderator_id, listing_id, price, note),
        )
        .await?;
        self.listing_changed(ChangeKind::Update, &outcome).await;
        Ok(outcome)
    }

    /// Seller takes the counter-offer.
    pub async fn accept_negotiation(&self, seller_id: &str, listing_id: i64) -> Result<TransitionOutcome> {
        let outcome = with_timeout(
            self.timeout(),
            lifecycle::accept_negotiation(&self.db, seller_id, listing_id),
        )
        .await?;
        self.listing_changed(ChangeKind::Update, &outcome).await;
        Ok(outcome)
    }

    /// Seller declines the counter-offer.
    pub async fn reject_negotiation(&self, seller_id: &str, listing_id: i64) -> Result<TransitionOutcome> {
        let outcome = with_timeout(
            self.timeout(),
            lifecycle::reject_negotiation(&self.db, seller_id, listing_id),
        )
        .await?;
        self.listing_changed(ChangeKind::Update, &outcome).await;
        Ok(outcome)
    }

    /// Moderator removes a listing.
    pub async fn delete_listing(&self, moderator_id: &str, listing_id: i64) -> Result<DeletedListing> {
        let deleted = with_timeout(
            self.timeout(),
            lifecycle::delete_listing(&self.db, moderator_id, listing_id),
        )
        .await?;
        self.feed.publish(ChangeEvent::listing(
            ChangeKind::Delete,
            deleted.listing.id,
            &deleted.listing.user_id,
            None,
        ));
        self.invalidate_listings().await;
        Ok(deleted)
    }

    /// Listings waiting for a moderator, newest first. Not cached.
    pub async fn pending_listings(&self) -> Result<Vec<listing_entity::Model>> {
        with_timeout(
            self.timeout(),
            listing::listings_by_status(&self.db, ListingStatus::Pending),
        )
        .await
    }

    /// The public catalogue with offer prices applied.
    pub async fn approved_listings(&self, category: Option<Category>) -> Result<Vec<PricedListing>> {
        let key = cache_key(APPROVED_ENDPOINT, &json!({ "category": category }));
        if let Some(cached) = self.catalogue.get(&key).await {
            debug!(%key, "Serving catalogue from cache");
            return Ok(cached);
        }

        let now = Utc::now();
        let load = async {
            let listings = listing::approved_listings(&self.db, category).await?;
            let offers = offer::active_offers(&self.db, now).await?;
            let priced = offer::price_with_offers(listings, &offers, now);
            let expiry = offer::earliest_applied_expiry(&priced, &offers);
            Ok::<_, Error>((priced, expiry))
        };
        let (priced, expiry) = with_timeout(self.timeout(), load).await?;
        self.catalogue
            .set_with_ttl(
                APPROVED_ENDPOINT,
                key,
                priced.clone(),
                self.catalogue_ttl(expiry, now),
            )
            .await;
        Ok(priced)
    }

    /// Default catalogue TTL, shortened so an entry never outlives an offer
    /// it applied.
    fn catalogue_ttl(&self, offer_expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        let default = self.settings.cache.default_ttl();
        offer_expiry.map_or(default, |end| {
            (end - now).to_std().unwrap_or(Duration::ZERO).min(default)
        })
    }

    /// A seller's own listings in every status.
    pub async fn seller_listings(&self, seller_id: &str) -> Result<Vec<listing_entity::Model>> {
        let key = cache_key(SELLER_ENDPOINT, &json!({ "user_id": seller_id }));
        if let Some(cached) = self.own_listings.get(&key).await {
            return Ok(cached);
        }
        let listings = with_timeout(
            self.timeout(),
            listing::listings_for_seller(&self.db, seller_id),
        )
        .await?;
        self.own_listings
            .set(SELLER_ENDPOINT, key, listings.clone())
            .await;
        Ok(listings)
    }

    /// Publishes an offer and announces it.
    pub async fn publish_offer(&self, moderator_id: &str, new: NewOffer) -> Result<offer_entity::Model> {
        let (created, notifications) = with_timeout(
            self.timeout(),
            offer::publish_offer(&self.db, moderator_id, new),
        )
        .await?;
        self.feed
            .publish(ChangeEvent::offer(ChangeKind::Insert, created.id));
        self.publish_notifications(&notifications);
        self.catalogue.invalidate_endpoint(APPROVED_ENDPOINT).await;
        Ok(created)
    }

    /// Switches an offer off.
    pub async fn deactivate_offer(&self, moderator_id: &str, offer_id: i64) -> Result<()> {
        with_timeout(
            self.timeout(),
            offer::deactivate_offer(&self.db, moderator_id, offer_id),
        )
        .await?;
        self.feed
            .publish(ChangeEvent::offer(ChangeKind::Update, offer_id));
        self.catalogue.invalidate_endpoint(APPROVED_ENDPOINT).await;
        Ok(())
    }

    /// A user's inbox, newest first.
    pub async fn notifications(&self, user_id: &str) -> Result<Vec<notification_entity::Model>> {
        with_timeout(
            self.timeout(),
            notification::notifications_for_user(&self.db, user_id),
        )
        .await
    }

    /// Unread badge count.
    pub async fn unread_count(&self, user_id: &str) -> Result<u64> {
        with_timeout(self.timeout(), notification::unread_count(&self.db, user_id)).await
    }

    /// Marks one notification read.
    pub async fn mark_read(&self, user_id: &str, notification_id: i64) -> Result<bool> {
        with_timeout(
            self.timeout(),
            notification::mark_read(&self.db, user_id, notification_id),
        )
        .await
    }

    /// Marks the whole inbox read.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        with_timeout(self.timeout(), notification::mark_all_read(&self.db, user_id)).await
    }
}
