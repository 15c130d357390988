//! In-process change feed.
//!
//! Mutations publish a [`ChangeEvent`]; subscribers register a [`FeedFilter`]
//! on table and optional column equality. Events carry only identifiers:
//! subscribers re-query the store rather than patch local state from them.

use crate::entities::ListingStatus;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{trace, warn};

const DEFAULT_CAPACITY: usize = 256;

/// Table a change happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// `products`
    Products,
    /// `offers`
    Offers,
    /// `notifications`
    Notifications,
    /// `profiles`
    Profiles,
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Row inserted
    Insert,
    /// Row updated
    Update,
    /// Row deleted
    Delete,
}

/// One row change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// Affected table
    pub table: Table,
    /// Insert, update or delete
    pub kind: ChangeKind,
    /// Primary key of the row
    pub row_id: String,
    /// `user_id` column of the row, when it has one
    pub user_id: Option<String>,
    /// Listing status after the change, for `products` rows
    pub status: Option<ListingStatus>,
}

impl ChangeEvent {
    /// A change to a listing row.
    #[must_use]
    pub fn listing(kind: ChangeKind, id: i64, user_id: &str, status: Option<ListingStatus>) -> Self {
        Self {
            table: Table::Products,
            kind,
            row_id: id.to_string(),
            user_id: Some(user_id.to_string()),
            status,
        }
    }

    /// A notification inserted for `user_id`.
    #[must_use]
    pub fn notification(id: i64, user_id: &str) -> Self {
        Self {
            table: Table::Notifications,
            kind: ChangeKind::Insert,
            row_id: id.to_string(),
            user_id: Some(user_id.to_string()),
            status: None,
        }
    }

    /// An offer row change.
    #[must_use]
    pub fn offer(kind: ChangeKind, id: i64) -> Self {
        Self {
            table: Table::Offers,
            kind,
            row_id: id.to_string(),
            user_id: None,
            status: None,
        }
    }
}

/// Which events a subscriber wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    /// Table to watch
    pub table: Table,
    /// Only rows with this `user_id`
    pub user_id: Option<String>,
    /// Only listing rows in this status
    pub status: Option<ListingStatus>,
}

impl FeedFilter {
    /// Every change in `table`.
    #[must_use]
    pub const fn table(table: Table) -> Self {
        Self {
            table,
            user_id: None,
            status: None,
        }
    }

    /// Restricts to rows owned by `user_id`.
    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Restricts to listings in `status`.
    #[must_use]
    pub const fn with_status(mut self, status: ListingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether `event` passes the filter.
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table
            && self
                .user_id
                .as_ref()
                .is_none_or(|wanted| event.user_id.as_ref() == Some(wanted))
            && self.status.is_none_or(|wanted| event.status == Some(wanted))
    }
}

/// Broadcasts row changes to any number of subscribers.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    /// Creates a feed buffering up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        trace!(?event, "Publishing change");
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    /// Registers a subscriber.
    #[must_use]
    pub fn subscribe(&self, filter: FeedFilter) -> Subscription {
        Subscription {
            filter,
            receiver: self.sender.subscribe(),
        }
    }
}

/// A filtered receiver from [`ChangeFeed::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    filter: FeedFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Waits for the next matching event; `None` once the feed is dropped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Change feed subscriber lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Change feed subscriber lagged, skipped {skipped} events");
                }
                Err(_) => return None,
            }
        }
    }
}
