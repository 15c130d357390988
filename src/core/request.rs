//! Local deadlines on store calls.
//!
//! A timeout only stops waiting; the store may still complete the operation.

use crate::errors::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Awaits `future`, failing with [`Error::Timeout`] once `limit` elapses.
pub async fn with_timeout<T, F>(limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if let Ok(result) = tokio::time::timeout(limit, future).await {
        result
    } else {
        warn!("Request gave up after {:?}", limit);
        Err(Error::Timeout {
            seconds: limit.as_secs(),
        })
    }
}
