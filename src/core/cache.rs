//! Time-bounded single-value cache with single-flight refresh
//!
//! Holding the lock across the refresh future means concurrent readers of an
//! expired entry wait for the one fetch in flight instead of starting their
//! own. A failed refresh hands back the last good value, flagged stale.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Default lifetime of a document snapshot
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default lifetime of a derived list view
pub const DEFAULT_VIEW_TTL: Duration = Duration::from_secs(30 * 60);

struct Entry<T> {
    value: Arc<T>,
    fetched_at: Instant,
    expired: bool,
}

impl<T> Entry<T> {
    fn new(value: Arc<T>) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            expired: false,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.expired && self.fetched_at.elapsed() < ttl
    }
}

/// Result of a cache lookup
#[derive(Debug)]
pub struct Lookup<T> {
    pub value: Arc<T>,
    /// The refresh failed and this is the last good value
    pub stale: bool,
}

pub struct TtlCache<T> {
    ttl: Duration,
    entry: Mutex<Option<Entry<T>>>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, calling `refresh` if it is missing or expired
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<Lookup<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut entry = self.entry.lock().await;
        if let Some(current) = entry.as_ref() {
            if current.is_fresh(self.ttl) {
                tracing::debug!("cache hit");
                return Ok(Lookup {
                    value: Arc::clone(&current.value),
                    stale: false,
                });
            }
        }

        tracing::debug!("cache refresh");
        match refresh().await {
            Ok(value) => {
                let value = Arc::new(value);
                *entry = Some(Entry::new(Arc::clone(&value)));
                Ok(Lookup {
                    value,
                    stale: false,
                })
            }
            Err(e) => match entry.as_ref() {
                Some(last) => {
                    tracing::warn!(error = %e, "refresh failed, serving stale value");
                    Ok(Lookup {
                        value: Arc::clone(&last.value),
                        stale: true,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Store a value as freshly fetched
    pub async fn replace(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.entry.lock().await = Some(Entry::new(Arc::clone(&value)));
        value
    }

    /// Force the next lookup to refresh; the old value stays as a fallback
    pub async fn invalidate(&self) {
        if let Some(entry) = self.entry.lock().await.as_mut() {
            entry.expired = true;
        }
    }

    /// Drop the value entirely
    pub async fn clear(&self) {
        *self.entry.lock().await = None;
    }

    /// Current value, fresh or not, without refreshing
    pub async fn peek(&self) -> Option<Arc<T>> {
        self.entry.lock().await.as_ref().map(|e| Arc::clone(&e.value))
    }
}
