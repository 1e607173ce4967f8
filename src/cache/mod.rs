mod fingerprint;
mod resolution_cache;

pub use fingerprint::*;
pub use resolution_cache::*;

use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_POSITIVE_TTL: Duration = Duration::from_secs(3600); // 1 hour
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(300); // 5 minutes
pub const DEFAULT_POSITIVE_CAPACITY: usize = 1024;

/// A cached value stamped with its insertion time.
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}
