//! Cache invalidation trait.

use crate::events::CacheKey;

/// Receives invalidation signals from the realtime stream.
///
/// Invalidation is fire-and-forget: implementations must not block.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, key: &CacheKey);
}

impl<F> CacheInvalidator for F
where
    F: Fn(&CacheKey) + Send + Sync,
{
    fn invalidate(&self, key: &CacheKey) {
        self(key)
    }
}
