//! Per-user question cooldown.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

const SHARDS: usize = 16;

/// Accepted calls between two eviction sweeps of a shard.
const SWEEP_EVERY: u64 = 256;

/// Tracks the last accepted question per user.
///
/// The map is split into shards so users hashing to different shards never
/// contend. Each check-and-set holds one shard lock for a few map operations
/// and never across an `.await`.
pub struct RateLimiter {
    cooldown: Duration,
    /// Entries idle longer than this are dropped by the lazy sweep.
    retention: Duration,
    shards: [Mutex<HashMap<i64, Instant>>; SHARDS],
    accepted: AtomicU64,
}

impl RateLimiter {
    /// `eviction_factor` is the retention window in multiples of `cooldown`
    /// (clamped to at least 1).
    pub fn new(cooldown: Duration, eviction_factor: u32) -> Self {
        Self {
            cooldown,
            retention: cooldown * eviction_factor.max(1),
            shards: std::array::from_fn(|_| Mutex::new(HashMap::new())),
            accepted: AtomicU64::new(0),
        }
    }

    fn shard(&self, user_id: i64) -> &Mutex<HashMap<i64, Instant>> {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARDS]
    }

    /// Accept a question from `user_id` at `now`.
    ///
    /// Returns true and records `now` if the user has never asked or the
    /// cooldown has fully elapsed (inclusive). Returns false and leaves the
    /// stored timestamp untouched otherwise.
    pub fn allow(&self, user_id: i64, now: Instant) -> bool {
        let mut map = self.shard(user_id).lock().unwrap_or_else(|e| e.into_inner());

        if let Some(last) = map.get(&user_id)
            && now.saturating_duration_since(*last) < self.cooldown
        {
            return false;
        }
        map.insert(user_id, now);

        let count = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        if count % SWEEP_EVERY == 0 {
            let before = map.len();
            let retention = self.retention;
            map.retain(|_, last| now.saturating_duration_since(*last) < retention);
            debug!("Rate limiter sweep evicted {} entries", before - map.len());
        }
        true
    }

    /// Last accepted question time for `user_id`, if any.
    pub fn last_seen(&self, user_id: i64) -> Option<Instant> {
        let map = self.shard(user_id).lock().unwrap_or_else(|e| e.into_inner());
        map.get(&user_id).copied()
    }

    /// Drop every entry idle longer than the retention window.
    pub fn evict_stale(&self, now: Instant) -> usize {
        let retention = self.retention;
        self.shards
            .iter()
            .map(|shard| {
                let mut map = shard.lock().unwrap_or_else(|e| e.into_inner());
                let before = map.len();
                map.retain(|_, last| now.saturating_duration_since(*last) < retention);
                before - map.len()
            })
            .sum()
    }

    /// Number of tracked users.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }
}
