// Time-decayed per-sender counter for media bursts.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Most distinct senders tracked at once; the oldest entry is dropped to
/// make room beyond this.
const MAX_TRACKED_SENDERS: usize = 100;
/// How long a sender's burst window lasts, measured from their first post.
const WINDOW_SECS: i64 = 30;

struct BurstEntry {
    count: u32,
    first_seen: DateTime<Utc>,
}

/// Counts media posts per sender inside a fixed decay window.
///
/// The window is fixed from first insertion, not sliding: a sender's count
/// resets 30 seconds after their first post no matter how recently they
/// posted. Only the detection task writes here; `DashMap` gives the shared
/// service interior mutability without an explicit lock.
pub struct SpamCounter {
    entries: DashMap<String, BurstEntry>,
    capacity: usize,
    window: Duration,
}

impl SpamCounter {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            capacity: MAX_TRACKED_SENDERS,
            window: Duration::seconds(WINDOW_SECS),
        }
    }

    /// Bumps the counter for `key` and returns the post-increment count.
    pub fn increment(&self, key: &str) -> u32 {
        self.increment_at(key, Utc::now())
    }

    fn increment_at(&self, key: &str, now: DateTime<Utc>) -> u32 {
        // Expired windows are cleared on every touch rather than on a timer.
        self.entries.retain(|_, entry| now - entry.first_seen < self.window);

        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.count += 1;
            return entry.count;
        }

        if self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().first_seen)
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            key.to_string(),
            BurstEntry {
                count: 1,
                first_seen: now,
            },
        );
        1
    }
}

impl Default for SpamCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn nth_increment_within_window_returns_n() {
        let counter = SpamCounter::new();
        for n in 1..=8 {
            assert_eq!(counter.increment_at("@user:example.org", t0()), n);
        }
    }

    #[test]
    fn window_is_fixed_from_first_insertion() {
        let counter = SpamCounter::new();
        counter.increment_at("@user:example.org", t0());
        // Touching the entry close to expiry does not extend the window...
        let count = counter.increment_at("@user:example.org", t0() + Duration::seconds(29));
        assert_eq!(count, 2);
        // ...so once the first post's window elapses the count resets to 1.
        let count = counter.increment_at("@user:example.org", t0() + Duration::seconds(31));
        assert_eq!(count, 1);
    }

    #[test]
    fn distinct_senders_count_independently() {
        let counter = SpamCounter::new();
        counter.increment_at("@a:example.org", t0());
        counter.increment_at("@a:example.org", t0());
        assert_eq!(counter.increment_at("@b:example.org", t0()), 1);
    }

    #[test]
    fn capacity_overflow_evicts_the_oldest_entry() {
        let counter = SpamCounter::new();
        counter.increment_at("@oldest:example.org", t0());
        for i in 1..100 {
            counter.increment_at(&format!("@user{i}:example.org"), t0() + Duration::seconds(1));
        }

        // The 101st distinct sender pushes exactly the oldest entry out.
        assert_eq!(
            counter.increment_at("@newest:example.org", t0() + Duration::seconds(2)),
            1
        );

        // Later entries survived the eviction and keep counting.
        assert_eq!(
            counter.increment_at("@user50:example.org", t0() + Duration::seconds(3)),
            2
        );
        // The evicted sender starts over at 1.
        assert_eq!(
            counter.increment_at("@oldest:example.org", t0() + Duration::seconds(3)),
            1
        );
    }
}
