use crate::model::{DateRange, ListeningEvent};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::trace;

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: Arc<T>,
}

/// Memoizes one kind of aggregation per (range, event count, parameters).
///
/// The key does not look at event contents unless fingerprinting is on: two
/// different event lists with the same length and range share an entry.
/// Oldest inserted entry is evicted first once `capacity` is exceeded.
#[derive(Debug)]
pub struct RangeCache<T> {
    entries: VecDeque<CacheEntry<T>>,
    capacity: usize,
    fingerprint: bool,
    hits: u64,
    misses: u64,
}

impl<T> Default for RangeCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T> RangeCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
            fingerprint: false,
            hits: 0,
            misses: 0,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: bool) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key == key)
    }

    pub fn key_for<P>(&self, events: &[ListeningEvent], range: DateRange, extra: &P) -> String
    where
        P: Serialize + ?Sized,
    {
        let mut key = format!(
            "{}-{}-{}",
            epoch_millis(range.since),
            epoch_millis(range.to),
            events.len()
        );
        let params = serde_json::to_string(extra).unwrap_or_default();
        if !matches!(params.as_str(), "" | "null" | "[]") {
            key.push('-');
            key.push_str(&params);
        }
        if self.fingerprint {
            key.push('#');
            key.push_str(&fingerprint(events));
        }
        key
    }

    pub fn cached<P, F>(
        &mut self,
        compute: F,
        events: &[ListeningEvent],
        range: DateRange,
        extra: &P,
    ) -> Arc<T>
    where
        P: Serialize + ?Sized,
        F: FnOnce(&[ListeningEvent]) -> T,
    {
        let key = self.key_for(events, range, extra);
        if let Some(entry) = self.entries.iter().find(|entry| entry.key == key) {
            self.hits += 1;
            trace!(%key, "stats cache hit");
            return Arc::clone(&entry.value);
        }

        self.misses += 1;
        trace!(%key, "stats cache miss");
        let value = Arc::new(compute(events));
        self.entries.push_back(CacheEntry {
            key,
            value: Arc::clone(&value),
        });
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                trace!(key = %evicted.key, "stats cache eviction");
            }
        }
        value
    }
}

fn epoch_millis(at: OffsetDateTime) -> i128 {
    at.unix_timestamp_nanos() / 1_000_000
}

fn fingerprint(events: &[ListeningEvent]) -> String {
    let mut hasher = Sha256::new();
    for event in events {
        hasher.update(event.timestamp.unix_timestamp_nanos().to_le_bytes());
        hasher.update(event.ms_played.to_le_bytes());
        hasher.update(event.track_name.as_bytes());
        hasher.update([0x1f_u8]);
        hasher.update(event.artist_name.as_bytes());
        hasher.update([0x1e_u8]);
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
