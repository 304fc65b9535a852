//! Dependency-tagged response cache.
//!
//! Every cached response carries the set of [`Tag`]s it was derived from: the
//! individual rows it read and the tables it enumerated. Handlers never delete
//! keys by name; a write invalidates the tags of what it touched and every
//! entry depending on one of them is dropped.
//!
//! Invalidation also advances a global epoch and stamps each invalidated tag
//! with it. A reader takes a [`Ticket`] (the current epoch) before querying
//! the database and the insert is refused if any of its tags was invalidated
//! after that ticket was issued, so a slow reader cannot put pre-write data
//! back into the cache after the writer has cleaned up.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::AppError;

/// How long an invalidation stamp is remembered. Loads running longer than
/// this may still insert stale data.
const VERSION_RETENTION: Duration = Duration::from_secs(15 * 60);

/// Response header reporting whether the body came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Subject,
    Chapter,
    Quiz,
    Question,
    Score,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A single row.
    Row(Entity, i64),
    /// Any enumeration of the table (lists, aggregates).
    Table(Entity),
}

impl Tag {
    /// Tags made stale by a write to one row.
    pub fn written(entity: Entity, id: i64) -> [Tag; 2] {
        [Tag::Row(entity, id), Tag::Table(entity)]
    }
}

#[derive(Clone, Debug)]
struct CachedEntry {
    data: Arc<Vec<u8>>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

#[derive(Default)]
struct TagIndex {
    epoch: u64,
    /// Epoch at which each tag was last invalidated.
    versions: HashMap<Tag, (u64, Instant)>,
    keys: HashMap<Tag, HashSet<String>>,
}

/// Epoch observed before a load started.
#[derive(Debug, Clone, Copy)]
pub struct Ticket(u64);

#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CachedEntry>>,
    index: Arc<Mutex<TagIndex>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self) -> MutexGuard<'_, TagIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Some(Arc::clone(&entry.data));
            }
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.index().epoch)
    }

    /// Stores `data` under `key`, depending on `tags`.
    ///
    /// Returns false (and stores nothing) if one of the tags was invalidated
    /// after `ticket` was taken.
    pub fn insert(
        &self,
        key: &str,
        data: Arc<Vec<u8>>,
        tags: &[Tag],
        ttl: Duration,
        ticket: Ticket,
    ) -> bool {
        let mut index = self.index();

        let stale = tags.iter().any(|tag| {
            index
                .versions
                .get(tag)
                .is_some_and(|(version, _)| *version > ticket.0)
        });
        if stale {
            return false;
        }

        self.entries.insert(
            key.to_string(),
            CachedEntry {
                data,
                cached_at: Instant::now(),
                ttl,
            },
        );
        for tag in tags {
            index.keys.entry(*tag).or_default().insert(key.to_string());
        }
        true
    }

    /// Drops every entry depending on any of `tags`. Returns how many entries were removed.
    pub fn invalidate<I>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = Tag>,
    {
        let mut index = self.index();
        index.epoch += 1;
        let epoch = index.epoch;
        let now = Instant::now();

        let mut removed = 0;
        for tag in tags {
            index.versions.insert(tag, (epoch, now));
            if let Some(keys) = index.keys.remove(&tag) {
                for key in keys {
                    if self.entries.remove(&key).is_some() {
                        removed += 1;
                    }
                }
            }
        }
        tracing::debug!(epoch, removed, "cache invalidated");
        removed
    }

    /// Removes expired entries and forgets old invalidation stamps.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let purged = before.saturating_sub(self.entries.len());

        let mut index = self.index();
        let entries = &self.entries;
        index.keys.retain(|_, keys| {
            keys.retain(|key| entries.contains_key(key));
            !keys.is_empty()
        });
        index
            .versions
            .retain(|_, (_, at)| at.elapsed() < VERSION_RETENTION);

        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-through helper used by every cached GET handler.
    ///
    /// On a miss, `load` returns the value to serialize and the tags it
    /// depends on.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: String,
        ttl: Duration,
        load: F,
    ) -> Result<CachedJson, AppError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, Vec<Tag>), AppError>>,
    {
        if let Some(data) = self.get(&key) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(CachedJson { data, hit: true });
        }

        tracing::debug!(key = %key, "cache miss");
        let ticket = self.ticket();
        let (value, tags) = load().await?;
        let data = Arc::new(
            serde_json::to_vec(&value).map_err(|e| AppError::InternalServerError(e.to_string()))?,
        );

        if !self.insert(&key, Arc::clone(&data), &tags, ttl, ticket) {
            tracing::debug!(key = %key, "discarded load raced by a write");
        }

        Ok(CachedJson { data, hit: false })
    }
}

/// Pre-serialized JSON body produced by [`ResponseCache::get_or_load`].
#[derive(Debug)]
pub struct CachedJson {
    pub data: Arc<Vec<u8>>,
    pub hit: bool,
}

impl IntoResponse for CachedJson {
    fn into_response(self) -> Response {
        let status = if self.hit { "HIT" } else { "MISS" };
        (
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                ),
                (
                    header::HeaderName::from_static(CACHE_STATUS_HEADER),
                    HeaderValue::from_static(status),
                ),
            ],
            self.data.as_ref().clone(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn bytes(s: &str) -> Arc<Vec<u8>> {
        Arc::new(s.as_bytes().to_vec())
    }

    #[test]
    fn insert_then_get() {
        let cache = ResponseCache::new();
        let ticket = cache.ticket();
        assert!(cache.insert("subject_1", bytes("a"), &[Tag::Row(Entity::Subject, 1)], TTL, ticket));
        assert_eq!(cache.get("subject_1").unwrap().as_slice(), b"a");
    }

    #[test]
    fn invalidating_a_tag_drops_only_dependents() {
        let cache = ResponseCache::new();
        let t = cache.ticket();
        cache.insert("chapter_3", bytes("c"), &[Tag::Row(Entity::Chapter, 3)], TTL, t);
        cache.insert(
            "quiz_7",
            bytes("q"),
            &[Tag::Row(Entity::Quiz, 7), Tag::Row(Entity::Chapter, 3)],
            TTL,
            t,
        );
        cache.insert("chapter_4", bytes("d"), &[Tag::Row(Entity::Chapter, 4)], TTL, t);

        let removed = cache.invalidate(Tag::written(Entity::Chapter, 3));

        assert_eq!(removed, 2);
        assert!(cache.get("chapter_3").is_none());
        assert!(cache.get("quiz_7").is_none());
        assert!(cache.get("chapter_4").is_some());
    }

    #[test]
    fn load_started_before_invalidation_is_not_stored() {
        let cache = ResponseCache::new();
        let ticket = cache.ticket();

        // A writer commits and invalidates while the reader is still loading.
        cache.invalidate([Tag::Row(Entity::Chapter, 3)]);

        let stored = cache.insert("chapter_3", bytes("old"), &[Tag::Row(Entity::Chapter, 3)], TTL, ticket);
        assert!(!stored);
        assert!(cache.get("chapter_3").is_none());

        // Unrelated tags are unaffected by the same epoch bump.
        assert!(cache.insert("chapter_4", bytes("ok"), &[Tag::Row(Entity::Chapter, 4)], TTL, ticket));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = ResponseCache::new();
        let t = cache.ticket();
        cache.insert("subjects_list", bytes("[]"), &[Tag::Table(Entity::Subject)], Duration::ZERO, t);
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("subjects_list").is_none());
        assert_eq!(cache.purge_expired(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_removes_expired() {
        let cache = ResponseCache::new();
        let t = cache.ticket();
        cache.insert("a", bytes("1"), &[Tag::Table(Entity::Quiz)], Duration::ZERO, t);
        cache.insert("b", bytes("2"), &[Tag::Table(Entity::Quiz)], TTL, t);
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn get_or_load_hits_after_first_load() {
        let cache = ResponseCache::new();
        let calls = std::sync::atomic::AtomicUsize::new(0);

        for expected_hit in [false, true] {
            let out = cache
                .get_or_load("leaderboard".to_string(), TTL, || async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok((vec![1, 2, 3], vec![Tag::Table(Entity::Score)]))
                })
                .await
                .unwrap();
            assert_eq!(out.hit, expected_hit);
            assert_eq!(out.data.as_slice(), b"[1,2,3]");
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        cache.invalidate([Tag::Table(Entity::Score)]);
        assert!(cache.get("leaderboard").is_none());
    }
}
