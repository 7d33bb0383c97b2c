//! In-memory aggregate storage for fast, deterministic tests.
//!
//! [`InMemoryStore`] honours the optimistic concurrency contract of
//! [`AggregateStore`] and adds hooks that let a test provoke the races the
//! coordinator has to survive:
//!
//! - [`InMemoryStore::inject_conflicts`]: the next N versioned writes fail
//! - [`InMemoryStore::interleave`]: a foreign write lands right before the next save
//! - [`InMemoryStore::fail_next`]: the next operation fails with a backend error

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a panicking test

use attendance_core::error::StoreError;
use attendance_core::key::{Slug, Version};
use attendance_core::model::{Event, EventSeries};
use attendance_core::store::{Aggregate, AggregateStore, EventStore, SeriesStore, StoreFuture};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Foreign write applied to the stored aggregate before a save.
type Interleaved<A> = Box<dyn FnOnce(&mut A) + Send>;

struct Inner<A> {
    data: BTreeMap<Slug, A>,
    injected_conflicts: usize,
    interleaved: Vec<Interleaved<A>>,
    backend_failure: Option<String>,
    saves: usize,
    rejected: usize,
}

/// In-memory store keyed by slug.
///
/// Clones share the same data, so a test can keep a handle while the code
/// under test owns another.
///
/// # Example
///
/// ```
/// use attendance_testing::{InMemoryEventStore, helpers};
/// use attendance_core::store::AggregateStore;
///
/// # async fn example() -> Result<(), attendance_core::StoreError> {
/// let store = InMemoryEventStore::new();
/// let event = helpers::event("pottery", 2);
///
/// store.save(event.clone(), None).await?;
/// assert!(store.exists(event.slug.clone()).await?);
/// assert!(store.save(event, None).await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct InMemoryStore<A> {
    inner: Arc<Mutex<Inner<A>>>,
}

/// In-memory [`EventStore`].
pub type InMemoryEventStore = InMemoryStore<Event>;

/// In-memory [`SeriesStore`].
pub type InMemorySeriesStore = InMemoryStore<EventSeries>;

impl<A> Clone for InMemoryStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for InMemoryStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("InMemoryStore")
            .field("len", &inner.data.len())
            .field("saves", &inner.saves)
            .field("rejected", &inner.rejected)
            .finish_non_exhaustive()
    }
}

impl<A: Aggregate> Default for InMemoryStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> InMemoryStore<A> {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data: BTreeMap::new(),
                injected_conflicts: 0,
                interleaved: Vec::new(),
                backend_failure: None,
                saves: 0,
                rejected: 0,
            })),
        }
    }

    /// Create a store seeded with `aggregates`, bypassing version checks.
    #[must_use]
    pub fn with(aggregates: impl IntoIterator<Item = A>) -> Self {
        let store = Self::new();
        for aggregate in aggregates {
            store.insert(aggregate);
        }
        store
    }

    /// Put an aggregate in place as-is, bypassing version checks.
    pub fn insert(&self, aggregate: A) {
        self.lock().data.insert(aggregate.slug().clone(), aggregate);
    }

    /// Read an aggregate without going through the port.
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<A> {
        self.lock().data.get(&Slug::new(slug)).cloned()
    }

    /// Every stored aggregate, ordered by slug.
    #[must_use]
    pub fn all(&self) -> Vec<A> {
        self.lock().data.values().cloned().collect()
    }

    /// Number of stored aggregates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    /// Successful writes (saves and deletes).
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Writes rejected with a version conflict.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.lock().rejected
    }

    /// Make the next `count` versioned writes fail with a version conflict,
    /// leaving the stored data untouched.
    pub fn inject_conflicts(&self, count: usize) {
        self.lock().injected_conflicts = count;
    }

    /// Run `write` against the stored aggregate right before the next
    /// versioned write, as if another writer won the race. The stored version
    /// ends up exactly one above what it was, whatever `write` did to it.
    pub fn interleave(&self, write: impl FnOnce(&mut A) + Send + 'static) {
        self.lock().interleaved.push(Box::new(write));
    }

    /// Make the next operation fail with [`StoreError::Backend`].
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.lock().backend_failure = Some(reason.into());
    }

    fn lock(&self) -> MutexGuard<'_, Inner<A>> {
        self.inner.lock().unwrap()
    }
}

impl<A> Inner<A>
where
    A: Aggregate + Versioned,
{
    fn take_backend_failure(&mut self) -> Result<(), StoreError> {
        self.backend_failure.take().map_or(Ok(()), |reason| Err(StoreError::Backend(reason)))
    }

    /// Apply pending interference and check `expected` against what is stored.
    fn check_version(&mut self, slug: &Slug, expected: Version) -> Result<(), StoreError> {
        if !self.interleaved.is_empty() {
            let writes = std::mem::take(&mut self.interleaved);
            if let Some(stored) = self.data.get_mut(slug) {
                for write in writes {
                    let next = stored.version().next();
                    write(stored);
                    stored.set_version(next);
                }
            }
        }

        let actual = self.data.get(slug).map(Aggregate::version);
        if self.injected_conflicts > 0 || actual != Some(expected) {
            self.injected_conflicts = self.injected_conflicts.saturating_sub(1);
            self.rejected += 1;
            return Err(StoreError::VersionConflict {
                slug: slug.clone(),
                expected: Some(expected),
                actual,
            });
        }
        Ok(())
    }
}

/// Lets the store advance versions for interleaved writes.
pub trait Versioned {
    /// Overwrite the version.
    fn set_version(&mut self, version: Version);
}

impl Versioned for Event {
    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

impl Versioned for EventSeries {
    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

impl<A> AggregateStore<A> for InMemoryStore<A>
where
    A: Aggregate + Versioned,
{
    fn load(&self, slug: Slug) -> StoreFuture<'_, Option<A>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.take_backend_failure()?;
            Ok(inner.data.get(&slug).cloned())
        })
    }

    fn save(&self, aggregate: A, expected: Option<Version>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.take_backend_failure()?;
            let slug = aggregate.slug().clone();

            match expected {
                None if inner.data.contains_key(&slug) => {
                    return Err(StoreError::AlreadyExists(slug));
                }
                None => {}
                Some(expected) => inner.check_version(&slug, expected)?,
            }

            inner.data.insert(slug, aggregate);
            inner.saves += 1;
            Ok(())
        })
    }

    fn exists(&self, slug: Slug) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.take_backend_failure()?;
            Ok(inner.data.contains_key(&slug))
        })
    }

    fn delete(&self, slug: Slug, expected: Version) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.take_backend_failure()?;
            if !inner.data.contains_key(&slug) {
                return Err(StoreError::NotFound(slug));
            }
            inner.check_version(&slug, expected)?;
            inner.data.remove(&slug);
            inner.saves += 1;
            Ok(())
        })
    }
}

impl EventStore for InMemoryEventStore {
    fn list_by_series(&self, series: Slug, include_deleted: bool) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.take_backend_failure()?;
            let mut events: Vec<Event> = inner
                .data
                .values()
                .filter(|event| event.series_slug.as_ref() == Some(&series))
                .filter(|event| include_deleted || !event.is_deleted())
                .cloned()
                .collect();
            events.sort_by_key(|event| event.event_date);
            Ok(events)
        })
    }
}

impl SeriesStore for InMemorySeriesStore {
    fn list_series(&self) -> StoreFuture<'_, Vec<EventSeries>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.take_backend_failure()?;
            Ok(inner.data.values().cloned().collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers;

    #[tokio::test]
    async fn save_requires_matching_version() {
        let store = InMemoryEventStore::new();
        let event = helpers::event("yoga", 2);
        store.save(event.clone(), None).await.unwrap();

        let mut next = event.clone();
        next.version = event.version.next();
        store.save(next.clone(), Some(event.version)).await.unwrap();

        let stale = store.save(next, Some(event.version)).await;
        assert!(matches!(stale, Err(StoreError::VersionConflict { .. })));
        assert_eq!(store.conflict_count(), 1);
        assert_eq!(store.get("yoga").unwrap().version, event.version.next());
    }

    #[tokio::test]
    async fn injected_conflicts_leave_data_untouched() {
        let event = helpers::event("yoga", 2);
        let store = InMemoryEventStore::with([event.clone()]);
        store.inject_conflicts(2);

        assert!(store.save(event.clone(), Some(event.version)).await.is_err());
        assert!(store.save(event.clone(), Some(event.version)).await.is_err());
        assert!(store.save(event.clone(), Some(event.version)).await.is_ok());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn interleaved_write_bumps_version() {
        let event = helpers::event("yoga", 2);
        let store = InMemoryEventStore::with([event.clone()]);
        store.interleave(|stored: &mut Event| stored.capacity = 9);

        let result = store.save(event.clone(), Some(event.version)).await;
        assert!(result.unwrap_err().is_version_conflict());

        let stored = store.get("yoga").unwrap();
        assert_eq!(stored.capacity, 9);
        assert_eq!(stored.version, event.version.next());
    }

    #[tokio::test]
    async fn backend_failure_is_one_shot() {
        let store = InMemorySeriesStore::new();
        store.fail_next("disk on fire");

        assert_eq!(
            store.list_series().await,
            Err(StoreError::Backend("disk on fire".to_string()))
        );
        assert_eq!(store.list_series().await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn list_by_series_filters_deleted() {
        let mut live = helpers::event("run-2025-01-08", 5);
        live.series_slug = Some(Slug::new("run"));
        let mut gone = helpers::event("run-2025-01-01", 5);
        gone.series_slug = Some(Slug::new("run"));
        gone.deleted_at = Some(gone.created_at);
        let other = helpers::event("standalone", 5);
        let store = InMemoryEventStore::with([live, gone, other]);

        assert_eq!(store.list_by_series(Slug::new("run"), false).await.unwrap().len(), 1);
        assert_eq!(store.list_by_series(Slug::new("run"), true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_checks_existence_and_version() {
        let event = helpers::event("yoga", 2);
        let store = InMemoryEventStore::with([event.clone()]);

        assert!(store.delete(Slug::new("nope"), event.version).await.is_err());
        assert!(store.delete(event.slug.clone(), event.version.next()).await.is_err());
        store.delete(event.slug.clone(), event.version).await.unwrap();
        assert!(store.is_empty());
    }
}
