//! Storage ports for event and series aggregates.
//!
//! The core never talks to a database directly. It requires a keyed store that
//! supports optimistic, versioned saves; everything else about persistence is
//! owned by the implementation.
//!
//! # Optimistic concurrency
//!
//! [`AggregateStore::save`] takes the version the new state was computed from:
//!
//! - `Some(version)`: the stored aggregate must currently be at `version`
//! - `None`: the key must be free (creation)
//!
//! A mismatch fails with [`StoreError::VersionConflict`] (or
//! [`StoreError::AlreadyExists`] for a taken key) and leaves the store
//! untouched.
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` rather than using `async fn` so that
//! stores can be shared as `Arc<dyn EventStore>`.

use crate::error::StoreError;
use crate::key::{Slug, Version};
use crate::model::{Event, EventSeries};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// An aggregate addressed by slug and guarded by a version.
pub trait Aggregate: Clone + Send + Sync + 'static {
    /// Human-readable kind, used in logs and error messages.
    const KIND: &'static str;

    /// Unique key.
    fn slug(&self) -> &Slug;

    /// Current version.
    fn version(&self) -> Version;
}

impl Aggregate for Event {
    const KIND: &'static str = "event";

    fn slug(&self) -> &Slug {
        &self.slug
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Aggregate for EventSeries {
    const KIND: &'static str = "series";

    fn slug(&self) -> &Slug {
        &self.slug
    }

    fn version(&self) -> Version {
        self.version
    }
}

/// Keyed store with optimistic, versioned writes.
///
/// Implementations must be `Send + Sync`; the coordinator and scheduler share
/// one store across tasks.
pub trait AggregateStore<A: Aggregate>: Send + Sync {
    /// Load an aggregate, `None` if nothing is stored under `slug`.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage backend failed
    fn load(&self, slug: Slug) -> StoreFuture<'_, Option<A>>;

    /// Replace the aggregate under its slug if the stored version still equals
    /// `expected` (or, for `None`, if the slug is free).
    ///
    /// # Errors
    ///
    /// - `VersionConflict`: stored version differs from `expected`
    /// - `AlreadyExists`: `expected` is `None` and the slug is taken
    /// - `Backend`: the storage backend failed
    fn save(&self, aggregate: A, expected: Option<Version>) -> StoreFuture<'_, ()>;

    /// Whether anything is stored under `slug`.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage backend failed
    fn exists(&self, slug: Slug) -> StoreFuture<'_, bool>;

    /// Remove the aggregate if it is still at `expected`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: nothing stored under `slug`
    /// - `VersionConflict`: stored version differs from `expected`
    /// - `Backend`: the storage backend failed
    fn delete(&self, slug: Slug, expected: Version) -> StoreFuture<'_, ()>;
}

/// Event storage with series queries.
pub trait EventStore: AggregateStore<Event> {
    /// All events generated for `series`. Soft-deleted events are only
    /// included when `include_deleted` is set.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage backend failed
    fn list_by_series(&self, series: Slug, include_deleted: bool) -> StoreFuture<'_, Vec<Event>>;
}

/// Series storage.
pub trait SeriesStore: AggregateStore<EventSeries> {
    /// Every stored series.
    ///
    /// # Errors
    ///
    /// - `Backend`: the storage backend failed
    fn list_series(&self) -> StoreFuture<'_, Vec<EventSeries>>;
}
