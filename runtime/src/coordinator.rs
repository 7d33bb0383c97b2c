//! Optimistic concurrency coordinator.
//!
//! Every read-modify-write of an aggregate goes through [`Coordinator`]:
//!
//! 1. load the current state by slug
//! 2. run the caller's pure transform on it
//! 3. persist the candidate with a version check
//! 4. on a version conflict, start over (bounded by the [`Backoff`] policy)
//! 5. after a confirmed write, hand the delta batch to the [`Notifier`]
//!
//! There is no locking. Deltas reach the notifier only for writes that were
//! actually persisted, so subscribers never see a change that later lost a race.

use crate::metrics::{NOTIFY_FAILURES_TOTAL, RETRY_EXHAUSTED_TOTAL, WRITE_CONFLICTS_TOTAL, counter};
use crate::retry::{Backoff, RetryPolicy, retry_with_predicate};
use attendance_core::attendance::Transition;
use attendance_core::delta::DeltaBatch;
use attendance_core::environment::Notifier;
use attendance_core::error::{AttendanceError, Result, StoreError};
use attendance_core::key::Slug;
use attendance_core::store::{Aggregate, AggregateStore};
use std::sync::Arc;

/// Outcome of a coordinated write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<A, R = ()> {
    /// State as persisted (or the loaded state if nothing changed)
    pub state: A,
    /// Deltas of the transition, already forwarded to the notifier if `changed`
    pub deltas: DeltaBatch,
    /// Whether a write happened
    pub changed: bool,
    /// Caller-defined result of the transform
    pub result: R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    Save,
    Delete,
}

/// Runs transforms against a store with optimistic retries.
#[derive(Clone)]
pub struct Coordinator {
    notifier: Arc<dyn Notifier>,
    backoff: Arc<dyn Backoff>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("max_attempts", &self.backoff.max_attempts())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Create a coordinator with the default [`RetryPolicy`].
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_backoff(notifier, Arc::new(RetryPolicy::default()))
    }

    /// Create a coordinator with an explicit backoff policy.
    #[must_use]
    pub fn with_backoff(notifier: Arc<dyn Notifier>, backoff: Arc<dyn Backoff>) -> Self {
        Self { notifier, backoff }
    }

    /// Load `slug`, apply `transform` and persist the result.
    ///
    /// `transform` may run once per attempt and must not have side effects.
    /// Unchanged transitions are returned without writing or notifying.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if nothing is stored under `slug`
    /// - [`AttendanceError::Conflict`] if every attempt lost a version race
    /// - any error returned by `transform`, unchanged and without retry
    /// - [`AttendanceError::Store`] for backend failures
    #[tracing::instrument(
        skip(self, store, transform),
        fields(kind = A::KIND),
        name = "coordinator_run"
    )]
    pub async fn run<A, S, F, R>(
        &self,
        store: &S,
        slug: &Slug,
        transform: F,
    ) -> Result<Committed<A, R>>
    where
        A: Aggregate,
        S: AggregateStore<A> + ?Sized,
        F: Fn(&A) -> Result<(Transition<A>, R)>,
    {
        self.execute(store, slug, &transform, Persist::Save).await
    }

    /// Like [`Coordinator::run`], but the winning candidate is removed from
    /// the store with a versioned delete instead of being saved.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::run`].
    #[tracing::instrument(
        skip(self, store, transform),
        fields(kind = A::KIND),
        name = "coordinator_remove"
    )]
    pub async fn remove<A, S, F, R>(
        &self,
        store: &S,
        slug: &Slug,
        transform: F,
    ) -> Result<Committed<A, R>>
    where
        A: Aggregate,
        S: AggregateStore<A> + ?Sized,
        F: Fn(&A) -> Result<(Transition<A>, R)>,
    {
        self.execute(store, slug, &transform, Persist::Delete).await
    }

    /// Persist a freshly created aggregate; the slug must be free.
    ///
    /// Not retried: a taken slug means someone else created it first.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::Conflict`] if the slug is already taken
    /// - [`AttendanceError::Store`] for backend failures
    #[tracing::instrument(
        skip(self, store, transition),
        fields(kind = A::KIND, slug = %transition.state.slug()),
        name = "coordinator_create"
    )]
    pub async fn create<A, S>(&self, store: &S, transition: Transition<A>) -> Result<Committed<A>>
    where
        A: Aggregate,
        S: AggregateStore<A> + ?Sized,
    {
        let slug = transition.state.slug().clone();
        match store.save(transition.state.clone(), None).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_) | StoreError::VersionConflict { .. }) => {
                tracing::debug!("Slug already taken");
                return Err(AttendanceError::Conflict(format!("{} {slug} already exists", A::KIND)));
            }
            Err(error) => return Err(error.into()),
        }

        tracing::debug!(deltas = transition.deltas.len(), "Created");
        self.publish(&slug, &transition.deltas).await;

        Ok(Committed {
            state: transition.state,
            deltas: transition.deltas,
            changed: true,
            result: (),
        })
    }

    async fn execute<A, S, F, R>(
        &self,
        store: &S,
        slug: &Slug,
        transform: &F,
        persist: Persist,
    ) -> Result<Committed<A, R>>
    where
        A: Aggregate,
        S: AggregateStore<A> + ?Sized,
        F: Fn(&A) -> Result<(Transition<A>, R)>,
    {
        let outcome = retry_with_predicate(
            self.backoff.as_ref(),
            move || async move { attempt(store, slug, transform, persist).await },
            is_version_conflict,
        )
        .await;

        match outcome {
            Ok(committed) => {
                if committed.changed {
                    self.publish(slug, &committed.deltas).await;
                }
                Ok(committed)
            }
            Err(error) if is_version_conflict(&error) => {
                counter!(RETRY_EXHAUSTED_TOTAL, "kind" => A::KIND).increment(1);
                tracing::warn!(
                    attempts = self.backoff.max_attempts(),
                    "Giving up after repeated version conflicts"
                );
                Err(AttendanceError::Conflict(format!(
                    "{} {slug} was modified concurrently, please retry",
                    A::KIND
                )))
            }
            Err(error) => Err(error),
        }
    }

    async fn publish(&self, slug: &Slug, deltas: &DeltaBatch) {
        if deltas.is_empty() {
            return;
        }
        if let Err(error) = self.notifier.notify(slug.clone(), deltas.clone()).await {
            counter!(NOTIFY_FAILURES_TOTAL).increment(1);
            tracing::warn!(slug = %slug, error = %error, "Failed to forward deltas after write");
        }
    }
}

async fn attempt<A, S, F, R>(
    store: &S,
    slug: &Slug,
    transform: &F,
    persist: Persist,
) -> Result<Committed<A, R>>
where
    A: Aggregate,
    S: AggregateStore<A> + ?Sized,
    F: Fn(&A) -> Result<(Transition<A>, R)>,
{
    let current = store
        .load(slug.clone())
        .await?
        .ok_or_else(|| AttendanceError::NotFound(format!("{} {slug}", A::KIND)))?;

    let (transition, result) = transform(&current)?;
    if !transition.changed {
        return Ok(Committed {
            state: transition.state,
            deltas: transition.deltas,
            changed: false,
            result,
        });
    }

    let expected = current.version();
    let write = match persist {
        Persist::Save => store.save(transition.state.clone(), Some(expected)).await,
        Persist::Delete => store.delete(slug.clone(), expected).await,
    };

    match write {
        Ok(()) => Ok(Committed {
            state: transition.state,
            deltas: transition.deltas,
            changed: true,
            result,
        }),
        Err(error @ StoreError::VersionConflict { .. }) => {
            counter!(WRITE_CONFLICTS_TOTAL, "kind" => A::KIND).increment(1);
            tracing::debug!(expected = %expected, error = %error, "Write lost a version race");
            Err(error.into())
        }
        Err(StoreError::NotFound(_)) => {
            Err(AttendanceError::NotFound(format!("{} {slug}", A::KIND)))
        }
        Err(error) => Err(error.into()),
    }
}

fn is_version_conflict(error: &AttendanceError) -> bool {
    matches!(error, AttendanceError::Store(store) if store.is_version_conflict())
}
