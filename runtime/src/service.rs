//! Application facade over the attendance behavior.
//!
//! [`AttendanceService`] is what a command or API layer talks to. Every
//! mutation is a pure transition from `attendance_core`, driven through the
//! [`Coordinator`] so it is retried on version conflicts and notified only
//! once persisted.

use crate::config::Config;
use crate::coordinator::{Committed, Coordinator};
use crate::scheduler::RecurrenceScheduler;
use attendance_core::attendance::{self, CreateEvent, EventDetailsPatch};
use attendance_core::environment::{AdminPolicy, Clock};
use attendance_core::error::{AttendanceError, Result};
use attendance_core::key::{Email, Slug};
use attendance_core::model::{AttendeeStatus, Event, EventSeries, NewAttendee};
use attendance_core::series::{self, CreateSeries, SeriesPatch};
use attendance_core::store::{EventStore, SeriesStore};
use std::sync::Arc;
use std::time::Duration;

/// Entry point for event and series commands.
#[derive(Clone)]
pub struct AttendanceService {
    events: Arc<dyn EventStore>,
    series: Arc<dyn SeriesStore>,
    coordinator: Coordinator,
    clock: Arc<dyn Clock>,
    admin_policy: Arc<dyn AdminPolicy>,
}

impl std::fmt::Debug for AttendanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceService")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl AttendanceService {
    /// Wire the service to its collaborators.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore>,
        series: Arc<dyn SeriesStore>,
        coordinator: Coordinator,
        clock: Arc<dyn Clock>,
        admin_policy: Arc<dyn AdminPolicy>,
    ) -> Self {
        Self {
            events,
            series,
            coordinator,
            clock,
            admin_policy,
        }
    }

    /// A recurrence scheduler sharing this service's stores, coordinator and clock.
    #[must_use]
    pub fn scheduler(&self, period: Duration) -> RecurrenceScheduler {
        RecurrenceScheduler::new(
            Arc::clone(&self.events),
            Arc::clone(&self.series),
            self.coordinator.clone(),
            Arc::clone(&self.clock),
            period,
        )
    }

    /// The recurrence scheduler described by `config`, or `None` when
    /// `ATTENDANCE_SCHEDULER_ENABLED` turned it off.
    #[must_use]
    pub fn configured_scheduler(&self, config: &Config) -> Option<RecurrenceScheduler> {
        let period = config.scheduler_period()?;
        Some(self.scheduler(period))
    }

    /// Create a standalone or series event.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::BadRequest`] for invalid input
    /// - [`AttendanceError::Conflict`] if the slug is taken
    pub async fn create_event(&self, command: CreateEvent) -> Result<Committed<Event>> {
        if self.events.exists(command.slug.clone()).await? {
            return Err(AttendanceError::Conflict(format!("event {} already exists", command.slug)));
        }
        let transition = attendance::create_event(command, self.clock.now())?;
        self.coordinator.create(self.events.as_ref(), transition).await
    }

    /// Create a series. Its events are created separately; the first one
    /// becomes the template for generated occurrences.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::BadRequest`] for invalid settings
    /// - [`AttendanceError::Conflict`] if the slug is taken
    pub async fn create_series(&self, command: CreateSeries) -> Result<Committed<EventSeries>> {
        if self.series.exists(command.slug.clone()).await? {
            return Err(AttendanceError::Conflict(format!(
                "series {} already exists",
                command.slug
            )));
        }
        let transition = series::create_series(command, self.clock.now())?;
        self.coordinator.create(self.series.as_ref(), transition).await
    }

    /// Register `email` on the event and report the status it ends up with.
    ///
    /// Registering an email that is already present changes nothing and
    /// reports the existing status.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if the event does not exist or was deleted
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn add_attendee(
        &self,
        slug: &Slug,
        name: &str,
        email: Email,
    ) -> Result<Committed<Event, AttendeeStatus>> {
        // Minted once so every attempt registers the same attendee id.
        let request = NewAttendee::new(name, email);
        let now = self.clock.now();

        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                let transition = attendance::add_attendee(event, request.clone(), now)?;
                let status = transition
                    .state
                    .attendee(&request.email)
                    .map_or(AttendeeStatus::Waitlisted, |a| a.status);
                Ok((transition, status))
            })
            .await
    }

    /// Cancel a registration, promoting the earliest waitlisted attendee.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] for an unknown event or attendee
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn remove_attendee(&self, slug: &Slug, email: &Email) -> Result<Committed<Event>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                Ok((attendance::remove_attendee(event, email, now)?, ()))
            })
            .await
    }

    /// Change the capacity, promoting or demoting as needed.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::BadRequest`] if `capacity` is negative
    /// - [`AttendanceError::NotFound`] if the event does not exist
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn update_capacity(&self, slug: &Slug, capacity: i64) -> Result<Committed<Event>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                Ok((attendance::update_capacity(event, capacity, now)?, ()))
            })
            .await
    }

    /// Block an attendee from the event.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] for an unknown event or attendee
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn block_attendee(&self, slug: &Slug, email: &Email) -> Result<Committed<Event>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                Ok((attendance::block_attendee(event, email, now)?, ()))
            })
            .await
    }

    /// Grant admin rights on the event.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if the event does not exist
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn add_admin(&self, slug: &Slug, email: &Email) -> Result<Committed<Event>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                Ok((attendance::add_admin(event, email, now)?, ()))
            })
            .await
    }

    /// Revoke admin rights on the event.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::BadRequest`] when targeting the creator
    /// - [`AttendanceError::NotFound`] if the event does not exist
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn remove_admin(&self, slug: &Slug, email: &Email) -> Result<Committed<Event>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                Ok((attendance::remove_admin(event, email, now)?, ()))
            })
            .await
    }

    /// Edit date, location, description or cover image.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if the event does not exist
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn update_details(
        &self,
        slug: &Slug,
        patch: EventDetailsPatch,
    ) -> Result<Committed<Event>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                Ok((attendance::update_details(event, patch.clone(), now)?, ()))
            })
            .await
    }

    /// Soft-delete the event.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if the event does not exist or is already deleted
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn delete_event(&self, slug: &Slug) -> Result<Committed<Event>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.events.as_ref(), slug, |event: &Event| {
                Ok((attendance::delete_event(event, now)?, ()))
            })
            .await
    }

    /// Change series settings.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::BadRequest`] for inconsistent settings
    /// - [`AttendanceError::NotFound`] if the series does not exist
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn update_series(
        &self,
        slug: &Slug,
        patch: SeriesPatch,
    ) -> Result<Committed<EventSeries>> {
        let now = self.clock.now();
        self.coordinator
            .run(self.series.as_ref(), slug, |current: &EventSeries| {
                Ok((series::update_series(current, patch.clone(), now)?, ()))
            })
            .await
    }

    /// Remove the series. Events already generated for it are kept.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if the series does not exist
    /// - [`AttendanceError::Conflict`] if retries are exhausted
    pub async fn delete_series(&self, slug: &Slug) -> Result<Committed<EventSeries>> {
        let now = self.clock.now();
        self.coordinator
            .remove(self.series.as_ref(), slug, |current: &EventSeries| {
                Ok((series::delete_series(current, now)?, ()))
            })
            .await
    }

    /// Load a live event.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if it does not exist or was deleted
    pub async fn get_event(&self, slug: &Slug) -> Result<Event> {
        self.events
            .load(slug.clone())
            .await?
            .filter(|event| !event.is_deleted())
            .ok_or_else(|| AttendanceError::NotFound(format!("event {slug}")))
    }

    /// Load a series.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if it does not exist
    pub async fn get_series(&self, slug: &Slug) -> Result<EventSeries> {
        self.series
            .load(slug.clone())
            .await?
            .ok_or_else(|| AttendanceError::NotFound(format!("series {slug}")))
    }

    /// Whether `email` may administer `event`, as decided by the admin policy.
    #[must_use]
    pub fn is_admin(&self, event: &Event, email: &Email) -> bool {
        self.admin_policy.is_admin(event, email)
    }

    /// Load the event and reject callers that are not admins.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::NotFound`] if the event does not exist or was deleted
    /// - [`AttendanceError::Forbidden`] if `caller` is not an admin
    pub async fn authorize(&self, slug: &Slug, caller: &Email) -> Result<Event> {
        let event = self.get_event(slug).await?;
        if self.is_admin(&event, caller) {
            Ok(event)
        } else {
            Err(AttendanceError::Forbidden(format!("{caller} is not an admin of {slug}")))
        }
    }
}
