//! Client-side mirror of an event, kept in sync by applying delta batches.
//!
//! This is the reference consumer of the delta contract: stale or duplicate
//! batches are ignored by version, and a batch is validated in full before any
//! of it is applied.

use crate::delta::{Change, Delta};
use crate::key::{Email, Slug, Version};
use crate::model::{Attendee, AttendeeStatus, Event};
use thiserror::Error;

/// Why a batch could not be applied. The mirror is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// The batch targets a different aggregate.
    #[error("Delta targets {found}, mirror tracks {expected}")]
    WrongTarget {
        /// Slug of the mirrored event
        expected: Slug,
        /// Slug found in the batch
        found: Slug,
    },

    /// Deltas of one batch must share a version.
    #[error("Batch mixes versions {first} and {other}")]
    MixedVersions {
        /// Version of the first delta
        first: Version,
        /// Conflicting version
        other: Version,
    },

    /// A delta refers to an attendee the mirror does not know.
    #[error("Unknown attendee {0}")]
    UnknownAttendee(Email),

    /// A delta adds an attendee the mirror already has.
    #[error("Attendee {0} already present")]
    DuplicateAttendee(Email),

    /// A delta kind that cannot be applied to an existing event.
    #[error("{0} cannot be applied to an event mirror")]
    Unsupported(&'static str),
}

/// Result of offering a batch to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was applied; the mirror is now at this version.
    Applied(Version),
    /// The batch was not newer than the mirror and was ignored.
    Stale,
}

/// Local copy of an event, advanced by delta batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMirror {
    event: Event,
}

impl EventMirror {
    /// Start mirroring from a snapshot.
    #[must_use]
    pub const fn new(snapshot: Event) -> Self {
        Self { event: snapshot }
    }

    /// Current mirrored state.
    #[must_use]
    pub const fn event(&self) -> &Event {
        &self.event
    }

    /// Version of the last applied batch (or the snapshot).
    #[must_use]
    pub const fn last_seen(&self) -> Version {
        self.event.version
    }

    /// Apply one batch atomically.
    ///
    /// # Errors
    ///
    /// Returns a [`MirrorError`] if the batch is malformed or inconsistent with
    /// the mirrored state; nothing is applied in that case.
    pub fn apply(&mut self, batch: &[Delta]) -> Result<BatchOutcome, MirrorError> {
        let Some(first) = batch.first() else {
            return Ok(BatchOutcome::Stale);
        };

        for delta in batch {
            if delta.target_slug != self.event.slug {
                return Err(MirrorError::WrongTarget {
                    expected: self.event.slug.clone(),
                    found: delta.target_slug.clone(),
                });
            }
            if delta.version != first.version {
                return Err(MirrorError::MixedVersions {
                    first: first.version,
                    other: delta.version,
                });
            }
        }

        if first.version <= self.event.version {
            return Ok(BatchOutcome::Stale);
        }

        let mut next = self.event.clone();
        for delta in batch {
            apply_change(&mut next, delta)?;
        }
        next.version = first.version;
        next.updated_at = first.timestamp;

        self.event = next;
        Ok(BatchOutcome::Applied(first.version))
    }
}

fn apply_change(event: &mut Event, delta: &Delta) -> Result<(), MirrorError> {
    match &delta.change {
        Change::EventCapacityUpdated { new_capacity, .. } => event.capacity = *new_capacity,
        Change::EventDeleted => event.deleted_at = Some(delta.timestamp),
        Change::AttendeeAdded { attendee, status } => {
            if event.attendee(&attendee.email).is_some() {
                return Err(MirrorError::DuplicateAttendee(attendee.email.clone()));
            }
            event.attendees.push(Attendee {
                id: attendee.id,
                name: attendee.name.clone(),
                email: attendee.email.clone(),
                status: *status,
                joined_at: attendee.joined_at,
            });
        }
        Change::AttendeeRemoved { email } => {
            let before = event.attendees.len();
            event.attendees.retain(|a| &a.email != email);
            if event.attendees.len() == before {
                return Err(MirrorError::UnknownAttendee(email.clone()));
            }
        }
        Change::AttendeeStatusChanged {
            email, new_status, ..
        } => set_status(event, email, *new_status)?,
        Change::AdminAdded { email } => {
            event.admins.insert(email.clone());
        }
        Change::AdminRemoved { email } => {
            event.admins.remove(email);
        }
        Change::EventDateTimeUpdated {
            event_date,
            timezone,
        } => {
            event.event_date = *event_date;
            event.timezone.clone_from(timezone);
        }
        Change::EventLocationUpdated { location } => event.location.clone_from(location),
        Change::EventDescriptionUpdated { description } => {
            event.description.clone_from(description);
        }
        Change::EventCoverImageUpdated { cover_image_url } => {
            event.cover_image_url.clone_from(cover_image_url);
        }
        change @ (Change::EventCreated { .. }
        | Change::SeriesCreated { .. }
        | Change::SeriesUpdated { .. }
        | Change::SeriesDeleted) => return Err(MirrorError::Unsupported(change.type_name())),
    }
    Ok(())
}

fn set_status(event: &mut Event, email: &Email, status: AttendeeStatus) -> Result<(), MirrorError> {
    let attendee = event
        .attendees
        .iter_mut()
        .find(|a| &a.email == email)
        .ok_or_else(|| MirrorError::UnknownAttendee(email.clone()))?;
    attendee.status = status;
    Ok(())
}
