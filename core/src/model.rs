//! Event and series aggregates.
//!
//! An [`Event`] keeps a single ordered list of [`Attendee`] records, each tagged
//! with a status. Confirmed and waitlisted attendees are derived views over that
//! list, ordered by join time. Aggregates are only ever replaced as a whole;
//! the functions in [`crate::attendance`] and [`crate::series`] compute the
//! replacement.

use crate::error::{AttendanceError, Result};
use crate::key::{AttendeeId, Email, Slug, Version};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Attendees
// ============================================================================

/// Registration status of an attendee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendeeStatus {
    /// Holds one of the event's seats
    Confirmed,
    /// Queued for a seat, promoted in join order
    Waitlisted,
    /// Barred from the event; never holds a seat and cannot re-join
    Blocked,
}

impl fmt::Display for AttendeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Waitlisted => write!(f, "WAITLISTED"),
            Self::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// A person registered for one event. Owned by that event only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    /// Attendee record id
    pub id: AttendeeId,
    /// Display name
    pub name: String,
    /// Normalized email, unique within the event
    pub email: Email,
    /// Current status
    pub status: AttendeeStatus,
    /// When the attendee first joined
    pub joined_at: DateTime<Utc>,
}

/// A join request, built once by the caller so that retried transforms
/// produce the same attendee record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAttendee {
    /// Id the attendee receives if added
    pub id: AttendeeId,
    /// Display name
    pub name: String,
    /// Normalized email
    pub email: Email,
}

impl NewAttendee {
    /// Create a join request with a fresh attendee id.
    #[must_use]
    pub fn new(name: impl Into<String>, email: Email) -> Self {
        Self {
            id: AttendeeId::new(),
            name: name.into(),
            email,
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// One dated, capacity-limited event instance.
///
/// # Invariants
///
/// - confirmed attendees never outnumber `capacity`
/// - an email appears at most once in `attendees`
/// - `version` strictly increases on every persisted mutation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique key
    pub slug: Slug,
    /// Title
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Where the event takes place
    pub location: Option<String>,
    /// Cover image reference, managed by the image collaborator
    pub cover_image_url: Option<String>,
    /// Start of the event
    pub event_date: DateTime<Utc>,
    /// IANA timezone name the event is presented in
    pub timezone: String,
    /// Maximum number of confirmed attendees
    pub capacity: u32,
    /// All attendees in join order
    pub attendees: Vec<Attendee>,
    /// Creator, always an admin
    pub creator_email: Email,
    /// Additional admins
    pub admins: BTreeSet<Email>,
    /// Series this event was generated from, if any
    pub series_slug: Option<Slug>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version
    pub version: Version,
}

impl Event {
    /// Confirmed attendees, earliest join first.
    #[must_use]
    pub fn confirmed(&self) -> Vec<&Attendee> {
        self.with_status(AttendeeStatus::Confirmed)
    }

    /// Waitlisted attendees, earliest join first.
    #[must_use]
    pub fn waitlisted(&self) -> Vec<&Attendee> {
        self.with_status(AttendeeStatus::Waitlisted)
    }

    /// Blocked attendees, earliest join first.
    #[must_use]
    pub fn blocked(&self) -> Vec<&Attendee> {
        self.with_status(AttendeeStatus::Blocked)
    }

    /// Number of confirmed attendees.
    #[must_use]
    pub fn confirmed_count(&self) -> usize {
        self.count(AttendeeStatus::Confirmed)
    }

    /// Number of waitlisted attendees.
    #[must_use]
    pub fn waitlist_len(&self) -> usize {
        self.count(AttendeeStatus::Waitlisted)
    }

    /// Seats still open for confirmation.
    #[must_use]
    pub fn vacancies(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.confirmed_count())
    }

    /// Look up an attendee by normalized email.
    #[must_use]
    pub fn attendee(&self, email: &Email) -> Option<&Attendee> {
        self.attendees.iter().find(|a| &a.email == email)
    }

    /// Whether the event has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn count(&self, status: AttendeeStatus) -> usize {
        self.attendees.iter().filter(|a| a.status == status).count()
    }

    // Stable sort keeps list order for equal join times.
    fn with_status(&self, status: AttendeeStatus) -> Vec<&Attendee> {
        let mut selected: Vec<&Attendee> = self
            .attendees
            .iter()
            .filter(|a| a.status == status)
            .collect();
        selected.sort_by_key(|a| a.joined_at);
        selected
    }
}

// ============================================================================
// Series
// ============================================================================

/// Calendar unit a series recurs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceUnit {
    /// Fixed number of days
    Days,
    /// Fixed number of weeks
    Weeks,
    /// Calendar months, clamped to month end
    Months,
}

/// How far apart consecutive occurrences of a series are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceInterval {
    /// Unit of the step
    pub unit: RecurrenceUnit,
    /// Number of units per step, at least 1
    pub every: u32,
}

impl RecurrenceInterval {
    /// Every `n` days.
    #[must_use]
    pub const fn days(every: u32) -> Self {
        Self { unit: RecurrenceUnit::Days, every }
    }

    /// Every `n` weeks.
    #[must_use]
    pub const fn weeks(every: u32) -> Self {
        Self { unit: RecurrenceUnit::Weeks, every }
    }

    /// Every `n` calendar months.
    #[must_use]
    pub const fn months(every: u32) -> Self {
        Self { unit: RecurrenceUnit::Months, every }
    }

    /// The occurrence following `from`, or `None` on calendar overflow.
    ///
    /// ```
    /// use attendance_core::model::RecurrenceInterval;
    /// use chrono::{TimeZone, Utc};
    ///
    /// let jan_31 = Utc.with_ymd_and_hms(2025, 1, 31, 18, 0, 0).unwrap();
    /// let next = RecurrenceInterval::months(1).advance(jan_31).unwrap();
    /// assert_eq!(next, Utc.with_ymd_and_hms(2025, 2, 28, 18, 0, 0).unwrap());
    /// ```
    #[must_use]
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.unit {
            RecurrenceUnit::Days => from.checked_add_signed(Duration::days(i64::from(self.every))),
            RecurrenceUnit::Weeks => {
                from.checked_add_signed(Duration::weeks(i64::from(self.every)))
            }
            RecurrenceUnit::Months => from.checked_add_months(Months::new(self.every)),
        }
    }
}

/// Longest generation horizon a series may ask for, in weeks.
pub const MAX_LEAD_WEEKS: u32 = 104;

/// Recurrence template from which dated events are generated.
///
/// A series without an `interval` is a one-off and is never touched by the
/// recurrence scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSeries {
    /// Unique key, also the prefix of generated event slugs
    pub slug: Slug,
    /// Title
    pub name: String,
    /// Step between occurrences
    pub interval: Option<RecurrenceInterval>,
    /// How many weeks ahead occurrences are kept generated
    pub lead_weeks: u32,
    /// Whether the scheduler generates occurrences
    pub auto_generate: bool,
    /// No occurrences are generated after this instant
    pub end_date: Option<DateTime<Utc>>,
    /// Creator, always an admin
    pub creator_email: Email,
    /// Additional admins
    pub admins: BTreeSet<Email>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version
    pub version: Version,
}

impl EventSeries {
    /// Whether the scheduler should generate occurrences for this series at `now`.
    #[must_use]
    pub fn generates_at(&self, now: DateTime<Utc>) -> bool {
        self.auto_generate
            && self.interval.is_some()
            && self.end_date.is_none_or(|end| end > now)
    }

    /// The instant up to which occurrences must exist: `now + lead_weeks`.
    ///
    /// # Errors
    ///
    /// - [`AttendanceError::BadRequest`] if `lead_weeks` exceeds [`MAX_LEAD_WEEKS`]
    ///   or the horizon is past the calendar range
    pub fn coverage_end(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Some(self.lead_weeks)
            .filter(|weeks| *weeks <= MAX_LEAD_WEEKS)
            .and_then(|weeks| Duration::try_weeks(i64::from(weeks)))
            .and_then(|lead| now.checked_add_signed(lead))
            .ok_or_else(|| {
                AttendanceError::BadRequest(format!(
                    "series {} cannot look {} weeks ahead",
                    self.slug, self.lead_weeks
                ))
            })
    }
}
