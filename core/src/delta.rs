//! Versioned change records emitted by attendance and series operations.
//!
//! A [`Delta`] describes one observed change to one aggregate. Every delta
//! produced by a single operation shares the version the aggregate was
//! persisted under, and the batch is delivered to subscribers as a unit.
//!
//! # Wire format
//!
//! Subscribers outside this crate depend on the JSON shape, so field names and
//! type tags are fixed:
//!
//! ```json
//! {
//!   "version": 7,
//!   "timestamp": "2025-05-01T10:00:00Z",
//!   "targetSlug": "tuesday-run-2025-05-06",
//!   "type": "AttendeeStatusChanged",
//!   "email": "ada@example.com",
//!   "oldStatus": "WAITLISTED",
//!   "newStatus": "CONFIRMED"
//! }
//! ```
//!
//! # Consumer contract
//!
//! - Discard a batch whose version is not newer than the last version seen.
//! - Apply a batch in the order produced, all or nothing.
//!
//! [`EventMirror`](crate::mirror::EventMirror) is a reference consumer.

use crate::key::{AttendeeId, Email, Slug, Version};
use crate::model::{Attendee, AttendeeStatus, RecurrenceInterval};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Ordered batch of deltas produced by one operation.
pub type DeltaBatch = SmallVec<[Delta; 4]>;

/// One immutable change record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// Version of the aggregate the change was persisted under
    pub version: Version,
    /// When the change was produced
    pub timestamp: DateTime<Utc>,
    /// Slug of the changed event or series
    pub target_slug: Slug,
    /// What changed
    #[serde(flatten)]
    pub change: Change,
}

/// Attendee fields carried by [`Change::AttendeeAdded`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeSnapshot {
    /// Attendee record id
    pub id: AttendeeId,
    /// Display name
    pub name: String,
    /// Normalized email
    pub email: Email,
    /// Join time
    pub joined_at: DateTime<Utc>,
}

impl From<&Attendee> for AttendeeSnapshot {
    fn from(attendee: &Attendee) -> Self {
        Self {
            id: attendee.id,
            name: attendee.name.clone(),
            email: attendee.email.clone(),
            joined_at: attendee.joined_at,
        }
    }
}

/// Closed set of change kinds. The variant name is the wire `type` tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum Change {
    EventCreated {
        name: String,
        event_date: DateTime<Utc>,
        timezone: String,
        capacity: u32,
        series_slug: Option<Slug>,
        creator_email: Email,
    },
    EventCapacityUpdated {
        old_capacity: u32,
        new_capacity: u32,
    },
    EventDeleted,
    AttendeeAdded {
        attendee: AttendeeSnapshot,
        status: AttendeeStatus,
    },
    AttendeeRemoved {
        email: Email,
    },
    AttendeeStatusChanged {
        email: Email,
        old_status: AttendeeStatus,
        new_status: AttendeeStatus,
    },
    AdminAdded {
        email: Email,
    },
    AdminRemoved {
        email: Email,
    },
    EventDateTimeUpdated {
        event_date: DateTime<Utc>,
        timezone: String,
    },
    EventLocationUpdated {
        location: Option<String>,
    },
    EventDescriptionUpdated {
        description: Option<String>,
    },
    EventCoverImageUpdated {
        cover_image_url: Option<String>,
    },
    SeriesCreated {
        interval: Option<RecurrenceInterval>,
        lead_weeks: u32,
        auto_generate: bool,
        end_date: Option<DateTime<Utc>>,
    },
    SeriesUpdated {
        interval: Option<RecurrenceInterval>,
        lead_weeks: u32,
        auto_generate: bool,
        end_date: Option<DateTime<Utc>>,
    },
    SeriesDeleted,
}

impl Change {
    /// Wire `type` tag of this change.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "EventCreated",
            Self::EventCapacityUpdated { .. } => "EventCapacityUpdated",
            Self::EventDeleted => "EventDeleted",
            Self::AttendeeAdded { .. } => "AttendeeAdded",
            Self::AttendeeRemoved { .. } => "AttendeeRemoved",
            Self::AttendeeStatusChanged { .. } => "AttendeeStatusChanged",
            Self::AdminAdded { .. } => "AdminAdded",
            Self::AdminRemoved { .. } => "AdminRemoved",
            Self::EventDateTimeUpdated { .. } => "EventDateTimeUpdated",
            Self::EventLocationUpdated { .. } => "EventLocationUpdated",
            Self::EventDescriptionUpdated { .. } => "EventDescriptionUpdated",
            Self::EventCoverImageUpdated { .. } => "EventCoverImageUpdated",
            Self::SeriesCreated { .. } => "SeriesCreated",
            Self::SeriesUpdated { .. } => "SeriesUpdated",
            Self::SeriesDeleted => "SeriesDeleted",
        }
    }
}

/// Stamps changes with the version, time and target of one operation.
#[derive(Clone, Debug)]
pub struct DeltaStamp {
    version: Version,
    timestamp: DateTime<Utc>,
    target_slug: Slug,
}

impl DeltaStamp {
    /// Stamp for changes persisted under `version` at `timestamp`.
    #[must_use]
    pub const fn new(target_slug: Slug, version: Version, timestamp: DateTime<Utc>) -> Self {
        Self {
            version,
            timestamp,
            target_slug,
        }
    }

    /// Build a delta for `change`.
    #[must_use]
    pub fn delta(&self, change: Change) -> Delta {
        Delta {
            version: self.version,
            timestamp: self.timestamp,
            target_slug: self.target_slug.clone(),
            change,
        }
    }
}
