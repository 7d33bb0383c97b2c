//! Attendance behavior: pure state transitions over an [`Event`].
//!
//! Every operation takes the current event by reference and returns a
//! [`Transition`] holding the replacement event and the ordered deltas the
//! change produced. Nothing here performs I/O, so the coordinator may invoke
//! an operation more than once while resolving write conflicts.
//!
//! # Seat allocation
//!
//! - Joining confirms while seats are free, otherwise appends to the waitlist.
//! - A vacated seat goes to the **earliest-joined** waitlisted attendee.
//! - A capacity decrease demotes the **most recently joined** confirmed
//!   attendees, protecting long-standing confirmations.
//!
//! # Versioning
//!
//! A changed event carries `version + 1` and `updated_at = now`, and every
//! delta in the batch is stamped with that version. Unchanged results keep the
//! current version and are not persisted.

use crate::delta::{AttendeeSnapshot, Change, DeltaBatch, DeltaStamp};
use crate::error::{AttendanceError, Result};
use crate::key::{Email, Slug, Version};
use crate::model::{Attendee, AttendeeStatus, Event, NewAttendee};
use chrono::{DateTime, Utc};
use smallvec::smallvec;
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Result of applying an operation to an aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition<A> {
    /// The replacement aggregate
    pub state: A,
    /// Ordered deltas describing the change
    pub deltas: DeltaBatch,
    /// Whether `state` differs from the input and must be persisted
    pub changed: bool,
}

impl<A> Transition<A> {
    /// A transition that must be persisted.
    #[must_use]
    pub const fn changed(state: A, deltas: DeltaBatch) -> Self {
        Self {
            state,
            deltas,
            changed: true,
        }
    }

    /// A transition that leaves the aggregate as it was.
    #[must_use]
    pub const fn unchanged(state: A, deltas: DeltaBatch) -> Self {
        Self {
            state,
            deltas,
            changed: false,
        }
    }
}

/// Input for [`create_event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateEvent {
    /// Unique key
    pub slug: Slug,
    /// Title
    pub name: String,
    /// Requested capacity, must not be negative
    pub capacity: i64,
    /// Start of the event
    pub event_date: DateTime<Utc>,
    /// IANA timezone name
    pub timezone: String,
    /// Creator
    pub creator_email: Email,
    /// Series the event belongs to
    pub series_slug: Option<Slug>,
    /// Free-form description
    pub description: Option<String>,
    /// Where the event takes place
    pub location: Option<String>,
    /// Cover image reference
    pub cover_image_url: Option<String>,
    /// Admins besides the creator
    pub admins: BTreeSet<Email>,
}

/// Partial update of an event's descriptive fields. `None` leaves a field
/// untouched; `Some(None)` clears an optional field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventDetailsPatch {
    /// New start time and timezone
    pub date_time: Option<(DateTime<Utc>, String)>,
    /// New location
    pub location: Option<Option<String>>,
    /// New description
    pub description: Option<Option<String>>,
    /// New cover image reference
    pub cover_image_url: Option<Option<String>>,
}

/// Build a new event at version 1.
///
/// # Errors
///
/// - [`AttendanceError::BadRequest`] if the capacity is negative or the name is blank
pub fn create_event(command: CreateEvent, now: DateTime<Utc>) -> Result<Transition<Event>> {
    let capacity = validate_capacity(command.capacity)?;
    if command.name.trim().is_empty() {
        return Err(AttendanceError::BadRequest("event name must not be empty".to_string()));
    }

    let version = Version::INITIAL.next();
    let event = Event {
        slug: command.slug,
        name: command.name,
        description: command.description,
        location: command.location,
        cover_image_url: command.cover_image_url,
        event_date: command.event_date,
        timezone: command.timezone,
        capacity,
        attendees: Vec::new(),
        creator_email: command.creator_email,
        admins: command.admins,
        series_slug: command.series_slug,
        created_at: now,
        updated_at: now,
        deleted_at: None,
        version,
    };

    let delta = DeltaStamp::new(event.slug.clone(), version, now).delta(Change::EventCreated {
        name: event.name.clone(),
        event_date: event.event_date,
        timezone: event.timezone.clone(),
        capacity,
        series_slug: event.series_slug.clone(),
        creator_email: event.creator_email.clone(),
    });

    Ok(Transition::changed(event, smallvec![delta]))
}

/// Register an attendee.
///
/// Idempotent per email: if the email is already on the event, the event is
/// returned unchanged together with an `AttendeeAdded` delta describing the
/// existing registration.
///
/// # Errors
///
/// - [`AttendanceError::NotFound`] if the event is deleted
pub fn add_attendee(
    event: &Event,
    request: NewAttendee,
    now: DateTime<Utc>,
) -> Result<Transition<Event>> {
    ensure_live(event)?;

    if let Some(existing) = event.attendee(&request.email) {
        let delta = DeltaStamp::new(event.slug.clone(), event.version, now).delta(
            Change::AttendeeAdded {
                attendee: AttendeeSnapshot::from(existing),
                status: existing.status,
            },
        );
        return Ok(Transition::unchanged(event.clone(), smallvec![delta]));
    }

    let status = if event.vacancies() > 0 {
        AttendeeStatus::Confirmed
    } else {
        AttendeeStatus::Waitlisted
    };
    let attendee = Attendee {
        id: request.id,
        name: request.name,
        email: request.email,
        status,
        joined_at: now,
    };

    let (mut next, stamp) = begin(event, now);
    let delta = stamp.delta(Change::AttendeeAdded {
        attendee: AttendeeSnapshot::from(&attendee),
        status,
    });
    next.attendees.push(attendee);

    Ok(Transition::changed(next, smallvec![delta]))
}

/// Cancel a registration, promoting the earliest waitlisted attendee into a
/// vacated seat.
///
/// # Errors
///
/// - [`AttendanceError::NotFound`] if the event is deleted or the email is not registered
pub fn remove_attendee(
    event: &Event,
    email: &Email,
    now: DateTime<Utc>,
) -> Result<Transition<Event>> {
    ensure_live(event)?;
    let position = position_of(event, email)?;

    let (mut next, stamp) = begin(event, now);
    next.attendees.remove(position);

    let mut deltas: DeltaBatch = smallvec![stamp.delta(Change::AttendeeRemoved {
        email: email.clone()
    })];
    fill_vacancies(&mut next, &stamp, &mut deltas);

    Ok(Transition::changed(next, deltas))
}

/// Change the capacity, promoting or demoting attendees to match.
///
/// The `EventCapacityUpdated` delta always comes first, followed by one
/// `AttendeeStatusChanged` per promoted or demoted attendee.
///
/// # Errors
///
/// - [`AttendanceError::BadRequest`] if `new_capacity` is negative or too large
/// - [`AttendanceError::NotFound`] if the event is deleted
pub fn update_capacity(
    event: &Event,
    new_capacity: i64,
    now: DateTime<Utc>,
) -> Result<Transition<Event>> {
    let new_capacity = validate_capacity(new_capacity)?;
    ensure_live(event)?;

    if new_capacity == event.capacity {
        return Ok(Transition::unchanged(event.clone(), DeltaBatch::new()));
    }

    let (mut next, stamp) = begin(event, now);
    next.capacity = new_capacity;

    let mut deltas: DeltaBatch = smallvec![stamp.delta(Change::EventCapacityUpdated {
        old_capacity: event.capacity,
        new_capacity,
    })];

    let confirmed = next.confirmed_count();
    let seats = new_capacity as usize;
    if confirmed > seats {
        demote_latest(&mut next, confirmed - seats, &stamp, &mut deltas);
    } else {
        fill_vacancies(&mut next, &stamp, &mut deltas);
    }

    Ok(Transition::changed(next, deltas))
}

/// Bar an attendee from the event. A seat they held is handed to the
/// waitlist like a cancellation would.
///
/// # Errors
///
/// - [`AttendanceError::NotFound`] if the event is deleted or the email is not registered
pub fn block_attendee(
    event: &Event,
    email: &Email,
    now: DateTime<Utc>,
) -> Result<Transition<Event>> {
    ensure_live(event)?;
    let position = position_of(event, email)?;

    let old_status = event.attendees[position].status;
    if old_status == AttendeeStatus::Blocked {
        return Ok(Transition::unchanged(event.clone(), DeltaBatch::new()));
    }

    let (mut next, stamp) = begin(event, now);
    next.attendees[position].status = AttendeeStatus::Blocked;

    let mut deltas: DeltaBatch = smallvec![stamp.delta(Change::AttendeeStatusChanged {
        email: email.clone(),
        old_status,
        new_status: AttendeeStatus::Blocked,
    })];
    fill_vacancies(&mut next, &stamp, &mut deltas);

    Ok(Transition::changed(next, deltas))
}

/// Grant admin rights. Adding an existing admin (or the creator) is a no-op.
///
/// # Errors
///
/// - [`AttendanceError::NotFound`] if the event is deleted
pub fn add_admin(event: &Event, email: &Email, now: DateTime<Utc>) -> Result<Transition<Event>> {
    ensure_live(event)?;
    if &event.creator_email == email || event.admins.contains(email) {
        return Ok(Transition::unchanged(event.clone(), DeltaBatch::new()));
    }

    let (mut next, stamp) = begin(event, now);
    next.admins.insert(email.clone());
    let delta = stamp.delta(Change::AdminAdded {
        email: email.clone(),
    });

    Ok(Transition::changed(next, smallvec![delta]))
}

/// Revoke admin rights. Removing a non-admin is a no-op.
///
/// # Errors
///
/// - [`AttendanceError::BadRequest`] if `email` is the creator
/// - [`AttendanceError::NotFound`] if the event is deleted
pub fn remove_admin(event: &Event, email: &Email, now: DateTime<Utc>) -> Result<Transition<Event>> {
    ensure_live(event)?;
    if &event.creator_email == email {
        return Err(AttendanceError::BadRequest(
            "the event creator cannot be removed as admin".to_string(),
        ));
    }
    if !event.admins.contains(email) {
        return Ok(Transition::unchanged(event.clone(), DeltaBatch::new()));
    }

    let (mut next, stamp) = begin(event, now);
    next.admins.remove(email);
    let delta = stamp.delta(Change::AdminRemoved {
        email: email.clone(),
    });

    Ok(Transition::changed(next, smallvec![delta]))
}

/// Apply a details patch. One delta per field that actually changed, in the
/// order date/time, location, description, cover image.
///
/// # Errors
///
/// - [`AttendanceError::NotFound`] if the event is deleted
pub fn update_details(
    event: &Event,
    patch: EventDetailsPatch,
    now: DateTime<Utc>,
) -> Result<Transition<Event>> {
    ensure_live(event)?;

    let (mut next, stamp) = begin(event, now);
    let mut deltas = DeltaBatch::new();

    if let Some((event_date, timezone)) = patch.date_time {
        if event_date != next.event_date || timezone != next.timezone {
            next.event_date = event_date;
            next.timezone.clone_from(&timezone);
            deltas.push(stamp.delta(Change::EventDateTimeUpdated {
                event_date,
                timezone,
            }));
        }
    }
    if let Some(location) = patch.location.filter(|l| *l != next.location) {
        next.location.clone_from(&location);
        deltas.push(stamp.delta(Change::EventLocationUpdated { location }));
    }
    if let Some(description) = patch.description.filter(|d| *d != next.description) {
        next.description.clone_from(&description);
        deltas.push(stamp.delta(Change::EventDescriptionUpdated { description }));
    }
    if let Some(cover_image_url) = patch.cover_image_url.filter(|c| *c != next.cover_image_url) {
        next.cover_image_url.clone_from(&cover_image_url);
        deltas.push(stamp.delta(Change::EventCoverImageUpdated { cover_image_url }));
    }

    if deltas.is_empty() {
        return Ok(Transition::unchanged(event.clone(), deltas));
    }
    Ok(Transition::changed(next, deltas))
}

/// Soft-delete the event.
///
/// # Errors
///
/// - [`AttendanceError::NotFound`] if the event is already deleted
pub fn delete_event(event: &Event, now: DateTime<Utc>) -> Result<Transition<Event>> {
    ensure_live(event)?;

    let (mut next, stamp) = begin(event, now);
    next.deleted_at = Some(now);

    Ok(Transition::changed(next, smallvec![stamp.delta(Change::EventDeleted)]))
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_capacity(capacity: i64) -> Result<u32> {
    if capacity < 0 {
        return Err(AttendanceError::BadRequest(format!(
            "capacity must not be negative, got {capacity}"
        )));
    }
    u32::try_from(capacity)
        .map_err(|_| AttendanceError::BadRequest(format!("capacity {capacity} is too large")))
}

fn ensure_live(event: &Event) -> Result<()> {
    if event.is_deleted() {
        return Err(AttendanceError::NotFound(format!("event {}", event.slug)));
    }
    Ok(())
}

fn position_of(event: &Event, email: &Email) -> Result<usize> {
    event
        .attendees
        .iter()
        .position(|a| &a.email == email)
        .ok_or_else(|| {
            AttendanceError::NotFound(format!("attendee {email} in event {}", event.slug))
        })
}

/// Clone the event as the next version and prepare the matching delta stamp.
fn begin(event: &Event, now: DateTime<Utc>) -> (Event, DeltaStamp) {
    let mut next = event.clone();
    next.version = event.version.next();
    next.updated_at = now;
    let stamp = DeltaStamp::new(next.slug.clone(), next.version, now);
    (next, stamp)
}

/// Promote earliest-joined waitlisted attendees into every open seat.
fn fill_vacancies(event: &mut Event, stamp: &DeltaStamp, deltas: &mut DeltaBatch) {
    let mut waitlisted: Vec<usize> = indices_with(event, AttendeeStatus::Waitlisted);
    waitlisted.sort_by_key(|&i| (event.attendees[i].joined_at, i));

    let promotions = event.vacancies().min(waitlisted.len());
    for &i in waitlisted.iter().take(promotions) {
        set_status(event, i, AttendeeStatus::Confirmed, stamp, deltas);
    }
}

/// Demote the `count` most recently joined confirmed attendees.
fn demote_latest(event: &mut Event, count: usize, stamp: &DeltaStamp, deltas: &mut DeltaBatch) {
    let mut confirmed: Vec<usize> = indices_with(event, AttendeeStatus::Confirmed);
    confirmed.sort_by_key(|&i| Reverse((event.attendees[i].joined_at, i)));

    for &i in confirmed.iter().take(count) {
        set_status(event, i, AttendeeStatus::Waitlisted, stamp, deltas);
    }
}

fn indices_with(event: &Event, status: AttendeeStatus) -> Vec<usize> {
    event
        .attendees
        .iter()
        .enumerate()
        .filter(|(_, a)| a.status == status)
        .map(|(i, _)| i)
        .collect()
}

fn set_status(
    event: &mut Event,
    index: usize,
    new_status: AttendeeStatus,
    stamp: &DeltaStamp,
    deltas: &mut DeltaBatch,
) {
    let attendee = &mut event.attendees[index];
    let old_status = attendee.status;
    attendee.status = new_status;
    deltas.push(stamp.delta(Change::AttendeeStatusChanged {
        email: attendee.email.clone(),
        old_status,
        new_status,
    }));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::delta::Delta;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn email(raw: &str) -> Email {
        raw.parse().unwrap()
    }

    fn new_event(capacity: i64) -> Event {
        create_event(
            CreateEvent {
                slug: Slug::new("board-games"),
                name: "Board games".to_string(),
                capacity,
                event_date: t0() + Duration::days(10),
                timezone: "Europe/Lisbon".to_string(),
                creator_email: email("host@club.org"),
                series_slug: None,
                description: None,
                location: None,
                cover_image_url: None,
                admins: BTreeSet::new(),
            },
            t0(),
        )
        .unwrap()
        .state
    }

    /// Join each email one minute apart.
    fn join_all(mut event: Event, emails: &[&str]) -> Event {
        for (minute, raw) in (1_i64..).zip(emails) {
            let request = NewAttendee::new(*raw, email(raw));
            event = add_attendee(&event, request, t0() + Duration::minutes(minute))
                .unwrap()
                .state;
        }
        event
    }

    fn emails(attendees: &[&Attendee]) -> Vec<String> {
        attendees.iter().map(|a| a.email.to_string()).collect()
    }

    fn status_changes(deltas: &[Delta]) -> Vec<(String, AttendeeStatus, AttendeeStatus)> {
        deltas
            .iter()
            .filter_map(|d| match &d.change {
                Change::AttendeeStatusChanged {
                    email,
                    old_status,
                    new_status,
                } => Some((email.to_string(), *old_status, *new_status)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn create_event_starts_at_version_one() {
        let transition = create_event(
            CreateEvent {
                slug: Slug::new("x"),
                name: "X".to_string(),
                capacity: 3,
                event_date: t0(),
                timezone: "UTC".to_string(),
                creator_email: email("a@b.c"),
                series_slug: None,
                description: None,
                location: None,
                cover_image_url: None,
                admins: BTreeSet::new(),
            },
            t0(),
        )
        .unwrap();

        assert_eq!(transition.state.version, Version::new(1));
        assert_eq!(transition.deltas.len(), 1);
        assert_eq!(transition.deltas[0].change.type_name(), "EventCreated");
        assert_eq!(transition.deltas[0].version, Version::new(1));
    }

    #[test]
    fn create_event_rejects_negative_capacity() {
        let result = create_event(
            CreateEvent {
                slug: Slug::new("x"),
                name: "X".to_string(),
                capacity: -1,
                event_date: t0(),
                timezone: "UTC".to_string(),
                creator_email: email("a@b.c"),
                series_slug: None,
                description: None,
                location: None,
                cover_image_url: None,
                admins: BTreeSet::new(),
            },
            t0(),
        );
        assert!(matches!(result, Err(AttendanceError::BadRequest(_))));
    }

    #[test]
    fn scenario_a_join_then_cancel_promotes_waitlist() {
        let event = join_all(new_event(2), &["a@x.io", "b@x.io", "c@x.io"]);
        assert_eq!(emails(&event.confirmed()), ["a@x.io", "b@x.io"]);
        assert_eq!(emails(&event.waitlisted()), ["c@x.io"]);

        let transition =
            remove_attendee(&event, &email("a@x.io"), t0() + Duration::hours(1)).unwrap();
        let after = &transition.state;
        assert_eq!(emails(&after.confirmed()), ["b@x.io", "c@x.io"]);
        assert!(after.waitlisted().is_empty());

        let types: Vec<_> = transition.deltas.iter().map(|d| d.change.type_name()).collect();
        assert_eq!(types, ["AttendeeRemoved", "AttendeeStatusChanged"]);
        assert_eq!(
            status_changes(&transition.deltas),
            [("c@x.io".to_string(), AttendeeStatus::Waitlisted, AttendeeStatus::Confirmed)]
        );
    }

    #[test]
    fn scenario_b_capacity_decrease_demotes_latest_confirmed() {
        let event = join_all(new_event(2), &["b@x.io", "c@x.io"]);

        let transition = update_capacity(&event, 1, t0() + Duration::hours(1)).unwrap();
        assert_eq!(emails(&transition.state.confirmed()), ["b@x.io"]);
        assert_eq!(emails(&transition.state.waitlisted()), ["c@x.io"]);

        assert_eq!(transition.deltas[0].change.type_name(), "EventCapacityUpdated");
        assert_eq!(
            status_changes(&transition.deltas),
            [("c@x.io".to_string(), AttendeeStatus::Confirmed, AttendeeStatus::Waitlisted)]
        );
    }

    #[test]
    fn capacity_increase_promotes_min_of_increase_and_waitlist_in_join_order() {
        let event = join_all(new_event(1), &["a@x.io", "b@x.io", "c@x.io", "d@x.io"]);

        let transition = update_capacity(&event, 3, t0() + Duration::hours(1)).unwrap();
        let promoted: Vec<_> = status_changes(&transition.deltas)
            .into_iter()
            .map(|(e, _, _)| e)
            .collect();
        assert_eq!(promoted, ["b@x.io", "c@x.io"]);
        assert_eq!(emails(&transition.state.waitlisted()), ["d@x.io"]);

        let transition = update_capacity(&transition.state, 10, t0() + Duration::hours(2)).unwrap();
        assert_eq!(status_changes(&transition.deltas).len(), 1);
        assert!(transition.state.waitlisted().is_empty());
    }

    #[test]
    fn promotion_follows_join_time_not_list_position() {
        let mut event = join_all(new_event(1), &["a@x.io", "late@x.io", "early@x.io"]);
        // Reorder join times against list order.
        event.attendees[1].joined_at = t0() + Duration::days(1);
        event.attendees[2].joined_at = t0() + Duration::minutes(30);

        let transition =
            remove_attendee(&event, &email("a@x.io"), t0() + Duration::days(2)).unwrap();
        assert_eq!(emails(&transition.state.confirmed()), ["early@x.io"]);
    }

    #[test]
    fn demotion_follows_join_time_not_list_position() {
        let mut event = join_all(new_event(2), &["old@x.io", "new@x.io"]);
        event.attendees[0].joined_at = t0() + Duration::days(1);
        event.attendees[1].joined_at = t0();

        let transition = update_capacity(&event, 1, t0() + Duration::days(2)).unwrap();
        assert_eq!(emails(&transition.state.waitlisted()), ["old@x.io"]);
    }

    #[test]
    fn add_attendee_is_idempotent_per_email() {
        let event = join_all(new_event(1), &["a@x.io", "b@x.io"]);

        let again = add_attendee(
            &event,
            NewAttendee::new("B again", email(" B@X.io ")),
            t0() + Duration::hours(3),
        )
        .unwrap();

        assert!(!again.changed);
        assert_eq!(again.state, event);
        assert_eq!(again.deltas.len(), 1);
        match &again.deltas[0].change {
            Change::AttendeeAdded { attendee, status } => {
                assert_eq!(*status, AttendeeStatus::Waitlisted);
                assert_eq!(attendee.name, "b@x.io");
            }
            other => panic!("unexpected change {other:?}"),
        }
        assert_eq!(again.deltas[0].version, event.version);
    }

    #[test]
    fn remove_unknown_attendee_is_not_found() {
        let event = new_event(2);
        let result = remove_attendee(&event, &email("ghost@x.io"), t0());
        assert!(matches!(result, Err(AttendanceError::NotFound(_))));
    }

    #[test]
    fn remove_waitlisted_attendee_promotes_nobody() {
        let event = join_all(new_event(1), &["a@x.io", "b@x.io", "c@x.io"]);
        let transition =
            remove_attendee(&event, &email("b@x.io"), t0() + Duration::hours(1)).unwrap();
        assert_eq!(transition.deltas.len(), 1);
        assert_eq!(emails(&transition.state.waitlisted()), ["c@x.io"]);
    }

    #[test]
    fn update_capacity_validates_and_short_circuits() {
        let event = new_event(2);
        assert!(matches!(
            update_capacity(&event, -5, t0()),
            Err(AttendanceError::BadRequest(_))
        ));

        let same = update_capacity(&event, 2, t0()).unwrap();
        assert!(!same.changed);
        assert!(same.deltas.is_empty());
        assert_eq!(same.state.version, event.version);
    }

    #[test]
    fn every_delta_in_a_batch_carries_the_new_version() {
        let event = join_all(new_event(3), &["a@x.io", "b@x.io", "c@x.io"]);
        let transition = update_capacity(&event, 0, t0() + Duration::hours(1)).unwrap();

        assert_eq!(transition.state.version, event.version.next());
        assert_eq!(transition.deltas.len(), 4);
        assert!(transition.deltas.iter().all(|d| d.version == transition.state.version));
        assert_eq!(transition.state.confirmed_count(), 0);
    }

    #[test]
    fn blocking_a_confirmed_attendee_frees_their_seat() {
        let event = join_all(new_event(1), &["a@x.io", "b@x.io"]);

        let transition =
            block_attendee(&event, &email("a@x.io"), t0() + Duration::hours(1)).unwrap();
        assert_eq!(emails(&transition.state.confirmed()), ["b@x.io"]);
        assert_eq!(emails(&transition.state.blocked()), ["a@x.io"]);
        assert_eq!(
            status_changes(&transition.deltas),
            [
                ("a@x.io".to_string(), AttendeeStatus::Confirmed, AttendeeStatus::Blocked),
                ("b@x.io".to_string(), AttendeeStatus::Waitlisted, AttendeeStatus::Confirmed),
            ]
        );

        let rejoin = add_attendee(
            &transition.state,
            NewAttendee::new("A", email("a@x.io")),
            t0() + Duration::hours(2),
        )
        .unwrap();
        assert!(!rejoin.changed);
        assert!(matches!(
            rejoin.deltas[0].change,
            Change::AttendeeAdded {
                status: AttendeeStatus::Blocked,
                ..
            }
        ));
    }

    #[test]
    fn admins_are_a_set_and_creator_is_permanent() {
        let event = new_event(1);
        let added = add_admin(&event, &email("co@club.org"), t0()).unwrap();
        assert!(added.changed);
        assert!(!add_admin(&added.state, &email("co@club.org"), t0()).unwrap().changed);
        assert!(!add_admin(&event, &email("host@club.org"), t0()).unwrap().changed);

        let removed = remove_admin(&added.state, &email("co@club.org"), t0()).unwrap();
        assert!(removed.state.admins.is_empty());
        assert_eq!(removed.deltas[0].change.type_name(), "AdminRemoved");

        assert!(matches!(
            remove_admin(&event, &email("host@club.org"), t0()),
            Err(AttendanceError::BadRequest(_))
        ));
    }

    #[test]
    fn details_patch_emits_one_delta_per_changed_field() {
        let event = new_event(1);
        let patch = EventDetailsPatch {
            date_time: Some((event.event_date, event.timezone.clone())),
            location: Some(Some("Library".to_string())),
            description: Some(None),
            cover_image_url: Some(Some("covers/1.png".to_string())),
        };

        let transition = update_details(&event, patch, t0()).unwrap();
        let types: Vec<_> = transition.deltas.iter().map(|d| d.change.type_name()).collect();
        assert_eq!(types, ["EventLocationUpdated", "EventCoverImageUpdated"]);
        assert_eq!(transition.state.location.as_deref(), Some("Library"));

        let noop = update_details(&transition.state, EventDetailsPatch::default(), t0()).unwrap();
        assert!(!noop.changed);
    }

    #[test]
    fn deleted_events_reject_mutations() {
        let event = join_all(new_event(1), &["a@x.io"]);
        let deleted = delete_event(&event, t0() + Duration::hours(1)).unwrap().state;

        assert!(deleted.is_deleted());
        assert!(matches!(
            add_attendee(&deleted, NewAttendee::new("b", email("b@x.io")), t0()),
            Err(AttendanceError::NotFound(_))
        ));
        assert!(matches!(delete_event(&deleted, t0()), Err(AttendanceError::NotFound(_))));
    }
}
