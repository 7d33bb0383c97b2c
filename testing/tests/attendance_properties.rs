//! Property-based tests for the attendance transitions.
//!
//! Every sequence of joins, cancellations, blocks and capacity changes must
//! keep the seat invariants, promote oldest-first, demote newest-first, and
//! produce deltas that let a mirror replay the exact same state.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use attendance_core::Transition;
use attendance_core::attendance;
use attendance_core::delta::Change;
use attendance_core::key::Email;
use attendance_core::mirror::EventMirror;
use attendance_core::model::{AttendeeStatus, Event, NewAttendee};
use attendance_testing::helpers;
use attendance_testing::properties::{Op, apply, arb_ops, arb_spelling, check_invariants, guest};
use proptest::prelude::*;

/// Replay `ops` from an empty event, one minute apart, skipping rejected ones.
fn replay(capacity: u32, ops: &[Op]) -> Event {
    let mut event = helpers::event("prop", capacity);
    for (minute, op) in (1_i64..).zip(ops) {
        if let Ok(transition) = apply(&event, op, helpers::minutes(minute)) {
            event = transition.state;
        }
    }
    event
}

/// Attendees whose status `transition` changed to `status`, in delta order.
fn moved_to(transition: &Transition<Event>, status: AttendeeStatus) -> Vec<Email> {
    transition
        .deltas
        .iter()
        .filter_map(|d| match &d.change {
            Change::AttendeeStatusChanged { email, new_status, .. } if *new_status == status => {
                Some(email.clone())
            }
            _ => None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_invariants_hold_for_every_reachable_state(capacity in 0_u32..5, ops in arb_ops(40)) {
        let mut event = helpers::event("prop", capacity);
        for (minute, op) in (1_i64..).zip(&ops) {
            match apply(&event, op, helpers::minutes(minute)) {
                Ok(transition) => {
                    check_invariants(&transition.state).map_err(TestCaseError::fail)?;
                    prop_assert!(transition.state.version >= event.version);
                    event = transition.state;
                }
                // Rejected operations must not leave anything behind.
                Err(_) => check_invariants(&event).map_err(TestCaseError::fail)?,
            }
        }
    }

    #[test]
    fn prop_adding_twice_equals_adding_once(
        capacity in 0_u32..5,
        ops in arb_ops(20),
        n in 0_u8..8,
    ) {
        let event = replay(capacity, &ops);
        let request = NewAttendee::new("Guest", guest(n));

        let once =
            attendance::add_attendee(&event, request.clone(), helpers::minutes(100)).unwrap();
        let twice = attendance::add_attendee(&once.state, request, helpers::minutes(101)).unwrap();

        prop_assert!(!twice.changed);
        prop_assert_eq!(&twice.state, &once.state);
        prop_assert_eq!(
            twice.state.attendee(&guest(n)).map(|a| a.status),
            once.state.attendee(&guest(n)).map(|a| a.status)
        );
    }

    #[test]
    fn prop_spellings_of_one_address_are_one_attendee(
        first in arb_spelling(0),
        second in arb_spelling(0),
    ) {
        let event = helpers::event("prop", 3);
        let joined = attendance::add_attendee(
            &event,
            NewAttendee::new("A", first.parse().unwrap()),
            helpers::minutes(1),
        )
        .unwrap();
        let again = attendance::add_attendee(
            &joined.state,
            NewAttendee::new("A", second.parse().unwrap()),
            helpers::minutes(2),
        )
        .unwrap();

        prop_assert_eq!(again.state.attendees.len(), 1);
        prop_assert_eq!(&again.state.attendees[0].email, &guest(0));
    }

    #[test]
    fn prop_vacancy_promotes_earliest_waitlisted(capacity in 1_u32..4, ops in arb_ops(30)) {
        let event = replay(capacity, &ops);
        let Some(leaving) = event.confirmed().first().map(|a| a.email.clone()) else {
            return Ok(());
        };
        let expected = event.waitlisted().first().map(|a| a.email.clone());

        let removed = attendance::remove_attendee(&event, &leaving, helpers::minutes(500)).unwrap();
        let promoted = moved_to(&removed, AttendeeStatus::Confirmed);

        prop_assert_eq!(promoted, expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_capacity_decrease_demotes_latest_confirmed(
        capacity in 2_u32..6,
        ops in arb_ops(30),
        shrink in 1_u32..6,
    ) {
        let event = replay(capacity, &ops);
        let target = event.capacity.saturating_sub(shrink);
        let confirmed = event.confirmed();
        let excess = confirmed.len().saturating_sub(target as usize);
        let expected: Vec<_> =
            confirmed.iter().rev().take(excess).map(|a| a.email.clone()).collect();

        let shrunk =
            attendance::update_capacity(&event, i64::from(target), helpers::minutes(500)).unwrap();
        let demoted = moved_to(&shrunk, AttendeeStatus::Waitlisted);

        prop_assert_eq!(demoted.len(), expected.len());
        for email in &expected {
            prop_assert!(demoted.contains(email));
        }
        prop_assert!(shrunk.state.confirmed_count() <= target as usize);
    }

    #[test]
    fn prop_capacity_increase_promotes_min_of_increase_and_waitlist(
        capacity in 0_u32..4,
        ops in arb_ops(30),
        grow in 1_u32..5,
    ) {
        let event = replay(capacity, &ops);
        let waitlist: Vec<_> = event.waitlisted().iter().map(|a| a.email.clone()).collect();
        let expected = (grow as usize).min(waitlist.len());

        let larger = i64::from(event.capacity + grow);
        let grown = attendance::update_capacity(&event, larger, helpers::minutes(500)).unwrap();
        let promoted = moved_to(&grown, AttendeeStatus::Confirmed);

        prop_assert_eq!(grown.deltas[0].change.type_name(), "EventCapacityUpdated");
        prop_assert_eq!(&promoted[..], &waitlist[..expected]);
    }

    #[test]
    fn prop_mirror_replays_server_state(capacity in 0_u32..5, ops in arb_ops(40)) {
        let mut server = helpers::event("prop", capacity);
        let mut mirror = EventMirror::new(server.clone());

        for (minute, op) in (1_i64..).zip(&ops) {
            if let Ok(transition) = apply(&server, op, helpers::minutes(minute)) {
                mirror.apply(&transition.deltas).unwrap();
                server = transition.state;
                prop_assert_eq!(mirror.event(), &server);
            }
        }
    }
}

#[test]
fn scenario_a_cancellation_promotes_waitlist() {
    let mut event = helpers::event("scenario-a", 2);
    for (minute, n) in [(1, 0), (2, 1), (3, 2)] {
        let request = NewAttendee::new("G", guest(n));
        event = attendance::add_attendee(&event, request, helpers::minutes(minute)).unwrap().state;
    }
    assert_eq!(event.waitlist_len(), 1);

    let event = attendance::remove_attendee(&event, &guest(0), helpers::minutes(4)).unwrap().state;
    let confirmed: Vec<_> = event.confirmed().iter().map(|a| a.email.clone()).collect();
    assert_eq!(confirmed, vec![guest(1), guest(2)]);
    assert_eq!(event.waitlist_len(), 0);
}

#[test]
fn scenario_b_capacity_shrink_demotes_latest() {
    let event = helpers::event_with(
        "scenario-b",
        2,
        &[
            ("b@example.com", AttendeeStatus::Confirmed),
            ("c@example.com", AttendeeStatus::Confirmed),
        ],
    );

    let event = attendance::update_capacity(&event, 1, helpers::minutes(10)).unwrap().state;
    assert_eq!(event.confirmed()[0].email, helpers::email("b@example.com"));
    assert_eq!(event.waitlisted()[0].email, helpers::email("c@example.com"));
}
