//! Property-based testing utilities using proptest.
//!
//! Strategies generate sequences of attendance operations over a small pool
//! of guests, so that joins, cancellations and blocks hit the same people
//! often enough to exercise idempotence and promotion.

use attendance_core::attendance::{self, Transition};
use attendance_core::error::Result;
use attendance_core::key::Email;
use attendance_core::model::{Event, NewAttendee};
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Number of distinct guests the strategies draw from.
pub const GUEST_POOL: u8 = 8;

/// One attendance operation against guest `n` of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Register guest `n`
    Add(u8),
    /// Cancel guest `n`
    Remove(u8),
    /// Block guest `n`
    Block(u8),
    /// Set the capacity
    Capacity(i64),
}

/// Address of guest `n`.
#[must_use]
pub fn guest(n: u8) -> Email {
    crate::helpers::email(&format!("guest{n}@example.com"))
}

/// Strategy for guest address spellings that normalize to [`guest`]:
/// mixed case and surrounding whitespace.
pub fn arb_spelling(n: u8) -> impl Strategy<Value = String> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        move |(upper_local, upper_domain, padded)| {
            let local = if upper_local { format!("GUEST{n}") } else { format!("Guest{n}") };
            let domain = if upper_domain { "EXAMPLE.com" } else { "example.COM" };
            if padded {
                format!("  {local}@{domain} ")
            } else {
                format!("{local}@{domain}")
            }
        },
    )
}

/// Strategy for a single operation.
pub fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..GUEST_POOL).prop_map(Op::Add),
        2 => (0..GUEST_POOL).prop_map(Op::Remove),
        1 => (0..GUEST_POOL).prop_map(Op::Block),
        2 => (0_i64..=6).prop_map(Op::Capacity),
    ]
}

/// Strategy for a sequence of up to `max_len` operations.
pub fn arb_ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 0..=max_len)
}

/// Apply `op` to `event` at `now`.
///
/// # Errors
///
/// Whatever the underlying operation returns, e.g. `NotFound` when removing
/// a guest that never joined.
pub fn apply(event: &Event, op: &Op, now: DateTime<Utc>) -> Result<Transition<Event>> {
    match *op {
        Op::Add(n) => {
            attendance::add_attendee(event, NewAttendee::new(format!("Guest {n}"), guest(n)), now)
        }
        Op::Remove(n) => attendance::remove_attendee(event, &guest(n), now),
        Op::Block(n) => attendance::block_attendee(event, &guest(n), now),
        Op::Capacity(capacity) => attendance::update_capacity(event, capacity, now),
    }
}

/// Check the invariants every reachable event state satisfies.
///
/// # Errors
///
/// Returns a description of the first violated invariant.
pub fn check_invariants(event: &Event) -> std::result::Result<(), String> {
    let confirmed = event.confirmed_count();
    let capacity = event.capacity as usize;
    if confirmed > capacity {
        return Err(format!("{confirmed} confirmed exceeds capacity {capacity}"));
    }

    let mut seen = BTreeSet::new();
    for attendee in &event.attendees {
        if !seen.insert(&attendee.email) {
            return Err(format!("{} appears more than once", attendee.email));
        }
    }

    if confirmed < capacity && event.waitlist_len() > 0 {
        return Err(format!(
            "{} waitlisted while {} seats are free",
            event.waitlist_len(),
            capacity - confirmed
        ));
    }

    Ok(())
}
