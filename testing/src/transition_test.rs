//! Given-When-Then harness for pure transitions.
//!
//! Operations in `attendance_core` have the shape
//! `(&State, input, now) -> Result<Transition<State>>`; this harness feeds one a
//! state and checks the resulting state, deltas or error.

#![allow(clippy::module_name_repetitions)] // TransitionTest is the natural name

use attendance_core::attendance::Transition;
use attendance_core::delta::Delta;
use attendance_core::error::{AttendanceError, Result};

/// Type alias for the operation under test
type Operation<S> = Box<dyn FnOnce(&S) -> Result<Transition<S>>>;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for delta assertion functions
type DeltaAssertion = Box<dyn FnOnce(&[Delta])>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&AttendanceError)>;

/// Fluent API for testing transitions with Given-When-Then syntax
///
/// # Example
///
/// ```
/// use attendance_testing::{TransitionTest, helpers};
/// use attendance_testing::transition_test::assertions;
/// use attendance_core::attendance;
///
/// TransitionTest::new()
///     .given_state(helpers::event("yoga", 2))
///     .when(|event| attendance::update_capacity(event, 3, helpers::minutes(1)))
///     .then_state(|event| assert_eq!(event.capacity, 3))
///     .then_deltas(|deltas| assertions::assert_delta_types(deltas, &["EventCapacityUpdated"]))
///     .run();
/// ```
pub struct TransitionTest<S> {
    initial_state: Option<S>,
    operation: Option<Operation<S>>,
    state_assertions: Vec<StateAssertion<S>>,
    delta_assertions: Vec<DeltaAssertion>,
    changed: Option<bool>,
    error_assertion: Option<ErrorAssertion>,
}

impl<S> Default for TransitionTest<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TransitionTest<S> {
    /// Create an empty test
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_state: None,
            operation: None,
            state_assertions: Vec::new(),
            delta_assertions: Vec::new(),
            changed: None,
            error_assertion: None,
        }
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the operation to test (When)
    #[must_use]
    pub fn when<F>(mut self, operation: F) -> Self
    where
        F: FnOnce(&S) -> Result<Transition<S>> + 'static,
    {
        self.operation = Some(Box::new(operation));
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the produced deltas (Then)
    #[must_use]
    pub fn then_deltas<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Delta]) + 'static,
    {
        self.delta_assertions.push(Box::new(assertion));
        self
    }

    /// Expect the transition to report `changed` (Then)
    #[must_use]
    pub const fn then_changed(mut self, changed: bool) -> Self {
        self.changed = Some(changed);
        self
    }

    /// Expect the operation to fail (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&AttendanceError) + 'static,
    {
        self.error_assertion = Some(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if the initial state or operation is not set, if the outcome
    /// (success or failure) is not the expected one, or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        let operation = self.operation.expect("Operation must be set with when()");

        match (operation(&state), self.error_assertion) {
            (Ok(transition), None) => {
                if let Some(changed) = self.changed {
                    assert_eq!(transition.changed, changed, "Unexpected `changed` flag");
                }
                for assertion in self.state_assertions {
                    assertion(&transition.state);
                }
                for assertion in self.delta_assertions {
                    assertion(&transition.deltas);
                }
            }
            (Err(error), Some(assertion)) => assertion(&error),
            (Ok(transition), Some(_)) => {
                panic!(
                    "Expected an error, but the operation produced {} deltas",
                    transition.deltas.len()
                )
            }
            (Err(error), None) => panic!("Expected success, but the operation failed: {error}"),
        }
    }
}

/// Helper assertions for deltas
pub mod assertions {
    use attendance_core::delta::Delta;
    use attendance_core::key::Version;

    /// Assert that there are no deltas
    ///
    /// # Panics
    ///
    /// Panics if deltas is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_deltas(deltas: &[Delta]) {
        assert!(
            deltas.is_empty(),
            "Expected no deltas, but found {}: {:?}",
            deltas.len(),
            deltas
        );
    }

    /// Assert the delta type tags, in order
    ///
    /// # Panics
    ///
    /// Panics if the types don't match.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_delta_types(deltas: &[Delta], expected: &[&str]) {
        let actual: Vec<&str> = deltas.iter().map(|d| d.change.type_name()).collect();
        assert_eq!(actual, expected, "Unexpected delta types");
    }

    /// Assert every delta carries `version`
    ///
    /// # Panics
    ///
    /// Panics if any delta has another version.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_stamped(deltas: &[Delta], version: Version) {
        assert!(
            deltas.iter().all(|d| d.version == version),
            "Expected every delta at version {version}, found {:?}",
            deltas.iter().map(|d| d.version).collect::<Vec<_>>()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers;
    use attendance_core::attendance;
    use attendance_core::key::Version;
    use attendance_core::model::{AttendeeStatus, NewAttendee};

    #[test]
    fn test_add_to_full_event_waitlists() {
        TransitionTest::new()
            .given_state(helpers::event_with("yoga", 1, &[("a@x.io", AttendeeStatus::Confirmed)]))
            .when(|event| {
                attendance::add_attendee(
                    event,
                    NewAttendee::new("B", helpers::email("b@x.io")),
                    helpers::minutes(10),
                )
            })
            .then_changed(true)
            .then_state(|event| assert_eq!(event.waitlist_len(), 1))
            .then_deltas(|deltas| {
                assertions::assert_delta_types(deltas, &["AttendeeAdded"]);
                assertions::assert_stamped(deltas, Version::new(2));
            })
            .run();
    }

    #[test]
    fn test_same_capacity_is_a_no_op() {
        TransitionTest::new()
            .given_state(helpers::event("yoga", 4))
            .when(|event| attendance::update_capacity(event, 4, helpers::minutes(1)))
            .then_changed(false)
            .then_deltas(assertions::assert_no_deltas)
            .run();
    }

    #[test]
    fn test_negative_capacity_is_rejected() {
        TransitionTest::new()
            .given_state(helpers::event("yoga", 4))
            .when(|event| attendance::update_capacity(event, -1, helpers::minutes(1)))
            .then_error(|error| assert!(matches!(error, AttendanceError::BadRequest(_))))
            .run();
    }
}
