//! Aggregate keys, versions and the normalized identifiers attendees are keyed by.
//!
//! Events and series are addressed by a [`Slug`]. Every persisted aggregate
//! carries a [`Version`] used for optimistic concurrency at the storage boundary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when parsing a key or identifier from external input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    /// Slug was empty or contained characters outside `[a-z0-9-]`.
    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    /// Email address was not of the form `local@domain`.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

/// Unique key of an event or event series.
///
/// # Validation
///
/// - `FromStr::from_str()`: Validates input (non-empty, `[a-z0-9-]` only)
/// - `From::from()` and `new()`: No validation (for internal use with trusted input)
///
/// # Examples
///
/// ```
/// use attendance_core::key::Slug;
///
/// let slug = Slug::new("tuesday-run");
/// assert_eq!(slug.as_str(), "tuesday-run");
///
/// assert!("Tuesday Run".parse::<Slug>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Create a new `Slug` from trusted input.
    #[must_use]
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Key of the occurrence of `series` that takes place on `date`.
    ///
    /// Two generators producing the same date end up with the same key, so the
    /// store's uniqueness check turns a duplicate into a create conflict.
    ///
    /// ```
    /// use attendance_core::key::Slug;
    /// use chrono::NaiveDate;
    ///
    /// let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
    /// let slug = Slug::occurrence(&Slug::new("tuesday-run"), date);
    /// assert_eq!(slug.as_str(), "tuesday-run-2025-03-04");
    /// ```
    #[must_use]
    pub fn occurrence(series: &Self, date: NaiveDate) -> Self {
        Self(format!("{}-{}", series.0, date.format("%Y-%m-%d")))
    }

    /// Get the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `Slug` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Slug {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ParseKeyError::InvalidSlug(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for Slug {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Slug {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Aggregate version number for optimistic concurrency control.
///
/// `0` means "never persisted". The first persisted version of an aggregate
/// is `1`, and every persisted mutation bumps it by exactly one. A save that
/// names a version other than the one currently stored is rejected.
///
/// # Examples
///
/// ```
/// use attendance_core::key::Version;
///
/// let v0 = Version::INITIAL;
/// let v1 = v0.next();
/// assert_eq!(v1, Version::new(1));
/// assert!(v1 > v0);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Version of an aggregate that has never been persisted.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Check if this is the initial (never persisted) version.
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Case-normalized email address.
///
/// Attendees and admins are keyed by email, so every comparison goes through
/// this type. Parsing trims surrounding whitespace and lowercases.
///
/// ```
/// use attendance_core::key::Email;
///
/// let email: Email = "  Ada@Example.COM ".parse().unwrap();
/// assert_eq!(email.as_str(), "ada@example.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Get the normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Email {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let mut parts = normalized.split('@');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
        );
        if !well_formed || normalized.chars().any(char::is_whitespace) {
            return Err(ParseKeyError::InvalidEmail(s.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Identifier of a single attendee record within an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendeeId(Uuid);

impl AttendeeId {
    /// Creates a new random `AttendeeId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `AttendeeId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AttendeeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
