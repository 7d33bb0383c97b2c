//! Series behavior: creating and editing recurrence templates.

use crate::attendance::Transition;
use crate::delta::{Change, DeltaStamp};
use crate::error::{AttendanceError, Result};
use crate::key::{Email, Slug, Version};
use crate::model::{EventSeries, MAX_LEAD_WEEKS, RecurrenceInterval};
use chrono::{DateTime, Utc};
use smallvec::smallvec;
use std::collections::BTreeSet;

/// Input for [`create_series`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateSeries {
    /// Unique key
    pub slug: Slug,
    /// Title
    pub name: String,
    /// Step between occurrences; `None` for a one-off
    pub interval: Option<RecurrenceInterval>,
    /// Generation horizon in weeks
    pub lead_weeks: u32,
    /// Whether occurrences are generated automatically
    pub auto_generate: bool,
    /// Last instant occurrences may be generated for
    pub end_date: Option<DateTime<Utc>>,
    /// Creator
    pub creator_email: Email,
    /// Admins besides the creator
    pub admins: BTreeSet<Email>,
}

/// Partial update of a series' recurrence settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeriesPatch {
    /// New interval; `Some(None)` turns the series into a one-off
    pub interval: Option<Option<RecurrenceInterval>>,
    /// New horizon
    pub lead_weeks: Option<u32>,
    /// New generation flag
    pub auto_generate: Option<bool>,
    /// New end date; `Some(None)` removes it
    pub end_date: Option<Option<DateTime<Utc>>>,
}

/// Build a new series at version 1.
///
/// # Errors
///
/// - [`AttendanceError::BadRequest`] if the settings are inconsistent
pub fn create_series(command: CreateSeries, now: DateTime<Utc>) -> Result<Transition<EventSeries>> {
    if command.name.trim().is_empty() {
        return Err(AttendanceError::BadRequest("series name must not be empty".to_string()));
    }

    let series = EventSeries {
        slug: command.slug,
        name: command.name,
        interval: command.interval,
        lead_weeks: command.lead_weeks,
        auto_generate: command.auto_generate,
        end_date: command.end_date,
        creator_email: command.creator_email,
        admins: command.admins,
        created_at: now,
        updated_at: now,
        version: Version::INITIAL.next(),
    };
    validate(&series)?;

    let stamp = DeltaStamp::new(series.slug.clone(), series.version, now);
    let delta = stamp.delta(Change::SeriesCreated {
        interval: series.interval,
        lead_weeks: series.lead_weeks,
        auto_generate: series.auto_generate,
        end_date: series.end_date,
    });

    Ok(Transition::changed(series, smallvec![delta]))
}

/// Apply a settings patch. The `SeriesUpdated` delta carries the full
/// resulting settings.
///
/// # Errors
///
/// - [`AttendanceError::BadRequest`] if the resulting settings are inconsistent
pub fn update_series(
    series: &EventSeries,
    patch: SeriesPatch,
    now: DateTime<Utc>,
) -> Result<Transition<EventSeries>> {
    let mut next = series.clone();
    if let Some(interval) = patch.interval {
        next.interval = interval;
    }
    if let Some(lead_weeks) = patch.lead_weeks {
        next.lead_weeks = lead_weeks;
    }
    if let Some(auto_generate) = patch.auto_generate {
        next.auto_generate = auto_generate;
    }
    if let Some(end_date) = patch.end_date {
        next.end_date = end_date;
    }

    if next == *series {
        return Ok(Transition::unchanged(next, smallvec![]));
    }
    validate(&next)?;

    next.version = series.version.next();
    next.updated_at = now;
    let stamp = DeltaStamp::new(next.slug.clone(), next.version, now);
    let delta = stamp.delta(Change::SeriesUpdated {
        interval: next.interval,
        lead_weeks: next.lead_weeks,
        auto_generate: next.auto_generate,
        end_date: next.end_date,
    });

    Ok(Transition::changed(next, smallvec![delta]))
}

/// Produce the deletion record for a series. The store removes it afterwards.
///
/// # Errors
///
/// Never fails today; the signature matches the other operations so it can be
/// driven through the coordinator.
pub fn delete_series(series: &EventSeries, now: DateTime<Utc>) -> Result<Transition<EventSeries>> {
    let mut next = series.clone();
    next.version = series.version.next();
    next.updated_at = now;
    let stamp = DeltaStamp::new(next.slug.clone(), next.version, now);
    Ok(Transition::changed(next, smallvec![stamp.delta(Change::SeriesDeleted)]))
}

fn validate(series: &EventSeries) -> Result<()> {
    if series.lead_weeks > MAX_LEAD_WEEKS {
        return Err(AttendanceError::BadRequest(format!(
            "lead time is capped at {MAX_LEAD_WEEKS} weeks, got {}",
            series.lead_weeks
        )));
    }
    if let Some(interval) = series.interval {
        if interval.every == 0 {
            return Err(AttendanceError::BadRequest(
                "recurrence interval must be at least 1".to_string(),
            ));
        }
        if series.lead_weeks == 0 {
            return Err(AttendanceError::BadRequest(
                "a recurring series needs at least one lead week".to_string(),
            ));
        }
    }
    Ok(())
}
