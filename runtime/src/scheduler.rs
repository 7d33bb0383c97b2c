//! Recurrence generation scheduler.
//!
//! Keeps every active series populated with dated events up to its coverage
//! horizon (`now + lead_weeks`). Each pass walks the series one by one and
//! records a separate result for each, so a failing series never stops the
//! others.
//!
//! Re-running a pass is harmless: candidate dates already taken by an event
//! are skipped, and a creation that loses the race on the occurrence slug is
//! counted as already generated.

use crate::coordinator::Coordinator;
use crate::metrics::{EVENTS_GENERATED_TOTAL, SERIES_FAILURES_TOTAL, counter};
use attendance_core::attendance::{self, CreateEvent};
use attendance_core::environment::Clock;
use attendance_core::error::{AttendanceError, Result};
use attendance_core::key::Slug;
use attendance_core::model::{Event, EventSeries, RecurrenceInterval};
use attendance_core::store::{EventStore, SeriesStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Result of one generation pass for one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesReport {
    /// Series that was processed
    pub series: Slug,
    /// Slugs of the events created in this pass, or why the series failed
    pub outcome: Result<Vec<Slug>>,
}

/// Result of one full scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// One entry per active series, in processing order
    pub series: Vec<SeriesReport>,
    /// Series that were not active (no interval, generation off, or ended)
    pub skipped: usize,
}

impl GenerationReport {
    /// Total number of events created across all series.
    #[must_use]
    pub fn generated(&self) -> usize {
        self.series
            .iter()
            .filter_map(|report| report.outcome.as_ref().ok())
            .map(Vec::len)
            .sum()
    }

    /// Series whose pass failed, with the error.
    pub fn failures(&self) -> impl Iterator<Item = (&Slug, &AttendanceError)> {
        self.series
            .iter()
            .filter_map(|report| report.outcome.as_ref().err().map(|e| (&report.series, e)))
    }
}

/// Periodically generates upcoming events for recurring series.
pub struct RecurrenceScheduler {
    events: Arc<dyn EventStore>,
    series: Arc<dyn SeriesStore>,
    coordinator: Coordinator,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl RecurrenceScheduler {
    /// Create a scheduler that runs a pass every `period`.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore>,
        series: Arc<dyn SeriesStore>,
        coordinator: Coordinator,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        Self {
            events,
            series,
            coordinator,
            clock,
            period,
        }
    }

    /// Run passes every period until `shutdown` turns `true` (or its sender
    /// is dropped). The first pass starts immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_secs = self.period.as_secs(), "Recurrence scheduler started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) => tracing::info!(
                            series = report.series.len(),
                            skipped = report.skipped,
                            generated = report.generated(),
                            failed = report.failures().count(),
                            "Recurrence pass finished"
                        ),
                        Err(error) => {
                            tracing::error!(
                                error = %error,
                                "Recurrence pass could not list series"
                            );
                        }
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!("Recurrence scheduler stopped");
    }

    /// Run a single pass over every series.
    ///
    /// # Errors
    ///
    /// Only fails if the series themselves cannot be listed; per-series
    /// failures are reported in the [`GenerationReport`].
    pub async fn run_once(&self) -> Result<GenerationReport> {
        let now = self.clock.now();
        let all = self.series.list_series().await?;
        let mut report = GenerationReport::default();

        for series in all {
            if !series.generates_at(now) {
                report.skipped += 1;
                continue;
            }

            let outcome = self.generate(&series, now).await;
            match &outcome {
                Ok(created) if !created.is_empty() => {
                    tracing::info!(
                        series = %series.slug,
                        created = created.len(),
                        "Generated events"
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    counter!(SERIES_FAILURES_TOTAL).increment(1);
                    tracing::error!(
                        series = %series.slug,
                        error = %error,
                        "Recurrence generation failed"
                    );
                }
            }
            report.series.push(SeriesReport {
                series: series.slug,
                outcome,
            });
        }

        Ok(report)
    }

    async fn generate(&self, series: &EventSeries, now: DateTime<Utc>) -> Result<Vec<Slug>> {
        let Some(interval) = series.interval else {
            return Ok(Vec::new());
        };

        // Soft-deleted events still anchor the sequence.
        let existing = self.events.list_by_series(series.slug.clone(), true).await?;
        let Some(anchor) = existing.iter().max_by_key(|event| event.event_date) else {
            tracing::warn!(series = %series.slug, "Series has no events to use as a template");
            return Ok(Vec::new());
        };

        let coverage_end = series.coverage_end(now)?;
        let occupied: BTreeSet<DateTime<Utc>> =
            existing.iter().map(|event| event.event_date).collect();
        let mut created = Vec::new();

        let dates = candidate_dates(interval, anchor.event_date, coverage_end, series.end_date);
        for date in dates {
            if occupied.contains(&date) {
                continue;
            }

            let transition = attendance::create_event(occurrence_of(series, anchor, date), now)?;
            let slug = transition.state.slug.clone();
            match self.coordinator.create(self.events.as_ref(), transition).await {
                Ok(_) => {
                    counter!(EVENTS_GENERATED_TOTAL).increment(1);
                    created.push(slug);
                }
                Err(AttendanceError::Conflict(_)) => {
                    tracing::debug!(slug = %slug, "Occurrence already generated");
                }
                Err(error) => return Err(error),
            }
        }

        Ok(created)
    }
}

impl std::fmt::Debug for RecurrenceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurrenceScheduler")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

/// Dates after `anchor`, stepping by `interval`, up to and including
/// `coverage_end` and `end_date`.
fn candidate_dates(
    interval: RecurrenceInterval,
    anchor: DateTime<Utc>,
    coverage_end: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
) -> impl Iterator<Item = DateTime<Utc>> {
    std::iter::successors(interval.advance(anchor), move |previous| interval.advance(*previous))
        .take_while(move |date| *date <= coverage_end && end_date.is_none_or(|end| *date <= end))
}

fn occurrence_of(series: &EventSeries, template: &Event, date: DateTime<Utc>) -> CreateEvent {
    CreateEvent {
        slug: Slug::occurrence(&series.slug, date.date_naive()),
        name: template.name.clone(),
        capacity: i64::from(template.capacity),
        event_date: date,
        timezone: template.timezone.clone(),
        creator_email: series.creator_email.clone(),
        series_slug: Some(series.slug.clone()),
        description: template.description.clone(),
        location: template.location.clone(),
        cover_image_url: template.cover_image_url.clone(),
        admins: template.admins.clone(),
    }
}
