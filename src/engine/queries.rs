use std::time::Instant;

use chrono::{Datelike, Days, NaiveDate};
use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::model::*;
use crate::observability;
use crate::repository::RepositoryError;

use super::availability::{enumerate_slots, summarize_day};
use super::conflict::*;
use super::{Engine, EngineError};

const DAYS_PER_WEEK: u64 = 7;

impl Engine {
    /// Check a requested event slot against existing bookings.
    ///
    /// A request outside business hours is a conflict verdict, decided before
    /// the repository is read. `exclude` skips the booking being edited.
    pub async fn check_conflicts(
        &self,
        space_id: &str,
        date: NaiveDate,
        start_time: TimeOfDay,
        duration_hours: f64,
        exclude: Option<&BookingId>,
    ) -> Result<ConflictResult, EngineError> {
        const OP: &str = "check_conflicts";
        let started = Instant::now();
        let result = self
            .check_conflicts_inner(space_id, date, start_time, duration_hours, exclude)
            .await;
        let outcome = match &result {
            Ok(r) if r.has_conflict => "conflict",
            Ok(_) => "clear",
            Err(_) => "error",
        };
        observability::record(OP, outcome, started);
        result
    }

    async fn check_conflicts_inner(
        &self,
        space_id: &str,
        date: NaiveDate,
        start_time: TimeOfDay,
        duration_hours: f64,
        exclude: Option<&BookingId>,
    ) -> Result<ConflictResult, EngineError> {
        validate_space_id(space_id)?;
        let minutes = validate_hours(duration_hours)?;

        let hours = &self.config.business_hours;
        let request = Span::new(start_time.minutes(), start_time.minutes() + minutes);
        if !hours.span().contains_span(&request) {
            debug!(space_id, %date, %start_time, duration_hours, "request outside business hours");
            return Ok(ConflictResult::outside_business_hours(hours.start_hour, hours.end_hour));
        }

        let bookings = self.load_day("check_conflicts", space_id, date).await?;
        let default_start = self.config.default_start_time;
        let conflicts = find_conflicts(&bookings, space_id, date, &request, exclude, default_start)?;

        let suggestions = if conflicts.is_empty() {
            Vec::new()
        } else {
            // The booking under edit must not block its own alternatives.
            let others: Vec<Booking> = bookings
                .into_iter()
                .filter(|b| exclude.is_none_or(|id| *id != b.id))
                .collect();
            enumerate_slots(
                &others,
                space_id,
                date,
                hours,
                self.config.slot_step_minutes,
                minutes,
                default_start,
            )?
            .into_iter()
            .filter(|slot| slot.available)
            .take(self.config.max_suggestions)
            .map(|slot| slot.on(date))
            .collect()
        };

        debug!(
            space_id,
            %date,
            %start_time,
            duration_hours,
            conflicts = conflicts.len(),
            suggestions = suggestions.len(),
            "conflict check"
        );
        Ok(ConflictResult::from_conflicts(conflicts, suggestions))
    }

    /// Check seat capacity of a coworking plan over `[start_date, start_date + duration_days)`.
    pub async fn check_coworking_availability(
        &self,
        plan_type: &str,
        start_date: NaiveDate,
        duration_days: u32,
    ) -> Result<ConflictResult, EngineError> {
        const OP: &str = "check_coworking";
        let started = Instant::now();
        let result = self
            .check_coworking_inner(plan_type, start_date, duration_days)
            .await;
        let outcome = match &result {
            Ok(r) if r.has_conflict => "conflict",
            Ok(_) => "clear",
            Err(_) => "error",
        };
        observability::record(OP, outcome, started);
        result
    }

    async fn check_coworking_inner(
        &self,
        plan_type: &str,
        start_date: NaiveDate,
        duration_days: u32,
    ) -> Result<ConflictResult, EngineError> {
        validate_space_id(plan_type)?;
        validate_days(duration_days)?;
        let capacity = self
            .config
            .capacity_for(plan_type)
            .ok_or_else(|| EngineError::UnknownPlan(plan_type.to_string()))?;

        let first_day = i64::from(start_date.num_days_from_ce());
        let request = Span::new(first_day, first_day + i64::from(duration_days));

        let bookings = self
            .repo
            .list_plan_bookings(plan_type)
            .await
            .inspect_err(|e| repository_failed("check_coworking", plan_type, e))?;
        let occupancy = count_occupancy(&bookings, plan_type, &request)?;

        debug!(plan_type, %start_date, duration_days, occupancy, capacity, "coworking check");
        Ok(ConflictResult::from_occupancy(occupancy, capacity))
    }

    /// Every candidate start for `duration_hours` on `date`, ascending.
    pub async fn get_available_slots(
        &self,
        space_id: &str,
        date: NaiveDate,
        duration_hours: f64,
    ) -> Result<Vec<SlotAvailability>, EngineError> {
        const OP: &str = "available_slots";
        let started = Instant::now();
        let result: Result<Vec<SlotAvailability>, EngineError> = async {
            validate_space_id(space_id)?;
            let minutes = validate_hours(duration_hours)?;
            let bookings = self.load_day(OP, space_id, date).await?;
            enumerate_slots(
                &bookings,
                space_id,
                date,
                &self.config.business_hours,
                self.config.slot_step_minutes,
                minutes,
                self.config.default_start_time,
            )
        }
        .await;
        observability::record(OP, if result.is_ok() { "ok" } else { "error" }, started);
        result
    }

    pub async fn get_daily_availability(
        &self,
        space_id: &str,
        date: NaiveDate,
    ) -> Result<AvailabilitySummary, EngineError> {
        const OP: &str = "daily";
        let started = Instant::now();
        let result: Result<AvailabilitySummary, EngineError> = async {
            validate_space_id(space_id)?;
            self.summarize(OP, space_id, date).await
        }
        .await;
        observability::record(OP, if result.is_ok() { "ok" } else { "error" }, started);
        result
    }

    /// Seven consecutive daily summaries starting at `start_date`.
    pub async fn get_weekly_availability(
        &self,
        space_id: &str,
        start_date: NaiveDate,
    ) -> Result<Vec<AvailabilitySummary>, EngineError> {
        const OP: &str = "weekly";
        let started = Instant::now();
        let result: Result<Vec<AvailabilitySummary>, EngineError> = async {
            validate_space_id(space_id)?;
            let dates = (0..DAYS_PER_WEEK)
                .map(|i| {
                    start_date
                        .checked_add_days(Days::new(i))
                        .ok_or(EngineError::LimitExceeded("date out of range"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            // Reads run concurrently; try_join_all keeps date order.
            try_join_all(dates.into_iter().map(|date| self.summarize(OP, space_id, date))).await
        }
        .await;
        observability::record(OP, if result.is_ok() { "ok" } else { "error" }, started);
        result
    }

    async fn summarize(
        &self,
        op: &'static str,
        space_id: &str,
        date: NaiveDate,
    ) -> Result<AvailabilitySummary, EngineError> {
        let bookings = self
            .load_day(op, space_id, date)
            .await?
            .into_iter()
            .filter(|b| b.space_id == space_id && b.date == date)
            .collect();
        Ok(summarize_day(date, bookings, &self.config.business_hours))
    }

    async fn load_day(
        &self,
        op: &'static str,
        space_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, EngineError> {
        let bookings = self
            .repo
            .list_bookings(space_id, date)
            .await
            .inspect_err(|e| repository_failed(op, space_id, e))?;
        Ok(bookings)
    }
}

fn repository_failed(op: &'static str, space_id: &str, e: &RepositoryError) {
    warn!(op, space_id, "repository read failed: {e}");
    metrics::counter!(observability::REPOSITORY_ERRORS_TOTAL, "op" => op).increment(1);
}
