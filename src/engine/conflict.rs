use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;
use crate::repository::RepositoryError;

use super::EngineError;

pub fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| EngineError::InvalidDate(s.to_string()))
}

pub fn parse_time(s: &str) -> Result<TimeOfDay, EngineError> {
    s.parse().map_err(|_| EngineError::InvalidTime(s.to_string()))
}

pub(crate) fn validate_space_id(space_id: &str) -> Result<(), EngineError> {
    if space_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("space id must not be empty"));
    }
    if space_id.len() > MAX_SPACE_ID_LEN {
        return Err(EngineError::LimitExceeded("space id too long"));
    }
    Ok(())
}

/// Validate an hourly duration and convert it to whole minutes.
pub(crate) fn validate_hours(duration_hours: f64) -> Result<i64, EngineError> {
    if !duration_hours.is_finite() || duration_hours <= 0.0 {
        return Err(EngineError::InvalidDuration(duration_hours));
    }
    if duration_hours > MAX_EVENT_DURATION_HOURS {
        return Err(EngineError::LimitExceeded("event duration too long"));
    }
    let minutes = hours_to_minutes(duration_hours);
    if minutes <= 0 {
        return Err(EngineError::InvalidDuration(duration_hours));
    }
    Ok(minutes)
}

pub(crate) fn validate_days(duration_days: u32) -> Result<(), EngineError> {
    if duration_days == 0 {
        return Err(EngineError::InvalidDuration(0.0));
    }
    if duration_days > MAX_COWORKING_DURATION_DAYS {
        return Err(EngineError::LimitExceeded("coworking duration too long"));
    }
    Ok(())
}

/// Occupied `[start, end)` of an event booking in minutes since midnight.
/// `None` for a stored booking with no positive length.
pub(crate) fn occupied_span(booking: &Booking, default_start: Option<TimeOfDay>) -> Result<Option<Span>, EngineError> {
    let start = booking
        .start_time
        .or(default_start)
        .ok_or_else(|| EngineError::MissingStartTime(booking.id.clone()))?;
    check_stored_duration(booking, MAX_EVENT_DURATION_HOURS)?;
    let minutes = hours_to_minutes(booking.duration);
    if minutes <= 0 {
        return Ok(None);
    }
    Ok(Some(Span::new(start.minutes(), start.minutes() + minutes)))
}

/// A stored duration longer than any request would be allowed is bad store data.
fn check_stored_duration(booking: &Booking, max: f64) -> Result<(), EngineError> {
    if booking.duration.is_nan() || booking.duration > max {
        return Err(RepositoryError::Corrupt(format!(
            "booking {} has duration {}",
            booking.id, booking.duration
        ))
        .into());
    }
    Ok(())
}

/// Active bookings on `space_id`/`date` with their occupied spans.
pub(crate) fn active_spans<'a>(
    bookings: &'a [Booking],
    space_id: &str,
    date: NaiveDate,
    exclude: Option<&BookingId>,
    default_start: Option<TimeOfDay>,
) -> Result<Vec<(Span, &'a Booking)>, EngineError> {
    let mut spans = Vec::new();
    for booking in bookings {
        if !booking.is_active() || booking.space_id != space_id || booking.date != date {
            continue;
        }
        if exclude.is_some_and(|id| *id == booking.id) {
            continue;
        }
        if let Some(span) = occupied_span(booking, default_start)? {
            spans.push((span, booking));
        }
    }
    Ok(spans)
}

/// Every active booking whose occupied span overlaps `request`.
pub fn find_conflicts(
    bookings: &[Booking],
    space_id: &str,
    date: NaiveDate,
    request: &Span,
    exclude: Option<&BookingId>,
    default_start: Option<TimeOfDay>,
) -> Result<Vec<Booking>, EngineError> {
    Ok(active_spans(bookings, space_id, date, exclude, default_start)?
        .into_iter()
        .filter(|(span, _)| span.overlaps(request))
        .map(|(_, booking)| booking.clone())
        .collect())
}

/// Active coworking bookings on `plan_type` whose day range overlaps `request`.
pub fn count_occupancy(bookings: &[Booking], plan_type: &str, request: &Span) -> Result<u32, EngineError> {
    let mut occupancy = 0;
    for booking in bookings {
        if !booking.is_active() || booking.kind != BookingKind::Coworking || booking.space_id != plan_type {
            continue;
        }
        check_stored_duration(booking, f64::from(MAX_COWORKING_DURATION_DAYS))?;
        if booking.day_span().is_some_and(|span| span.overlaps(request)) {
            occupancy += 1;
        }
    }
    Ok(occupancy)
}
