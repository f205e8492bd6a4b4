use chrono::NaiveDate;

use crate::config::BusinessHours;
use crate::model::*;

use super::conflict::active_spans;
use super::EngineError;

/// Minutes as `HH:MM`; unlike `TimeOfDay` this tolerates ends past midnight.
fn clock(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Enumerate candidate starts every `step_minutes` across business hours.
///
/// Stops at the first candidate whose end would pass the close of business.
/// A blocked candidate names the first booking that blocks it.
pub fn enumerate_slots(
    bookings: &[Booking],
    space_id: &str,
    date: NaiveDate,
    hours: &BusinessHours,
    step_minutes: u32,
    duration_minutes: i64,
    default_start: Option<TimeOfDay>,
) -> Result<Vec<SlotAvailability>, EngineError> {
    let mut occupied = active_spans(bookings, space_id, date, None, default_start)?;
    occupied.sort_by_key(|(span, _)| span.start);

    let window = hours.span();
    let step = i64::from(step_minutes.max(1));
    let mut slots = Vec::new();

    let mut start = window.start;
    while start < window.end {
        let end = start + duration_minutes;
        if end > window.end {
            break;
        }
        let candidate = Span::new(start, end);
        let blocker = occupied.iter().find(|(span, _)| span.overlaps(&candidate));
        let (Some(slot_start), Some(slot_end)) = (TimeOfDay::from_minutes(start), TimeOfDay::from_minutes(end)) else {
            break;
        };
        slots.push(SlotAvailability {
            start: slot_start,
            end: slot_end,
            available: blocker.is_none(),
            reason: blocker.map(|(span, booking)| {
                format!(
                    "Conflicts with {}'s booking ({}-{})",
                    booking.owner(),
                    clock(span.start),
                    clock(span.end)
                )
            }),
        });
        start += step;
    }

    Ok(slots)
}

/// Aggregate one day. Overlapping bookings can push `available_hours`
/// below zero; that is reported as-is.
pub fn summarize_day(date: NaiveDate, bookings: Vec<Booking>, hours: &BusinessHours) -> AvailabilitySummary {
    let bookings: Vec<Booking> = bookings.into_iter().filter(Booking::is_active).collect();
    let total_hours = hours.total_hours();
    let booked_hours: f64 = bookings.iter().map(|b| b.duration).sum();
    AvailabilitySummary {
        date,
        day_name: date.format("%a").to_string(),
        total_hours,
        booked_hours,
        available_hours: total_hours - booked_hours,
        utilization_rate: booked_hours / total_hours * 100.0,
        bookings,
    }
}
