use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)`.
///
/// Units depend on the caller: event bookings use minutes since midnight,
/// coworking bookings use days since the common era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ── Time of day ──────────────────────────────────────────────────

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Wall-clock time as minutes since midnight. `24:00` is representable so
/// that a slot may end exactly at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        (0..=MINUTES_PER_DAY)
            .contains(&minutes)
            .then_some(Self(minutes as u16))
    }

    pub fn from_hour(hour: u32) -> Option<Self> {
        Self::from_minutes(i64::from(hour) * 60)
    }

    pub fn minutes(self) -> i64 {
        i64::from(self.0)
    }

    /// Anchor this time to a calendar date.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + chrono::Duration::minutes(self.minutes())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTimeOfDay(pub String);

impl fmt::Display for InvalidTimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time of day {:?}, expected HH:MM", self.0)
    }
}

impl std::error::Error for InvalidTimeOfDay {}

impl FromStr for TimeOfDay {
    type Err = InvalidTimeOfDay;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidTimeOfDay(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(err());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let hours: u16 = h.parse().map_err(|_| err())?;
        let minutes: u16 = m.parse().map_err(|_| err())?;
        if hours > 23 || minutes > 59 {
            return Err(err());
        }
        Ok(Self(hours * 60 + minutes))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = InvalidTimeOfDay;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        // Slot end points serialize as "24:00"; accept them back.
        if value == "24:00" {
            return Ok(Self(MINUTES_PER_DAY as u16));
        }
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Convert a decimal hour count to whole minutes.
pub fn hours_to_minutes(hours: f64) -> i64 {
    (hours * 60.0).round() as i64
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub String);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingKind {
    /// Date-range membership on a coworking plan. Duration is in days.
    Coworking,
    /// Hourly reservation of an event space. Duration is in hours.
    Event,
}

/// Lifecycle is driven by the booking and payment flows, never by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Pending,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Only active bookings take part in conflict and capacity math.
    pub fn is_active(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    /// Event space id, or plan type for coworking bookings.
    pub space_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_name: Option<String>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeOfDay>,
    pub duration: f64,
    #[serde(rename = "type")]
    pub kind: BookingKind,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "userName", alias = "ownerLabel", default, skip_serializing_if = "Option::is_none")]
    pub owner_label: Option<String>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Occupied day range `[date, date + ceil(duration))`, or `None` for a
    /// booking with no positive length.
    pub fn day_span(&self) -> Option<Span> {
        let days = self.duration.ceil() as i64;
        if days <= 0 {
            return None;
        }
        let start = i64::from(self.date.num_days_from_ce());
        start.checked_add(days).map(|end| Span::new(start, end))
    }

    pub fn owner(&self) -> &str {
        self.owner_label.as_deref().unwrap_or("another member")
    }
}

// ── Query result types ───────────────────────────────────────────

/// A candidate interval anchored to a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// One enumerated start time for a space on a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SlotAvailability {
    pub fn on(&self, date: NaiveDate) -> TimeSlot {
        TimeSlot {
            start: self.start.on(date),
            end: self.end.on(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResult {
    pub has_conflict: bool,
    pub conflicts: Vec<Booking>,
    pub suggestions: Vec<TimeSlot>,
    pub message: String,
    /// Seats taken, for capacity checks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

impl ConflictResult {
    pub fn outside_business_hours(start_hour: u32, end_hour: u32) -> Self {
        Self {
            has_conflict: true,
            conflicts: Vec::new(),
            suggestions: Vec::new(),
            message: format!("Booking must be within business hours ({start_hour}:00 - {end_hour}:00)"),
            occupancy: None,
            capacity: None,
        }
    }

    pub fn from_conflicts(conflicts: Vec<Booking>, suggestions: Vec<TimeSlot>) -> Self {
        let message = if conflicts.is_empty() {
            "No conflicts found".to_string()
        } else {
            format!("Found {} scheduling conflict(s)", conflicts.len())
        };
        Self {
            has_conflict: !conflicts.is_empty(),
            conflicts,
            suggestions,
            message,
            occupancy: None,
            capacity: None,
        }
    }

    pub fn from_occupancy(occupancy: u32, capacity: u32) -> Self {
        let has_conflict = occupancy >= capacity;
        let message = if has_conflict {
            format!("Coworking space at capacity ({occupancy}/{capacity}). Please choose different dates.")
        } else {
            format!("Available ({occupancy}/{capacity} spots taken)")
        };
        Self {
            has_conflict,
            conflicts: Vec::new(),
            suggestions: Vec::new(),
            message,
            occupancy: Some(occupancy),
            capacity: Some(capacity),
        }
    }
}

/// Demand band shown next to a day's utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandLevel {
    High,
    Moderate,
    Available,
    Low,
}

impl DemandLevel {
    pub fn from_utilization(rate: f64) -> Self {
        if rate >= 90.0 {
            DemandLevel::High
        } else if rate >= 70.0 {
            DemandLevel::Moderate
        } else if rate >= 30.0 {
            DemandLevel::Available
        } else {
            DemandLevel::Low
        }
    }
}

/// Calendar shading for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    FullyBooked,
    Busy,
    Partial,
    Open,
}

impl DayStatus {
    pub fn from_utilization(rate: f64) -> Self {
        if rate >= 100.0 {
            DayStatus::FullyBooked
        } else if rate >= 70.0 {
            DayStatus::Busy
        } else if rate > 0.0 {
            DayStatus::Partial
        } else {
            DayStatus::Open
        }
    }
}

/// Per space+date aggregate. Recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySummary {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Thu".
    pub day_name: String,
    pub total_hours: f64,
    pub booked_hours: f64,
    /// Not clamped: a negative value means overlapping bookings slipped in upstream.
    pub available_hours: f64,
    pub utilization_rate: f64,
    pub bookings: Vec<Booking>,
}

impl AvailabilitySummary {
    pub fn demand(&self) -> DemandLevel {
        DemandLevel::from_utilization(self.utilization_rate)
    }

    pub fn day_status(&self) -> DayStatus {
        DayStatus::from_utilization(self.utilization_rate)
    }
}
