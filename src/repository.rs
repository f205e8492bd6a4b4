use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

use crate::model::{Booking, BookingId, BookingKind, BookingStatus};

/// Read-only access to booking records owned by the booking and payment flows.
///
/// Implementations return cancelled bookings as well; the engine does the
/// filtering. Each call must return a consistent snapshot.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Every booking on `space_id` dated `date`.
    async fn list_bookings(&self, space_id: &str, date: NaiveDate) -> Result<Vec<Booking>, RepositoryError>;

    /// Every coworking booking on `plan_type`, regardless of date.
    async fn list_plan_bookings(&self, plan_type: &str) -> Result<Vec<Booking>, RepositoryError>;
}

#[derive(Debug)]
pub enum RepositoryError {
    Unavailable(String),
    Timeout,
    Corrupt(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::Unavailable(e) => write!(f, "booking store unavailable: {e}"),
            RepositoryError::Timeout => write!(f, "booking store timed out"),
            RepositoryError::Corrupt(e) => write!(f, "booking store returned bad data: {e}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Bookings held in memory, bucketed by space id and kept sorted by
/// `(date, start_time)`.
pub struct InMemoryRepository {
    spaces: DashMap<String, Vec<Booking>>,
    booking_to_space: DashMap<BookingId, String>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            spaces: DashMap::new(),
            booking_to_space: DashMap::new(),
        }
    }

    pub fn from_bookings(bookings: impl IntoIterator<Item = Booking>) -> Self {
        let repo = Self::new();
        for booking in bookings {
            repo.upsert(booking);
        }
        repo
    }

    /// Load a JSON array of bookings.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| RepositoryError::Unavailable(format!("{}: {e}", path.display())))?;
        let bookings: Vec<Booking> = serde_json::from_slice(&raw)
            .map_err(|e| RepositoryError::Corrupt(format!("{}: {e}", path.display())))?;
        Ok(Self::from_bookings(bookings))
    }

    pub fn len(&self) -> usize {
        self.booking_to_space.len()
    }

    pub fn is_empty(&self) -> bool {
        self.booking_to_space.is_empty()
    }

    /// Insert or replace a booking by id. A booking moved to another space
    /// leaves its old bucket.
    pub fn upsert(&self, booking: Booking) {
        if let Some(previous) = self.booking_to_space.get(&booking.id).map(|e| e.value().clone()) {
            self.remove_from_space(&previous, &booking.id);
        }
        self.booking_to_space
            .insert(booking.id.clone(), booking.space_id.clone());

        let mut bucket = self.spaces.entry(booking.space_id.clone()).or_default();
        let key = (booking.date, booking.start_time);
        let pos = bucket
            .binary_search_by(|b| (b.date, b.start_time).cmp(&key))
            .unwrap_or_else(|e| e);
        bucket.insert(pos, booking);
    }

    pub fn remove(&self, id: &BookingId) -> Option<Booking> {
        let (_, space_id) = self.booking_to_space.remove(id)?;
        self.remove_from_space(&space_id, id)
    }

    /// Drive a status transition on behalf of an external flow.
    pub fn set_status(&self, id: &BookingId, status: BookingStatus) -> bool {
        let Some(space_id) = self.booking_to_space.get(id).map(|e| e.value().clone()) else {
            return false;
        };
        let Some(mut bucket) = self.spaces.get_mut(&space_id) else {
            return false;
        };
        match bucket.iter_mut().find(|b| &b.id == id) {
            Some(booking) => {
                booking.status = status;
                true
            }
            None => false,
        }
    }

    fn remove_from_space(&self, space_id: &str, id: &BookingId) -> Option<Booking> {
        let mut bucket = self.spaces.get_mut(space_id)?;
        let pos = bucket.iter().position(|b| &b.id == id)?;
        Some(bucket.remove(pos))
    }
}

#[async_trait]
impl BookingRepository for InMemoryRepository {
    async fn list_bookings(&self, space_id: &str, date: NaiveDate) -> Result<Vec<Booking>, RepositoryError> {
        let Some(bucket) = self.spaces.get(space_id) else {
            return Ok(Vec::new());
        };
        // Bucket is sorted by date, so the day is one contiguous run.
        let from = bucket.partition_point(|b| b.date < date);
        let to = bucket.partition_point(|b| b.date <= date);
        Ok(bucket[from..to].to_vec())
    }

    async fn list_plan_bookings(&self, plan_type: &str) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .spaces
            .get(plan_type)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|b| b.kind == BookingKind::Coworking)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
