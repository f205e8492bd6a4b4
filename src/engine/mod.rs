mod availability;
mod conflict;
mod error;
mod queries;

pub use availability::{enumerate_slots, summarize_day};
pub use conflict::{count_occupancy, find_conflicts, parse_date, parse_time};
pub use error::EngineError;

use std::sync::Arc;

use crate::config::{ConfigError, EngineConfig};
use crate::model::ConflictResult;
use crate::repository::BookingRepository;

/// Availability and conflict engine.
///
/// Holds no booking state of its own: every call reads a fresh snapshot from
/// the repository, so one `Engine` can be shared across tasks.
pub struct Engine {
    repo: Arc<dyn BookingRepository>,
    config: EngineConfig,
}

impl Engine {
    /// Fails if `config` does not pass [`EngineConfig::validate`].
    pub fn new(repo: Arc<dyn BookingRepository>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { repo, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl ConflictResult {
    /// Gate a submission on this verdict: a conflicted result becomes
    /// `EngineError::Rejected` so callers can `?` it.
    pub fn admit(self) -> Result<Self, EngineError> {
        if self.has_conflict {
            Err(EngineError::Rejected(self.message))
        } else {
            Ok(self)
        }
    }
}
