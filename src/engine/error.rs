use crate::model::BookingId;
use crate::repository::RepositoryError;

#[derive(Debug)]
pub enum EngineError {
    InvalidInput(&'static str),
    InvalidTime(String),
    InvalidDate(String),
    InvalidDuration(f64),
    LimitExceeded(&'static str),
    UnknownPlan(String),
    MissingStartTime(BookingId),
    /// Availability could not be determined. Never read this as "free".
    Repository(RepositoryError),
    /// A conflicted verdict refused at the admission gate.
    Rejected(String),
}

impl EngineError {
    /// True for errors caused by the caller's input rather than by the store.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidInput(_)
                | EngineError::InvalidTime(_)
                | EngineError::InvalidDate(_)
                | EngineError::InvalidDuration(_)
                | EngineError::LimitExceeded(_)
                | EngineError::UnknownPlan(_)
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::InvalidTime(t) => write!(f, "invalid time of day {t:?}, expected HH:MM"),
            EngineError::InvalidDate(d) => write!(f, "invalid date {d:?}, expected YYYY-MM-DD"),
            EngineError::InvalidDuration(d) => write!(f, "duration must be positive, got {d}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::UnknownPlan(plan) => write!(f, "unknown coworking plan: {plan}"),
            EngineError::MissingStartTime(id) => {
                write!(f, "booking {id} has no start time and no default is configured")
            }
            EngineError::Repository(e) => write!(f, "availability unknown: {e}"),
            EngineError::Rejected(msg) => write!(f, "booking rejected: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Repository(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(e: RepositoryError) -> Self {
        EngineError::Repository(e)
    }
}
