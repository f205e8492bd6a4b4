use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::{Span, TimeOfDay};

/// Opening window `[start_hour, end_hour)` in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 20,
        }
    }
}

impl BusinessHours {
    /// The window in minutes since midnight.
    pub fn span(&self) -> Span {
        Span::new(i64::from(self.start_hour) * 60, i64::from(self.end_hour) * 60)
    }

    pub fn total_hours(&self) -> f64 {
        f64::from(self.end_hour.saturating_sub(self.start_hour))
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub business_hours: BusinessHours,
    /// Distance between enumerated slot starts.
    pub slot_step_minutes: u32,
    /// Alternatives offered when a request conflicts.
    pub max_suggestions: usize,
    /// Start assumed for event bookings stored without one. `None` turns a
    /// missing start time into an error.
    pub default_start_time: Option<TimeOfDay>,
    /// Seat ceiling per coworking plan type.
    pub capacities: HashMap<String, u32>,
    /// Ceiling for plan types missing from `capacities`. `None` rejects them.
    pub default_capacity: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let capacities = [("day-pass", 50), ("flex-pass", 30), ("dedicated", 10)]
            .into_iter()
            .map(|(plan, cap)| (plan.to_string(), cap))
            .collect();
        Self {
            business_hours: BusinessHours::default(),
            slot_step_minutes: 60,
            max_suggestions: 3,
            default_start_time: TimeOfDay::from_hour(9),
            capacities,
            default_capacity: Some(50),
        }
    }
}

impl EngineConfig {
    pub fn capacity_for(&self, plan_type: &str) -> Option<u32> {
        self.capacities
            .get(plan_type)
            .copied()
            .or(self.default_capacity)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let BusinessHours { start_hour, end_hour } = self.business_hours;
        if start_hour >= end_hour || end_hour > 24 {
            return Err(ConfigError::BusinessHours { start_hour, end_hour });
        }
        if self.slot_step_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: SLOT_STEP_MINUTES,
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup(BUSINESS_START) {
            config.business_hours.start_hour = parse(BUSINESS_START, &v)?;
        }
        if let Some(v) = lookup(BUSINESS_END) {
            config.business_hours.end_hour = parse(BUSINESS_END, &v)?;
        }
        if let Some(v) = lookup(SLOT_STEP_MINUTES) {
            config.slot_step_minutes = parse(SLOT_STEP_MINUTES, &v)?;
        }
        if let Some(v) = lookup(MAX_SUGGESTIONS) {
            let n: usize = parse(MAX_SUGGESTIONS, &v)?;
            config.max_suggestions = n.min(crate::limits::MAX_SUGGESTIONS);
        }
        if let Some(v) = lookup(DEFAULT_START) {
            config.default_start_time = if is_none(&v) {
                None
            } else {
                Some(parse(DEFAULT_START, &v)?)
            };
        }
        if let Some(v) = lookup(CAPACITIES) {
            config.capacities = parse_capacities(&v)?;
        }
        if let Some(v) = lookup(DEFAULT_CAPACITY) {
            config.default_capacity = if is_none(&v) {
                None
            } else {
                Some(parse(DEFAULT_CAPACITY, &v)?)
            };
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// JSON file of bookings loaded into the in-memory repository at startup.
    pub seed_path: Option<PathBuf>,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    /// Ceiling on a single engine call, repository read included.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 7878,
            seed_path: None,
            max_connections: 256,
            metrics_port: None,
            request_timeout: Duration::from_millis(5_000),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = lookup(BIND) {
            config.bind = v;
        }
        if let Some(v) = lookup(PORT) {
            config.port = parse(PORT, &v)?;
        }
        config.seed_path = lookup(SEED).map(PathBuf::from);
        if let Some(v) = lookup(MAX_CONNECTIONS) {
            config.max_connections = parse(MAX_CONNECTIONS, &v)?;
        }
        if let Some(v) = lookup(METRICS_PORT) {
            config.metrics_port = Some(parse(METRICS_PORT, &v)?);
        }
        if let Some(v) = lookup(REQUEST_TIMEOUT_MS) {
            config.request_timeout = Duration::from_millis(parse(REQUEST_TIMEOUT_MS, &v)?);
        }
        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ── Environment keys ─────────────────────────────────────────────

pub const BIND: &str = "DESKBOOK_BIND";
pub const PORT: &str = "DESKBOOK_PORT";
pub const SEED: &str = "DESKBOOK_SEED";
pub const MAX_CONNECTIONS: &str = "DESKBOOK_MAX_CONNECTIONS";
pub const METRICS_PORT: &str = "DESKBOOK_METRICS_PORT";
pub const REQUEST_TIMEOUT_MS: &str = "DESKBOOK_REQUEST_TIMEOUT_MS";
pub const BUSINESS_START: &str = "DESKBOOK_BUSINESS_START";
pub const BUSINESS_END: &str = "DESKBOOK_BUSINESS_END";
pub const SLOT_STEP_MINUTES: &str = "DESKBOOK_SLOT_STEP_MINUTES";
pub const MAX_SUGGESTIONS: &str = "DESKBOOK_MAX_SUGGESTIONS";
pub const DEFAULT_START: &str = "DESKBOOK_DEFAULT_START";
pub const CAPACITIES: &str = "DESKBOOK_CAPACITIES";
pub const DEFAULT_CAPACITY: &str = "DESKBOOK_DEFAULT_CAPACITY";

fn is_none(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("none")
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// `plan=n,plan=n`
fn parse_capacities(value: &str) -> Result<HashMap<String, u32>, ConfigError> {
    let mut out = HashMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (plan, cap) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
            key: CAPACITIES,
            value: entry.to_string(),
        })?;
        let plan = plan.trim();
        if plan.is_empty() {
            return Err(ConfigError::Invalid {
                key: CAPACITIES,
                value: entry.to_string(),
            });
        }
        out.insert(plan.to_string(), parse(CAPACITIES, cap)?);
    }
    Ok(out)
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
    BusinessHours { start_hour: u32, end_hour: u32 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {key}: {value:?}"),
            ConfigError::BusinessHours { start_hour, end_hour } => write!(
                f,
                "business hours must satisfy start < end <= 24, got {start_hour}..{end_hour}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
