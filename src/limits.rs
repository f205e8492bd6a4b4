// Hard ceilings on caller-supplied input.

/// Longest event booking accepted, in hours.
pub const MAX_EVENT_DURATION_HOURS: f64 = 24.0;

/// Longest coworking booking accepted, in days.
pub const MAX_COWORKING_DURATION_DAYS: u32 = 366;

pub const MAX_SPACE_ID_LEN: usize = 128;

/// Longest request line accepted on the wire, in bytes.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// Upper bound on suggested alternatives, regardless of configuration.
pub const MAX_SUGGESTIONS: usize = 24;
