use chrono::{DateTime, NaiveDate, Offset, TimeZone};
use chrono_tz::Tz;

use crate::error::{EdaError, Result};

/// Layout used for timestamps in the cleaned event export.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layout used for calendar dates in every date-keyed output.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Converts epoch seconds into calendar instants in one fixed timezone.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler for the IANA timezone `tz_name`.
    ///
    /// Unlike a display-only conversion, an unknown name is an error: every
    /// date-keyed aggregate depends on it.
    pub fn new(tz_name: &str) -> Result<Self> {
        let tz = tz_name
            .parse::<Tz>()
            .map_err(|_| EdaError::Config(format!("unknown timezone {}", tz_name)))?;
        Ok(Self { tz })
    }

    /// Handler for UTC.
    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    /// Resolve `secs` since the epoch into this handler's timezone.
    ///
    /// Returns `None` when the instant, or its local wall-clock time in this
    /// timezone, lies outside chrono's representable range.
    pub fn from_epoch(&self, secs: i64) -> Option<DateTime<Tz>> {
        let utc = DateTime::from_timestamp(secs, 0)?;
        let local = utc.with_timezone(&self.tz);
        // Calendar accessors read the local time; it must be representable too.
        utc.naive_utc().checked_add_offset(local.offset().fix())?;
        Some(local)
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// IANA name of the configured timezone.
    pub fn name(&self) -> &'static str {
        self.tz.name()
    }
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self::utc()
    }
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Render `dt` as `YYYY-MM-DD HH:MM:SS` in its own timezone.
pub fn format_timestamp<Z: TimeZone>(dt: &DateTime<Z>) -> String
where
    Z::Offset: std::fmt::Display,
{
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Render `date` as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
