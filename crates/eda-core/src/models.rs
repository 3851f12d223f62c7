use chrono::{DateTime, Datelike, NaiveDate, Timelike, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Columns every input file must carry, in the order they are retained.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "group_id",
    "user_id",
    "image_id",
    "cluster_image_name",
    "timestamp",
];

/// Weekdays in reporting order (Monday first).
pub const WEEKDAY_ORDER: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A single image-share action read from the input log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Opaque identifier of the WhatsApp group the image was posted in.
    pub group_id: String,
    /// Opaque identifier of the posting user.
    pub user_id: String,
    /// Opaque identifier of the image file.
    pub image_id: String,
    /// Canonical name shared by near-duplicate copies of one image.
    pub cluster_image_name: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

/// The loaded input, in file order.
pub type EventTable = Vec<EventRecord>;

/// Which identifier column a frequency ranking is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKey {
    User,
    Group,
    Image,
}

impl EventKey {
    /// Borrow the field this key selects from `record`.
    pub fn select<'a>(&self, record: &'a EventRecord) -> &'a str {
        match self {
            EventKey::User => &record.user_id,
            EventKey::Group => &record.group_id,
            EventKey::Image => &record.cluster_image_name,
        }
    }

    /// Input column name backing this key.
    pub fn column(&self) -> &'static str {
        match self {
            EventKey::User => "user_id",
            EventKey::Group => "group_id",
            EventKey::Image => "cluster_image_name",
        }
    }
}

/// An event with its timestamp resolved to a calendar instant.
///
/// Hour, weekday, month and date are derived on demand from `at` rather than
/// stored alongside the record.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub record: EventRecord,
    pub at: DateTime<Tz>,
}

impl NormalizedEvent {
    /// Hour of day, 0–23.
    pub fn hour(&self) -> u32 {
        self.at.hour()
    }

    pub fn weekday(&self) -> Weekday {
        self.at.weekday()
    }

    /// Month number, 1–12.
    pub fn month(&self) -> u32 {
        self.at.month()
    }

    /// Calendar date in the configured timezone.
    pub fn date(&self) -> NaiveDate {
        self.at.date_naive()
    }
}

/// Full English name of `day`, e.g. `"Monday"`.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Position of `day` in [`WEEKDAY_ORDER`].
pub fn weekday_index(day: Weekday) -> usize {
    day.num_days_from_monday() as usize
}
