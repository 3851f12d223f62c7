//! Frequency tables, temporal histograms and cross-tabulations over the
//! normalized event table.
//!
//! Every view is deterministic: rankings are stable on first-seen order and
//! keyed views iterate in sorted or fixed calendar order, never hash order.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use eda_core::models::{weekday_index, weekday_name, EventKey, NormalizedEvent, WEEKDAY_ORDER};
use eda_core::time_utils::format_date;
use serde::{Deserialize, Serialize};

/// Default cutoff for the user and group rankings.
pub const DEFAULT_TOP_ACCOUNTS: usize = 10;
/// Default cutoff for the image ranking.
pub const DEFAULT_TOP_IMAGES: usize = 20;
/// Default number of images tracked in the spread trend.
pub const DEFAULT_SPREAD_IMAGES: usize = 5;

// ── FrequencyTable ────────────────────────────────────────────────────────────

/// One ranked key and its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub key: String,
    pub count: u64,
}

/// Keys ranked by count, descending, with the column labels they persist under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    pub key_label: String,
    pub count_label: String,
    pub rows: Vec<FrequencyRow>,
}

impl FrequencyTable {
    pub fn new(
        key_label: impl Into<String>,
        count_label: impl Into<String>,
        rows: Vec<FrequencyRow>,
    ) -> Self {
        Self {
            key_label: key_label.into(),
            count_label: count_label.into(),
            rows,
        }
    }

    /// The first `n` keys, in rank order.
    pub fn keys(&self, n: usize) -> Vec<&str> {
        self.rows.iter().take(n).map(|r| r.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Histograms ────────────────────────────────────────────────────────────────

/// Events per calendar date, ascending. Only dates with activity appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateHistogram {
    pub counts: BTreeMap<NaiveDate, u64>,
}

impl DateHistogram {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Earliest date carrying the highest count.
    pub fn busiest(&self) -> Option<(NaiveDate, u64)> {
        let mut best: Option<(NaiveDate, u64)> = None;
        for (date, count) in &self.counts {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((*date, *count));
            }
        }
        best
    }
}

/// Events per hour of day; all 24 hours present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HourHistogram {
    pub counts: [u64; 24],
}

impl HourHistogram {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Earliest hour with the highest non-zero count.
    pub fn peak(&self) -> Option<u32> {
        peak_index(&self.counts).map(|i| i as u32)
    }
}

/// Events per weekday, Monday first; all 7 days present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekdayHistogram {
    pub counts: [u64; 7],
}

impl WeekdayHistogram {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Name of the first weekday (Monday-first) with the highest non-zero count.
    pub fn peak(&self) -> Option<&'static str> {
        peak_index(&self.counts).map(|i| weekday_name(WEEKDAY_ORDER[i]))
    }
}

/// How many users posted exactly `post_count` times, ascending by post count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountDistribution {
    pub counts: BTreeMap<u64, u64>,
}

impl CountDistribution {
    /// Build from a full (untruncated) ranking.
    pub fn from_ranking(rows: &[FrequencyRow]) -> Self {
        let mut counts = BTreeMap::new();
        for row in rows {
            *counts.entry(row.count).or_insert(0u64) += 1;
        }
        Self { counts }
    }
}

// ── CountMatrix ───────────────────────────────────────────────────────────────

/// A zero-filled two-dimensional count table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMatrix {
    /// Label of the row-key column, e.g. `"weekday"`.
    pub row_label: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `cells[r][c]` is the count for `rows[r]` × `columns[c]`.
    pub cells: Vec<Vec<u64>>,
}

impl CountMatrix {
    fn zeroed(row_label: &str, rows: Vec<String>, columns: Vec<String>) -> Self {
        let cells = vec![vec![0; columns.len()]; rows.len()];
        Self {
            row_label: row_label.to_string(),
            rows,
            columns,
            cells,
        }
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().flatten().sum()
    }

    /// Count at (`row`, `column`) by label.
    pub fn get(&self, row: &str, column: &str) -> Option<u64> {
        let r = self.rows.iter().position(|x| x == row)?;
        let c = self.columns.iter().position(|x| x == column)?;
        Some(self.cells[r][c])
    }
}

// ── EventAggregator ───────────────────────────────────────────────────────────

/// Stateless helper deriving every aggregate view from normalized events.
pub struct EventAggregator;

impl EventAggregator {
    /// Every distinct value of `key` with its count, descending.
    ///
    /// Ties keep first-seen order.
    pub fn rank(events: &[NormalizedEvent], key: EventKey) -> Vec<FrequencyRow> {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut rows: Vec<FrequencyRow> = Vec::new();

        for event in events {
            let value = key.select(&event.record);
            match slots.get(value) {
                Some(&slot) => rows[slot].count += 1,
                None => {
                    slots.insert(value, rows.len());
                    rows.push(FrequencyRow {
                        key: value.to_string(),
                        count: 1,
                    });
                }
            }
        }

        // sort_by is stable, so equal counts stay in first-seen order.
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }

    /// The `n` most frequent values of `key`, or all of them when fewer exist.
    pub fn top_n(events: &[NormalizedEvent], key: EventKey, n: usize) -> FrequencyTable {
        truncated(key, Self::rank(events, key), n)
    }

    pub fn daily_activity(events: &[NormalizedEvent]) -> DateHistogram {
        let mut counts = BTreeMap::new();
        for event in events {
            *counts.entry(event.date()).or_insert(0u64) += 1;
        }
        DateHistogram { counts }
    }

    pub fn hourly_activity(events: &[NormalizedEvent]) -> HourHistogram {
        let mut histogram = HourHistogram::default();
        for event in events {
            histogram.counts[event.hour() as usize] += 1;
        }
        histogram
    }

    pub fn weekday_activity(events: &[NormalizedEvent]) -> WeekdayHistogram {
        let mut histogram = WeekdayHistogram::default();
        for event in events {
            histogram.counts[weekday_index(event.weekday())] += 1;
        }
        histogram
    }

    /// Weekday (Monday→Sunday) × hour (0–23), zero-filled.
    pub fn weekday_hour_matrix(events: &[NormalizedEvent]) -> CountMatrix {
        let columns = (0..24).map(|h: u32| h.to_string()).collect();
        let mut matrix = CountMatrix::zeroed("weekday", weekday_labels(), columns);
        for event in events {
            matrix.cells[weekday_index(event.weekday())][event.hour() as usize] += 1;
        }
        matrix
    }

    /// Weekday (Monday→Sunday) × month (1–12), zero-filled.
    pub fn weekday_month_matrix(events: &[NormalizedEvent]) -> CountMatrix {
        let columns = (1..=12).map(|m: u32| m.to_string()).collect();
        let mut matrix = CountMatrix::zeroed("weekday", weekday_labels(), columns);
        for event in events {
            matrix.cells[weekday_index(event.weekday())][(event.month() - 1) as usize] += 1;
        }
        matrix
    }

    /// Per-date counts of the `k` highest-ranked images in `ranking`.
    ///
    /// Rows are the dates on which any of those images was shared, ascending;
    /// columns are the image names in lexicographic order.
    pub fn image_spread_trend(
        events: &[NormalizedEvent],
        ranking: &FrequencyTable,
        k: usize,
    ) -> CountMatrix {
        let mut names: Vec<String> = ranking.keys(k).into_iter().map(str::to_string).collect();
        names.sort();

        let slots: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut by_date: BTreeMap<NaiveDate, Vec<u64>> = BTreeMap::new();
        for event in events {
            if let Some(&slot) = slots.get(event.record.cluster_image_name.as_str()) {
                by_date
                    .entry(event.date())
                    .or_insert_with(|| vec![0; names.len()])[slot] += 1;
            }
        }

        let (rows, cells): (Vec<String>, Vec<Vec<u64>>) = by_date
            .into_iter()
            .map(|(date, counts)| (format_date(date), counts))
            .unzip();

        CountMatrix {
            row_label: "date".to_string(),
            rows,
            columns: names,
            cells,
        }
    }

    /// Distribution of posts per user across all users.
    pub fn user_post_distribution(events: &[NormalizedEvent]) -> CountDistribution {
        CountDistribution::from_ranking(&Self::rank(events, EventKey::User))
    }
}

// ── AggregateSet ──────────────────────────────────────────────────────────────

/// Ranking cutoffs for [`AggregateSet::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateLimits {
    pub top_users: usize,
    pub top_groups: usize,
    pub top_images: usize,
    pub spread_images: usize,
}

impl Default for AggregateLimits {
    fn default() -> Self {
        Self {
            top_users: DEFAULT_TOP_ACCOUNTS,
            top_groups: DEFAULT_TOP_ACCOUNTS,
            top_images: DEFAULT_TOP_IMAGES,
            spread_images: DEFAULT_SPREAD_IMAGES,
        }
    }
}

/// Headline figures for the viewer's summary panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub total_events: usize,
    pub distinct_users: usize,
    pub distinct_groups: usize,
    pub distinct_images: usize,
    pub peak_weekday: Option<String>,
    pub peak_hour: Option<u32>,
    pub busiest_date: Option<String>,
    pub top_image: Option<String>,
}

/// Every aggregate view of one pipeline run.
#[derive(Debug, Clone)]
pub struct AggregateSet {
    pub top_users: FrequencyTable,
    pub top_groups: FrequencyTable,
    pub top_images: FrequencyTable,
    pub daily: DateHistogram,
    pub hourly: HourHistogram,
    pub weekday: WeekdayHistogram,
    pub weekday_hour: CountMatrix,
    pub weekday_month: CountMatrix,
    pub spread_trend: CountMatrix,
    pub user_distribution: CountDistribution,
    pub insights: InsightSummary,
    pub limits: AggregateLimits,
}

impl AggregateSet {
    /// Compute every view. An empty `events` slice yields empty or all-zero
    /// views.
    pub fn build(events: &[NormalizedEvent], limits: AggregateLimits) -> Self {
        let user_rank = EventAggregator::rank(events, EventKey::User);
        let group_rank = EventAggregator::rank(events, EventKey::Group);
        let image_rank = EventAggregator::rank(events, EventKey::Image);

        let user_distribution = CountDistribution::from_ranking(&user_rank);
        let distinct_users = user_rank.len();
        let distinct_groups = group_rank.len();
        let distinct_images = image_rank.len();

        let top_users = truncated(EventKey::User, user_rank, limits.top_users);
        let top_groups = truncated(EventKey::Group, group_rank, limits.top_groups);
        let top_images = truncated(EventKey::Image, image_rank, limits.top_images);

        let daily = EventAggregator::daily_activity(events);
        let hourly = EventAggregator::hourly_activity(events);
        let weekday = EventAggregator::weekday_activity(events);
        let weekday_hour = EventAggregator::weekday_hour_matrix(events);
        let weekday_month = EventAggregator::weekday_month_matrix(events);
        let spread_trend =
            EventAggregator::image_spread_trend(events, &top_images, limits.spread_images);

        let insights = InsightSummary {
            total_events: events.len(),
            distinct_users,
            distinct_groups,
            distinct_images,
            peak_weekday: weekday.peak().map(str::to_string),
            peak_hour: hourly.peak(),
            busiest_date: daily.busiest().map(|(date, _)| format_date(date)),
            top_image: top_images.rows.first().map(|r| r.key.clone()),
        };

        Self {
            top_users,
            top_groups,
            top_images,
            daily,
            hourly,
            weekday,
            weekday_hour,
            weekday_month,
            spread_trend,
            user_distribution,
            insights,
            limits,
        }
    }
}

// ── Private ───────────────────────────────────────────────────────────────────

fn labels_for(key: EventKey) -> (&'static str, &'static str) {
    match key {
        EventKey::User => ("user_id", "post_count"),
        EventKey::Group => ("group_id", "message_count"),
        EventKey::Image => ("image_name", "share_count"),
    }
}

fn truncated(key: EventKey, mut rows: Vec<FrequencyRow>, n: usize) -> FrequencyTable {
    rows.truncate(n);
    let (key_label, count_label) = labels_for(key);
    FrequencyTable::new(key_label, count_label, rows)
}

fn weekday_labels() -> Vec<String> {
    WEEKDAY_ORDER
        .iter()
        .map(|d| weekday_name(*d).to_string())
        .collect()
}

/// Index of the first maximum, or `None` when every bucket is zero.
fn peak_index(counts: &[u64]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (i, &count) in counts.iter().enumerate() {
        if count > 0 && best.map_or(true, |(_, c)| count > c) {
            best = Some((i, count));
        }
    }
    best.map(|(i, _)| i)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
