//! Persistence of aggregate views as comma-separated tables.
//!
//! [`OutputDir::ensure`] is the one place output directories are created.
//! Each write opens, fills and flushes its own file handle before returning,
//! replacing whatever file was there.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use eda_core::error::{EdaError, Result};
use eda_core::models::{weekday_name, NormalizedEvent, REQUIRED_COLUMNS, WEEKDAY_ORDER};
use eda_core::time_utils::{format_date, format_timestamp};
use serde::Serialize;
use tracing::debug;

use crate::aggregator::{
    AggregateSet, CountDistribution, CountMatrix, DateHistogram, FrequencyTable, HourHistogram,
    WeekdayHistogram,
};

/// File name (without extension) of the cleaned event export.
pub const CLEAN_EXPORT_NAME: &str = "misinfo_clean";

// ── Tabular ───────────────────────────────────────────────────────────────────

/// A view that can be written as a header row followed by data rows.
pub trait Tabular {
    fn header(&self) -> Vec<String>;

    /// Stream every data row into `out`.
    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()>;
}

impl Tabular for FrequencyTable {
    fn header(&self) -> Vec<String> {
        vec![self.key_label.clone(), self.count_label.clone()]
    }

    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        for row in &self.rows {
            out.write_record([row.key.as_str(), row.count.to_string().as_str()])?;
        }
        Ok(())
    }
}

impl Tabular for DateHistogram {
    fn header(&self) -> Vec<String> {
        vec!["date".to_string(), "count".to_string()]
    }

    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        for (date, count) in &self.counts {
            out.write_record([format_date(*date), count.to_string()])?;
        }
        Ok(())
    }
}

impl Tabular for HourHistogram {
    fn header(&self) -> Vec<String> {
        vec!["hour".to_string(), "count".to_string()]
    }

    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        for (hour, count) in self.counts.iter().enumerate() {
            out.write_record([hour.to_string(), count.to_string()])?;
        }
        Ok(())
    }
}

impl Tabular for WeekdayHistogram {
    fn header(&self) -> Vec<String> {
        vec!["weekday".to_string(), "count".to_string()]
    }

    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        for (day, count) in WEEKDAY_ORDER.iter().zip(self.counts.iter()) {
            out.write_record([weekday_name(*day), count.to_string().as_str()])?;
        }
        Ok(())
    }
}

impl Tabular for CountDistribution {
    fn header(&self) -> Vec<String> {
        vec!["post_count".to_string(), "user_count".to_string()]
    }

    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        for (posts, users) in &self.counts {
            out.write_record([posts.to_string(), users.to_string()])?;
        }
        Ok(())
    }
}

impl Tabular for CountMatrix {
    fn header(&self) -> Vec<String> {
        std::iter::once(self.row_label.clone())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        for (label, cells) in self.rows.iter().zip(&self.cells) {
            let record: Vec<String> = std::iter::once(label.clone())
                .chain(cells.iter().map(u64::to_string))
                .collect();
            out.write_record(&record)?;
        }
        Ok(())
    }
}

/// The loaded events with timestamps rendered as calendar time.
pub struct CleanEvents<'a>(pub &'a [NormalizedEvent]);

impl Tabular for CleanEvents<'_> {
    fn header(&self) -> Vec<String> {
        REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn write_rows<W: Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        for event in self.0 {
            let rec = &event.record;
            out.write_record([
                rec.group_id.as_str(),
                rec.user_id.as_str(),
                rec.image_id.as_str(),
                rec.cluster_image_name.as_str(),
                format_timestamp(&event.at).as_str(),
            ])?;
        }
        Ok(())
    }
}

// ── OutputDir ─────────────────────────────────────────────────────────────────

/// An existing directory that aggregate files are written into.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Create `path` (and any missing parents) if absent.
    ///
    /// Calling this on an existing directory is a no-op.
    pub fn ensure(path: impl Into<PathBuf>) -> Result<Self> {
        let root = path.into();
        std::fs::create_dir_all(&root).map_err(|e| EdaError::write(&root, e))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Ensure the child directory `name` and return it.
    pub fn subdir(&self, name: &str) -> Result<OutputDir> {
        OutputDir::ensure(self.root.join(name))
    }

    /// Write `table` to `<dir>/<name>.csv`, replacing any existing file.
    pub fn write_table<T: Tabular>(&self, name: &str, table: &T) -> Result<PathBuf> {
        let path = self.root.join(format!("{}.csv", name));
        let file = File::create(&path).map_err(|e| EdaError::write(&path, e))?;

        let mut out = csv::Writer::from_writer(file);
        out.write_record(table.header())
            .and_then(|_| table.write_rows(&mut out))
            .map_err(|e| EdaError::write(&path, e.into()))?;
        out.flush().map_err(|e| EdaError::write(&path, e))?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Write `value` as pretty JSON to `<dir>/<name>.json`.
    ///
    /// The file is written next to its destination and renamed into place.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.root.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| EdaError::write(&path, std::io::Error::other(e)))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| EdaError::write(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| EdaError::write(&path, e))?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

// ── Aggregate persistence ─────────────────────────────────────────────────────

/// Write every view in `set` into `dir`, returning the paths in write order.
pub fn persist_aggregates(dir: &OutputDir, set: &AggregateSet) -> Result<Vec<PathBuf>> {
    let limits = &set.limits;
    let written = vec![
        dir.write_table("top_users", &set.top_users)?,
        dir.write_table("top_groups", &set.top_groups)?,
        dir.write_table("daily_activity", &set.daily)?,
        dir.write_table("hourly_activity", &set.hourly)?,
        dir.write_table("weekday_activity", &set.weekday)?,
        dir.write_table("heatmap_weekday_hour", &set.weekday_hour)?,
        dir.write_table("heatmap_weekday_month", &set.weekday_month)?,
        dir.write_table(&format!("top_{}_images", limits.top_images), &set.top_images)?,
        dir.write_table(
            &format!("top_{}_image_spread_trend", limits.spread_images),
            &set.spread_trend,
        )?,
        dir.write_table("user_post_distribution", &set.user_distribution)?,
    ];
    Ok(written)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
