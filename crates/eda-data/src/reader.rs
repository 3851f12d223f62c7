//! Batched loading of the tab-separated event log.
//!
//! The input is read through a single scoped file handle owned by
//! [`EventBatches`]; at most one batch of rows is buffered at a time and the
//! batches are concatenated into an [`EventTable`] by [`load_events`].

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{StringRecord, StringRecordsIntoIter};
use eda_core::error::{EdaError, Result};
use eda_core::models::{EventRecord, EventTable};
use tracing::debug;

/// Rows per batch when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Column holding epoch seconds; every column list must request it.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Upper bound on the capacity reserved up front for one batch.
const MAX_BATCH_PREALLOC: usize = 4096;

// ── ColumnIndex ───────────────────────────────────────────────────────────────

/// Header positions of a fixed, ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    names: Vec<String>,
    positions: Vec<usize>,
}

impl ColumnIndex {
    /// Locate each of `columns` in `headers`.
    ///
    /// Extra header columns are ignored. The first requested column that is
    /// missing yields [`EdaError::Schema`].
    pub fn resolve(headers: &StringRecord, columns: &[&str], path: &Path) -> Result<Self> {
        let positions = columns
            .iter()
            .map(|column| {
                headers
                    .iter()
                    .position(|h| h == *column)
                    .ok_or_else(|| EdaError::Schema {
                        path: path.to_path_buf(),
                        column: column.to_string(),
                    })
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(Self {
            names: columns.iter().map(|c| c.to_string()).collect(),
            positions,
        })
    }

    /// Header position of each requested column, in request order.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Header position of `column`, if it was requested.
    pub fn position_of(&self, column: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n == column)
            .map(|slot| self.positions[slot])
    }
}

/// Where each [`EventRecord`] field sits in a data row.
///
/// Identifier columns that were not requested read as empty strings.
#[derive(Debug, Clone, Copy)]
struct FieldPositions {
    group_id: Option<usize>,
    user_id: Option<usize>,
    image_id: Option<usize>,
    cluster_image_name: Option<usize>,
    timestamp: usize,
}

impl FieldPositions {
    fn from_index(index: &ColumnIndex) -> Result<Self> {
        let timestamp = index.position_of(TIMESTAMP_COLUMN).ok_or_else(|| {
            EdaError::Config(format!(
                "column list must include `{}`",
                TIMESTAMP_COLUMN
            ))
        })?;
        Ok(Self {
            group_id: index.position_of("group_id"),
            user_id: index.position_of("user_id"),
            image_id: index.position_of("image_id"),
            cluster_image_name: index.position_of("cluster_image_name"),
            timestamp,
        })
    }
}

/// Cell at `position`; short rows and unrequested columns read as empty.
fn cell(row: &StringRecord, position: Option<usize>) -> &str {
    position.and_then(|p| row.get(p)).unwrap_or("")
}

// ── EventBatches ──────────────────────────────────────────────────────────────

/// Sequential, fixed-size batches of [`EventRecord`]s read from one file.
///
/// Only the requested columns are retained. The file handle is released when
/// the iterator is dropped. After the first error the iterator is fused.
pub struct EventBatches {
    path: PathBuf,
    records: StringRecordsIntoIter<File>,
    fields: FieldPositions,
    batch_size: usize,
    rows_read: usize,
    batches_read: usize,
    finished: bool,
}

impl EventBatches {
    /// Open `path` and resolve `columns` against its header.
    ///
    /// `columns` must include `timestamp`. A `batch_size` of zero is treated
    /// as one.
    pub fn open(path: &Path, columns: &[&str], batch_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| EdaError::file_access(path, e))?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| EdaError::file_access(path, e.into()))?
            .clone();
        let index = ColumnIndex::resolve(&headers, columns, path)?;
        let fields = FieldPositions::from_index(&index)?;

        debug!(
            "Opened {} ({} header columns, {} requested, batch size {})",
            path.display(),
            headers.len(),
            columns.len(),
            batch_size.max(1)
        );

        Ok(Self {
            path: path.to_path_buf(),
            records: reader.into_records(),
            fields,
            batch_size: batch_size.max(1),
            rows_read: 0,
            batches_read: 0,
            finished: false,
        })
    }

    /// Number of data rows consumed so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Number of batches yielded so far.
    pub fn batches_read(&self) -> usize {
        self.batches_read
    }

    /// Build the record for the data row after the `rows_read` already consumed.
    fn build_record(&self, row: &StringRecord) -> Result<EventRecord> {
        let raw_ts = cell(row, Some(self.fields.timestamp));
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| EdaError::FieldParse {
            row: self.rows_read + 1,
            column: TIMESTAMP_COLUMN.to_string(),
            value: raw_ts.to_string(),
        })?;

        Ok(EventRecord {
            group_id: cell(row, self.fields.group_id).to_string(),
            user_id: cell(row, self.fields.user_id).to_string(),
            image_id: cell(row, self.fields.image_id).to_string(),
            cluster_image_name: cell(row, self.fields.cluster_image_name).to_string(),
            timestamp,
        })
    }
}

impl Iterator for EventBatches {
    type Item = Result<Vec<EventRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size.min(MAX_BATCH_PREALLOC));
        while batch.len() < self.batch_size {
            match self.records.next() {
                Some(Ok(row)) => match self.build_record(&row) {
                    Ok(record) => {
                        batch.push(record);
                        self.rows_read += 1;
                    }
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                },
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(EdaError::file_access(&self.path, e.into())));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            self.batches_read += 1;
            Some(Ok(batch))
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// An event table together with the number of batches it was read in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedEvents {
    pub table: EventTable,
    pub batches: usize,
}

/// Load `columns` of `path`, `batch_size` rows at a time, keeping the batch
/// count.
pub fn load_batches(path: &Path, columns: &[&str], batch_size: usize) -> Result<LoadedEvents> {
    let mut table: EventTable = Vec::new();
    let mut batches = 0usize;

    for batch in EventBatches::open(path, columns, batch_size)? {
        let batch = batch?;
        batches += 1;
        debug!("Batch {}: {} rows", batches, batch.len());
        table.extend(batch);
    }

    debug!(
        "Loaded {} rows in {} batches from {}",
        table.len(),
        batches,
        path.display()
    );

    Ok(LoadedEvents { table, batches })
}

/// Load the whole event table from `path`, `batch_size` rows at a time.
///
/// Rows keep their file order; the result is identical for every batch size.
pub fn load_events(path: &Path, columns: &[&str], batch_size: usize) -> Result<EventTable> {
    load_batches(path, columns, batch_size).map(|loaded| loaded.table)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Read epoch seconds from a cell. Fractional values truncate toward zero.
fn parse_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<i64>() {
        return Some(secs);
    }
    let secs = trimmed.parse::<f64>().ok()?;
    if !secs.is_finite() {
        return None;
    }
    Some(secs.trunc() as i64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use eda_core::models::REQUIRED_COLUMNS;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    const HEADER: &str = "group_id\tuser_id\timage_id\tcluster_image_name\ttimestamp";
    const COLUMNS: [&str; 5] = REQUIRED_COLUMNS;

    fn write_tsv(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn sample_rows(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                format!(
                    "g{}\tu{}\timg{}.jpg\tcluster{}\t{}",
                    i % 3,
                    i % 7,
                    i,
                    i % 4,
                    1_552_608_000 + i as i64 * 3600
                )
            })
            .collect()
    }

    fn write_sample(dir: &Path, n: usize) -> PathBuf {
        let rows = sample_rows(n);
        let mut lines: Vec<&str> = vec![HEADER];
        lines.extend(rows.iter().map(|s| s.as_str()));
        write_tsv(dir, "events.tsv", &lines)
    }

    // ── ColumnIndex ───────────────────────────────────────────────────────────

    #[test]
    fn test_column_index_resolves_in_request_order() {
        let headers = StringRecord::from(vec!["timestamp", "extra", "user_id"]);
        let index =
            ColumnIndex::resolve(&headers, &["user_id", "timestamp"], Path::new("x")).unwrap();
        assert_eq!(index.positions(), &[2, 0]);
        assert_eq!(index.position_of("timestamp"), Some(0));
        assert_eq!(index.position_of("extra"), None);
    }

    #[test]
    fn test_column_index_missing_column() {
        let headers = StringRecord::from(vec!["user_id"]);
        let err = ColumnIndex::resolve(&headers, &["user_id", "group_id"], Path::new("in.tsv"))
            .unwrap_err();
        match err {
            EdaError::Schema { column, path } => {
                assert_eq!(column, "group_id");
                assert_eq!(path, PathBuf::from("in.tsv"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ── load_events ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_events_basic() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(
            dir.path(),
            "events.tsv",
            &[HEADER, "g1\tu1\ti1.jpg\tc1\t1552660200"],
        );

        let table = load_events(&path, &COLUMNS, DEFAULT_BATCH_SIZE).unwrap();
        assert_eq!(
            table,
            vec![EventRecord {
                group_id: "g1".to_string(),
                user_id: "u1".to_string(),
                image_id: "i1.jpg".to_string(),
                cluster_image_name: "c1".to_string(),
                timestamp: 1_552_660_200,
            }]
        );
    }

    #[test]
    fn test_load_events_row_count_preserved() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 2_345);
        let table = load_events(&path, &COLUMNS, 1000).unwrap();
        assert_eq!(table.len(), 2_345);
    }

    #[test]
    fn test_load_events_identical_across_batch_sizes() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 57);

        let one = load_events(&path, &COLUMNS, 1).unwrap();
        let thousand = load_events(&path, &COLUMNS, 1000).unwrap();
        let huge = load_events(&path, &COLUMNS, usize::MAX).unwrap();

        assert_eq!(one.len(), 57);
        assert_eq!(one, thousand);
        assert_eq!(one, huge);
    }

    #[test]
    fn test_load_events_drops_extra_columns_and_reorders() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(
            dir.path(),
            "events.tsv",
            &[
                "timestamp\tphash\tcluster_image_name\tuser_id\tgroup_id\timage_id\tlang",
                "1552660200\tff00\tc1\tu1\tg1\ti1.jpg\thi",
            ],
        );

        let table = load_events(&path, &COLUMNS, 10).unwrap();
        assert_eq!(table[0].group_id, "g1");
        assert_eq!(table[0].user_id, "u1");
        assert_eq!(table[0].image_id, "i1.jpg");
        assert_eq!(table[0].cluster_image_name, "c1");
        assert_eq!(table[0].timestamp, 1_552_660_200);
    }

    #[test]
    fn test_load_events_header_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(dir.path(), "events.tsv", &[HEADER]);
        let table = load_events(&path, &COLUMNS, 10).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_events_missing_file() {
        let missing = Path::new("/tmp/does-not-exist-eda-test-xyz.tsv");
        let err = load_events(missing, &COLUMNS, 10).unwrap_err();
        assert!(matches!(err, EdaError::FileAccess { .. }));
    }

    #[test]
    fn test_load_events_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(
            dir.path(),
            "events.tsv",
            &["group_id\tuser_id\timage_id\ttimestamp", "g1\tu1\ti1\t0"],
        );
        let err = load_events(&path, &COLUMNS, 10).unwrap_err();
        match err {
            EdaError::Schema { column, .. } => assert_eq!(column, "cluster_image_name"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_events_empty_file_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(dir.path(), "events.tsv", &[]);
        let err = load_events(&path, &COLUMNS, 10).unwrap_err();
        assert!(matches!(err, EdaError::Schema { .. }));
    }

    #[test]
    fn test_load_events_non_numeric_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(
            dir.path(),
            "events.tsv",
            &[HEADER, "g1\tu1\ti1\tc1\t100", "g1\tu1\ti1\tc1\tnoon"],
        );
        let err = load_events(&path, &COLUMNS, 10).unwrap_err();
        match err {
            EdaError::FieldParse { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "timestamp");
                assert_eq!(value, "noon");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_events_short_row_reads_empty_ids() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(
            dir.path(),
            "events.tsv",
            &[
                "timestamp\tgroup_id\tuser_id\timage_id\tcluster_image_name",
                "1552660200\tg1",
            ],
        );
        let table = load_events(&path, &COLUMNS, 10).unwrap();
        assert_eq!(table[0].group_id, "g1");
        assert_eq!(table[0].user_id, "");
        assert_eq!(table[0].cluster_image_name, "");
    }

    // ── EventBatches ──────────────────────────────────────────────────────────

    #[test]
    fn test_event_batches_sizes() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 10);

        let sizes: Vec<usize> = EventBatches::open(&path, &COLUMNS, 4)
            .unwrap()
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_event_batches_zero_batch_size_treated_as_one() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 3);
        let batches: Vec<_> = EventBatches::open(&path, &COLUMNS, 0).unwrap().collect();
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn test_event_batches_fused_after_error() {
        let dir = TempDir::new().unwrap();
        let path = write_tsv(
            dir.path(),
            "events.tsv",
            &[HEADER, "g1\tu1\ti1\tc1\tbad", "g1\tu1\ti1\tc1\t100"],
        );
        let mut batches = EventBatches::open(&path, &COLUMNS, 1).unwrap();
        assert!(batches.next().unwrap().is_err());
        assert!(batches.next().is_none());
    }

    #[test]
    fn test_event_batches_rows_read() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 5);
        let mut batches = EventBatches::open(&path, &COLUMNS, 2).unwrap();
        batches.next();
        assert_eq!(batches.rows_read(), 2);
    }

    #[test]
    fn test_event_batches_counts_batches() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 10);
        let mut batches = EventBatches::open(&path, &COLUMNS, 4).unwrap();
        assert_eq!(batches.batches_read(), 0);
        while batches.next().is_some() {}
        assert_eq!(batches.batches_read(), 3);
    }

    #[test]
    fn test_load_batches_reports_batch_count() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 10);

        let loaded = load_batches(&path, &COLUMNS, 3).unwrap();
        assert_eq!(loaded.table.len(), 10);
        assert_eq!(loaded.batches, 4);

        let header_only = write_tsv(dir.path(), "empty.tsv", &[HEADER]);
        assert_eq!(load_batches(&header_only, &COLUMNS, 3).unwrap().batches, 0);
    }

    // ── Column lists ──────────────────────────────────────────────────────────

    #[test]
    fn test_load_events_requested_column_missing_from_header() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 2);
        let columns = ["group_id", "user_id", "timestamp", "phash"];

        let err = load_events(&path, &columns, 10).unwrap_err();
        match err {
            EdaError::Schema { column, .. } => assert_eq!(column, "phash"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_events_subset_of_columns() {
        let dir = TempDir::new().unwrap();
        // No group_id or cluster_image_name in the header; they are not requested.
        let path = write_tsv(
            dir.path(),
            "events.tsv",
            &["user_id\ttimestamp\timage_id", "u1\t1552660200\ti1.jpg"],
        );

        let table = load_events(&path, &["timestamp", "user_id"], 10).unwrap();
        assert_eq!(table[0].user_id, "u1");
        assert_eq!(table[0].timestamp, 1_552_660_200);
        assert_eq!(table[0].group_id, "");
        // Present in the header but not requested.
        assert_eq!(table[0].image_id, "");
    }

    #[test]
    fn test_load_events_without_timestamp_column_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(dir.path(), 1);
        let err = load_events(&path, &["group_id", "user_id"], 10).unwrap_err();
        assert!(matches!(err, EdaError::Config(_)));
    }

    // ── parse_timestamp ───────────────────────────────────────────────────────

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp("1552660200"), Some(1_552_660_200));
        assert_eq!(parse_timestamp(" 42 "), Some(42));
        assert_eq!(parse_timestamp("-5"), Some(-5));
        assert_eq!(parse_timestamp("1552660200.9"), Some(1_552_660_200));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("NaN"), None);
        assert_eq!(parse_timestamp("2019-03-15"), None);
    }
}
