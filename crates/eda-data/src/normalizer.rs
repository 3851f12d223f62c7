//! Epoch-to-calendar conversion of a loaded event table.

use eda_core::error::{EdaError, Result};
use eda_core::models::{EventRecord, NormalizedEvent};
use eda_core::time_utils::TimezoneHandler;
use tracing::debug;

/// Resolve every event's timestamp in `handler`'s timezone.
///
/// The first timestamp without a representable calendar instant aborts with
/// [`EdaError::CalendarConversion`] carrying its 1-based row number; no row is
/// dropped or clamped.
pub fn normalize(table: Vec<EventRecord>, handler: &TimezoneHandler) -> Result<Vec<NormalizedEvent>> {
    let rows = table.len();
    let events = table
        .into_iter()
        .enumerate()
        .map(|(row, record)| {
            let at = handler
                .from_epoch(record.timestamp)
                .ok_or(EdaError::CalendarConversion {
                    row: row + 1,
                    timestamp: record.timestamp,
                })?;
            Ok(NormalizedEvent { record, at })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Normalized {} rows into {}", rows, handler.name());
    Ok(events)
}
