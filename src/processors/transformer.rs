use crate::error::{Result, SyncError};
use crate::models::{Datapoint, HeaderTriple, Measurement, RawRow, Reading};
use crate::utils::constants::{DROP_COLUMNS, SOURCE_UTC_OFFSET_HOURS, TIMESTAMP_COLUMN, TIMESTAMP_FORMATS};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

/// Converts raw rows into typed datapoints.
///
/// Timestamps in the files are naive local time. They are read at a fixed
/// offset (UTC-6 by default, no daylight saving) and stored as UTC.
pub struct Transformer {
    source_offset: FixedOffset,
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            source_offset: FixedOffset::east_opt(SOURCE_UTC_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }

    /// Read timestamps at `hours` east of UTC; offsets of a day or more are rejected.
    pub fn with_utc_offset_hours(hours: i32) -> Result<Self> {
        let source_offset = hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| SyncError::Config(format!("UTC offset of {} hours is out of range", hours)))?;
        Ok(Self { source_offset })
    }

    /// Timestamp of a row, taken from its TIMESTAMP column
    pub fn row_timestamp(&self, header: &HeaderTriple, row: &RawRow, row_number: usize) -> Result<DateTime<Utc>> {
        let raw = row
            .value_for(header, TIMESTAMP_COLUMN)
            .ok_or_else(|| SyncError::RowTransform {
                row: row_number,
                message: "missing TIMESTAMP value".to_string(),
            })?;

        self.parse_timestamp(raw).map_err(|e| SyncError::RowTransform {
            row: row_number,
            message: format!("invalid TIMESTAMP '{}': {}", raw, e),
        })
    }

    /// Parse a naive logger timestamp at the source offset and convert to UTC
    pub fn parse_timestamp(&self, raw: &str) -> Result<DateTime<Utc>> {
        let trimmed = raw.trim();
        let naive = TIMESTAMP_FORMATS[1..]
            .iter()
            .fold(NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMATS[0]), |parsed, format| {
                parsed.or_else(|_| NaiveDateTime::parse_from_str(trimmed, format))
            })?;

        // A fixed offset maps every local time to exactly one instant
        Ok(Utc.from_utc_datetime(&(naive - self.source_offset)))
    }

    /// Build the reading set of one row.
    ///
    /// Empty cells and drop-list columns are omitted; keys are lower-cased.
    pub fn readings(&self, header: &HeaderTriple, row: &RawRow) -> Reading {
        let mut reading = Reading::new();

        for (index, identifier) in header.identifiers.iter().enumerate() {
            let value = row.cell(index);
            if value.is_empty() || is_dropped(identifier) {
                continue;
            }

            reading.insert(
                identifier,
                Measurement::new(value, header.unit(index), header.measurement_type(index)),
            );
        }

        reading
    }

    /// Full row transformation with an already-parsed timestamp
    pub fn transform(&self, site_id: i32, timestamp: DateTime<Utc>, header: &HeaderTriple, row: &RawRow) -> Datapoint {
        Datapoint::new(site_id, timestamp, self.readings(header, row))
    }

    /// Parse the timestamp and build the datapoint in one step
    pub fn transform_row(&self, site_id: i32, header: &HeaderTriple, row: &RawRow, row_number: usize) -> Result<Datapoint> {
        let timestamp = self.row_timestamp(header, row, row_number)?;
        Ok(self.transform(site_id, timestamp, header, row))
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop-list membership ignores case so that no persisted key can collide with it.
pub fn is_dropped(identifier: &str) -> bool {
    DROP_COLUMNS
        .iter()
        .any(|dropped| dropped.eq_ignore_ascii_case(identifier))
}
