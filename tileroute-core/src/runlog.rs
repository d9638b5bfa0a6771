//! Reading recorded run logs.
//!
//! A run log is a CSV file with optional `# key value` metadata lines on top,
//! followed by a header and one row per logged event. Older recordings name
//! the tile column `transition_id`.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::constants::{
    COL_EVENT_ID, COL_ITEM_ID, COL_LEGACY_TILE_ID, COL_LOCATION_ID, COL_TILE_ID, COL_TIMESTAMP,
    META_PREFIX,
};
use crate::error::{RouteError, RouteResult};

/// One raw event of a run. At most one of the id columns is normally set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct LogRow {
    /// Position of the row in the data section of the log.
    pub index: usize,
    /// Milliseconds since the first logged event.
    pub timestamp: u64,
    pub tile_id: Option<u32>,
    pub location_id: Option<u32>,
    pub item_id: Option<u32>,
    pub event_id: Option<u32>,
}

impl LogRow {
    #[must_use]
    pub const fn tile(index: usize, timestamp: u64, tile_id: u32) -> Self {
        Self {
            index,
            timestamp,
            tile_id: Some(tile_id),
            location_id: None,
            item_id: None,
            event_id: None,
        }
    }
}

/// A complete play-through as read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunLog {
    pub name: String,
    pub meta: BTreeMap<String, String>,
    pub rows: Vec<LogRow>,
}

impl RunLog {
    #[must_use]
    pub fn from_rows(name: impl Into<String>, rows: Vec<LogRow>) -> Self {
        Self {
            name: name.into(),
            meta: BTreeMap::new(),
            rows,
        }
    }

    /// Read a run log from disk; the run is named after the file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid run log.
    pub fn read(path: &Path) -> RouteResult<Self> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| RouteError::Io {
            path: display.clone(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| display.clone(), |n| n.to_string_lossy().into_owned());
        log::debug!("reading run {display}");
        Self::parse(&name, &text)
    }

    /// Parse the textual contents of a run log.
    ///
    /// Timestamps are rebased so the earliest event is at 0 ms.
    ///
    /// # Errors
    ///
    /// Returns an error if the header lacks the timestamp or tile column, or a
    /// cell cannot be read as a number.
    pub fn parse(name: &str, text: &str) -> RouteResult<Self> {
        let (meta, body) = split_meta(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = reader
            .headers()
            .map_err(|source| RouteError::Csv {
                path: name.to_string(),
                source,
            })?
            .clone();
        let columns = Columns::locate(&headers).map_err(|message| RouteError::MalformedRunLog {
            path: name.to_string(),
            message,
        })?;

        let mut raw: Vec<(i64, LogRow)> = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|source| RouteError::Csv {
                path: name.to_string(),
                source,
            })?;
            let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("");
            let malformed = |message: String| RouteError::MalformedRunLog {
                path: name.to_string(),
                message: format!("row {index}: {message}"),
            };

            let timestamp = parse_timestamp(cell(Some(columns.timestamp))).map_err(malformed)?;
            let row = LogRow {
                index,
                timestamp: 0,
                tile_id: parse_id(cell(Some(columns.tile_id))).map_err(malformed)?,
                location_id: parse_id(cell(columns.location_id)).map_err(malformed)?,
                item_id: parse_id(cell(columns.item_id)).map_err(malformed)?,
                event_id: parse_id(cell(columns.event_id)).map_err(malformed)?,
            };
            raw.push((timestamp, row));
        }

        let start = raw.iter().map(|(ts, _)| *ts).min().unwrap_or(0);
        let rows = raw
            .into_iter()
            .map(|(ts, mut row)| {
                row.timestamp = ts.abs_diff(start);
                row
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            meta,
            rows,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

struct Columns {
    timestamp: usize,
    tile_id: usize,
    location_id: Option<usize>,
    item_id: Option<usize>,
    event_id: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, String> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let timestamp = find(COL_TIMESTAMP).ok_or_else(|| format!("missing {COL_TIMESTAMP} column"))?;
        let tile_id = find(COL_TILE_ID)
            .or_else(|| find(COL_LEGACY_TILE_ID))
            .ok_or_else(|| format!("missing {COL_TILE_ID} column"))?;
        Ok(Self {
            timestamp,
            tile_id,
            location_id: find(COL_LOCATION_ID),
            item_id: find(COL_ITEM_ID),
            event_id: find(COL_EVENT_ID),
        })
    }
}

/// Split leading metadata lines from the CSV body.
fn split_meta(text: &str) -> (BTreeMap<String, String>, &str) {
    let mut meta = BTreeMap::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with(META_PREFIX) {
            break;
        }
        offset += line.len();
        let entry = trimmed.trim_start_matches(META_PREFIX).trim();
        if entry.is_empty() {
            continue;
        }
        let (key, value) = entry.split_once(' ').unwrap_or((entry, ""));
        meta.insert(key.to_string(), value.trim().to_string());
    }
    (meta, text.get(offset..).unwrap_or(""))
}

fn parse_timestamp(cell: &str) -> Result<i64, String> {
    if let Ok(value) = cell.parse::<i64>() {
        return Ok(value);
    }
    match cell.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(format!("invalid timestamp {cell:?}")),
    }
}

/// Id cells are integers, sometimes written as floats (`6.0`) by tools that
/// round-tripped the log; empty and `nan` cells are absent.
fn parse_id(cell: &str) -> Result<Option<u32>, String> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    if let Ok(value) = cell.parse::<u32>() {
        return Ok(Some(value));
    }
    match cell.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(value) if value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value) => {
            Ok(Some(value as u32))
        }
        _ => Err(format!("invalid id {cell:?}")),
    }
}
