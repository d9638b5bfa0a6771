//! Read-only lookup tables for tiles, checks, items and story events.
//!
//! The tables are loaded once and passed by reference to whatever needs to
//! translate between ids and names. Synthetic tiles introduced by the
//! pipeline (run start/end, reset, save & quit) are always present in the
//! tile table.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::constants::{CHECKS_FILE, EVENTS_FILE, ITEMS_FILE, SYNTHETIC_TILES, TILES_FILE};
use crate::error::{RouteError, RouteResult};

/// A single reference record. Extra keys in the source JSON are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRecord {
    pub id: u32,
    pub name: String,
}

/// Bidirectional `id <-> name` projection of one reference table.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    table: &'static str,
    records: Vec<RefRecord>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl LookupTable {
    #[must_use]
    pub fn new(table: &'static str, records: Vec<RefRecord>) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_name = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            by_id.insert(record.id, idx);
            by_name.insert(record.name.clone(), idx);
        }
        Self {
            table,
            records,
            by_id,
            by_name,
        }
    }

    /// Parse a table from a JSON array of `{ "id": .., "name": .. }` records.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an array of records.
    pub fn from_json(table: &'static str, json: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<RefRecord> = serde_json::from_str(json)?;
        Ok(Self::new(table, records))
    }

    fn with_synthetic(mut self, extra: &[(u32, &str)]) -> Self {
        for (id, name) in extra {
            if self.by_id.contains_key(id) {
                continue;
            }
            let idx = self.records.len();
            self.records.push(RefRecord {
                id: *id,
                name: (*name).to_string(),
            });
            self.by_id.insert(*id, idx);
            self.by_name.insert((*name).to_string(), idx);
        }
        self
    }

    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    /// # Errors
    ///
    /// Returns [`RouteError::MalformedReferenceData`] when the id is unknown.
    pub fn name(&self, id: u32) -> RouteResult<&str> {
        self.get_name(id)
            .ok_or_else(|| RouteError::MalformedReferenceData {
                table: self.table,
                key: id.to_string(),
            })
    }

    /// # Errors
    ///
    /// Returns [`RouteError::MalformedReferenceData`] when the name is unknown.
    pub fn id(&self, name: &str) -> RouteResult<u32> {
        self.get_id(name)
            .ok_or_else(|| RouteError::MalformedReferenceData {
                table: self.table,
                key: name.to_string(),
            })
    }

    #[must_use]
    pub fn get_name(&self, id: u32) -> Option<&str> {
        self.by_id
            .get(&id)
            .and_then(|idx| self.records.get(*idx))
            .map(|r| r.name.as_str())
    }

    #[must_use]
    pub fn get_id(&self, name: &str) -> Option<u32> {
        self.by_name
            .get(name)
            .and_then(|idx| self.records.get(*idx))
            .map(|r| r.id)
    }

    /// Records whose lowercased name matches `pattern` from the start.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidConfig`] if the pattern is not a valid
    /// regular expression.
    pub fn find(&self, pattern: &str) -> RouteResult<Vec<&RefRecord>> {
        let re = Regex::new(&format!("^(?:{pattern})")).map_err(|e| RouteError::InvalidConfig {
            field: "pattern",
            reason: e.to_string(),
        })?;
        Ok(self
            .records
            .iter()
            .filter(|r| re.is_match(&r.name.to_lowercase()))
            .collect())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RefRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// All four reference tables.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub tiles: LookupTable,
    pub checks: LookupTable,
    pub items: LookupTable,
    pub events: LookupTable,
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::from_tables(Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }
}

impl ReferenceData {
    #[must_use]
    pub fn from_tables(
        tiles: Vec<RefRecord>,
        checks: Vec<RefRecord>,
        items: Vec<RefRecord>,
        events: Vec<RefRecord>,
    ) -> Self {
        Self {
            tiles: LookupTable::new("tiles", tiles).with_synthetic(&SYNTHETIC_TILES),
            checks: LookupTable::new("checks", checks),
            items: LookupTable::new("items", items),
            events: LookupTable::new("events", events),
        }
    }

    /// Load `tiles.json`, `checks.json`, `items.json` and `events.json` from
    /// a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any file is missing or is not a JSON array of
    /// records.
    pub fn load_dir(dir: &Path) -> RouteResult<Self> {
        let tiles = read_records(&dir.join(TILES_FILE))?;
        let checks = read_records(&dir.join(CHECKS_FILE))?;
        let items = read_records(&dir.join(ITEMS_FILE))?;
        let events = read_records(&dir.join(EVENTS_FILE))?;
        log::debug!(
            "reference data: {} tiles, {} checks, {} items, {} events",
            tiles.len(),
            checks.len(),
            items.len(),
            events.len()
        );
        Ok(Self::from_tables(tiles, checks, items, events))
    }

    /// # Errors
    ///
    /// Returns [`RouteError::MalformedReferenceData`] for an unknown tile id.
    pub fn tile_name(&self, tile_id: u32) -> RouteResult<&str> {
        self.tiles.name(tile_id)
    }

    /// # Errors
    ///
    /// Returns [`RouteError::MalformedReferenceData`] for an unknown name.
    pub fn tile_id(&self, name: &str) -> RouteResult<u32> {
        self.tiles.id(name)
    }

    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn find_tiles(&self, pattern: &str) -> RouteResult<Vec<&RefRecord>> {
        self.tiles.find(pattern)
    }

    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn find_items(&self, pattern: &str) -> RouteResult<Vec<&RefRecord>> {
        self.items.find(pattern)
    }
}

fn read_records(path: &Path) -> RouteResult<Vec<RefRecord>> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| RouteError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RouteError::Json {
        path: display,
        source,
    })
}
