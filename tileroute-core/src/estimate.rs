//! Best-possible-time estimation.
//!
//! Every logic tile of every run is keyed by a configurable hash of its
//! route context. The fastest time seen for each key across all runs is the
//! best known time for that stretch; a run's best possible time is the sum
//! of those minima along its own visits.
use serde::Serialize;
use std::collections::HashMap;

use crate::ability::{Ability, AbilityRules};
use crate::error::{RouteError, RouteResult};
use crate::hasher::{Field, hash_fields};
use crate::identity::{LogicTile, resolve_run};
use crate::reference::ReferenceData;
use crate::runlog::RunLog;

/// Which fields make two visits "the same stretch" for the estimator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorConfig {
    pub route_fields: Vec<Field>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        let route_fields = Field::ROUTE
            .into_iter()
            .chain(Field::TILE_EVENTS)
            .chain(Ability::ALL.into_iter().map(Field::Ability))
            .collect();
        Self { route_fields }
    }
}

impl EstimatorConfig {
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownAbility`] for a name that is neither a
    /// tile field nor an ability, and [`RouteError::InvalidConfig`] for an
    /// empty list.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> RouteResult<Self> {
        if names.is_empty() {
            return Err(RouteError::InvalidConfig {
                field: "estimator_fields",
                reason: "at least one field is required".to_string(),
            });
        }
        let route_fields = names
            .iter()
            .map(|n| n.as_ref().parse::<Field>())
            .collect::<RouteResult<Vec<_>>>()?;
        Ok(Self { route_fields })
    }

    fn key(&self, tile: &LogicTile) -> u64 {
        hash_fields(tile, &self.route_fields)
    }
}

/// One visit of the compared run next to the best time known for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRow {
    pub row: usize,
    pub previous_tile: u32,
    pub previous_name: String,
    pub tile_id: u32,
    pub tile_name: String,
    pub next_tile: u32,
    pub next_name: String,
    pub next_next_tile: u32,
    pub next_next_name: String,
    pub abilities: String,
    pub check_occurred: bool,
    pub actual_ms: u64,
    pub best_ms: u64,
    pub delta_ms: u64,
}

/// A run compared against the best times of every loaded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunComparison {
    pub run: String,
    pub rows: Vec<ComparisonRow>,
    pub total_ms: u64,
    pub best_total_ms: u64,
}

impl RunComparison {
    #[must_use]
    pub const fn possible_save_ms(&self) -> u64 {
        self.total_ms.saturating_sub(self.best_total_ms)
    }

    /// Rows with the largest time loss first.
    #[must_use]
    pub fn worst_rows(&self, limit: usize) -> Vec<&ComparisonRow> {
        let mut rows: Vec<&ComparisonRow> = self.rows.iter().filter(|r| r.delta_ms > 0).collect();
        rows.sort_by(|a, b| b.delta_ms.cmp(&a.delta_ms).then(a.row.cmp(&b.row)));
        rows.truncate(limit);
        rows
    }
}

struct KeyedRun {
    name: String,
    tiles: Vec<LogicTile>,
    keys: Vec<u64>,
}

/// Collects runs and answers best-possible-time comparisons.
pub struct RunComparator<'a> {
    reference: &'a ReferenceData,
    config: EstimatorConfig,
    runs: Vec<KeyedRun>,
    best: HashMap<u64, u64>,
}

impl<'a> RunComparator<'a> {
    #[must_use]
    pub fn new(reference: &'a ReferenceData, config: EstimatorConfig) -> Self {
        Self {
            reference,
            config,
            runs: Vec::new(),
            best: HashMap::new(),
        }
    }

    /// Add already resolved tiles of one run.
    pub fn add_tiles(&mut self, name: impl Into<String>, tiles: Vec<LogicTile>) {
        let keys: Vec<u64> = tiles.iter().map(|t| self.config.key(t)).collect();
        for (tile, key) in tiles.iter().zip(&keys) {
            self.best
                .entry(*key)
                .and_modify(|best| *best = (*best).min(tile.weight))
                .or_insert(tile.weight);
        }
        self.runs.push(KeyedRun {
            name: name.into(),
            tiles,
            keys,
        });
    }

    /// Resolve and add a run. A failing run is not added.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while segmenting or resolving the run.
    pub fn add_run(&mut self, run: &RunLog, rules: &AbilityRules) -> RouteResult<usize> {
        let tiles = resolve_run(run, rules).collect::<RouteResult<Vec<_>>>()?;
        let count = tiles.len();
        self.add_tiles(run.name.clone(), tiles);
        Ok(count)
    }

    pub fn run_names(&self) -> impl Iterator<Item = &str> {
        self.runs.iter().map(|r| r.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Compare one run with the fastest times seen across all runs.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownRunRequested`] listing the loaded runs
    /// when `run` is not one of them, and
    /// [`RouteError::MalformedReferenceData`] when a tile of the run has no
    /// name.
    pub fn best_possible_time_for(&self, run: &str) -> RouteResult<RunComparison> {
        let selected = self
            .runs
            .iter()
            .find(|r| r.name == run)
            .ok_or_else(|| RouteError::UnknownRunRequested {
                requested: run.to_string(),
                available: self.run_names().map(str::to_string).collect(),
            })?;

        let rows: Vec<ComparisonRow> = selected
            .tiles
            .iter()
            .zip(&selected.keys)
            .map(|(tile, key)| {
                let best = self.best.get(key).copied().unwrap_or(tile.weight);
                self.row(tile, best)
            })
            .collect::<RouteResult<_>>()?;
        let total_ms = rows.iter().map(|r| r.actual_ms).sum();
        let best_total_ms = rows.iter().map(|r| r.best_ms).sum();
        log::info!("{run}: {total_ms} ms actual, {best_total_ms} ms best possible");
        Ok(RunComparison {
            run: run.to_string(),
            rows,
            total_ms,
            best_total_ms,
        })
    }

    fn row(&self, tile: &LogicTile, best_ms: u64) -> RouteResult<ComparisonRow> {
        let name = |id: u32| self.reference.tile_name(id).map(str::to_string);
        Ok(ComparisonRow {
            row: tile.visit.source_row,
            previous_tile: tile.previous_tile,
            previous_name: name(tile.previous_tile)?,
            tile_id: tile.tile_id(),
            tile_name: name(tile.tile_id())?,
            next_tile: tile.next_tile,
            next_name: name(tile.next_tile)?,
            next_next_tile: tile.next_next_tile,
            next_next_name: name(tile.next_next_tile)?,
            abilities: tile.abilities().describe(),
            check_occurred: tile.visit.check_occurred,
            actual_ms: tile.weight,
            best_ms,
            delta_ms: tile.weight.saturating_sub(best_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::RefRecord;
    use crate::runlog::LogRow;

    fn reference() -> ReferenceData {
        let tiles = (1..=5)
            .map(|id| RefRecord {
                id,
                name: format!("Tile {id}"),
            })
            .collect();
        ReferenceData::from_tables(tiles, Vec::new(), Vec::new(), Vec::new())
    }

    fn run(name: &str, tiles: &[(u64, u32)]) -> RunLog {
        let rows = tiles
            .iter()
            .enumerate()
            .map(|(index, (ts, tile))| LogRow::tile(index, *ts, *tile))
            .collect();
        RunLog::from_rows(name, rows)
    }

    fn comparator<'a>(reference: &'a ReferenceData, runs: &[RunLog]) -> RunComparator<'a> {
        let mut comparator = RunComparator::new(reference, EstimatorConfig::default());
        for r in runs {
            comparator.add_run(r, &AbilityRules::all()).unwrap();
        }
        comparator
    }

    #[test]
    fn takes_minimum_over_matching_stretches() {
        let reference = reference();
        let runs = [
            run("slow.csv", &[(0, 1), (100, 2), (300, 3), (310, 4)]),
            run("fast.csv", &[(0, 1), (60, 2), (200, 3), (230, 4)]),
        ];
        let comparison = comparator(&reference, &runs)
            .best_possible_time_for("slow.csv")
            .unwrap();
        let actual: Vec<u64> = comparison.rows.iter().map(|r| r.actual_ms).collect();
        let best: Vec<u64> = comparison.rows.iter().map(|r| r.best_ms).collect();
        assert_eq!(actual, vec![100, 200, 10, 0]);
        assert_eq!(best, vec![60, 140, 10, 0]);
        assert_eq!(comparison.total_ms, 310);
        assert_eq!(comparison.best_total_ms, 210);
        assert_eq!(comparison.possible_save_ms(), 100);
        assert_eq!(comparison.worst_rows(1)[0].row, 1);
        assert_eq!(comparison.rows[0].previous_name, "RUN_START");
    }

    #[test]
    fn different_context_is_not_compared() {
        let reference = reference();
        let runs = [
            run("a.csv", &[(0, 1), (100, 2), (150, 3)]),
            run("b.csv", &[(0, 1), (10, 2), (20, 5)]),
        ];
        let comparison = comparator(&reference, &runs)
            .best_possible_time_for("a.csv")
            .unwrap();
        assert_eq!(comparison.best_total_ms, comparison.total_ms);
    }

    #[test]
    fn unknown_run_lists_alternatives() {
        let reference = reference();
        let runs = [run("a.csv", &[(0, 1)]), run("b.csv", &[(0, 1)])];
        let err = comparator(&reference, &runs)
            .best_possible_time_for("c.csv")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "run c.csv does not exist. Possible values: a.csv, b.csv"
        );
    }

    #[test]
    fn unnamed_tile_is_a_lookup_failure() {
        let reference = reference();
        let runs = [run("a.csv", &[(0, 1), (40, 9), (90, 2)])];
        let err = comparator(&reference, &runs)
            .best_possible_time_for("a.csv")
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::MalformedReferenceData { table: "tiles", ref key } if key == "9"
        ));
    }

    #[test]
    fn fields_parse_from_names() {
        let config = EstimatorConfig::from_names(&["tile_id", "next_tile", "can_dash"]).unwrap();
        assert_eq!(config.route_fields.len(), 3);
        assert!(EstimatorConfig::from_names::<&str>(&[]).is_err());
        assert!(matches!(
            EstimatorConfig::from_names(&["bogus"]),
            Err(RouteError::UnknownAbility(_))
        ));
    }
}
