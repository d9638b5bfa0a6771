//! Collapse a per-event log into one record per tile visit.
use std::sync::Arc;

use crate::ability::{AbilityRules, AbilityVector};
use crate::constants::{
    DEATH_EVENT_ID, RESET_EVENT_ID, RESET_TILE_ID, SAVE_QUIT_EVENT_ID, SAVE_QUIT_TILE_ID,
};
use crate::error::{RouteError, RouteResult};
use crate::runlog::{LogRow, RunLog};

/// A log row together with the abilities held at that row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedRow {
    pub row: LogRow,
    pub abilities: AbilityVector,
}

/// One stay on a tile, from the row that entered it up to the next tile
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileVisit {
    pub run: Arc<str>,
    /// Index of the log row that entered the tile.
    pub source_row: usize,
    /// Boundary timestamp in ms since run start.
    pub timestamp: u64,
    pub tile_id: u32,
    /// Abilities held when the tile was entered.
    pub abilities: AbilityVector,
    pub location_ids: Vec<u32>,
    pub item_ids: Vec<u32>,
    pub event_ids: Vec<u32>,
    /// A check was logged between entering this tile and entering the next.
    pub check_occurred: bool,
}

impl TileVisit {
    fn enter(run: &Arc<str>, tile_id: u32, row: EvaluatedRow) -> Self {
        let mut visit = Self {
            run: Arc::clone(run),
            source_row: row.row.index,
            timestamp: row.row.timestamp,
            tile_id,
            abilities: row.abilities,
            location_ids: Vec::new(),
            item_ids: Vec::new(),
            event_ids: Vec::new(),
            check_occurred: false,
        };
        visit.absorb(&row.row);
        visit
    }

    fn absorb(&mut self, row: &LogRow) {
        self.location_ids.extend(row.location_id);
        self.item_ids.extend(row.item_id);
        self.event_ids.extend(row.event_id);
    }

    fn close(mut self) -> Self {
        self.check_occurred = !self.location_ids.is_empty();
        self
    }
}

/// Turn story events into tile boundaries: save & quit and reset get a
/// synthetic tile id, deaths are dropped.
#[must_use]
pub fn rewrite_special_event(row: LogRow) -> Option<LogRow> {
    match row.event_id {
        Some(DEATH_EVENT_ID) => None,
        Some(SAVE_QUIT_EVENT_ID) => Some(LogRow {
            tile_id: Some(SAVE_QUIT_TILE_ID),
            ..row
        }),
        Some(RESET_EVENT_ID) => Some(LogRow {
            tile_id: Some(RESET_TILE_ID),
            ..row
        }),
        _ => Some(row),
    }
}

/// Lazy single-pass segmentation of one run.
///
/// Yields one [`TileVisit`] per maximal stretch of rows on the same tile.
/// The last open visit is flushed once the input is exhausted. A run whose
/// first row has no tile id yields [`RouteError::MissingTileId`] and ends.
pub struct Segmenter<I> {
    run: Arc<str>,
    rows: I,
    open: Option<TileVisit>,
    done: bool,
}

impl<I> Segmenter<I>
where
    I: Iterator<Item = EvaluatedRow>,
{
    pub fn new(run: impl Into<Arc<str>>, rows: I) -> Self {
        Self {
            run: run.into(),
            rows,
            open: None,
            done: false,
        }
    }
}

impl<I> Iterator for Segmenter<I>
where
    I: Iterator<Item = EvaluatedRow>,
{
    type Item = RouteResult<TileVisit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for row in self.rows.by_ref() {
            let Some(open) = self.open.as_mut() else {
                let Some(tile_id) = row.row.tile_id else {
                    self.done = true;
                    return Some(Err(RouteError::MissingTileId {
                        run: self.run.to_string(),
                        row: row.row.index,
                    }));
                };
                self.open = Some(TileVisit::enter(&self.run, tile_id, row));
                continue;
            };
            match row.row.tile_id {
                Some(tile_id) if tile_id != open.tile_id => {
                    let entered = TileVisit::enter(&self.run, tile_id, row);
                    let finished = std::mem::replace(open, entered);
                    return Some(Ok(finished.close()));
                }
                _ => open.absorb(&row.row),
            }
        }
        self.done = true;
        self.open.take().map(|visit| Ok(visit.close()))
    }
}

/// Pair rows with their ability vectors and apply [`rewrite_special_event`].
pub fn prepare_rows(
    rows: &[LogRow],
    vectors: Vec<AbilityVector>,
) -> impl Iterator<Item = EvaluatedRow> + '_ {
    rows.iter()
        .copied()
        .zip(vectors)
        .filter_map(|(row, abilities)| {
            rewrite_special_event(row).map(|row| EvaluatedRow { row, abilities })
        })
}

/// Evaluate abilities over the whole run, rewrite story events and segment.
pub fn segment_run<'a>(
    run: &'a RunLog,
    rules: &AbilityRules,
) -> Segmenter<impl Iterator<Item = EvaluatedRow> + 'a> {
    let vectors = rules.evaluate(&run.rows);
    Segmenter::new(run.name.as_str(), prepare_rows(&run.rows, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::{Ability, Item};

    fn run(text: &str) -> RunLog {
        RunLog::parse("test.csv", text).unwrap()
    }

    fn visits(log: &RunLog) -> Vec<TileVisit> {
        segment_run(log, &AbilityRules::all())
            .collect::<RouteResult<Vec<_>>>()
            .unwrap()
    }

    const CHECK_LOG: &str = "\
timestamp,tile_id,location_id,item_id,event_id
0,20,,,
1,,18,,
2,17,,,
3,,,20,
4,30,,,
5,,,,20
6,31,,,
7,,,,20
8,,,20,
9,,55,,
9,55,,,
";

    #[test]
    fn marks_check_occurred_on_the_tile_before_the_check() {
        let log = run(CHECK_LOG);
        let flagged: Vec<(usize, bool)> = visits(&log)
            .iter()
            .map(|v| (v.source_row, v.check_occurred))
            .collect();
        assert_eq!(
            flagged,
            vec![(0, true), (2, false), (4, false), (6, true), (10, false)]
        );
    }

    #[test]
    fn aggregates_incidental_events() {
        let log = run(CHECK_LOG);
        let all = visits(&log);
        assert_eq!(all[0].location_ids, vec![18]);
        assert_eq!(all[1].item_ids, vec![20]);
        assert_eq!(all[2].event_ids, vec![20]);
        assert_eq!(all[3].event_ids, vec![20]);
        assert_eq!(all[3].item_ids, vec![20]);
        assert_eq!(all[3].location_ids, vec![55]);
    }

    #[test]
    fn final_visit_is_flushed_even_for_tile_zero() {
        let log = run("timestamp,tile_id,location_id,item_id,event_id\n0,4,,,\n10,0,,,\n12,,,27,\n");
        let all = visits(&log);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].tile_id, 0);
        assert_eq!(all[1].item_ids, vec![27]);
    }

    #[test]
    fn repeated_tile_ids_merge_into_one_visit() {
        let log = run("timestamp,tile_id,location_id,item_id,event_id\n0,4,,,\n5,4,,,\n7,5,,,\n");
        let tiles: Vec<u32> = visits(&log).iter().map(|v| v.tile_id).collect();
        assert_eq!(tiles, vec![4, 5]);
    }

    #[test]
    fn deaths_vanish_and_story_events_become_tiles() {
        let log = run(
            "timestamp,tile_id,location_id,item_id,event_id\n0,4,,,\n5,,,,1\n6,,,,0\n9,4,,,\n12,,,,15\n",
        );
        let all = visits(&log);
        let tiles: Vec<u32> = all.iter().map(|v| v.tile_id).collect();
        assert_eq!(tiles, vec![4, SAVE_QUIT_TILE_ID, 4, RESET_TILE_ID]);
        assert!(all[0].event_ids.is_empty());
        assert_eq!(all[1].event_ids, vec![SAVE_QUIT_EVENT_ID]);
    }

    #[test]
    fn missing_first_tile_is_an_error() {
        let log = run("timestamp,tile_id,location_id,item_id,event_id\n0,,3,,\n1,4,,,\n");
        let mut segmenter = segment_run(&log, &AbilityRules::all());
        let err = segmenter.next().unwrap().unwrap_err();
        assert!(matches!(err, RouteError::MissingTileId { row: 0, .. }));
        assert!(segmenter.next().is_none());
    }

    #[test]
    fn visit_carries_abilities_of_entering_row() {
        let log = run(&format!(
            "timestamp,tile_id,location_id,item_id,event_id\n0,4,,,\n1,,,{},\n2,5,,,\n",
            Item::Boots.id()
        ));
        let all = visits(&log);
        assert_eq!(all[0].abilities.get(Ability::Dash), Some(false));
        assert_eq!(all[1].abilities.get(Ability::Dash), Some(true));
    }

    #[test]
    fn empty_run_yields_nothing() {
        let log = RunLog::from_rows("empty.csv", Vec::new());
        assert_eq!(segment_run(&log, &AbilityRules::all()).count(), 0);
    }
}
