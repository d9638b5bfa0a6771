//! Logic-tile identities.
//!
//! A logic tile is a tile seen in its routing context: the tile the player
//! came from, the tile they went to next and the abilities they held. Two
//! visits with the same context share one identity. Each visit also carries
//! the identity of the logic tile it leads to, computed from the same
//! window shifted one visit forward, so consecutive visits always link up.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::ability::{AbilityRules, AbilityVector};
use crate::constants::{RUN_END, RUN_START};
use crate::error::{RouteError, RouteResult};
use crate::hasher::{Field, FieldValue, HashRecord, hash_fields};
use crate::runlog::RunLog;
use crate::segment::{EvaluatedRow, Segmenter, TileVisit, segment_run};

/// Hash identifying a logic tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicTileId(pub u64);

impl fmt::Display for LogicTileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for LogicTileId {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| RouteError::UnknownEndpoint(trimmed.to_string()))
    }
}

/// A tile visit with its routing window, edge weight and identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicTile {
    pub visit: TileVisit,
    pub previous_tile: u32,
    pub next_tile: u32,
    pub next_next_tile: u32,
    /// Milliseconds until the next visit starts; 0 for the last visit.
    pub weight: u64,
    pub id: LogicTileId,
    pub successor: LogicTileId,
}

impl LogicTile {
    fn new(
        visit: TileVisit,
        previous_tile: u32,
        next_tile: u32,
        next_next_tile: u32,
        weight: u64,
        next_abilities: Option<AbilityVector>,
    ) -> Self {
        let mut tile = Self {
            visit,
            previous_tile,
            next_tile,
            next_next_tile,
            weight,
            id: LogicTileId(0),
            successor: LogicTileId(0),
        };
        let fields = identity_fields(&tile.visit.abilities);
        tile.id = LogicTileId(hash_fields(&tile, &fields));
        let shifted = Shifted {
            abilities: next_abilities.as_ref().unwrap_or(&tile.visit.abilities),
            tile: &tile,
        };
        tile.successor = LogicTileId(hash_fields(&shifted, &fields));
        tile
    }

    #[must_use]
    pub const fn tile_id(&self) -> u32 {
        self.visit.tile_id
    }

    #[must_use]
    pub const fn abilities(&self) -> &AbilityVector {
        &self.visit.abilities
    }
}

/// The fields a logic-tile identity is hashed over.
#[must_use]
pub fn identity_fields(abilities: &AbilityVector) -> SmallVec<[Field; 16]> {
    Field::WINDOW
        .into_iter()
        .chain(abilities.abilities().map(Field::Ability))
        .collect()
}

fn tile_value(tile: u32) -> FieldValue<'static> {
    FieldValue::Int(u64::from(tile))
}

fn shared_value(tile: &LogicTile, field: Field) -> FieldValue<'_> {
    match field {
        Field::LocationIds => FieldValue::List(&tile.visit.location_ids),
        Field::ItemIds => FieldValue::List(&tile.visit.item_ids),
        Field::EventIds => FieldValue::List(&tile.visit.event_ids),
        Field::Ability(ability) => tile
            .visit
            .abilities
            .get(ability)
            .map_or(FieldValue::Missing, FieldValue::Bool),
        _ => FieldValue::Missing,
    }
}

impl HashRecord for LogicTile {
    fn field_value(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::PreviousTile => tile_value(self.previous_tile),
            Field::TileId => tile_value(self.visit.tile_id),
            Field::NextTile => tile_value(self.next_tile),
            Field::NextNextTile => tile_value(self.next_next_tile),
            _ => shared_value(self, field),
        }
    }
}

/// The window of a logic tile moved one visit forward, seen with the
/// abilities held on entering the next tile.
///
/// Hashing it must give the next visit's own id (`successor == next.id`),
/// which is what links consecutive visits of a run into graph edges.
struct Shifted<'a> {
    tile: &'a LogicTile,
    abilities: &'a AbilityVector,
}

impl HashRecord for Shifted<'_> {
    fn field_value(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::PreviousTile => tile_value(self.tile.visit.tile_id),
            Field::TileId => tile_value(self.tile.next_tile),
            Field::NextTile => tile_value(self.tile.next_next_tile),
            Field::NextNextTile => FieldValue::Missing,
            Field::Ability(ability) => self
                .abilities
                .get(ability)
                .map_or(FieldValue::Missing, FieldValue::Bool),
            _ => shared_value(self.tile, field),
        }
    }
}

/// Lazy adapter turning tile visits into logic tiles.
///
/// Holds at most two visits of lookahead. The first visit's predecessor is
/// [`RUN_START`]; missing successors are [`RUN_END`].
pub struct IdentityResolver<I> {
    visits: I,
    lookahead: VecDeque<TileVisit>,
    previous_tile: u32,
    exhausted: bool,
    done: bool,
}

impl<I> IdentityResolver<I>
where
    I: Iterator<Item = RouteResult<TileVisit>>,
{
    pub fn new(visits: I) -> Self {
        Self {
            visits,
            lookahead: VecDeque::with_capacity(3),
            previous_tile: RUN_START,
            exhausted: false,
            done: false,
        }
    }

    fn fill(&mut self) -> RouteResult<()> {
        while !self.exhausted && self.lookahead.len() < 3 {
            match self.visits.next() {
                Some(visit) => self.lookahead.push_back(visit?),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }
}

impl<I> Iterator for IdentityResolver<I>
where
    I: Iterator<Item = RouteResult<TileVisit>>,
{
    type Item = RouteResult<LogicTile>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(err) = self.fill() {
            self.done = true;
            return Some(Err(err));
        }
        let Some(current) = self.lookahead.pop_front() else {
            self.done = true;
            return None;
        };
        let next = self.lookahead.front();
        let weight = match next {
            Some(next) if next.timestamp < current.timestamp => {
                self.done = true;
                return Some(Err(RouteError::NonMonotonicTimestamp {
                    run: current.run.to_string(),
                    row: next.source_row,
                    previous: current.timestamp,
                    current: next.timestamp,
                }));
            }
            Some(next) => next.timestamp - current.timestamp,
            None => 0,
        };
        let next_tile = next.map_or(RUN_END, |v| v.tile_id);
        let next_abilities = next.map(|v| v.abilities.clone());
        let next_next_tile = self.lookahead.get(1).map_or(RUN_END, |v| v.tile_id);
        let previous_tile = std::mem::replace(&mut self.previous_tile, current.tile_id);
        Some(Ok(LogicTile::new(
            current,
            previous_tile,
            next_tile,
            next_next_tile,
            weight,
            next_abilities,
        )))
    }
}

/// Segment a run and resolve every visit to a logic tile.
pub fn resolve_run<'a>(
    run: &'a RunLog,
    rules: &AbilityRules,
) -> IdentityResolver<Segmenter<impl Iterator<Item = EvaluatedRow> + 'a>> {
    IdentityResolver::new(segment_run(run, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::Ability;
    use crate::runlog::LogRow;
    use std::sync::Arc;

    fn visit(row: usize, timestamp: u64, tile_id: u32, dash: bool) -> TileVisit {
        TileVisit {
            run: Arc::from("run.csv"),
            source_row: row,
            timestamp,
            tile_id,
            abilities: AbilityVector::from_flags(&[(Ability::Dash, dash)]),
            location_ids: Vec::new(),
            item_ids: Vec::new(),
            event_ids: Vec::new(),
            check_occurred: false,
        }
    }

    fn resolve(visits: Vec<TileVisit>) -> RouteResult<Vec<LogicTile>> {
        IdentityResolver::new(visits.into_iter().map(Ok)).collect()
    }

    #[test]
    fn windows_and_weights() {
        let tiles = resolve(vec![
            visit(0, 0, 1, false),
            visit(3, 40, 2, false),
            visit(7, 100, 3, false),
        ])
        .unwrap();
        let windows: Vec<_> = tiles
            .iter()
            .map(|t| (t.previous_tile, t.tile_id(), t.next_tile, t.next_next_tile, t.weight))
            .collect();
        assert_eq!(
            windows,
            vec![
                (RUN_START, 1, 2, 3, 40),
                (1, 2, 3, RUN_END, 60),
                (2, 3, RUN_END, RUN_END, 0),
            ]
        );
    }

    #[test]
    fn successor_is_next_identity() {
        let tiles = resolve(vec![
            visit(0, 0, 1, false),
            visit(1, 5, 2, false),
            visit(2, 9, 1, false),
            visit(3, 12, 2, false),
        ])
        .unwrap();
        for pair in tiles.windows(2) {
            assert_eq!(pair[0].successor, pair[1].id);
        }
    }

    #[test]
    fn successor_follows_abilities_gained_on_the_way() {
        let tiles = resolve(vec![
            visit(0, 0, 1, false),
            visit(2, 5, 2, true),
            visit(3, 9, 3, true),
        ])
        .unwrap();
        assert_eq!(tiles[0].successor, tiles[1].id);
        assert_eq!(tiles[1].successor, tiles[2].id);
    }

    #[test]
    fn abilities_change_identity() {
        let slow = resolve(vec![visit(0, 0, 1, false), visit(1, 5, 2, false)]).unwrap();
        let fast = resolve(vec![visit(0, 0, 1, true), visit(1, 5, 2, true)]).unwrap();
        assert_ne!(slow[0].id, fast[0].id);
        assert_eq!(slow[0].tile_id(), fast[0].tile_id());
    }

    #[test]
    fn incidental_events_do_not_change_identity() {
        let plain = resolve(vec![visit(0, 0, 1, false), visit(1, 5, 2, false)]).unwrap();
        let mut busy = visit(0, 0, 1, false);
        busy.location_ids.push(44);
        busy.check_occurred = true;
        let busy = resolve(vec![busy, visit(1, 5, 2, false)]).unwrap();
        assert_eq!(plain[0].id, busy[0].id);
    }

    #[test]
    fn backwards_timestamp_is_rejected() {
        let err = resolve(vec![visit(0, 50, 1, false), visit(4, 10, 2, false)]).unwrap_err();
        assert!(matches!(
            err,
            RouteError::NonMonotonicTimestamp {
                row: 4,
                previous: 50,
                current: 10,
                ..
            }
        ));
    }

    #[test]
    fn upstream_error_ends_the_stream() {
        let source = vec![Err(RouteError::MissingTileId {
            run: "x".to_string(),
            row: 0,
        })];
        let mut resolver = IdentityResolver::new(source.into_iter());
        assert!(resolver.next().unwrap().is_err());
        assert!(resolver.next().is_none());
    }

    #[test]
    fn resolves_a_parsed_run() {
        let run = RunLog::from_rows(
            "r.csv",
            vec![LogRow::tile(0, 0, 4), LogRow::tile(1, 20, 5), LogRow::tile(2, 50, 6)],
        );
        let tiles: Vec<_> = resolve_run(&run, &AbilityRules::graph_default())
            .collect::<RouteResult<_>>()
            .unwrap();
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0].abilities().len(), 5);
        assert_eq!(tiles[1].weight, 30);
    }

    #[test]
    fn ids_render_as_hex_and_parse_back() {
        let id = LogicTileId(0xabc);
        assert_eq!(id.to_string(), "0000000000000abc");
        assert_eq!("0x0abc".parse::<LogicTileId>().unwrap(), id);
        assert!("zz".parse::<LogicTileId>().is_err());
    }
}
