//! Check-to-check route analysis of a single play-through.
//!
//! Between two consecutive tiles on which a check was collected, the run
//! took some route. The graph knows the fastest route seen in any run
//! between the same logic tiles; the difference is time that could be
//! saved.
use serde::Serialize;

use crate::error::{RouteError, RouteResult};
use crate::identity::LogicTile;
use crate::query::{Endpoint, RouteQuery};

/// The stretch between two check tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSegment {
    pub from_row: usize,
    pub to_row: usize,
    pub actual_ms: u64,
    /// `None` when the graph has no route between the two tiles.
    pub shortest_ms: Option<u64>,
    pub actual_route: Vec<String>,
    pub shortest_route: Vec<String>,
}

impl CheckSegment {
    /// The fastest known route goes through different tiles.
    #[must_use]
    pub fn rerouted(&self) -> bool {
        self.shortest_ms.is_some() && self.actual_route != self.shortest_route
    }

    #[must_use]
    pub fn save_ms(&self) -> u64 {
        self.shortest_ms
            .map_or(0, |shortest| self.actual_ms.saturating_sub(shortest))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRouteReport {
    pub run: String,
    pub segments: Vec<CheckSegment>,
    pub possible_save_ms: u64,
    pub routing_save_ms: u64,
    pub unreachable: usize,
}

/// Compare every check-to-check stretch of `playthrough` with the shortest
/// route in the graph.
///
/// The compared time runs from entering the earlier check tile to entering
/// the tile right before the later one.
///
/// # Errors
///
/// Returns [`RouteError::MalformedReferenceData`] when a tile on either
/// route has no name. A stretch without a known route is counted as
/// unreachable instead of failing.
pub fn analyze_check_routes(
    playthrough: &[LogicTile],
    query: &RouteQuery<'_>,
) -> RouteResult<CheckRouteReport> {
    let run = playthrough
        .first()
        .map(|t| t.visit.run.to_string())
        .unwrap_or_default();
    let name = |tile: &LogicTile| {
        query
            .reference()
            .tile_name(tile.tile_id())
            .map(str::to_string)
    };

    let mut segments = Vec::new();
    let mut unreachable = 0;
    let mut previous_check: Option<usize> = None;

    for (idx, tile) in playthrough.iter().enumerate() {
        if !tile.visit.check_occurred {
            continue;
        }
        let Some(start) = previous_check.replace(idx) else {
            continue;
        };
        let Some(before) = idx.checked_sub(1).and_then(|i| playthrough.get(i)) else {
            continue;
        };
        let origin = &playthrough[start];
        let actual_ms = before.visit.timestamp.saturating_sub(origin.visit.timestamp);
        let actual_route = playthrough[start..=idx]
            .iter()
            .map(name)
            .collect::<RouteResult<Vec<_>>>()?;

        let found = query.shortest_path(&Endpoint::Logic(origin.id), &Endpoint::Logic(before.id));
        let (shortest_ms, shortest_route) = match found {
            Ok(path) => {
                let mut names = query.named_route(&path)?;
                names.push(name(tile)?);
                (Some(path.total_ms), names)
            }
            Err(err @ RouteError::NoPathFound { .. }) => {
                log::warn!("{run}: rows {}..{}: {err}", origin.visit.source_row, tile.visit.source_row);
                unreachable += 1;
                (None, Vec::new())
            }
            Err(err) => return Err(err),
        };
        segments.push(CheckSegment {
            from_row: origin.visit.source_row,
            to_row: tile.visit.source_row,
            actual_ms,
            shortest_ms,
            actual_route,
            shortest_route,
        });
    }

    let possible_save_ms = segments.iter().map(CheckSegment::save_ms).sum();
    let routing_save_ms = segments
        .iter()
        .filter(|s| s.rerouted())
        .map(CheckSegment::save_ms)
        .sum();
    Ok(CheckRouteReport {
        run,
        segments,
        possible_save_ms,
        routing_save_ms,
        unreachable,
    })
}
