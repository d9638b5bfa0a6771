//! Shortest-path queries over a finished [`LogicGraph`].
use std::collections::HashSet;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use pathfinding::directed::astar::{AstarSolution, astar_bag};
use pathfinding::directed::dijkstra::dijkstra;
use pathfinding::num_traits::Zero;
use serde::Serialize;

use crate::error::{RouteError, RouteResult};
use crate::graph::LogicGraph;
use crate::identity::LogicTileId;
use crate::reference::ReferenceData;

/// One end of a route query.
///
/// A raw tile id or tile name stands for every logic tile of that tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Logic(LogicTileId),
    Tile(u32),
    Name(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logic(id) => write!(f, "logic:{id}"),
            Self::Tile(tile) => write!(f, "{tile}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for Endpoint {
    type Err = RouteError;

    /// `logic:<hex>` names a logic tile, a bare number a tile id and anything
    /// else a tile name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RouteError::UnknownEndpoint(String::new()));
        }
        if let Some(hex) = trimmed.strip_prefix("logic:") {
            return hex.parse().map(Self::Logic);
        }
        Ok(trimmed
            .parse::<u32>()
            .map_or_else(|_| Self::Name(trimmed.to_string()), Self::Tile))
    }
}

impl From<LogicTileId> for Endpoint {
    fn from(id: LogicTileId) -> Self {
        Self::Logic(id)
    }
}

/// A shortest route through the logic graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePath {
    pub nodes: Vec<LogicTileId>,
    pub total_ms: u64,
}

impl RoutePath {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_seconds(&self) -> f64 {
        self.total_ms as f64 / 1000.0
    }

    #[must_use]
    pub fn source(&self) -> Option<LogicTileId> {
        self.nodes.first().copied()
    }

    #[must_use]
    pub fn target(&self) -> Option<LogicTileId> {
        self.nodes.last().copied()
    }
}

/// Read-only query engine borrowing a graph and the reference tables.
#[derive(Debug, Clone, Copy)]
pub struct RouteQuery<'a> {
    graph: &'a LogicGraph,
    reference: &'a ReferenceData,
}

impl<'a> RouteQuery<'a> {
    #[must_use]
    pub const fn new(graph: &'a LogicGraph, reference: &'a ReferenceData) -> Self {
        Self { graph, reference }
    }

    #[must_use]
    pub const fn graph(&self) -> &'a LogicGraph {
        self.graph
    }

    #[must_use]
    pub const fn reference(&self) -> &'a ReferenceData {
        self.reference
    }

    /// Logic tiles an endpoint stands for.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownEndpoint`] if it matches no node and
    /// [`RouteError::MalformedReferenceData`] for a name missing from the
    /// tile table.
    pub fn resolve(&self, endpoint: &Endpoint) -> RouteResult<Vec<LogicTileId>> {
        let ids = match endpoint {
            Endpoint::Logic(id) if self.graph.contains(*id) => vec![*id],
            Endpoint::Logic(_) => Vec::new(),
            Endpoint::Tile(tile) => self.graph.logic_tiles_of(*tile).to_vec(),
            Endpoint::Name(name) => self
                .graph
                .logic_tiles_of(self.reference.tiles.id(name)?)
                .to_vec(),
        };
        if ids.is_empty() {
            return Err(RouteError::UnknownEndpoint(endpoint.to_string()));
        }
        Ok(ids)
    }

    /// Human readable name of an endpoint, if one is known.
    #[must_use]
    pub fn describe(&self, endpoint: &Endpoint) -> Option<String> {
        match endpoint {
            Endpoint::Logic(id) => self
                .graph
                .tile_of(*id)
                .and_then(|tile| self.reference.tiles.get_name(tile))
                .map(str::to_string),
            Endpoint::Tile(tile) => self.reference.tiles.get_name(*tile).map(str::to_string),
            Endpoint::Name(name) => Some(name.clone()),
        }
    }

    /// The fastest route between two endpoints.
    ///
    /// Among equally fast routes the one with the fewest transitions wins.
    /// Successors are expanded in logic tile id order, so repeated queries
    /// return the same path.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownEndpoint`] for an endpoint outside the
    /// graph, [`RouteError::MalformedReferenceData`] for an unknown tile name
    /// and [`RouteError::NoPathFound`] if the target is unreachable.
    pub fn shortest_path(&self, from: &Endpoint, to: &Endpoint) -> RouteResult<RoutePath> {
        let sources = self.resolve(from)?;
        let targets: HashSet<LogicTileId> = self.resolve(to)?.into_iter().collect();
        let (steps, cost) = dijkstra(
            &Step::Start,
            |step| self.expand(step, &sources, &targets),
            |step| *step == Step::End,
        )
        .ok_or_else(|| self.no_path(from, to))?;
        log::debug!("{from} -> {to}: {} ms in {} transition(s)", cost.ms, cost.hops);
        Ok(RoutePath {
            nodes: logic_tiles(steps),
            total_ms: cost.ms,
        })
    }

    /// Every route that ties for the fastest time, produced lazily.
    ///
    /// Tied routes share both the time and the number of transitions, so a
    /// detour around a zero-time loop is not listed. The order of the routes
    /// is unspecified.
    ///
    /// # Errors
    ///
    /// Same as [`shortest_path`](Self::shortest_path).
    pub fn all_shortest_paths(
        &self,
        from: &Endpoint,
        to: &Endpoint,
    ) -> RouteResult<AllShortestPaths> {
        let sources = self.resolve(from)?;
        let targets: HashSet<LogicTileId> = self.resolve(to)?.into_iter().collect();
        let (solutions, cost) = astar_bag(
            &Step::Start,
            |step| self.expand(step, &sources, &targets),
            |_| Cost::zero(),
            |step| *step == Step::End,
        )
        .ok_or_else(|| self.no_path(from, to))?;
        log::debug!("{from} -> {to}: {} ms, enumerating ties", cost.ms);
        Ok(AllShortestPaths {
            solutions,
            total_ms: cost.ms,
        })
    }

    /// Tile names along a path.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::MalformedReferenceData`] if a tile on the path
    /// has no entry in the tile table.
    pub fn named_route(&self, path: &RoutePath) -> RouteResult<Vec<String>> {
        path.nodes
            .iter()
            .map(|id| {
                let tile = self
                    .graph
                    .tile_of(*id)
                    .ok_or_else(|| RouteError::UnknownEndpoint(Endpoint::Logic(*id).to_string()))?;
                self.reference.tiles.name(tile).map(str::to_string)
            })
            .collect()
    }

    fn no_path(&self, from: &Endpoint, to: &Endpoint) -> RouteError {
        RouteError::NoPathFound {
            from: from.to_string(),
            to: to.to_string(),
            from_desc: self.describe(from),
            to_desc: self.describe(to),
        }
    }

    /// Outgoing steps of the search graph: the virtual start fans out to
    /// every source, and every target leads on to the virtual end.
    fn expand(
        &self,
        step: &Step,
        sources: &[LogicTileId],
        targets: &HashSet<LogicTileId>,
    ) -> Vec<(Step, Cost)> {
        match *step {
            Step::Start => sources.iter().map(|id| (Step::Tile(*id), Cost::zero())).collect(),
            Step::Tile(id) => {
                let mut next: Vec<(Step, Cost)> = self
                    .graph
                    .successors(id)
                    .map(|(to, ms)| (Step::Tile(to), Cost { ms, hops: 1 }))
                    .collect();
                next.sort_unstable();
                if targets.contains(&id) {
                    next.push((Step::End, Cost::zero()));
                }
                next
            }
            Step::End => Vec::new(),
        }
    }
}

/// Node of the search graph. `Start` and `End` stand for "any source" and
/// "any target" so multi-tile endpoints need a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Step {
    Start,
    Tile(LogicTileId),
    End,
}

fn logic_tiles(steps: Vec<Step>) -> Vec<LogicTileId> {
    steps
        .into_iter()
        .filter_map(|step| match step {
            Step::Tile(id) => Some(id),
            Step::Start | Step::End => None,
        })
        .collect()
}

/// Search cost: elapsed time first, then the number of transitions.
///
/// Counting transitions keeps every cycle strictly positive, so tied routes
/// never loop back on themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
struct Cost {
    ms: u64,
    hops: u32,
}

impl Add for Cost {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            ms: self.ms.saturating_add(other.ms),
            hops: self.hops.saturating_add(other.hops),
        }
    }
}

impl Zero for Cost {
    fn zero() -> Self {
        Self::default()
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Lazy enumeration of equally short paths.
pub struct AllShortestPaths {
    solutions: AstarSolution<Step>,
    total_ms: u64,
}

impl AllShortestPaths {
    #[must_use]
    pub const fn total_ms(&self) -> u64 {
        self.total_ms
    }
}

impl fmt::Debug for AllShortestPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllShortestPaths")
            .field("total_ms", &self.total_ms)
            .finish_non_exhaustive()
    }
}

impl Iterator for AllShortestPaths {
    type Item = RoutePath;

    fn next(&mut self) -> Option<Self::Item> {
        self.solutions.next().map(|steps| RoutePath {
            nodes: logic_tiles(steps),
            total_ms: self.total_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::reference::RefRecord;

    const A: LogicTileId = LogicTileId(0xa);
    const B: LogicTileId = LogicTileId(0xb);
    const C: LogicTileId = LogicTileId(0xc);
    const D: LogicTileId = LogicTileId(0xd);

    fn reference() -> ReferenceData {
        let tiles = [(1, "Alpha"), (2, "Bravo"), (3, "Charlie"), (4, "Delta")]
            .into_iter()
            .map(|(id, name)| RefRecord {
                id,
                name: name.to_string(),
            })
            .collect();
        ReferenceData::from_tables(tiles, Vec::new(), Vec::new(), Vec::new())
    }

    fn graph(edges: &[(LogicTileId, LogicTileId, i64)]) -> LogicGraph {
        let mut builder = GraphBuilder::new();
        for (id, tile) in [(A, 1), (B, 2), (C, 3), (D, 4)] {
            builder.add_node(id, tile);
        }
        for (from, to, weight) in edges {
            builder.add_transition(*from, *to, *weight).unwrap();
        }
        builder.finish()
    }

    #[test]
    fn prefers_cheaper_detour() {
        let graph = graph(&[(A, B, 5), (B, C, 7), (A, C, 20)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let path = query
            .shortest_path(&Endpoint::Logic(A), &Endpoint::Logic(C))
            .unwrap();
        assert_eq!(path.nodes, vec![A, B, C]);
        assert_eq!(path.total_ms, 12);
        assert!((path.total_seconds() - 0.012).abs() < f64::EPSILON);
        assert_eq!(
            query.named_route(&path).unwrap(),
            vec!["Alpha", "Bravo", "Charlie"]
        );
    }

    #[test]
    fn unreachable_target_reports_both_ends() {
        let graph = graph(&[(A, B, 5)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let err = query
            .shortest_path(&Endpoint::Logic(A), &Endpoint::Tile(3))
            .unwrap_err();
        match err {
            RouteError::NoPathFound {
                from,
                to,
                from_desc,
                to_desc,
            } => {
                assert_eq!(from, "logic:000000000000000a");
                assert_eq!(to, "3");
                assert_eq!(from_desc.as_deref(), Some("Alpha"));
                assert_eq!(to_desc.as_deref(), Some("Charlie"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn disconnected_logic_tiles_have_no_path() {
        let graph = graph(&[(A, B, 5), (C, D, 5)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let err = query
            .all_shortest_paths(&Endpoint::Logic(B), &Endpoint::Logic(C))
            .unwrap_err();
        match err {
            RouteError::NoPathFound {
                from,
                to,
                from_desc,
                to_desc,
            } => {
                assert_eq!(from, "logic:000000000000000b");
                assert_eq!(to, "logic:000000000000000c");
                assert_eq!(from_desc.as_deref(), Some("Bravo"));
                assert_eq!(to_desc.as_deref(), Some("Charlie"));
            }
            other => panic!("unexpected error {other}"),
        }
        let message = query
            .shortest_path(&Endpoint::Logic(B), &Endpoint::Logic(C))
            .unwrap_err()
            .to_string();
        assert!(message.contains("logic:000000000000000b"));
        assert!(message.contains("logic:000000000000000c"));
    }

    #[test]
    fn unknown_endpoints_are_rejected() {
        let graph = graph(&[(A, B, 5)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        for endpoint in [Endpoint::Logic(LogicTileId(0xff)), Endpoint::Tile(99)] {
            let err = query.shortest_path(&endpoint, &Endpoint::Logic(B)).unwrap_err();
            assert!(matches!(err, RouteError::UnknownEndpoint(_)));
        }
    }

    #[test]
    fn unknown_tile_name_is_a_lookup_failure() {
        let graph = graph(&[(A, B, 5)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let err = query
            .shortest_path(&Endpoint::Name("Nowhere".to_string()), &Endpoint::Logic(B))
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::MalformedReferenceData { table: "tiles", ref key } if key == "Nowhere"
        ));
        // Known name, but no logic tile of it was ever visited.
        let mut builder = GraphBuilder::new();
        builder.add_node(A, 1);
        let sparse = builder.finish();
        let query = RouteQuery::new(&sparse, &reference);
        let err = query
            .shortest_path(&Endpoint::Name("Delta".to_string()), &Endpoint::Logic(A))
            .unwrap_err();
        assert!(matches!(err, RouteError::UnknownEndpoint(ref name) if name == "Delta"));
    }

    #[test]
    fn unnamed_tile_on_a_route_is_a_lookup_failure() {
        let mut builder = GraphBuilder::new();
        builder.add_node(A, 1);
        builder.add_node(B, 777);
        builder.add_transition(A, B, 4).unwrap();
        let graph = builder.finish();
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let path = query
            .shortest_path(&Endpoint::Logic(A), &Endpoint::Logic(B))
            .unwrap();
        let err = query.named_route(&path).unwrap_err();
        assert!(matches!(
            err,
            RouteError::MalformedReferenceData { table: "tiles", ref key } if key == "777"
        ));
    }

    #[test]
    fn lists_every_tied_path() {
        let graph = graph(&[(A, B, 5), (B, D, 5), (A, C, 4), (C, D, 6), (A, D, 11)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let paths = query
            .all_shortest_paths(&Endpoint::Name("Alpha".to_string()), &Endpoint::Tile(4))
            .unwrap();
        assert_eq!(paths.total_ms(), 10);
        let mut nodes: Vec<Vec<LogicTileId>> = paths.map(|p| p.nodes).collect();
        nodes.sort();
        assert_eq!(nodes, vec![vec![A, B, D], vec![A, C, D]]);
    }

    #[test]
    fn repeated_queries_pick_the_same_tied_path() {
        let graph = graph(&[(A, B, 5), (B, D, 5), (A, C, 4), (C, D, 6)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let first = query
            .shortest_path(&Endpoint::Logic(A), &Endpoint::Logic(D))
            .unwrap();
        for _ in 0..10 {
            let again = query
                .shortest_path(&Endpoint::Logic(A), &Endpoint::Logic(D))
                .unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(first.total_ms, 10);
    }

    #[test]
    fn multi_tile_endpoints_take_the_best_pair() {
        const A2: LogicTileId = LogicTileId(0xa2);
        const D2: LogicTileId = LogicTileId(0xd2);
        let mut builder = GraphBuilder::new();
        for (id, tile) in [(A, 1), (A2, 1), (B, 2), (D, 4), (D2, 4)] {
            builder.add_node(id, tile);
        }
        builder.add_transition(A, B, 9).unwrap();
        builder.add_transition(B, D, 9).unwrap();
        builder.add_transition(A2, D2, 7).unwrap();
        let graph = builder.finish();
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let path = query
            .shortest_path(&Endpoint::Tile(1), &Endpoint::Tile(4))
            .unwrap();
        assert_eq!(path.nodes, vec![A2, D2]);
        assert_eq!(path.total_ms, 7);
    }

    #[test]
    fn source_equal_to_target_is_free() {
        let graph = graph(&[(A, B, 5)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let path = query
            .shortest_path(&Endpoint::Logic(A), &Endpoint::Logic(A))
            .unwrap();
        assert_eq!(path.nodes, vec![A]);
        assert_eq!(path.total_ms, 0);
    }

    #[test]
    fn zero_weight_cycles_terminate() {
        let graph = graph(&[(A, B, 0), (B, C, 0), (C, B, 0), (B, D, 3)]);
        let reference = reference();
        let query = RouteQuery::new(&graph, &reference);
        let paths: Vec<_> = query
            .all_shortest_paths(&Endpoint::Logic(A), &Endpoint::Logic(D))
            .unwrap()
            .collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes, vec![A, B, D]);
    }

    #[test]
    fn endpoints_parse() {
        assert_eq!("12".parse::<Endpoint>().unwrap(), Endpoint::Tile(12));
        assert_eq!(
            "logic:00ff".parse::<Endpoint>().unwrap(),
            Endpoint::Logic(LogicTileId(0xff))
        );
        assert_eq!(
            "Kakariko Village".parse::<Endpoint>().unwrap(),
            Endpoint::Name("Kakariko Village".to_string())
        );
        assert!("".parse::<Endpoint>().is_err());
    }
}
