//! The logic-route graph.
//!
//! [`GraphBuilder`] folds logic tiles from any number of runs into a
//! directed graph with one node per logic-tile identity and one edge per
//! observed transition, weighted with the fastest time seen. [`finish`]
//! freezes it into a [`LogicGraph`] that only answers lookups.
//!
//! [`finish`]: GraphBuilder::finish
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use crate::ability::AbilityRules;
use crate::error::{RouteError, RouteResult};
use crate::identity::{LogicTile, LogicTileId, resolve_run};
use crate::runlog::RunLog;

/// A node of the logic-route graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicNode {
    pub id: LogicTileId,
    pub tile_id: u32,
    /// One visit of this logic tile. Nodes only ever reached as a successor
    /// (for example the end of every run) have none.
    pub representative: Option<LogicTile>,
}

impl LogicNode {
    /// Active abilities of the representative visit, comma separated.
    #[must_use]
    pub fn abilities_label(&self) -> String {
        self.representative
            .as_ref()
            .map(|tile| tile.abilities().describe())
            .unwrap_or_default()
    }
}

/// Mutable accumulator for the logic-route graph.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    graph: DiGraph<LogicNode, u64>,
    nodes: HashMap<LogicTileId, NodeIndex>,
    edges: HashMap<(NodeIndex, NodeIndex), EdgeIndex>,
    folded: usize,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a node exists for `id`, returning its index.
    pub fn add_node(&mut self, id: LogicTileId, tile_id: u32) -> NodeIndex {
        if let Some(idx) = self.nodes.get(&id) {
            return *idx;
        }
        let idx = self.graph.add_node(LogicNode {
            id,
            tile_id,
            representative: None,
        });
        self.nodes.insert(id, idx);
        idx
    }

    /// Record `tile` as a visit of its node. The representative kept is the
    /// one with the smallest run name and row, whatever the fold order.
    fn observe(&mut self, tile: &LogicTile) -> NodeIndex {
        let idx = self.add_node(tile.id, tile.tile_id());
        if let Some(node) = self.graph.node_weight_mut(idx) {
            let replace = node.representative.as_ref().is_none_or(|current| {
                (&*tile.visit.run, tile.visit.source_row)
                    < (&*current.visit.run, current.visit.source_row)
            });
            if replace {
                node.representative = Some(tile.clone());
            }
        }
        idx
    }

    /// Fold one logic tile: its node, its successor's node and the edge
    /// between them.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidTransition`] if the tile would point to
    /// itself or its weight cannot be represented.
    pub fn fold(&mut self, tile: &LogicTile) -> RouteResult<()> {
        validate(tile)?;
        let source = self.observe(tile);
        let target = self.add_node(tile.successor, tile.next_tile);
        self.connect(source, target, tile.weight);
        self.folded += 1;
        Ok(())
    }

    /// Fold every tile of a stream, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first stream or fold error.
    pub fn fold_all<I>(&mut self, tiles: I) -> RouteResult<usize>
    where
        I: IntoIterator<Item = RouteResult<LogicTile>>,
    {
        let mut count = 0;
        for tile in tiles {
            self.fold(&tile?)?;
            count += 1;
        }
        Ok(count)
    }

    /// Fold the tiles of one run, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns the first invalid tile; the graph is left unchanged.
    pub fn fold_tiles(&mut self, tiles: &[LogicTile]) -> RouteResult<()> {
        tiles.iter().try_for_each(validate)?;
        for tile in tiles {
            self.fold(tile)?;
        }
        Ok(())
    }

    /// Resolve and fold a whole run. A run that fails part way contributes
    /// nothing to the graph.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while segmenting or resolving the run.
    pub fn fold_run(&mut self, run: &RunLog, rules: &AbilityRules) -> RouteResult<usize> {
        let tiles = resolve_run(run, rules).collect::<RouteResult<Vec<_>>>()?;
        self.fold_tiles(&tiles)?;
        log::debug!("{}: folded {} logic tiles", run.name, tiles.len());
        Ok(tiles.len())
    }

    /// Add an edge between two existing nodes, keeping the smaller weight if
    /// it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidTransition`] for a negative weight or an
    /// endpoint that is not in the graph.
    pub fn add_transition(
        &mut self,
        from: LogicTileId,
        to: LogicTileId,
        weight: i64,
    ) -> RouteResult<()> {
        let invalid = |reason: &'static str| RouteError::InvalidTransition {
            from: from.0,
            to: to.0,
            weight,
            run: String::new(),
            row: 0,
            reason,
        };
        let weight = u64::try_from(weight).map_err(|_| invalid("negative weight"))?;
        let source = *self.nodes.get(&from).ok_or_else(|| invalid("unknown source node"))?;
        let target = *self.nodes.get(&to).ok_or_else(|| invalid("unknown target node"))?;
        self.connect(source, target, weight);
        Ok(())
    }

    fn connect(&mut self, source: NodeIndex, target: NodeIndex, weight: u64) {
        match self.edges.entry((source, target)) {
            Entry::Occupied(entry) => {
                if let Some(current) = self.graph.edge_weight_mut(*entry.get()) {
                    *current = (*current).min(weight);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(self.graph.add_edge(source, target, weight));
            }
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Freeze the graph.
    #[must_use]
    pub fn finish(self) -> LogicGraph {
        let mut by_tile: BTreeMap<u32, Vec<LogicTileId>> = BTreeMap::new();
        for node in self.graph.node_weights() {
            by_tile.entry(node.tile_id).or_default().push(node.id);
        }
        for ids in by_tile.values_mut() {
            ids.sort_unstable();
        }
        log::info!(
            "logic graph: {} nodes, {} edges from {} logic tiles",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.folded
        );
        LogicGraph {
            graph: self.graph,
            nodes: self.nodes,
            by_tile,
        }
    }
}

fn validate(tile: &LogicTile) -> RouteResult<()> {
    let invalid = |reason: &'static str| RouteError::InvalidTransition {
        from: tile.id.0,
        to: tile.successor.0,
        weight: i64::try_from(tile.weight).unwrap_or(i64::MAX),
        run: tile.visit.run.to_string(),
        row: tile.visit.source_row,
        reason,
    };
    if tile.id == tile.successor {
        return Err(invalid("a logic tile cannot lead to itself"));
    }
    if i64::try_from(tile.weight).is_err() {
        return Err(invalid("weight out of range"));
    }
    Ok(())
}

/// Immutable logic-route graph.
#[derive(Debug, Clone)]
pub struct LogicGraph {
    graph: DiGraph<LogicNode, u64>,
    nodes: HashMap<LogicTileId, NodeIndex>,
    by_tile: BTreeMap<u32, Vec<LogicTileId>>,
}

impl LogicGraph {
    /// Build a graph from every run, using `rules` for the ability vectors.
    ///
    /// # Errors
    ///
    /// Returns the first run error; use [`crate::batch`] to skip failing runs
    /// instead.
    pub fn from_runs(runs: &[RunLog], rules: &AbilityRules) -> RouteResult<Self> {
        let mut builder = GraphBuilder::new();
        for run in runs {
            let folded = builder.fold_all(resolve_run(run, rules))?;
            log::debug!("{}: streamed {folded} logic tiles", run.name);
        }
        Ok(builder.finish())
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn contains(&self, id: LogicTileId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn node(&self, id: LogicTileId) -> Option<&LogicNode> {
        self.nodes
            .get(&id)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    /// The raw tile a logic tile belongs to.
    #[must_use]
    pub fn tile_of(&self, id: LogicTileId) -> Option<u32> {
        self.node(id).map(|node| node.tile_id)
    }

    /// Every logic tile of a raw tile, in id order.
    #[must_use]
    pub fn logic_tiles_of(&self, tile_id: u32) -> &[LogicTileId] {
        self.by_tile.get(&tile_id).map_or(&[], Vec::as_slice)
    }

    /// Weight of the edge `from -> to`, if present.
    #[must_use]
    pub fn edge_weight(&self, from: LogicTileId, to: LogicTileId) -> Option<u64> {
        let source = *self.nodes.get(&from)?;
        let target = *self.nodes.get(&to)?;
        self.graph
            .find_edge(source, target)
            .and_then(|edge| self.graph.edge_weight(edge))
            .copied()
    }

    /// Outgoing edges of a node as `(target, weight)`.
    pub fn successors(&self, id: LogicTileId) -> impl Iterator<Item = (LogicTileId, u64)> + '_ {
        self.nodes.get(&id).into_iter().flat_map(move |idx| {
            self.graph
                .edges_directed(*idx, Direction::Outgoing)
                .map(|edge| (self.graph[edge.target()].id, *edge.weight()))
        })
    }

    /// All nodes ordered by id.
    #[must_use]
    pub fn nodes(&self) -> Vec<&LogicNode> {
        let mut nodes: Vec<&LogicNode> = self.graph.node_weights().collect();
        nodes.sort_unstable_by_key(|node| node.id);
        nodes
    }

    /// All edges as `(from, to, weight)`, ordered by endpoints.
    #[must_use]
    pub fn edges(&self) -> Vec<(LogicTileId, LogicTileId, u64)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].id,
                    self.graph[edge.target()].id,
                    *edge.weight(),
                )
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Distinct raw tiles present in the graph.
    pub fn tiles(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_tile.keys().copied()
    }
}
