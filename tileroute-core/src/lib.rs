//! Tileroute core
//!
//! Reconstructs logical routing from recorded play-throughs of a randomized
//! action-adventure game. A run log is segmented into tile visits annotated
//! with the player's abilities, every visit is hashed into a logic-tile
//! identity, and the identities of many runs are assembled into a weighted
//! directed graph that answers fastest-route queries.

pub mod ability;
pub mod analysis;
pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod estimate;
pub mod export;
pub mod graph;
pub mod hasher;
pub mod identity;
pub mod query;
pub mod reference;
pub mod runlog;
pub mod segment;

use std::path::{Path, PathBuf};

// Re-export commonly used types
pub use ability::{Ability, AbilityRules, AbilityVector, Item};
pub use analysis::{CheckRouteReport, CheckSegment, analyze_check_routes};
pub use batch::{Batch, BatchReport, ResolvedRun, RunFailure, discover_runs};
pub use config::{AbilitySelection, PipelineConfig};
pub use error::{RouteError, RouteResult};
pub use estimate::{ComparisonRow, EstimatorConfig, RunComparator, RunComparison};
pub use export::{NodeLinkGraph, node_link, write_graphml, write_json};
pub use graph::{GraphBuilder, LogicGraph, LogicNode};
pub use hasher::{Field, FieldValue, HashRecord, hash_fields};
pub use identity::{IdentityResolver, LogicTile, LogicTileId, resolve_run};
pub use query::{AllShortestPaths, Endpoint, RoutePath, RouteQuery};
pub use reference::{LookupTable, RefRecord, ReferenceData};
pub use runlog::{LogRow, RunLog};
pub use segment::{Segmenter, TileVisit, segment_run};

/// Source of reference tables and run logs.
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the reference tables cannot be loaded.
    fn load_reference(&self) -> Result<ReferenceData, Self::Error>;

    /// Load and resolve every run matching `patterns`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the batch as a whole cannot be loaded;
    /// individual run failures belong in the batch report.
    fn load_batch(&self, patterns: &[String], rules: &AbilityRules) -> Result<Batch, Self::Error>;
}

/// Loads everything from directories on disk.
#[derive(Debug, Clone)]
pub struct DirLoader {
    reference_dir: PathBuf,
    runs_dir: PathBuf,
}

impl DirLoader {
    #[must_use]
    pub fn new(reference_dir: impl Into<PathBuf>, runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            reference_dir: reference_dir.into(),
            runs_dir: runs_dir.into(),
        }
    }

    #[must_use]
    pub fn reference_dir(&self) -> &Path {
        &self.reference_dir
    }

    #[must_use]
    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }
}

impl DataLoader for DirLoader {
    type Error = RouteError;

    fn load_reference(&self) -> RouteResult<ReferenceData> {
        ReferenceData::load_dir(&self.reference_dir)
    }

    fn load_batch(&self, patterns: &[String], rules: &AbilityRules) -> RouteResult<Batch> {
        Batch::load(&self.runs_dir, patterns, rules)
    }
}
