//! Loading a batch of runs from disk.
//!
//! Runs are discovered with glob patterns relative to a root directory,
//! read, and resolved to logic tiles. A run that fails at any stage is left
//! out and recorded in the [`BatchReport`]; the rest of the batch goes on.
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::ability::AbilityRules;
use crate::error::{RouteError, RouteResult};
use crate::estimate::{EstimatorConfig, RunComparator};
use crate::graph::{GraphBuilder, LogicGraph};
use crate::identity::{LogicTile, resolve_run};
use crate::reference::ReferenceData;
use crate::runlog::RunLog;

/// A run that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub run: String,
    pub error: String,
}

/// What happened to every file of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: Vec<String>,
    pub failures: Vec<RunFailure>,
}

impl BatchReport {
    fn fail(&mut self, run: &str, error: &RouteError) {
        log::warn!("skipping {run}: {error}");
        self.processed.retain(|name| name != run);
        self.failures.push(RunFailure {
            run: run.to_string(),
            error: error.to_string(),
        });
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The logic tiles of one successfully resolved run.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub name: String,
    pub tiles: Vec<LogicTile>,
}

/// Every usable run of a batch.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub runs: Vec<ResolvedRun>,
    pub report: BatchReport,
}

impl Batch {
    /// Discover, read and resolve runs under `root`.
    ///
    /// # Errors
    ///
    /// Only an invalid glob pattern is an error; unreadable or malformed
    /// runs end up in [`Batch::report`].
    pub fn load(root: &Path, patterns: &[String], rules: &AbilityRules) -> RouteResult<Self> {
        let paths = discover_runs(root, patterns)?;
        let logs = paths.iter().map(|path| {
            RunLog::read(path).map_err(|err| (path.display().to_string(), err))
        });
        Ok(Self::from_logs(logs, rules))
    }

    /// Resolve already read runs. `Err` items carry the run name.
    pub fn from_logs<I>(logs: I, rules: &AbilityRules) -> Self
    where
        I: IntoIterator<Item = Result<RunLog, (String, RouteError)>>,
    {
        let mut batch = Self::default();
        for log in logs {
            let run = match log {
                Ok(run) => run,
                Err((name, err)) => {
                    batch.report.fail(&name, &err);
                    continue;
                }
            };
            match resolve_run(&run, rules).collect::<RouteResult<Vec<_>>>() {
                Ok(tiles) => {
                    log::debug!("{}: {} rows, {} visits", run.name, run.len(), tiles.len());
                    batch.report.processed.push(run.name.clone());
                    batch.runs.push(ResolvedRun {
                        name: run.name,
                        tiles,
                    });
                }
                Err(err) => batch.report.fail(&run.name, &err),
            }
        }
        log::info!(
            "loaded {} runs, {} failed",
            batch.runs.len(),
            batch.report.failures.len()
        );
        batch
    }

    #[must_use]
    pub fn run(&self, name: &str) -> Option<&ResolvedRun> {
        self.runs.iter().find(|run| run.name == name)
    }

    /// Names of the usable runs.
    pub fn run_names(&self) -> impl Iterator<Item = &str> {
        self.runs.iter().map(|run| run.name.as_str())
    }

    /// Like [`Batch::run`], but an unknown name is an error listing the
    /// usable runs.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownRunRequested`].
    pub fn require_run(&self, name: &str) -> RouteResult<&ResolvedRun> {
        self.run(name).ok_or_else(|| RouteError::UnknownRunRequested {
            requested: name.to_string(),
            available: self.run_names().map(str::to_string).collect(),
        })
    }

    /// Fold every run into a graph. Runs rejected by the graph builder are
    /// dropped from the batch and reported.
    pub fn build_graph(&mut self) -> LogicGraph {
        let mut builder = GraphBuilder::new();
        let mut rejected = Vec::new();
        self.runs.retain(|run| match builder.fold_tiles(&run.tiles) {
            Ok(()) => true,
            Err(err) => {
                rejected.push((run.name.clone(), err));
                false
            }
        });
        for (name, err) in &rejected {
            self.report.fail(name, err);
        }
        builder.finish()
    }

    /// A best-time comparator over every run of the batch.
    #[must_use]
    pub fn comparator<'a>(
        &self,
        reference: &'a ReferenceData,
        config: EstimatorConfig,
    ) -> RunComparator<'a> {
        let mut comparator = RunComparator::new(reference, config);
        for run in &self.runs {
            comparator.add_tiles(run.name.clone(), run.tiles.clone());
        }
        comparator
    }
}

/// Compile glob patterns. `*` does not cross directory separators.
///
/// # Errors
///
/// Returns [`RouteError::InvalidConfig`] for an invalid pattern.
pub fn build_globset(patterns: &[String]) -> RouteResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| RouteError::InvalidConfig {
                field: "runs",
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| RouteError::InvalidConfig {
        field: "runs",
        reason: e.to_string(),
    })
}

/// Run files under `root` matching any of `patterns`, in path order.
///
/// A pattern that names an existing file is taken as is.
///
/// # Errors
///
/// Returns [`RouteError::InvalidConfig`] for an invalid pattern.
pub fn discover_runs(root: &Path, patterns: &[String]) -> RouteResult<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = Vec::new();
    let mut globs = Vec::new();
    for pattern in patterns {
        let direct = root.join(pattern);
        if direct.is_file() {
            found.push(direct);
        } else {
            globs.push(pattern.clone());
        }
    }

    if !globs.is_empty() {
        let set = build_globset(&globs)?;
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("cannot scan {}: {err}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if set.is_match(relative) {
                found.push(path.to_path_buf());
            }
        }
    }

    found.sort();
    found.dedup();
    log::debug!("{} run files match {}", found.len(), patterns.join(", "));
    Ok(found)
}
