mod reports;
mod util;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;

use tileroute_core::{
    AbilitySelection, Batch, DataLoader, DirLoader, Endpoint, LogicGraph, PipelineConfig,
    ReferenceData, RouteQuery, analyze_check_routes, node_link, write_graphml, write_json,
};

use reports::{
    GraphSummary, LookupReport, PathReport, write_check_routes, write_comparison,
    write_graph_summary, write_lookup, write_path_report,
};
use util::split_csv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Build the logic graph and summarize it
    Graph,
    /// Fastest known route between two endpoints
    Path,
    /// Compare one run against the best time seen for each logic tile
    BestTime,
    /// Compare the route between consecutive checks with the fastest one
    CheckRoutes,
    /// Write the logic graph for external tools
    Export,
    /// Search tile and item names in the reference tables
    Lookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Graphml,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tileroute", version)]
#[command(about = "Reconstruct logic routes from recorded randomizer runs")]
struct Args {
    /// What to do with the loaded runs
    #[arg(long, value_enum, default_value_t = Mode::Graph)]
    mode: Mode,

    /// Run log patterns relative to --runs-dir (comma-separated)
    #[arg(long)]
    runs: Option<String>,

    /// Directory holding the run logs
    #[arg(long, default_value = ".")]
    runs_dir: PathBuf,

    /// Directory holding tiles.json, checks.json, items.json and events.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Route start: a tile name, a tile id, or logic:<hex>
    #[arg(long)]
    from: Option<String>,

    /// Route end: a tile name, a tile id, or logic:<hex>
    #[arg(long)]
    to: Option<String>,

    /// Name pattern for lookup mode (regex, matched against lowercased names)
    #[arg(long)]
    pattern: Option<String>,

    /// List every route tied for the fastest time
    #[arg(long)]
    all: bool,

    /// Run to analyze (file name relative to --runs-dir)
    #[arg(long)]
    run: Option<String>,

    /// Export format
    #[arg(long, value_enum, default_value_t = ExportFormat::Graphml)]
    format: ExportFormat,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Optional path to write the output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pipeline configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ability preset (all, graph_default) or comma-separated ability names
    #[arg(long)]
    abilities: Option<String>,

    /// Fields identifying a route in best-time mode (comma-separated)
    #[arg(long)]
    estimator_fields: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(&args)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init()
        .ok();
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(abilities) = &args.abilities {
        config.abilities = AbilitySelection::parse_arg(abilities);
    }
    if let Some(runs) = &args.runs {
        config.runs = split_csv(runs);
    }
    if let Some(fields) = &args.estimator_fields {
        config.estimator_fields = Some(split_csv(fields));
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let rules = config.ability_rules()?;
    let data_dir = config
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("data"));
    let loader = DirLoader::new(data_dir, &args.runs_dir);

    let reference = loader
        .load_reference()
        .with_context(|| format!("failed to load reference data from {}", loader.reference_dir().display()))?;
    if args.mode == Mode::Lookup {
        let pattern = required(args.pattern.as_deref(), "--pattern")?;
        let report = LookupReport::new(&reference, pattern)?;
        let mut output_target = OutputTarget::new(args.output.clone())?;
        write_lookup(&mut output_target, &args.report, &report)?;
        output_target.flush_inner()?;
        return Ok(());
    }

    let mut batch = loader
        .load_batch(&config.runs, &rules)
        .with_context(|| format!("failed to load runs from {}", loader.runs_dir().display()))?;
    log::info!(
        "resolved {} run(s) with {} abilities",
        batch.runs.len(),
        rules.len()
    );

    for failure in &batch.report.failures {
        eprintln!(
            "{} {}: {}",
            "skipped".yellow(),
            failure.run,
            failure.error
        );
    }
    if batch.runs.is_empty() {
        bail!(
            "no usable runs matched {} under {}",
            config.runs.join(", "),
            loader.runs_dir().display()
        );
    }

    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.mode {
        Mode::Graph => {
            let graph = batch.build_graph();
            let query = RouteQuery::new(&graph, &reference);
            let summary = GraphSummary::new(&batch, &graph, &query)?;
            write_graph_summary(&mut output_target, &args.report, &summary)?;
        }
        Mode::Path => {
            let graph = batch.build_graph();
            write_path(args, &graph, &reference, &mut output_target)?;
        }
        Mode::BestTime => {
            let name = required(args.run.as_deref(), "--run")?;
            let comparator = batch.comparator(&reference, config.estimator_config()?);
            let comparison = comparator.best_possible_time_for(name)?;
            write_comparison(&mut output_target, &args.report, &comparison)?;
        }
        Mode::CheckRoutes => {
            let name = required(args.run.as_deref(), "--run")?;
            batch.require_run(name)?;
            let graph = batch.build_graph();
            write_checks(&batch, name, &graph, &reference, args, &mut output_target)?;
        }
        Mode::Export => {
            let graph = batch.build_graph();
            let doc = node_link(&graph, &reference)?;
            match args.format {
                ExportFormat::Graphml => write_graphml(&doc, &mut output_target)?,
                ExportFormat::Json => write_json(&doc, &mut output_target)?,
            }
        }
        // Answered before any run is loaded.
        Mode::Lookup => {}
    }
    output_target.flush_inner()?;
    Ok(())
}

fn required<'a>(value: Option<&'a str>, flag: &str) -> Result<&'a str> {
    value.with_context(|| format!("{flag} is required for this mode"))
}

fn write_path(
    args: &Args,
    graph: &LogicGraph,
    reference: &ReferenceData,
    out: &mut OutputTarget,
) -> Result<()> {
    let from: Endpoint = required(args.from.as_deref(), "--from")?.parse()?;
    let to: Endpoint = required(args.to.as_deref(), "--to")?.parse()?;
    let query = RouteQuery::new(graph, reference);
    let paths: Vec<_> = if args.all {
        query.all_shortest_paths(&from, &to)?.collect()
    } else {
        vec![query.shortest_path(&from, &to)?]
    };
    let report = PathReport::new(&query, &from, &to, &paths)?;
    write_path_report(out, &args.report, &report)
}

fn write_checks(
    batch: &Batch,
    name: &str,
    graph: &LogicGraph,
    reference: &ReferenceData,
    args: &Args,
    out: &mut OutputTarget,
) -> Result<()> {
    let run = batch
        .require_run(name)
        .context("run was rejected while building the graph")?;
    let query = RouteQuery::new(graph, reference);
    let report = analyze_check_routes(&run.tiles, &query)?;
    write_check_routes(out, &args.report, &report)
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
