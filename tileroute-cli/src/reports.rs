use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use tileroute_core::{
    Batch, CheckRouteReport, Endpoint, LogicGraph, RefRecord, ReferenceData, RoutePath,
    RouteQuery, RouteResult, RunComparison, RunFailure,
};

use crate::util::format_ms;

/// Rows of the comparison table shown in the console.
const WORST_ROWS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TileCount {
    pub tile: String,
    pub logic_tiles: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub runs: Vec<String>,
    pub failures: Vec<RunFailure>,
    pub nodes: usize,
    pub edges: usize,
    pub tiles: usize,
    pub most_split: Vec<TileCount>,
}

impl GraphSummary {
    pub fn new(batch: &Batch, graph: &LogicGraph, query: &RouteQuery<'_>) -> RouteResult<Self> {
        let mut most_split = graph
            .tiles()
            .map(|tile| -> RouteResult<TileCount> {
                Ok(TileCount {
                    tile: query.reference().tile_name(tile)?.to_string(),
                    logic_tiles: graph.logic_tiles_of(tile).len(),
                })
            })
            .collect::<RouteResult<Vec<_>>>()?;
        most_split.sort_by(|a, b| b.logic_tiles.cmp(&a.logic_tiles).then(a.tile.cmp(&b.tile)));
        most_split.truncate(5);
        Ok(Self {
            runs: batch.run_names().map(str::to_string).collect(),
            failures: batch.report.failures.clone(),
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            tiles: graph.tiles().count(),
            most_split,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub from: String,
    pub to: String,
    pub total_ms: u64,
    pub routes: Vec<Vec<String>>,
    pub logic_tiles: Vec<Vec<String>>,
}

impl PathReport {
    pub fn new(
        query: &RouteQuery<'_>,
        from: &Endpoint,
        to: &Endpoint,
        paths: &[RoutePath],
    ) -> RouteResult<Self> {
        Ok(Self {
            from: query.describe(from).unwrap_or_else(|| from.to_string()),
            to: query.describe(to).unwrap_or_else(|| to.to_string()),
            total_ms: paths.first().map_or(0, |p| p.total_ms),
            routes: paths
                .iter()
                .map(|p| query.named_route(p))
                .collect::<RouteResult<_>>()?,
            logic_tiles: paths
                .iter()
                .map(|p| p.nodes.iter().map(ToString::to_string).collect())
                .collect(),
        })
    }
}

/// Tiles and items whose names match a search pattern.
#[derive(Debug, Clone, Serialize)]
pub struct LookupReport {
    pub pattern: String,
    pub tiles: Vec<RefRecord>,
    pub items: Vec<RefRecord>,
}

impl LookupReport {
    pub fn new(reference: &ReferenceData, pattern: &str) -> RouteResult<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            tiles: reference.find_tiles(pattern)?.into_iter().cloned().collect(),
            items: reference.find_items(pattern)?.into_iter().cloned().collect(),
        })
    }
}

#[derive(Debug, Serialize)]
struct LookupRow<'a> {
    table: &'static str,
    id: u32,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct PathStep<'a> {
    route: usize,
    step: usize,
    logic_tile: &'a str,
    tile: &'a str,
}

#[derive(Debug, Serialize)]
struct SegmentRow {
    from_row: usize,
    to_row: usize,
    actual_ms: u64,
    shortest_ms: Option<u64>,
    rerouted: bool,
    actual_route: String,
    shortest_route: String,
}

fn json<W: Write + ?Sized, T: Serialize>(w: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)?;
    Ok(())
}

pub fn write_graph_summary<W: Write + ?Sized>(
    w: &mut W,
    format: &str,
    summary: &GraphSummary,
) -> Result<()> {
    match format {
        "json" => json(w, summary)?,
        "markdown" => {
            writeln!(w, "# Logic Route Graph\n")?;
            writeln!(w, "- **Runs**: {}", summary.runs.len())?;
            writeln!(w, "- **Skipped runs**: {}", summary.failures.len())?;
            writeln!(w, "- **Tiles**: {}", summary.tiles)?;
            writeln!(w, "- **Logic tiles**: {}", summary.nodes)?;
            writeln!(w, "- **Transitions**: {}\n", summary.edges)?;
            writeln!(w, "| Tile | Logic tiles |")?;
            writeln!(w, "|------|-------------|")?;
            for entry in &summary.most_split {
                writeln!(w, "| {} | {} |", entry.tile, entry.logic_tiles)?;
            }
        }
        "csv" => {
            let mut out = csv::Writer::from_writer(&mut *w);
            out.write_record(["metric", "value"])?;
            for (metric, value) in [
                ("runs", summary.runs.len()),
                ("failures", summary.failures.len()),
                ("tiles", summary.tiles),
                ("nodes", summary.nodes),
                ("edges", summary.edges),
            ] {
                out.write_record([metric, value.to_string().as_str()])?;
            }
            out.flush()?;
        }
        _ => {
            writeln!(w, "{}", "🗺  Logic Route Graph".bright_cyan().bold())?;
            writeln!(w, "{}", "===================".cyan())?;
            writeln!(w, "Runs: {}", summary.runs.len().to_string().green())?;
            if !summary.failures.is_empty() {
                writeln!(w, "Skipped: {}", summary.failures.len().to_string().yellow())?;
            }
            writeln!(w, "Tiles: {}", summary.tiles)?;
            writeln!(w, "Logic tiles: {}", summary.nodes)?;
            writeln!(w, "Transitions: {}", summary.edges)?;
            if !summary.most_split.is_empty() {
                writeln!(w)?;
                writeln!(w, "{}", "Most split tiles".bold())?;
                for entry in &summary.most_split {
                    writeln!(w, "  {:30} {}", entry.tile, entry.logic_tiles)?;
                }
            }
        }
    }
    Ok(())
}

pub fn write_path_report<W: Write + ?Sized>(
    w: &mut W,
    format: &str,
    report: &PathReport,
) -> Result<()> {
    match format {
        "json" => json(w, report)?,
        "markdown" => {
            writeln!(w, "# {} → {}\n", report.from, report.to)?;
            writeln!(w, "Fastest known time: **{}**\n", format_ms(report.total_ms))?;
            for (idx, route) in report.routes.iter().enumerate() {
                writeln!(w, "{}. {}", idx + 1, route.join(" → "))?;
            }
        }
        "csv" => {
            let mut out = csv::Writer::from_writer(&mut *w);
            for (route, (names, ids)) in report.routes.iter().zip(&report.logic_tiles).enumerate() {
                for (step, (tile, logic_tile)) in names.iter().zip(ids).enumerate() {
                    out.serialize(PathStep {
                        route,
                        step,
                        logic_tile,
                        tile,
                    })?;
                }
            }
            out.flush()?;
        }
        _ => {
            writeln!(
                w,
                "{} {} → {}",
                "🧭".bright_cyan(),
                report.from.bold(),
                report.to.bold()
            )?;
            writeln!(w, "Fastest known time: {}", format_ms(report.total_ms).green())?;
            for route in &report.routes {
                writeln!(w, "  {}", route.join(" -> "))?;
            }
        }
    }
    Ok(())
}

pub fn write_comparison<W: Write + ?Sized>(
    w: &mut W,
    format: &str,
    comparison: &RunComparison,
) -> Result<()> {
    match format {
        "json" => json(w, comparison)?,
        "csv" => {
            let mut out = csv::Writer::from_writer(&mut *w);
            for row in &comparison.rows {
                out.serialize(row)?;
            }
            out.flush()?;
        }
        "markdown" => {
            writeln!(w, "# Best possible time: {}\n", comparison.run)?;
            writeln!(w, "- **Total time**: {}", format_ms(comparison.total_ms))?;
            writeln!(
                w,
                "- **Best possible time**: {}",
                format_ms(comparison.best_total_ms)
            )?;
            writeln!(
                w,
                "- **Possible save**: {}\n",
                format_ms(comparison.possible_save_ms())
            )?;
            writeln!(w, "| Row | Tile | Next | Actual | Best | Lost |")?;
            writeln!(w, "|-----|------|------|--------|------|------|")?;
            for row in comparison.worst_rows(WORST_ROWS) {
                writeln!(
                    w,
                    "| {} | {} | {} | {} | {} | {} |",
                    row.row,
                    row.tile_name,
                    row.next_name,
                    format_ms(row.actual_ms),
                    format_ms(row.best_ms),
                    format_ms(row.delta_ms)
                )?;
            }
        }
        _ => {
            writeln!(w, "Run: {}", comparison.run.bold())?;
            writeln!(w, "Total time: {}", format_ms(comparison.total_ms))?;
            writeln!(
                w,
                "Best possible time: {}",
                format_ms(comparison.best_total_ms).green()
            )?;
            writeln!(
                w,
                "Possible save: {}",
                format_ms(comparison.possible_save_ms()).yellow()
            )?;
            let worst = comparison.worst_rows(WORST_ROWS);
            if !worst.is_empty() {
                writeln!(w)?;
                writeln!(w, "{}", "Biggest losses".bold())?;
                for row in worst {
                    writeln!(
                        w,
                        "  row {:>5}  {:25} -> {:25} {}",
                        row.row,
                        row.tile_name,
                        row.next_name,
                        format!("+{}", format_ms(row.delta_ms)).red()
                    )?;
                }
            }
        }
    }
    Ok(())
}

pub fn write_check_routes<W: Write + ?Sized>(
    w: &mut W,
    format: &str,
    report: &CheckRouteReport,
) -> Result<()> {
    match format {
        "json" => json(w, report)?,
        "csv" => {
            let mut out = csv::Writer::from_writer(&mut *w);
            for segment in &report.segments {
                out.serialize(SegmentRow {
                    from_row: segment.from_row,
                    to_row: segment.to_row,
                    actual_ms: segment.actual_ms,
                    shortest_ms: segment.shortest_ms,
                    rerouted: segment.rerouted(),
                    actual_route: segment.actual_route.join(" -> "),
                    shortest_route: segment.shortest_route.join(" -> "),
                })?;
            }
            out.flush()?;
        }
        "markdown" => {
            writeln!(w, "# Check routes: {}\n", report.run)?;
            for segment in &report.segments {
                writeln!(
                    w,
                    "- rows {}–{}: {} (fastest {})",
                    segment.from_row,
                    segment.to_row,
                    format_ms(segment.actual_ms),
                    segment
                        .shortest_ms
                        .map_or_else(|| "unreachable".to_string(), format_ms)
                )?;
            }
            writeln!(w)?;
            writeln!(w, "- **Possible time save**: {}", format_ms(report.possible_save_ms))?;
            writeln!(
                w,
                "- **Possible time save from better routing**: {}",
                format_ms(report.routing_save_ms)
            )?;
            writeln!(w, "- **Unreachable segments**: {}", report.unreachable)?;
        }
        _ => {
            writeln!(w, "Run: {}", report.run.bold())?;
            for segment in &report.segments {
                writeln!(
                    w,
                    "{}, time: {}",
                    segment.actual_route.join(" -> "),
                    format_ms(segment.actual_ms)
                )?;
                match segment.shortest_ms {
                    Some(shortest) => writeln!(
                        w,
                        "{}, time: {}",
                        segment.shortest_route.join(" -> "),
                        format_ms(shortest).green()
                    )?,
                    None => writeln!(w, "{}", "ERROR: no known route".red())?,
                }
            }
            writeln!(w)?;
            writeln!(w, "Possible time save: {}", format_ms(report.possible_save_ms))?;
            writeln!(
                w,
                "Possible time save from better routing: {}",
                format_ms(report.routing_save_ms)
            )?;
            if report.unreachable > 0 {
                writeln!(w, "Unreachable segments: {}", report.unreachable.to_string().red())?;
            }
        }
    }
    Ok(())
}

pub fn write_lookup<W: Write + ?Sized>(
    w: &mut W,
    format: &str,
    report: &LookupReport,
) -> Result<()> {
    let tables = [("tiles", &report.tiles), ("items", &report.items)];
    match format {
        "json" => json(w, report)?,
        "csv" => {
            let mut out = csv::Writer::from_writer(&mut *w);
            for (table, records) in tables {
                for record in records {
                    out.serialize(LookupRow {
                        table,
                        id: record.id,
                        name: &record.name,
                    })?;
                }
            }
            out.flush()?;
        }
        "markdown" => {
            writeln!(w, "# Names matching `{}`\n", report.pattern)?;
            writeln!(w, "| Table | Id | Name |")?;
            writeln!(w, "|-------|----|------|")?;
            for (table, records) in tables {
                for record in records {
                    writeln!(w, "| {table} | {} | {} |", record.id, record.name)?;
                }
            }
        }
        _ => {
            for (table, records) in tables {
                writeln!(w, "{} ({})", table.bold(), records.len())?;
                for record in records {
                    writeln!(w, "  {:>6}  {}", record.id, record.name)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tileroute_core::{CheckSegment, ComparisonRow};

    fn lookup() -> LookupReport {
        let record = |id: u32, name: &str| RefRecord {
            id,
            name: name.to_string(),
        };
        let reference = ReferenceData::from_tables(
            vec![record(3, "Kakariko Village"), record(6, "Kakariko Well"), record(7, "Lake Hylia")],
            Vec::new(),
            vec![record(26, "Moon Pearl"), record(27, "Kakariko Key")],
            Vec::new(),
        );
        LookupReport::new(&reference, "kak").unwrap()
    }

    fn comparison() -> RunComparison {
        RunComparison {
            run: "run.csv".to_string(),
            rows: vec![ComparisonRow {
                row: 3,
                previous_tile: 1,
                previous_name: "Alpha".to_string(),
                tile_id: 2,
                tile_name: "Bravo".to_string(),
                next_tile: 3,
                next_name: "Charlie".to_string(),
                next_next_tile: 4,
                next_next_name: "Delta".to_string(),
                abilities: "can_dash".to_string(),
                check_occurred: false,
                actual_ms: 1_500,
                best_ms: 1_000,
                delta_ms: 500,
            }],
            total_ms: 1_500,
            best_total_ms: 1_000,
        }
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn comparison_csv_has_header_and_rows() {
        let text = render(|w| write_comparison(w, "csv", &comparison()));
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("row,previous_tile,previous_name"));
        assert!(lines.next().unwrap().contains("Bravo"));
    }

    #[test]
    fn comparison_console_lists_losses() {
        colored::control::set_override(false);
        let text = render(|w| write_comparison(w, "console", &comparison()));
        assert!(text.contains("Best possible time: 0:00:01.000"));
        assert!(text.contains("+0:00:00.500"));
    }

    #[test]
    fn comparison_markdown_has_table() {
        let text = render(|w| write_comparison(w, "markdown", &comparison()));
        assert!(text.contains("| 3 | Bravo | Charlie |"));
    }

    #[test]
    fn check_routes_console_marks_unreachable() {
        colored::control::set_override(false);
        let report = CheckRouteReport {
            run: "run.csv".to_string(),
            segments: vec![CheckSegment {
                from_row: 0,
                to_row: 9,
                actual_ms: 4_000,
                shortest_ms: None,
                actual_route: vec!["Alpha".to_string(), "Bravo".to_string()],
                shortest_route: Vec::new(),
            }],
            possible_save_ms: 0,
            routing_save_ms: 0,
            unreachable: 1,
        };
        let text = render(|w| write_check_routes(w, "console", &report));
        assert!(text.contains("Alpha -> Bravo, time: 0:00:04.000"));
        assert!(text.contains("ERROR: no known route"));
        let csv = render(|w| write_check_routes(w, "csv", &report));
        assert!(csv.starts_with("from_row,to_row,actual_ms,shortest_ms,rerouted"));
    }

    #[test]
    fn path_report_json_round_trips_names() {
        let report = PathReport {
            from: "Alpha".to_string(),
            to: "Charlie".to_string(),
            total_ms: 12,
            routes: vec![vec!["Alpha".to_string(), "Charlie".to_string()]],
            logic_tiles: vec![vec!["000a".to_string(), "000c".to_string()]],
        };
        let text = render(|w| write_path_report(w, "json", &report));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["total_ms"], 12);
        assert_eq!(value["routes"][0][1], "Charlie");
        let csv = render(|w| write_path_report(w, "csv", &report));
        assert!(csv.contains("0,1,000c,Charlie"));
    }

    #[test]
    fn lookup_lists_matching_tiles_and_items() {
        let report = lookup();
        let tiles: Vec<u32> = report.tiles.iter().map(|r| r.id).collect();
        assert_eq!(tiles, vec![3, 6]);
        assert_eq!(report.items.len(), 1);
        let csv = render(|w| write_lookup(w, "csv", &report));
        assert!(csv.starts_with("table,id,name\n"));
        assert!(csv.contains("items,27,Kakariko Key"));
        colored::control::set_override(false);
        let text = render(|w| write_lookup(w, "console", &report));
        assert!(text.contains("tiles (2)"));
    }

    #[test]
    fn lookup_rejects_invalid_pattern() {
        let reference = ReferenceData::default();
        assert!(LookupReport::new(&reference, "(").is_err());
    }
}
