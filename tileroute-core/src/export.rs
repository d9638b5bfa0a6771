//! Graph export as GraphML and node-link JSON.
use serde::Serialize;
use std::io::{self, Write};

use crate::error::RouteResult;
use crate::graph::{LogicGraph, LogicNode};
use crate::reference::ReferenceData;

/// A node as written by the exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportNode {
    pub id: String,
    pub tile_id: u32,
    pub name: String,
    pub abilities: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEdge {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

/// Node-link document, the layout graph tools read as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeLinkGraph {
    pub directed: bool,
    pub multigraph: bool,
    pub nodes: Vec<ExportNode>,
    pub links: Vec<ExportEdge>,
}

fn export_node(node: &LogicNode, reference: &ReferenceData) -> RouteResult<ExportNode> {
    Ok(ExportNode {
        id: node.id.to_string(),
        tile_id: node.tile_id,
        name: reference.tile_name(node.tile_id)?.to_string(),
        abilities: node.abilities_label(),
    })
}

/// Snapshot of the graph in export form, ordered by id.
///
/// # Errors
///
/// Returns [`RouteError::MalformedReferenceData`](crate::RouteError) if a
/// node's tile is missing from the tile table.
pub fn node_link(graph: &LogicGraph, reference: &ReferenceData) -> RouteResult<NodeLinkGraph> {
    Ok(NodeLinkGraph {
        directed: true,
        multigraph: false,
        nodes: graph
            .nodes()
            .into_iter()
            .map(|node| export_node(node, reference))
            .collect::<RouteResult<_>>()?,
        links: graph
            .edges()
            .into_iter()
            .map(|(source, target, weight)| ExportEdge {
                source: source.to_string(),
                target: target.to_string(),
                weight,
            })
            .collect(),
    })
}

/// Write the graph as pretty-printed node-link JSON.
///
/// # Errors
///
/// Returns any error raised by the writer.
pub fn write_json<W: Write>(doc: &NodeLinkGraph, writer: W) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(writer, doc)
}

/// Write the graph as GraphML.
///
/// # Errors
///
/// Returns any error raised by the writer.
pub fn write_graphml<W: Write>(doc: &NodeLinkGraph, mut writer: W) -> io::Result<()> {
    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">"#
    )?;
    writeln!(writer, r#"  <key id="name" for="node" attr.name="name" attr.type="string"/>"#)?;
    writeln!(
        writer,
        r#"  <key id="abilities" for="node" attr.name="abilities" attr.type="string"/>"#
    )?;
    writeln!(writer, r#"  <key id="tile_id" for="node" attr.name="tile_id" attr.type="long"/>"#)?;
    writeln!(writer, r#"  <key id="weight" for="edge" attr.name="weight" attr.type="long"/>"#)?;
    writeln!(writer, r#"  <graph edgedefault="directed">"#)?;
    for node in &doc.nodes {
        writeln!(writer, r#"    <node id="{}">"#, escape(&node.id))?;
        writeln!(writer, r#"      <data key="name">{}</data>"#, escape(&node.name))?;
        writeln!(
            writer,
            r#"      <data key="abilities">{}</data>"#,
            escape(&node.abilities)
        )?;
        writeln!(writer, r#"      <data key="tile_id">{}</data>"#, node.tile_id)?;
        writeln!(writer, "    </node>")?;
    }
    for edge in &doc.links {
        writeln!(
            writer,
            r#"    <edge source="{}" target="{}">"#,
            escape(&edge.source),
            escape(&edge.target)
        )?;
        writeln!(writer, r#"      <data key="weight">{}</data>"#, edge.weight)?;
        writeln!(writer, "    </edge>")?;
    }
    writeln!(writer, "  </graph>")?;
    writeln!(writer, "</graphml>")?;
    writer.flush()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
