//! Inward interfaces (§6): the plain data and traits the core consumes without fetching anything
//! itself. Grounded on `data.rs`'s `RoadSegment`/`Node`/`Location` JSON shapes, adapted from a
//! sidewalk-and-discriminator vehicle-routing format into a directed-multigraph loader contract.

use std::collections::HashMap;

use geo::Polygon;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::graph::{EdgeData, NodeData, NodeId, RoadGraph};

pub type EdgeTagPredicate = Box<dyn Fn(&HashMap<String, String>) -> bool>;

pub struct LoadRequest {
	pub region_polygon: Polygon<f64>,
	pub network_filter: EdgeTagPredicate,
	pub simplify_flag: bool,
	pub buffer_meters: f64,
}

/// An injected source of road-network data; the core never performs network or file I/O itself.
pub trait MapSource {
	fn load(&self, req: &LoadRequest) -> Result<RoadGraph, RouteError>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StartLocation {
	pub coords: Option<(f64, f64)>,
	pub node: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct CompletedArea {
	pub polygon: Polygon<f64>,
}

/// On-disk JSON shape for a road network: a flat node list plus a segment list, grounded on
/// `data.rs`'s `RoadSegment`/`Node` pair but stripped of the sidewalk/discriminator fields this
/// domain has no use for.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RoadGraphFile {
	pub nodes: Vec<NodeRecord>,
	pub segments: Vec<SegmentRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeRecord {
	pub id: NodeId,
	pub x: f64,
	pub y: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SegmentRecord {
	pub from: NodeId,
	pub to: NodeId,
	/// Present when the source carries real geometry; absent segments become straight lines.
	#[serde(default)]
	pub geometry: Option<Vec<(f64, f64)>>,
	#[serde(default)]
	pub directed: bool,
	#[serde(default)]
	pub tags: HashMap<String, String>,
}

impl RoadGraphFile {
	/// Builds a `RoadGraph` from the file contents, applying `network_filter` to each segment's
	/// tags and synthesizing straight-line geometry for segments that don't carry a polyline. When
	/// `simplify` is set, coalesces interstitial nodes before returning
	/// (`RoadGraph::simplify_colinear_chains`, `RouteOptions::simplify`).
	pub fn into_graph(self, network_filter: &EdgeTagPredicate, simplify: bool) -> RoadGraph {
		let mut graph = RoadGraph::new();
		for node in &self.nodes {
			graph.add_node(node.id.clone(), NodeData { x: node.x, y: node.y });
		}
		for segment in &self.segments {
			if !network_filter(&segment.tags) {
				continue;
			}
			let (from_coord, to_coord) = match (graph.node(&segment.from), graph.node(&segment.to)) {
				(Some(a), Some(b)) => (a.coord(), b.coord()),
				_ => continue,
			};
			let mut edge = match &segment.geometry {
				Some(points) if points.len() >= 2 => EdgeData::real(points.clone()),
				_ => EdgeData::straight_line(from_coord, to_coord),
			};
			edge.tags = segment.tags.clone();
			graph.add_edge(segment.from.clone(), segment.to.clone(), edge.clone());
			if !segment.directed {
				graph.add_edge(segment.to.clone(), segment.from.clone(), edge.mirrored());
			}
		}
		if simplify {
			graph.simplify_colinear_chains();
		}
		graph
	}
}

/// A `MapSource` that reads a pre-fetched `RoadGraphFile` already held in memory; the CLI layer
/// parses JSON/YAML into this before the solve starts, keeping the core free of any file access.
pub struct StaticMapSource {
	pub file: RoadGraphFile,
}

impl MapSource for StaticMapSource {
	fn load(&self, req: &LoadRequest) -> Result<RoadGraph, RouteError> {
		let graph = self.file.clone().into_graph(&req.network_filter, req.simplify_flag);
		if graph.is_empty() {
			return Err(RouteError::EmptyRegion { phase: "Loading map data" });
		}
		Ok(graph)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn sample_file() -> RoadGraphFile {
		RoadGraphFile {
			nodes: vec![
				NodeRecord { id: "a".into(), x: 0.0, y: 0.0 },
				NodeRecord { id: "b".into(), x: 1.0, y: 0.0 },
			],
			segments: vec![SegmentRecord { from: "a".into(), to: "b".into(), geometry: None, directed: false, tags: HashMap::new() }],
		}
	}

	#[test]
	fn undirected_segment_becomes_two_edges() {
		let graph = sample_file().into_graph(&(Box::new(|_: &HashMap<String, String>| true) as EdgeTagPredicate), false);
		assert_eq!(graph.edge_count(), 2);
	}

	#[test]
	fn network_filter_excludes_segment() {
		let graph = sample_file().into_graph(&(Box::new(|_: &HashMap<String, String>| false) as EdgeTagPredicate), false);
		assert_eq!(graph.edge_count(), 0);
	}

	#[test]
	fn static_source_rejects_empty_graph() {
		let source = StaticMapSource { file: RoadGraphFile { nodes: vec![], segments: vec![] } };
		let req = LoadRequest {
			region_polygon: geo::Polygon::new(geo::LineString(vec![]), vec![]),
			network_filter: Box::new(|_| true),
			simplify_flag: false,
			buffer_meters: 0.0,
		};
		assert!(source.load(&req).is_err());
	}
}
