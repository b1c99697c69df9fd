//! The directed road multigraph.
//!
//! Generalizes the teacher's `Graph<NId, N, E>` / `Edge<NId>` pair into a multigraph specialized
//! for directed road edges with parallel-edge identity: `(u, v, key)` where `key` is the index of
//! the edge within the `Vec` stored for that ordered pair.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use noisy_float::prelude::{n64, N64};
use priority_queue::PriorityQueue;

use crate::geometry::{self, Coord, Polyline};

pub type NodeId = Arc<str>;

/// A directed, possibly-synthetic road segment.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeData {
	pub geometry: Polyline,
	pub length: f64,
	pub is_straight_line: bool,
	pub tags: HashMap<String, String>,
	pub augmented: bool,
	pub connecting: bool,
}

impl EdgeData {
	pub fn real(geometry: Polyline) -> Self {
		let length = geometry::length(&geometry);
		Self {
			geometry,
			length,
			is_straight_line: false,
			tags: HashMap::new(),
			augmented: false,
			connecting: false,
		}
	}

	pub fn straight_line(from: Coord, to: Coord) -> Self {
		let geometry = vec![from, to];
		let length = geometry::distance(from, to);
		Self {
			geometry,
			length,
			is_straight_line: true,
			tags: HashMap::new(),
			augmented: false,
			connecting: false,
		}
	}

	/// Builds the reverse of this edge, preserving the provenance invariant: the mirrored edge's
	/// geometry is the coordinate-reversed original and its `is_straight_line` flag is copied
	/// verbatim. This is the single setter §9 calls for - no other code path is allowed to flip
	/// `is_straight_line` on a synthesized reverse edge.
	pub fn mirrored(&self) -> Self {
		Self {
			geometry: geometry::reverse(&self.geometry),
			length: self.length,
			is_straight_line: self.is_straight_line,
			tags: self.tags.clone(),
			augmented: self.augmented,
			connecting: self.connecting,
		}
	}
}

/// A node with its WGS-84 coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeData {
	pub x: f64,
	pub y: f64,
}

impl NodeData {
	pub fn coord(&self) -> Coord {
		(self.x, self.y)
	}
}

/// The directed road multigraph.
#[derive(Clone, Debug, Default)]
pub struct RoadGraph {
	nodes: IndexMap<NodeId, NodeData>,
	/// Adjacency: all edges keyed by ordered pair, parallel edges held in insertion order.
	edges: IndexMap<(NodeId, NodeId), Vec<EdgeData>>,
}

impl RoadGraph {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_node(&mut self, id: NodeId, data: NodeData) {
		self.nodes.insert(id, data);
	}

	pub fn node(&self, id: &NodeId) -> Option<&NodeData> {
		self.nodes.get(id)
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
		self.nodes.keys()
	}

	/// Adds a directed edge `u -> v`, returning its disambiguating key.
	pub fn add_edge(&mut self, u: NodeId, v: NodeId, data: EdgeData) -> usize {
		let bucket = self.edges.entry((u, v)).or_default();
		bucket.push(data);
		bucket.len() - 1
	}

	pub fn edge(&self, u: &NodeId, v: &NodeId, key: usize) -> Option<&EdgeData> {
		self.edges.get(&(u.clone(), v.clone())).and_then(|b| b.get(key))
	}

	/// All parallel edges between the ordered pair `(u, v)`.
	pub fn edges_between(&self, u: &NodeId, v: &NodeId) -> &[EdgeData] {
		self.edges.get(&(u.clone(), v.clone())).map(|v| v.as_slice()).unwrap_or(&[])
	}

	/// Removes one edge instance `(u, v, key)`.
	pub fn remove_edge(&mut self, u: &NodeId, v: &NodeId, key: usize) -> Option<EdgeData> {
		let pair = (u.clone(), v.clone());
		let bucket = self.edges.get_mut(&pair)?;
		if key >= bucket.len() {
			return None;
		}
		let removed = bucket.remove(key);
		if bucket.is_empty() {
			self.edges.remove(&pair);
		}
		Some(removed)
	}

	pub fn remove_node(&mut self, id: &NodeId) {
		self.nodes.remove(id);
		self.edges.retain(|(u, v), _| u != id && v != id);
	}

	/// Iterates every `(u, v, key, edge)` triple.
	pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, usize, &EdgeData)> {
		self.edges
			.iter()
			.flat_map(|((u, v), bucket)| bucket.iter().enumerate().map(move |(k, e)| (u, v, k, e)))
	}

	pub fn edge_count(&self) -> usize {
		self.edges.values().map(Vec::len).sum()
	}

	pub fn out_degree(&self, id: &NodeId) -> usize {
		self.edges.iter().filter(|((u, _), _)| u == id).map(|(_, b)| b.len()).sum()
	}

	pub fn in_degree(&self, id: &NodeId) -> usize {
		self.edges.iter().filter(|((_, v), _)| v == id).map(|(_, b)| b.len()).sum()
	}

	pub fn out_edges<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = (&'a NodeId, usize, &'a EdgeData)> + 'a {
		self.edges
			.iter()
			.filter(move |((u, _), _)| u == id)
			.flat_map(move |((_, v), bucket)| bucket.iter().enumerate().map(move |(k, e)| (v, k, e)))
	}

	pub fn in_edges<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = (&'a NodeId, usize, &'a EdgeData)> + 'a {
		self.edges
			.iter()
			.filter(move |((_, v), _)| v == id)
			.flat_map(move |((u, _), bucket)| bucket.iter().enumerate().map(move |(k, e)| (u, k, e)))
	}

	/// Weakly-connected components, as sets of node ids. Size ordering is the caller's job
	/// (see `filter`, which sorts largest-first).
	pub fn weakly_connected_components(&self) -> Vec<HashSet<NodeId>> {
		let mut undirected: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
		for id in self.nodes.keys() {
			undirected.entry(id.clone()).or_default();
		}
		for (u, v, _, _) in self.edges() {
			undirected.entry(u.clone()).or_default().push(v.clone());
			undirected.entry(v.clone()).or_default().push(u.clone());
		}
		let mut seen = HashSet::new();
		let mut components = Vec::new();
		for start in self.nodes.keys() {
			if seen.contains(start) {
				continue;
			}
			let mut component = HashSet::new();
			let mut stack = vec![start.clone()];
			while let Some(n) = stack.pop() {
				if !component.insert(n.clone()) {
					continue;
				}
				seen.insert(n.clone());
				if let Some(neighbors) = undirected.get(&n) {
					for nb in neighbors {
						if !component.contains(nb) {
							stack.push(nb.clone());
						}
					}
				}
			}
			components.push(component);
		}
		components
	}

	pub fn is_weakly_connected(&self) -> bool {
		self.weakly_connected_components().len() <= 1
	}

	/// Shortest path from `from` to `to`, weighted by `length`, respecting edge direction.
	/// Returns the sequence of `(u, v, key)` triples traversed.
	pub fn shortest_path(&self, from: &NodeId, to: &NodeId) -> Option<Vec<(NodeId, NodeId, usize)>> {
		if from == to {
			return Some(Vec::new());
		}
		let mut dist: HashMap<NodeId, N64> = HashMap::new();
		let mut prev: HashMap<NodeId, (NodeId, NodeId, usize)> = HashMap::new();
		let mut queue = PriorityQueue::new();
		dist.insert(from.clone(), n64(0.0));
		queue.push(from.clone(), n64(0.0));
		while let Some((u, neg_d)) = queue.pop() {
			let d = -neg_d;
			if &u == to {
				return Some(reconstruct_path(&prev, to));
			}
			if dist.get(&u).map_or(false, |best| *best < d) {
				continue;
			}
			for (v, key, edge) in self.out_edges(&u) {
				let nd = d + n64(edge.length);
				if dist.get(v).map_or(true, |best| nd < *best) {
					dist.insert(v.clone(), nd);
					prev.insert(v.clone(), (u.clone(), v.clone(), key));
					queue.push(v.clone(), -nd);
				}
			}
		}
		None
	}

	/// Keeps only nodes matching `keep` (and the edges between surviving nodes).
	pub fn retain_nodes(&mut self, keep: impl Fn(&NodeId) -> bool) {
		self.nodes.retain(|id, _| keep(id));
		self.edges.retain(|(u, v), _| keep(u) && keep(v));
	}

	/// Builds the subgraph induced by `keep`, copying all nodes and qualifying edges.
	pub fn subgraph(&self, keep_node: impl Fn(&NodeId) -> bool) -> RoadGraph {
		let mut out = RoadGraph::new();
		for (id, data) in self.nodes.iter().filter(|(id, _)| keep_node(id)) {
			out.add_node(id.clone(), *data);
		}
		for (u, v, _, e) in self.edges() {
			if keep_node(u) && keep_node(v) {
				out.add_edge(u.clone(), v.clone(), e.clone());
			}
		}
		out
	}

	/// Coalesces interstitial nodes - those with exactly one incoming and one outgoing edge -
	/// into the single edge they pass through, concatenating geometry. Mirrors `osmnx`'s
	/// topological graph simplification (`RouteOptions::simplify`): a node is collapsed whenever
	/// it isn't a real intersection, regardless of how colinear its geometry actually is. Never
	/// collapses a node down to a self-loop; chains that would form one stop one node short.
	pub fn simplify_colinear_chains(&mut self) {
		let mut skip: HashSet<NodeId> = HashSet::new();
		loop {
			let candidate = self
				.nodes()
				.find(|id| !skip.contains(*id) && self.in_degree(id) == 1 && self.out_degree(id) == 1)
				.cloned();
			let v = match candidate {
				Some(v) => v,
				None => break,
			};
			let (u, _, in_edge) = self.in_edges(&v).next().map(|(u, k, e)| (u.clone(), k, e.clone())).unwrap();
			let (w, _, out_edge) = self.out_edges(&v).next().map(|(w, k, e)| (w.clone(), k, e.clone())).unwrap();
			if u == v || w == v || u == w {
				skip.insert(v);
				continue;
			}
			let mut geometry = in_edge.geometry.clone();
			geometry.extend(out_edge.geometry.iter().skip(1).cloned());
			let merged = EdgeData {
				geometry,
				length: in_edge.length + out_edge.length,
				is_straight_line: in_edge.is_straight_line && out_edge.is_straight_line,
				tags: in_edge.tags.clone(),
				augmented: in_edge.augmented || out_edge.augmented,
				connecting: in_edge.connecting || out_edge.connecting,
			};
			self.remove_node(&v);
			self.add_edge(u, w, merged);
		}
	}

	/// Removes edges whose `highway` tag is an unnamed `track`/`path`, or any `cycleway`
	/// regardless of name, then drops any node left with no edges at all. Grounded on
	/// `original_source/optiburb.py::prune`.
	pub fn prune_unnamed_tracks(&mut self) {
		let mut doomed: Vec<(NodeId, NodeId, usize)> = self
			.edges()
			.filter(|(_, _, _, e)| {
				let highway = e.tags.get("highway").map(String::as_str);
				let unnamed_track = matches!(highway, Some("track") | Some("path")) && e.tags.get("name").map_or(true, |n| n.is_empty());
				let cycleway = highway == Some("cycleway");
				unnamed_track || cycleway
			})
			.map(|(u, v, k, _)| (u.clone(), v.clone(), k))
			.collect();
		// Descending by key within each (u, v) bucket, so removing one doesn't shift the index of
		// another still-queued removal in the same bucket.
		doomed.sort_by(|a, b| b.2.cmp(&a.2));
		for (u, v, k) in doomed {
			self.remove_edge(&u, &v, k);
		}
		let orphans: Vec<NodeId> = self.nodes().filter(|id| self.in_degree(id) + self.out_degree(id) == 0).cloned().collect();
		for id in orphans {
			self.remove_node(&id);
		}
	}
}

fn reconstruct_path(prev: &HashMap<NodeId, (NodeId, NodeId, usize)>, to: &NodeId) -> Vec<(NodeId, NodeId, usize)> {
	let mut path = Vec::new();
	let mut cur = to.clone();
	while let Some((u, v, key)) = prev.get(&cur) {
		path.push((u.clone(), v.clone(), *key));
		cur = u.clone();
	}
	path.reverse();
	path
}

#[cfg(test)]
pub mod test_util {
	use super::*;

	pub fn nid(s: &str) -> NodeId {
		Arc::from(s)
	}

	/// Builds a small graph from `(id, x, y)` nodes and `(u, v)` straight-line edges.
	pub fn graph(nodes: &[(&str, f64, f64)], edges: &[(&str, &str)]) -> RoadGraph {
		let mut g = RoadGraph::new();
		for (id, x, y) in nodes {
			g.add_node(nid(id), NodeData { x: *x, y: *y });
		}
		for (u, v) in edges {
			let ucoord = g.node(&nid(u)).unwrap().coord();
			let vcoord = g.node(&nid(v)).unwrap().coord();
			g.add_edge(nid(u), nid(v), EdgeData::real(vec![ucoord, vcoord]));
		}
		g
	}
}

#[cfg(test)]
mod test {
	use super::test_util::*;
	use super::*;

	#[test]
	fn degrees_of_square_block() {
		let g = graph(
			&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 1.0, 1.0), ("d", 0.0, 1.0)],
			&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")],
		);
		for n in ["a", "b", "c", "d"] {
			let id = nid(n);
			assert_eq!(g.in_degree(&id), 1);
			assert_eq!(g.out_degree(&id), 1);
		}
	}

	#[test]
	fn weakly_connected_detects_two_components() {
		let g = graph(
			&[("a", 0.0, 0.0), ("b", 0.0, 1.0), ("c", 10.0, 0.0), ("d", 10.0, 1.0)],
			&[("a", "b"), ("b", "a"), ("c", "d"), ("d", "c")],
		);
		assert_eq!(g.weakly_connected_components().len(), 2);
	}

	#[test]
	fn shortest_path_respects_direction() {
		let g = graph(&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 2.0, 0.0)], &[("a", "b"), ("b", "c")]);
		assert!(g.shortest_path(&nid("a"), &nid("c")).is_some());
		assert!(g.shortest_path(&nid("c"), &nid("a")).is_none());
	}

	#[test]
	fn parallel_edges_get_distinct_keys() {
		let mut g = RoadGraph::new();
		g.add_node(nid("a"), NodeData { x: 0.0, y: 0.0 });
		g.add_node(nid("b"), NodeData { x: 1.0, y: 0.0 });
		let k1 = g.add_edge(nid("a"), nid("b"), EdgeData::real(vec![(0.0, 0.0), (1.0, 0.0)]));
		let k2 = g.add_edge(nid("a"), nid("b"), EdgeData::real(vec![(0.0, 0.0), (1.0, 0.0)]));
		assert_ne!(k1, k2);
		assert_eq!(g.edges_between(&nid("a"), &nid("b")).len(), 2);
	}

	#[test]
	fn simplify_collapses_directed_chain() {
		let mut g = graph(&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 2.0, 0.0)], &[("a", "b"), ("b", "c")]);
		g.simplify_colinear_chains();
		assert!(g.node(&nid("b")).is_none());
		assert_eq!(g.edges_between(&nid("a"), &nid("c")).len(), 1);
		assert!((g.edges_between(&nid("a"), &nid("c"))[0].length - 2.0).abs() < 1e-9);
	}

	#[test]
	fn simplify_stops_short_of_a_self_loop() {
		let mut g = graph(
			&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 2.0, 0.0), ("d", 3.0, 0.0)],
			&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")],
		);
		g.simplify_colinear_chains();
		assert!(g.nodes().all(|n| g.in_degree(n) + g.out_degree(n) > 0));
		for (u, v, _, _) in g.edges() {
			assert_ne!(u, v);
		}
	}

	#[test]
	fn prune_drops_unnamed_track_and_orphan() {
		let mut g = RoadGraph::new();
		g.add_node(nid("a"), NodeData { x: 0.0, y: 0.0 });
		g.add_node(nid("b"), NodeData { x: 1.0, y: 0.0 });
		let mut edge = EdgeData::real(vec![(0.0, 0.0), (1.0, 0.0)]);
		edge.tags.insert("highway".to_string(), "track".to_string());
		g.add_edge(nid("a"), nid("b"), edge);
		g.prune_unnamed_tracks();
		assert!(g.edges_between(&nid("a"), &nid("b")).is_empty());
		assert!(g.node(&nid("a")).is_none());
		assert!(g.node(&nid("b")).is_none());
	}

	#[test]
	fn prune_keeps_named_track() {
		let mut g = RoadGraph::new();
		g.add_node(nid("a"), NodeData { x: 0.0, y: 0.0 });
		g.add_node(nid("b"), NodeData { x: 1.0, y: 0.0 });
		let mut edge = EdgeData::real(vec![(0.0, 0.0), (1.0, 0.0)]);
		edge.tags.insert("highway".to_string(), "track".to_string());
		edge.tags.insert("name".to_string(), "Fire Road 3".to_string());
		g.add_edge(nid("a"), nid("b"), edge);
		g.prune_unnamed_tracks();
		assert_eq!(g.edges_between(&nid("a"), &nid("b")).len(), 1);
	}
}
