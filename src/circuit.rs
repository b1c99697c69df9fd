//! The Eulerian circuit constructor (§4.E): an iterative Hierholzer traversal over the balanced
//! directed multigraph, consuming each edge exactly once.
//!
//! Grounded on the teacher's explicit-stack style (`graph::heuristics::solve_pwrp` never
//! recurses over the graph itself) and on
//! `original_source/optiburb.py::determine_circuit`'s use of an Eulerian-circuit routine with an
//! explicit start node.

use indexmap::IndexMap;

use crate::error::RouteError;
use crate::geometry;
use crate::graph::{EdgeData, NodeId, RoadGraph};

const PHASE: &str = "Finding circuit";

pub type CircuitEdge = (NodeId, NodeId, EdgeData);

/// Picks the start node: the caller's node if present, else the node nearest the caller's
/// coordinates, else the first node in iteration order.
pub fn choose_start(graph: &RoadGraph, requested_node: Option<&NodeId>, requested_coords: Option<(f64, f64)>) -> Result<NodeId, RouteError> {
	if graph.is_empty() {
		return Err(RouteError::EmptyRegion { phase: PHASE });
	}
	if let Some(node) = requested_node {
		if graph.node(node).is_some() {
			return Ok(node.clone());
		}
	}
	if let Some(coords) = requested_coords {
		let nearest = graph
			.nodes()
			.min_by(|a, b| {
				let da = geometry::distance(graph.node(a).unwrap().coord(), coords);
				let db = geometry::distance(graph.node(b).unwrap().coord(), coords);
				da.partial_cmp(&db).unwrap()
			})
			.cloned();
		return nearest.ok_or(RouteError::NoPathToStart { phase: PHASE });
	}
	graph.nodes().next().cloned().ok_or(RouteError::EmptyRegion { phase: PHASE })
}

/// Runs Hierholzer's algorithm from `start`, returning the circuit as an ordered list of
/// `(u, v, edge_data)` triples.
pub fn build_circuit(graph: &RoadGraph, start: &NodeId) -> Result<Vec<CircuitEdge>, RouteError> {
	if !graph.is_weakly_connected() {
		return Err(RouteError::NotConnected { phase: PHASE });
	}
	for n in graph.nodes() {
		if graph.in_degree(n) != graph.out_degree(n) {
			return Err(RouteError::CircuitIncomplete {
				phase: PHASE,
				detail: format!("node {} is not balanced", n),
			});
		}
	}

	// Mutable remaining-edge-count structure, keyed by (u, v); never touches original geometry.
	// IndexMap (not HashMap) so `next_unused_target` walks candidates in insertion order - the
	// circuit built from a given graph is reproducible run to run.
	let mut remaining: IndexMap<(NodeId, NodeId), Vec<usize>> = IndexMap::new();
	for (u, v, key, _) in graph.edges() {
		remaining.entry((u.clone(), v.clone())).or_default().push(key);
	}
	let total_edges = graph.edge_count();

	let mut circuit: Vec<CircuitEdge> = Vec::new();
	let mut stack: Vec<NodeId> = vec![start.clone()];
	let mut path_edges: Vec<CircuitEdge> = Vec::new();

	while let Some(u) = stack.last().cloned() {
		if let Some(v) = next_unused_target(graph, &remaining, &u) {
			let key = {
				let bucket = remaining.get_mut(&(u.clone(), v.clone())).unwrap();
				bucket.pop().unwrap()
			};
			if remaining.get(&(u.clone(), v.clone())).map_or(false, Vec::is_empty) {
				remaining.remove(&(u.clone(), v.clone()));
			}
			let edge = graph.edge(&u, &v, key).expect("remaining edge must exist").clone();
			path_edges.push((u.clone(), v.clone(), edge));
			stack.push(v);
		} else {
			stack.pop();
			if let Some(edge) = path_edges.pop() {
				circuit.push(edge);
			}
		}
	}
	circuit.reverse();

	if circuit.len() != total_edges {
		return Err(RouteError::CircuitIncomplete {
			phase: PHASE,
			detail: format!("used {} of {} edges", circuit.len(), total_edges),
		});
	}
	for w in circuit.windows(2) {
		if w[0].1 != w[1].0 {
			return Err(RouteError::CircuitIncomplete {
				phase: PHASE,
				detail: "edges do not chain".to_string(),
			});
		}
	}
	if let (Some(first), Some(last)) = (circuit.first(), circuit.last()) {
		if first.0 != last.1 {
			return Err(RouteError::CircuitIncomplete {
				phase: PHASE,
				detail: "circuit does not close".to_string(),
			});
		}
	}
	let circuit_straight = circuit.iter().filter(|(_, _, e)| e.is_straight_line).count();
	let graph_straight = graph.edges().filter(|(_, _, _, e)| e.is_straight_line).count();
	if circuit_straight != graph_straight {
		return Err(RouteError::CircuitIncomplete {
			phase: PHASE,
			detail: "straight-line edge count changed".to_string(),
		});
	}

	Ok(circuit)
}

fn next_unused_target(_graph: &RoadGraph, remaining: &IndexMap<(NodeId, NodeId), Vec<usize>>, u: &NodeId) -> Option<NodeId> {
	remaining.keys().find(|(from, _)| from == u).map(|(_, to)| to.clone())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::balance;
	use crate::graph::test_util::*;

	#[test]
	fn square_block_circuit_in_order() {
		let mut g = graph(
			&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 1.0, 1.0), ("d", 0.0, 1.0)],
			&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")],
		);
		balance::balance(&mut g).unwrap();
		let start = choose_start(&g, None, None).unwrap();
		let circuit = build_circuit(&g, &start).unwrap();
		assert_eq!(circuit.len(), 4);
		for w in circuit.windows(2) {
			assert_eq!(w[0].1, w[1].0);
		}
		assert_eq!(circuit.first().unwrap().0, circuit.last().unwrap().1);
	}

	#[test]
	fn start_nearest_coords_picks_b() {
		let g = graph(
			&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 1.0, 1.0), ("d", 0.0, 1.0)],
			&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")],
		);
		let start = choose_start(&g, None, Some((0.9, 0.05))).unwrap();
		assert_eq!(&*start, "b");
	}

	#[test]
	fn empty_graph_is_rejected() {
		let g = RoadGraph::new();
		assert!(choose_start(&g, None, None).is_err());
	}
}
