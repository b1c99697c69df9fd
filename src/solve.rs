//! The top-level pipeline (§5): load -> (optional) filter completed -> balance -> construct
//! circuit -> emit track, run in strict sequence with progress events and cooperative
//! cancellation.
//!
//! Grounded on the teacher's `main.rs` subcommand dispatch, which already drives a fixed
//! load-then-solve sequence; generalized here into a single reusable entry point instead of one
//! function per CLI subcommand.

use crate::balance;
use crate::circuit;
use crate::config::RouteOptions;
use crate::error::RouteError;
use crate::filter;
use crate::io::{CompletedArea, LoadRequest, MapSource};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::track::{self, Track};

pub struct SolveRequest<'a> {
	pub load: LoadRequest,
	pub completed_area: Option<CompletedArea>,
	pub options: &'a RouteOptions,
}

/// Runs the full pipeline against `source`, reporting milestones to `progress` and checking
/// `cancelled` at each phase boundary.
pub fn solve_route(
	source: &dyn MapSource,
	request: SolveRequest,
	progress: &mut dyn ProgressSink,
	cancelled: &dyn Fn() -> bool,
) -> Result<Track, RouteError> {
	progress.emit(ProgressEvent::new("Starting", 0, "solve started"));
	check_cancelled(cancelled, "Starting")?;

	progress.emit(ProgressEvent::new("Area defined", 5, "region resolved"));

	progress.emit(ProgressEvent::new("Loading map data", 10, "fetching road network"));
	let mut graph = source.load(&request.load)?;
	check_cancelled(cancelled, "Loading map data")?;

	progress.emit(ProgressEvent::new("Processing graph", 30, "preparing graph for balancing"));
	if request.options.prune {
		graph.prune_unnamed_tracks();
	}
	if request.options.feature_deadend {
		balance::shortcut_dead_ends(&mut graph);
	}
	if request.options.exclude_completed {
		if let Some(area) = &request.completed_area {
			graph = filter::filter_completed(&graph, &area.polygon, request.options.completed_threshold);
		}
	}
	check_cancelled(cancelled, "Processing graph")?;

	progress.emit(ProgressEvent::new("Balancing graph", 55, "equalizing in/out degree"));
	balance::balance(&mut graph)?;
	check_cancelled(cancelled, "Balancing graph")?;

	progress.emit(ProgressEvent::new("Finding circuit", 75, "constructing Eulerian circuit"));
	let start_node = request.options.start.as_ref().and_then(|s| s.node.clone());
	let start_coords = request.options.start.as_ref().and_then(|s| s.coords);
	let start = circuit::choose_start(&graph, start_node.as_ref(), start_coords)?;
	let circuit = circuit::build_circuit(&graph, &start)?;
	check_cancelled(cancelled, "Finding circuit")?;

	progress.emit(ProgressEvent::new("Creating GPX", 90, "emitting track"));
	let mut result = track::emit(&circuit, request.options.arrow_interval);
	if request.options.simplify_gpx {
		result = track::simplify_track(&result, request.options.simplify_tolerance);
	}

	progress.emit(ProgressEvent::new("Complete", 100, "solve finished"));
	Ok(result)
}

fn check_cancelled(cancelled: &dyn Fn() -> bool, phase: &'static str) -> Result<(), RouteError> {
	if cancelled() {
		return Err(RouteError::Cancelled { phase });
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::graph::{test_util::*, RoadGraph};
	use geo::{Coordinate, LineString, Polygon};
	use std::collections::HashMap;

	struct FixedSource(RoadGraph);

	impl MapSource for FixedSource {
		fn load(&self, _req: &LoadRequest) -> Result<RoadGraph, RouteError> {
			Ok(self.0.clone())
		}
	}

	fn empty_polygon() -> Polygon<f64> {
		Polygon::new(LineString(vec![]), vec![])
	}

	fn request(options: &RouteOptions) -> SolveRequest {
		SolveRequest {
			load: LoadRequest {
				region_polygon: empty_polygon(),
				network_filter: Box::new(|_: &HashMap<String, String>| true),
				simplify_flag: false,
				buffer_meters: 0.0,
			},
			completed_area: None,
			options,
		}
	}

	#[test]
	fn square_block_solves_end_to_end() {
		let g = graph(
			&[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 1.0, 1.0), ("d", 0.0, 1.0)],
			&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")],
		);
		let source = FixedSource(g);
		let options = RouteOptions::default();
		let mut sink = crate::progress::NullSink;
		let track = solve_route(&source, request(&options), &mut sink, &|| false).unwrap();
		assert!(track.total_distance > 0.0);
		assert!(!track.real.is_empty());
	}

	#[test]
	fn cancelled_before_start_returns_cancelled_error() {
		let g = graph(&[("a", 0.0, 0.0)], &[]);
		let source = FixedSource(g);
		let options = RouteOptions::default();
		let mut sink = crate::progress::NullSink;
		let result = solve_route(&source, request(&options), &mut sink, &|| true);
		assert!(matches!(result, Err(RouteError::Cancelled { .. })));
	}
}
