//! Track emission (§4.E): turns a circuit into the two-segment, direction-marked `Track` the
//! downstream GPX serializer consumes.
//!
//! Grounded on `original_source/optiburb.py::create_gpx_track` / `_add_track_points` /
//! `_calculate_bearing`, reworked to produce an in-memory structure instead of writing GPX XML.

use crate::circuit::CircuitEdge;
use crate::geometry::{self, Coord};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackPointKind {
	Route,
	StraightLine,
	Direction,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
	pub lon: f64,
	pub lat: f64,
	pub kind: TrackPointKind,
	pub bearing_deg: Option<f64>,
}

impl TrackPoint {
	fn plain(coord: Coord, kind: TrackPointKind) -> Self {
		Self { lon: coord.0, lat: coord.1, kind, bearing_deg: None }
	}
}

#[derive(Clone, Debug, Default)]
pub struct Track {
	pub real: Vec<TrackPoint>,
	pub straight: Vec<TrackPoint>,
	pub total_distance: f64,
	pub backtrack_distance: f64,
}

/// Emits a `Track` from a circuit, placing a direction marker on every `arrow_interval`-th
/// interior point of each real-road segment (always the first point for 2-point segments).
pub fn emit(circuit: &[CircuitEdge], arrow_interval: usize) -> Track {
	let mut track = Track::default();
	for (_u, _v, edge) in circuit {
		let (polyline, straight_line) = match geometry::align(&edge.geometry, first_coord(edge), last_coord(edge)) {
			Some(p) => (p, edge.is_straight_line),
			None => (vec![first_coord(edge), last_coord(edge)], true),
		};

		track.total_distance += geometry::length(&polyline);
		if edge.augmented {
			track.backtrack_distance += geometry::length(&polyline);
		}

		if straight_line {
			for coord in &polyline {
				track.straight.push(TrackPoint::plain(*coord, TrackPointKind::StraightLine));
			}
		} else {
			push_real_segment(&mut track.real, &polyline, arrow_interval);
		}
	}
	track
}

fn first_coord(edge: &crate::graph::EdgeData) -> Coord {
	edge.geometry[0]
}

fn last_coord(edge: &crate::graph::EdgeData) -> Coord {
	*edge.geometry.last().unwrap()
}

fn push_real_segment(real: &mut Vec<TrackPoint>, polyline: &[Coord], arrow_interval: usize) {
	let interval = arrow_interval.max(1);
	for (i, coord) in polyline.iter().enumerate() {
		let is_marker_position = if polyline.len() == 2 { i == 0 } else { i > 0 && i < polyline.len() - 1 && i % interval == 0 };
		real.push(TrackPoint::plain(*coord, TrackPointKind::Route));
		if is_marker_position && i + 1 < polyline.len() {
			let bearing = geometry::bearing(*coord, polyline[i + 1]);
			real.push(TrackPoint { lon: coord.0, lat: coord.1, kind: TrackPointKind::Direction, bearing_deg: Some(bearing) });
		}
	}
}

/// Simplification (optional, §4.E): strips direction markers, runs Douglas-Peucker, then
/// re-inserts markers at regular intervals while preserving each surviving point's kind by
/// nearest-neighbor lookup into the pre-simplification set.
pub fn simplify_track(track: &Track, tolerance: f64) -> Track {
	let route_points: Vec<Coord> = track.real.iter().filter(|p| p.kind == TrackPointKind::Route).map(|p| (p.lon, p.lat)).collect();
	let marker_count = track.real.iter().filter(|p| p.kind == TrackPointKind::Direction).count();

	let simplified = geometry::simplify(&route_points, tolerance);
	let n = simplified.len();
	let interval = (n / (marker_count + 1)).max(3);

	let mut real = Vec::with_capacity(simplified.len());
	for (i, coord) in simplified.iter().enumerate() {
		let kind = nearest_kind(&route_points, &track.real, *coord);
		real.push(TrackPoint::plain(*coord, kind));
		if i > 0 && i < simplified.len() - 1 && i % interval == 0 {
			if let Some(next) = simplified.get(i + 1) {
				real.push(TrackPoint {
					lon: coord.0,
					lat: coord.1,
					kind: TrackPointKind::Direction,
					bearing_deg: Some(geometry::bearing(*coord, *next)),
				});
			}
		}
	}

	Track {
		real,
		straight: track.straight.clone(),
		total_distance: track.total_distance,
		backtrack_distance: track.backtrack_distance,
	}
}

fn nearest_kind(route_points: &[Coord], original: &[TrackPoint], target: Coord) -> TrackPointKind {
	route_points
		.iter()
		.enumerate()
		.min_by(|(_, a), (_, b)| geometry::distance(**a, target).partial_cmp(&geometry::distance(**b, target)).unwrap())
		.and_then(|(_, coord)| original.iter().find(|p| (p.lon, p.lat) == *coord))
		.map(|p| p.kind)
		.unwrap_or(TrackPointKind::Route)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::graph::EdgeData;
	use std::sync::Arc;

	fn edge(from: Coord, to: Coord, straight: bool) -> CircuitEdge {
		let mut data = if straight { EdgeData::straight_line(from, to) } else { EdgeData::real(vec![from, to]) };
		data.is_straight_line = straight;
		(Arc::from("u"), Arc::from("v"), data)
	}

	#[test]
	fn real_segment_goes_to_real_track() {
		let circuit = vec![edge((0.0, 0.0), (1.0, 0.0), false)];
		let track = emit(&circuit, 3);
		assert_eq!(track.real.len(), 3); // 2 coords + 1 direction marker (2-point rule)
		assert!(track.straight.is_empty());
	}

	#[test]
	fn straight_segment_goes_to_straight_track() {
		let circuit = vec![edge((0.0, 0.0), (1.0, 0.0), true)];
		let track = emit(&circuit, 3);
		assert!(track.real.is_empty());
		assert_eq!(track.straight.len(), 2);
	}

	#[test]
	fn augmented_edges_accumulate_backtrack_distance() {
		let (u, v, mut data) = edge((0.0, 0.0), (1.0, 0.0), false);
		data.augmented = true;
		let circuit = vec![(u, v, data)];
		let track = emit(&circuit, 3);
		assert!((track.backtrack_distance - 1.0).abs() < 1e-9);
	}
}
