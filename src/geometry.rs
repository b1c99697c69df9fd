//! Planar geometry helpers shared by the balancer, the circuit constructor and track emission.
//!
//! Lengths and distances are planar Euclidean over WGS-84 degrees, not great-circle - consistent
//! throughout the crate, which is all the balance/circuit invariants require.

use geo::algorithm::contains::Contains;
use geo::{Coordinate, LineString, Point, Polygon};

pub type Coord = (f64, f64);
pub type Polyline = Vec<Coord>;

/// Coordinate matching tolerance used when aligning geometry to edge endpoints.
pub const ALIGN_EPSILON: f64 = 1e-5;

/// Reverses the order of coordinates in a polyline.
pub fn reverse(polyline: &[Coord]) -> Polyline {
	polyline.iter().rev().cloned().collect()
}

/// Planar Euclidean distance between two points.
pub fn distance(p: Coord, q: Coord) -> f64 {
	((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt()
}

/// Sum of Euclidean segment lengths along a polyline.
pub fn length(polyline: &[Coord]) -> f64 {
	polyline.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Forward azimuth from `p` to `q`, in degrees, normalized to `[0, 360)`.
pub fn bearing(p: Coord, q: Coord) -> f64 {
	let (lon1, lat1) = (p.0.to_radians(), p.1.to_radians());
	let (lon2, lat2) = (q.0.to_radians(), q.1.to_radians());
	let d_lon = lon2 - lon1;
	let y = d_lon.sin() * lat2.cos();
	let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
	let deg = y.atan2(x).to_degrees();
	(deg + 360.0) % 360.0
}

/// Orients `polyline` so its first/last point match `u`/`v` within [`ALIGN_EPSILON`].
///
/// Returns `None` if the polyline has fewer than 2 points.
pub fn align(polyline: &[Coord], u: Coord, v: Coord) -> Option<Polyline> {
	if polyline.len() < 2 {
		return None;
	}
	let first = polyline[0];
	let last = *polyline.last().unwrap();
	let forward_cost = distance(first, u) + distance(last, v);
	let reverse_cost = distance(first, v) + distance(last, u);
	if distance(first, u) < ALIGN_EPSILON && distance(last, v) < ALIGN_EPSILON {
		Some(polyline.to_vec())
	} else if distance(first, v) < ALIGN_EPSILON && distance(last, u) < ALIGN_EPSILON {
		Some(reverse(polyline))
	} else if forward_cost <= reverse_cost {
		Some(polyline.to_vec())
	} else {
		Some(reverse(polyline))
	}
}

/// Douglas-Peucker polyline simplification.
pub fn simplify(polyline: &[Coord], tolerance: f64) -> Polyline {
	if polyline.len() < 3 {
		return polyline.to_vec();
	}
	let mut keep = vec![false; polyline.len()];
	keep[0] = true;
	keep[polyline.len() - 1] = true;
	douglas_peucker(polyline, 0, polyline.len() - 1, tolerance, &mut keep);
	polyline.iter().zip(keep).filter(|(_, k)| *k).map(|(c, _)| *c).collect()
}

fn douglas_peucker(polyline: &[Coord], start: usize, end: usize, tolerance: f64, keep: &mut [bool]) {
	if end <= start + 1 {
		return;
	}
	let (a, b) = (polyline[start], polyline[end]);
	let mut farthest_idx = start;
	let mut farthest_dist = 0.0;
	for i in (start + 1)..end {
		let d = perpendicular_distance(polyline[i], a, b);
		if d > farthest_dist {
			farthest_dist = d;
			farthest_idx = i;
		}
	}
	if farthest_dist > tolerance {
		keep[farthest_idx] = true;
		douglas_peucker(polyline, start, farthest_idx, tolerance, keep);
		douglas_peucker(polyline, farthest_idx, end, tolerance, keep);
	}
}

fn perpendicular_distance(p: Coord, a: Coord, b: Coord) -> f64 {
	let (dx, dy) = (b.0 - a.0, b.1 - a.1);
	let seg_len_sq = dx * dx + dy * dy;
	if seg_len_sq == 0.0 {
		return distance(p, a);
	}
	let t = ((p.0 - a.0) * dx + (p.1 - a.1) * dy) / seg_len_sq;
	let t = t.clamp(0.0, 1.0);
	let proj = (a.0 + t * dx, a.1 + t * dy);
	distance(p, proj)
}

/// Degrees-per-meter conversion used to turn the spec's metre buffers into the degree units the
/// rest of the crate works in. Accurate only near the equator, matching the planar-Euclidean
/// convention used throughout (see module docs).
const DEG_PER_METER: f64 = 1.0 / 111_320.0;

/// Approximates `area(buffer(edge) ∩ buffer(area)) / area(buffer(edge))` for the completed-road
/// classification rule.
///
/// The pack carries no polygon-buffering crate, so this samples the edge polyline at a fixed
/// step and scores the fraction of sampled length whose buffer disk center falls inside the
/// area polygon grown by `area_buffer_m`. This is a tractable stand-in for true buffer-polygon
/// intersection area and is documented as such in DESIGN.md.
pub fn buffer_overlap_ratio(edge: &[Coord], area: &Polygon<f64>, _edge_buffer_m: f64, area_buffer_m: f64) -> f64 {
	if edge.len() < 2 {
		return 0.0;
	}
	let area_buffer_deg = area_buffer_m * DEG_PER_METER;
	let samples = sample_polyline(edge, 20);
	if samples.is_empty() {
		return 0.0;
	}
	let inside = samples
		.iter()
		.filter(|p| point_near_polygon(**p, area, area_buffer_deg))
		.count();
	inside as f64 / samples.len() as f64
}

fn point_near_polygon(p: Coord, area: &Polygon<f64>, buffer_deg: f64) -> bool {
	let point = Point::new(p.0, p.1);
	if area.contains(&point) {
		return true;
	}
	if buffer_deg <= 0.0 {
		return false;
	}
	exterior_min_distance(area, p) <= buffer_deg
}

fn exterior_min_distance(area: &Polygon<f64>, p: Coord) -> f64 {
	let ring: &LineString<f64> = area.exterior();
	ring.0
		.windows(2)
		.map(|w| perpendicular_distance(p, coord_of(w[0]), coord_of(w[1])))
		.fold(f64::INFINITY, f64::min)
}

fn coord_of(c: Coordinate<f64>) -> Coord {
	(c.x, c.y)
}

/// Samples `n` evenly spaced points (by arc length) along a polyline, always including the
/// endpoints.
fn sample_polyline(polyline: &[Coord], n: usize) -> Vec<Coord> {
	let total = length(polyline);
	if total == 0.0 {
		return vec![polyline[0]];
	}
	let mut out = Vec::with_capacity(n);
	for i in 0..n {
		let target = total * (i as f64) / ((n - 1).max(1) as f64);
		out.push(point_at_distance(polyline, target));
	}
	out
}

fn point_at_distance(polyline: &[Coord], target: f64) -> Coord {
	let mut walked = 0.0;
	for w in polyline.windows(2) {
		let seg_len = distance(w[0], w[1]);
		if walked + seg_len >= target || seg_len == 0.0 {
			let remaining = (target - walked).max(0.0);
			let t = if seg_len > 0.0 { (remaining / seg_len).min(1.0) } else { 0.0 };
			return (w[0].0 + t * (w[1].0 - w[0].0), w[0].1 + t * (w[1].1 - w[0].1));
		}
		walked += seg_len;
	}
	*polyline.last().unwrap()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn reverse_is_involutive() {
		let line = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)];
		assert_eq!(reverse(&reverse(&line)), line);
	}

	#[test]
	fn length_of_square_edge() {
		let line = vec![(0.0, 0.0), (1.0, 0.0)];
		assert!((length(&line) - 1.0).abs() < 1e-9);
	}

	#[test]
	fn bearing_north_is_zero() {
		let b = bearing((0.0, 0.0), (0.0, 1.0));
		assert!(b.abs() < 1e-6);
	}

	#[test]
	fn bearing_east_is_ninety() {
		let b = bearing((0.0, 0.0), (1.0, 0.0));
		assert!((b - 90.0).abs() < 1e-6);
	}

	#[test]
	fn align_unchanged_when_already_oriented() {
		let line = vec![(0.0, 0.0), (1.0, 1.0)];
		let aligned = align(&line, (0.0, 0.0), (1.0, 1.0)).unwrap();
		assert_eq!(aligned, line);
	}

	#[test]
	fn align_reverses_when_backwards() {
		let line = vec![(1.0, 1.0), (0.0, 0.0)];
		let aligned = align(&line, (0.0, 0.0), (1.0, 1.0)).unwrap();
		assert_eq!(aligned, vec![(0.0, 0.0), (1.0, 1.0)]);
	}

	#[test]
	fn align_rejects_degenerate_polyline() {
		assert_eq!(align(&[(0.0, 0.0)], (0.0, 0.0), (1.0, 1.0)), None);
	}

	#[test]
	fn simplify_drops_colinear_points() {
		let line = vec![(0.0, 0.0), (0.5, 0.0), (1.0, 0.0)];
		let simplified = simplify(&line, 1e-6);
		assert_eq!(simplified, vec![(0.0, 0.0), (1.0, 0.0)]);
	}
}
