//! Route options (§6): a YAML/JSON-configured struct mirroring the teacher's `meta::Parameters`,
//! one field per tunable behavior of the solve pipeline.

use serde::{Deserialize, Serialize};

use crate::io::StartLocation;

fn default_completed_threshold() -> f64 {
	0.5
}

fn default_simplify_tolerance() -> f64 {
	1e-5
}

fn default_arrow_interval() -> usize {
	3
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RouteOptions {
	/// Coalesce colinear/near-colinear nodes in the loaded graph before balancing.
	#[serde(default)]
	pub simplify: bool,
	/// Remove edges of class `{track, path, cycleway}` with an empty name, then orphan nodes.
	#[serde(default)]
	pub prune: bool,
	/// Run the track simplifier during emission.
	#[serde(default)]
	pub simplify_gpx: bool,
	/// Run the dead-end shortcut pre-pass before balancing.
	#[serde(default)]
	pub feature_deadend: bool,
	/// Run completed-road filtering when a `CompletedArea` is supplied.
	#[serde(default)]
	pub exclude_completed: bool,
	/// Buffer radius in metres applied when the region is a single point.
	#[serde(default)]
	pub buffer_meters: f64,
	/// Optional start address or coordinates.
	#[serde(default)]
	pub start: Option<StartLocation>,
	/// Overlap ratio above which an edge counts as completed.
	#[serde(default = "default_completed_threshold")]
	pub completed_threshold: f64,
	/// Douglas-Peucker tolerance used when `simplify_gpx` is set.
	#[serde(default = "default_simplify_tolerance")]
	pub simplify_tolerance: f64,
	/// Direction-marker spacing along a real-road segment.
	#[serde(default = "default_arrow_interval")]
	pub arrow_interval: usize,
}

impl Default for RouteOptions {
	fn default() -> Self {
		Self {
			simplify: false,
			prune: false,
			simplify_gpx: false,
			feature_deadend: false,
			exclude_completed: false,
			buffer_meters: 0.0,
			start: None,
			completed_threshold: default_completed_threshold(),
			simplify_tolerance: default_simplify_tolerance(),
			arrow_interval: default_arrow_interval(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn defaults_match_spec() {
		let opts = RouteOptions::default();
		assert!((opts.completed_threshold - 0.5).abs() < 1e-12);
		assert!((opts.simplify_tolerance - 1e-5).abs() < 1e-15);
		assert_eq!(opts.arrow_interval, 3);
	}

	#[test]
	fn deserializes_from_partial_yaml() {
		let yaml = "simplify: true\nexclude_completed: true\n";
		let opts: RouteOptions = serde_yaml::from_str(yaml).unwrap();
		assert!(opts.simplify);
		assert!(opts.exclude_completed);
		assert_eq!(opts.arrow_interval, 3);
	}
}
