//! GeoJSON conversion (§6, debug convenience only).
//!
//! Converts a `Track` into a `geojson::FeatureCollection` with two named sub-collections,
//! `real_roads` and `straight_lines`, plus direction markers carrying `bearing_deg`. Not a
//! downstream contract: callers that need GPX or another wire format serialize `Track` however
//! they like.

use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::json;

use crate::track::{Track, TrackPoint, TrackPointKind};

/// A `FeatureCollection` with two named member collections: `real_roads` carries the route
/// linestring plus direction-marker points, `straight_lines` carries the synthesized-connector
/// linestring.
pub fn track_to_geojson(track: &Track) -> FeatureCollection {
	let mut features = Vec::new();
	features.extend(linestring_feature(&track.real, "real_roads"));
	features.extend(direction_marker_features(&track.real));
	features.extend(linestring_feature(&track.straight, "straight_lines"));

	FeatureCollection {
		bbox: None,
		features,
		foreign_members: Some(
			json!({
				"total_distance": track.total_distance,
				"backtrack_distance": track.backtrack_distance,
			})
			.as_object()
			.unwrap()
			.clone(),
		),
	}
}

fn linestring_feature(points: &[TrackPoint], collection: &'static str) -> Option<Feature> {
	let coords: Vec<Vec<f64>> = points.iter().filter(|p| p.kind != TrackPointKind::Direction).map(|p| vec![p.lon, p.lat]).collect();
	if coords.len() < 2 {
		return None;
	}
	Some(Feature {
		bbox: None,
		geometry: Some(Geometry::new(Value::LineString(coords))),
		id: None,
		properties: Some(json!({ "collection": collection }).as_object().unwrap().clone()),
		foreign_members: None,
	})
}

fn direction_marker_features(points: &[TrackPoint]) -> Vec<Feature> {
	points
		.iter()
		.filter(|p| p.kind == TrackPointKind::Direction)
		.map(|p| Feature {
			bbox: None,
			geometry: Some(Geometry::new(Value::Point(vec![p.lon, p.lat]))),
			id: None,
			properties: Some(json!({ "collection": "direction_markers", "bearing_deg": p.bearing_deg }).as_object().unwrap().clone()),
			foreign_members: None,
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::track::emit;
	use crate::graph::EdgeData;
	use std::sync::Arc;

	#[test]
	fn emits_real_roads_and_direction_markers() {
		let edge = EdgeData::real(vec![(0.0, 0.0), (1.0, 0.0)]);
		let circuit = vec![(Arc::from("a") as Arc<str>, Arc::from("b") as Arc<str>, edge)];
		let track = emit(&circuit, 3);
		let fc = track_to_geojson(&track);
		assert!(fc.features.iter().any(|f| f.properties.as_ref().and_then(|p| p.get("collection")).and_then(|c| c.as_str()) == Some("real_roads")));
		assert!(fc.features.iter().any(|f| f.properties.as_ref().and_then(|p| p.get("collection")).and_then(|c| c.as_str()) == Some("direction_markers")));
	}
}
