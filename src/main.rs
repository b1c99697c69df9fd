//! # burbsweep
//!
//! CLI for solving the street-coverage routing problem: balance a road network into an Eulerian
//! circuit and emit a track covering every edge exactly once.

use clap::{crate_version, App, Arg, SubCommand};

use burbsweep::config::RouteOptions;
use burbsweep::graph::NodeId;
use burbsweep::io::{CompletedArea, LoadRequest, RoadGraphFile, StartLocation, StaticMapSource};
use burbsweep::progress::LogSink;
use burbsweep::solve::{self, SolveRequest};

fn main() -> std::io::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));

	let matches = App::new("burbsweep")
		.version(crate_version!())
		.about("Cover every street exactly once")
		.subcommand(
			SubCommand::with_name("route")
				.about("Compute a street-coverage route")
				.arg(Arg::with_name("road-graph").takes_value(true).required(true).index(1).help("Road graph JSON"))
				.arg(Arg::with_name("output").takes_value(true).required(true).index(2).help("Output track GeoJSON"))
				.arg(Arg::with_name("options").short("o").long("options").takes_value(true).help("Route options YAML"))
				.arg(Arg::with_name("completed-area").short("c").long("completed-area").takes_value(true).help("Completed-area polygon GeoJSON"))
				.arg(Arg::with_name("start-node").long("start-node").takes_value(true).help("Start node id"))
				.arg(Arg::with_name("start-coords").long("start-coords").takes_value(true).number_of_values(2).help("Start lon lat")),
		)
		.get_matches();

	if let Some(matches) = matches.subcommand_matches("route") {
		let road_graph_path = matches.value_of("road-graph").unwrap();
		let file: RoadGraphFile = serde_json::from_reader(std::fs::File::open(road_graph_path)?).expect("road graph invalid JSON");

		let mut options: RouteOptions = match matches.value_of("options") {
			Some(path) => serde_yaml::from_reader(std::fs::File::open(path)?).expect("options invalid YAML"),
			None => RouteOptions::default(),
		};

		if let Some(node) = matches.value_of("start-node") {
			let node_id: NodeId = node.into();
			options.start = Some(StartLocation { coords: None, node: Some(node_id) });
		} else if let Some(mut coords) = matches.values_of("start-coords") {
			let lon: f64 = coords.next().unwrap().parse().expect("start-coords lon invalid");
			let lat: f64 = coords.next().unwrap().parse().expect("start-coords lat invalid");
			options.start = Some(StartLocation { coords: Some((lon, lat)), node: None });
		}

		let completed_area = match matches.value_of("completed-area") {
			Some(path) => {
				let collection: geojson::FeatureCollection = serde_json::from_reader(std::fs::File::open(path)?).expect("completed-area invalid GeoJSON");
				polygon_from_collection(&collection).map(|polygon| CompletedArea { polygon })
			}
			None => None,
		};

		log::info!("Loaded configuration");
		let source = StaticMapSource { file };
		let load = LoadRequest {
			region_polygon: geo::Polygon::new(geo::LineString(vec![]), vec![]),
			network_filter: Box::new(|_| true),
			simplify_flag: options.simplify,
			buffer_meters: options.buffer_meters,
		};
		let request = SolveRequest { load, completed_area, options: &options };
		let mut sink = LogSink;
		let track = solve::solve_route(&source, request, &mut sink, &|| false).expect("route solve failed");
		log::info!("Constructed track");

		let geojson = burbsweep::gj::track_to_geojson(&track);
		serde_json::to_writer(std::fs::File::create(matches.value_of("output").unwrap())?, &geojson).unwrap();
	}
	Ok(())
}

fn polygon_from_collection(collection: &geojson::FeatureCollection) -> Option<geo::Polygon<f64>> {
	use std::convert::TryInto;
	collection
		.features
		.iter()
		.find_map(|f| f.geometry.clone())
		.and_then(|g| TryInto::<geo::Geometry<f64>>::try_into(g).ok())
		.and_then(|g| match g {
			geo::Geometry::Polygon(p) => Some(p),
			_ => None,
		})
}
