//! The error taxonomy surfaced to callers of the route solver (see `solve::solve_route`).
//!
//! Every variant carries the phase it occurred in, so a caller can report "balancing graph
//! failed" rather than a bare message.

#[derive(thiserror::Error, Debug)]
pub enum RouteError {
	#[error("[{phase}] region produced no nodes")]
	EmptyRegion { phase: &'static str },

	#[error("[{phase}] no node reachable from the requested start location")]
	NoPathToStart { phase: &'static str },

	#[error("[{phase}] balancer could not equalize in/out degree for all nodes")]
	UnbalanceableGraph { phase: &'static str },

	#[error("[{phase}] graph has more than one weakly-connected component")]
	NotConnected { phase: &'static str },

	#[error("[{phase}] circuit construction dropped edges: {detail}")]
	CircuitIncomplete { phase: &'static str, detail: String },

	#[error("[{phase}] invalid or missing coordinate: {detail}")]
	GeometryInvalid { phase: &'static str, detail: String },

	#[error("[{phase}] external collaborator failed: {source}")]
	ExternalFailure {
		phase: &'static str,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	#[error("solve cancelled during {phase}")]
	Cancelled { phase: &'static str },
}

impl RouteError {
	pub fn phase(&self) -> &'static str {
		match self {
			RouteError::EmptyRegion { phase }
			| RouteError::NoPathToStart { phase }
			| RouteError::UnbalanceableGraph { phase }
			| RouteError::NotConnected { phase }
			| RouteError::CircuitIncomplete { phase, .. }
			| RouteError::GeometryInvalid { phase, .. }
			| RouteError::ExternalFailure { phase, .. }
			| RouteError::Cancelled { phase } => phase,
		}
	}
}
