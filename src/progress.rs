//! Progress reporting (§6): a narrow sink the solver pushes named milestones through, independent
//! of the `log`/`env_logger` diagnostic stream.
//!
//! Grounded on the teacher's `plow.rs` annealing loop, which reports iteration progress to its
//! caller via a plain callback; generalized here into a named-step interface so a CLI can print a
//! progress bar while a web caller streams events to a client.

/// A named milestone emitted during `solve::solve_route`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
	pub step: &'static str,
	pub percent: u8,
	pub message: String,
}

impl ProgressEvent {
	pub fn new(step: &'static str, percent: u8, message: impl Into<String>) -> Self {
		Self { step, percent, message: message.into() }
	}
}

pub trait ProgressSink {
	fn emit(&mut self, event: ProgressEvent);
}

/// A `ProgressSink` that drops every event; the default when a caller doesn't care.
pub struct NullSink;

impl ProgressSink for NullSink {
	fn emit(&mut self, _event: ProgressEvent) {}
}

/// A `ProgressSink` that logs each event at `info` level through the ambient `log` facade.
pub struct LogSink;

impl ProgressSink for LogSink {
	fn emit(&mut self, event: ProgressEvent) {
		log::info!("[{:>3}%] {}: {}", event.percent, event.step, event.message);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn null_sink_accepts_any_event() {
		let mut sink = NullSink;
		sink.emit(ProgressEvent::new("Starting", 0, "begin"));
	}
}
