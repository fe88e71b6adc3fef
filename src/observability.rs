use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parley.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("parley.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parley.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_INTERRUPTED: Counter = Counter::new("parley.stream.interrupted");
pub(crate) static STREAM_DURATION: Moments = Moments::new("parley.stream.duration_seconds");

pub(crate) static REPL_COMMANDS: Counter = Counter::new("parley.repl.commands");
pub(crate) static REPL_UNKNOWN_COMMANDS: Counter = Counter::new("parley.repl.unknown_commands");
pub(crate) static REPL_CHAT_TURNS: Counter = Counter::new("parley.repl.chat_turns");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_INTERRUPTED);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&REPL_COMMANDS);
    collector.register_counter(&REPL_UNKNOWN_COMMANDS);
    collector.register_counter(&REPL_CHAT_TURNS);
}
