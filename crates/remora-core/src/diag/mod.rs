//! Process-wide diagnostic log sinks.

mod sink;

pub use sink::LogSink;

/// Main attach/lifecycle log. Every line is also mirrored to the host log
/// via `tracing`, whether or not the file is open yet.
pub static LOG: LogSink = LogSink::new("core", "remora/remora_log.txt");

/// Independent stream for network-session diagnostics. Mechanically
/// identical to [`LOG`] but a disjoint file and no shared state.
pub static NET_LOG: LogSink = LogSink::new("net", "remora/net_log.txt");
