//! The trace sink: the single `trace(level, msg)` surface the core emits
//! through.
//!
//! The sink is injected, not a concrete logger; the default implementation
//! forwards to `tracing` events so the frontend's subscriber decides where
//! lines land.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    /// Class loading and publication.
    Class,
    /// `<clinit>` and initialization ordering.
    Init,
    /// One line per decoded instruction.
    Inst,
    /// Everything else chatty.
    Verbose,
    Error,
}

pub trait TraceSink: Send + Sync {
    fn trace(&self, level: TraceLevel, msg: &str);
}

/// Forwards trace lines to `tracing` events.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn trace(&self, level: TraceLevel, msg: &str) {
        match level {
            TraceLevel::Class => tracing::info!(target: "robusta::class", "{msg}"),
            TraceLevel::Init => tracing::info!(target: "robusta::init", "{msg}"),
            TraceLevel::Inst => tracing::trace!(target: "robusta::inst", "{msg}"),
            TraceLevel::Verbose => tracing::trace!(target: "robusta::verbose", "{msg}"),
            TraceLevel::Error => tracing::error!(target: "robusta::error", "{msg}"),
        }
    }
}

/// Collects trace lines in memory; used by tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: parking_lot::Mutex<Vec<(TraceLevel, String)>>,
}

impl BufferSink {
    #[must_use]
    pub fn new() -> BufferSink {
        BufferSink::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<(TraceLevel, String)> {
        self.lines.lock().clone()
    }
}

impl TraceSink for BufferSink {
    fn trace(&self, level: TraceLevel, msg: &str) {
        self.lines.lock().push((level, msg.to_owned()));
    }
}
