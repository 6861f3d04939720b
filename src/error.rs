use thiserror::Error;

/// Errors from the few fallible edges of the crate.
///
/// Drift itself is never an error: it is delivered as a [`DriftReport`] through
/// the configured sinks.
///
/// [`DriftReport`]: crate::DriftReport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The frame clock was dropped while an async tick wait was outstanding.
    #[error("frame clock stopped before the tick wait completed")]
    ClockStopped,

    /// A report sink name that does not match any built-in sink.
    #[error("unknown report sink `{0}` (expected one of: log, assert, breakpoint, runtime-warning)")]
    UnknownSink(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
