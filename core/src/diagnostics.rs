//! Optional diagnostic sink for fatal conditions.
//!
//! The engine never holds a global logger. Entry points receive a sink
//! through [`ForwardContext`](crate::layers::ForwardContext); the default
//! is [`NoopSink`]. [`TracingSink`] forwards reports to `tracing`.

use core::fmt;

/// Engine area a report originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Matrix,
    Tensor,
    Convolution,
    Pooling,
    Network,
}

impl Subsystem {
    pub const fn as_str(self) -> &'static str {
        match self {
            Subsystem::Matrix => "matrix",
            Subsystem::Tensor => "tensor",
            Subsystem::Convolution => "convolution",
            Subsystem::Pooling => "pooling",
            Subsystem::Network => "network",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

pub trait DiagnosticSink {
    fn report(&self, subsystem: Subsystem, severity: Severity, message: &str);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &S {
    fn report(&self, subsystem: Subsystem, severity: Severity, message: &str) {
        (**self).report(subsystem, severity, message)
    }
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    #[inline]
    fn report(&self, _subsystem: Subsystem, _severity: Severity, _message: &str) {}
}

/// Emits every report as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, subsystem: Subsystem, severity: Severity, message: &str) {
        let subsystem = subsystem.as_str();
        match severity {
            Severity::Debug => tracing::debug!(subsystem, "{message}"),
            Severity::Info => tracing::info!(subsystem, "{message}"),
            Severity::Warning => tracing::warn!(subsystem, "{message}"),
            Severity::Error => tracing::error!(subsystem, "{message}"),
            Severity::Critical => tracing::error!(subsystem, critical = true, "{message}"),
        }
    }
}
