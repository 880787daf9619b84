use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Forwards domain log lines to the process-wide `tracing` subscriber.
struct TracingBridge;

impl DomainLogger for TracingBridge {
    fn info(&self, msg: &str) {
        tracing::info!(target: "pathopt::domain", "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: "pathopt::domain", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "pathopt::domain", "{}", msg);
    }
}

pub fn init_tracing_logger() -> DynLogger {
    Arc::new(TracingBridge)
}
