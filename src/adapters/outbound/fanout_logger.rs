use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Forwards every line to each of its targets in order.
pub struct FanoutLogger {
    targets: Vec<DynLogger>,
}

impl FanoutLogger {
    pub fn new(targets: Vec<DynLogger>) -> Self {
        Self { targets }
    }
}

impl DomainLogger for FanoutLogger {
    fn info(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.error(msg));
    }
}

/// Tracing output always; the file target is added when `file` is set and
/// its backend could be installed.
pub fn init_combined_logger(file: Option<&str>, level: &str) -> DynLogger {
    let console = super::init_tracing_logger();
    let Some(path) = file else {
        return console;
    };
    match super::init_file_logger(path, level) {
        Ok(file_logger) => Arc::new(FanoutLogger::new(vec![console, file_logger])),
        Err(e) => {
            console.warn(&e);
            console
        }
    }
}
