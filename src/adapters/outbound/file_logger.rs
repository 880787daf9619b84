use crate::domains::logger::{DynLogger, FileLogger};
use std::sync::Arc;

/// Install the `fast_log` file backend and return a logger writing to it.
pub fn init_file_logger(path: &str, level: &str) -> Result<DynLogger, String> {
    FileLogger::init(path, level)
        .map_err(|e| format!("Failed to initialize fast_log at {}: {}", path, e))?;
    Ok(Arc::new(FileLogger))
}
