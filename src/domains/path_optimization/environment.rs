use super::types::{Environment, EnvironmentParams};
use crate::common::DomainResult;
use std::sync::{Arc, PoisonError, RwLock};

/// Holds the currently configured workspace.
///
/// Configuration swaps in a fresh `Arc<Environment>`; running jobs keep the
/// snapshot they were started with, so reconfiguring never touches an
/// in-flight run.
#[derive(Debug, Default)]
pub struct EnvironmentStore {
    current: RwLock<Option<Arc<Environment>>>,
}

impl EnvironmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `params` and replace the stored environment wholesale.
    pub fn configure(&self, params: EnvironmentParams) -> DomainResult<Arc<Environment>> {
        let environment = Arc::new(params.into_environment()?);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(environment.clone());
        Ok(environment)
    }

    pub fn snapshot(&self) -> Option<Arc<Environment>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn obstacle_count(&self) -> usize {
        self.snapshot().map_or(0, |env| env.obstacles.len())
    }
}
