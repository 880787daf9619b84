pub mod optimization_service;

pub use optimization_service::*;
