pub mod broadcast_hub;
pub mod fanout_logger;
pub mod file_logger;
pub mod noop_logger;
pub mod polyline_cost;
pub mod random_search;
pub mod tracing_logger;

pub use broadcast_hub::*;
pub use fanout_logger::*;
pub use file_logger::*;
pub use noop_logger::*;
pub use polyline_cost::*;
pub use random_search::*;
pub use tracing_logger::*;
