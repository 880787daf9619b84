pub mod logger;
pub mod path_optimization;

pub use logger::*;
pub use path_optimization::*;
