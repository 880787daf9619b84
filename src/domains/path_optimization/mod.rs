pub mod coordinator;
pub mod environment;
pub mod events;
pub mod job;
pub mod ports;
pub mod publisher;
pub mod types;

pub use coordinator::*;
pub use environment::*;
pub use events::*;
pub use job::*;
pub use ports::*;
pub use publisher::*;
pub use types::*;
