pub mod model;

pub use model::{AdapterMode, ConnectionState, InterfaceSource, InterfaceStatus};
