//! Transaction aggregate
//!
//! Contains the FuelTransaction entity, its query filter and repository interface.

pub mod model;
pub mod repository;

pub use model::{FuelTransaction, TransactionQuery};
pub use repository::TransactionRepository;
