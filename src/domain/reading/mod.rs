//! Tank reading aggregate
//!
//! Contains the TankReading entity, live samples and the repository interface.

pub mod model;
pub mod repository;

pub use model::{round1, TankMeasurement, TankReading, TankSample, TankStatus};
pub use repository::ReadingRepository;
