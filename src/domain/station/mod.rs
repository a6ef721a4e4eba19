//! Station registry aggregate
//!
//! Stations, tanks and products are owned by the external registry; the
//! device layer only reads them.

pub mod model;
pub mod repository;

pub use model::{Product, Station, Tank, TankFilter, TankInfo};
pub use repository::StationRepository;
