//! Database entities module

pub mod anomaly_alert;
pub mod interface_type;
pub mod product;
pub mod refill_event;
pub mod station;
pub mod tank;
pub mod tank_reading;
pub mod transaction;

pub use anomaly_alert::Entity as AnomalyAlert;
pub use interface_type::Entity as InterfaceType;
pub use product::Entity as Product;
pub use refill_event::Entity as RefillEvent;
pub use station::Entity as Station;
pub use tank::Entity as Tank;
pub use tank_reading::Entity as TankReading;
pub use transaction::Entity as Transaction;
