//! Notifications module
//!
//! In-process publish port for real-time dashboard data. Adapters publish
//! through [`RealtimePublisher`](crate::application::ports::RealtimePublisher);
//! the transport that fans events out to clients subscribes to the bus.
//!
//! # Usage
//! ```ignore
//! use fuel_telemetry::notifications::create_event_bus;
//!
//! let event_bus = create_event_bus();
//! let mut subscriber = event_bus.subscribe();
//! while let Some(msg) = subscriber.recv().await {
//!     println!("{} for station {:?}", msg.event.event_type(), msg.event.station_id());
//! }
//! ```

pub mod event_bus;
pub mod events;

pub use event_bus::{create_event_bus, EventBus, EventSubscriber, SharedEventBus};
pub use events::*;
