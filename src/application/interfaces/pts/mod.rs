//! jsonPTS forecourt/probe controller over HTTP

pub mod adapter;
pub mod client;
pub mod clock;
pub mod packets;
pub mod simulator;

pub use adapter::{PtsAdapter, PtsSettings};
pub use client::{PtsClient, PtsClientConfig, DEFAULT_CANDIDATE_PATHS};
pub use clock::ClockCheck;
pub use packets::PacketError;
