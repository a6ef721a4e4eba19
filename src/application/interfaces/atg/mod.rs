//! Serial automatic tank gauge (ATG)

pub mod adapter;
pub mod codec;
pub mod protocol;
pub mod simulator;
pub mod transport;

pub use adapter::{AtgAdapter, AtgSettings};
pub use codec::{decode_be_f32_hex, CodecError, FloatDecoder};
pub use protocol::{parse_inventory, ProtocolError, TankFrame};
pub use transport::{AtgConnector, AtgLink, SerialConnector, TransportError};
