pub mod channel;
pub mod error;
pub mod registry;
pub mod types;

pub use channel::ChannelTransport;
pub use error::ChannelError;
pub use registry::TransportRegistry;
pub use types::{InboundMessage, OutboundMessage, SendReceipt};
