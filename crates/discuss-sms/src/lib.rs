//! Vonage (Nexmo) SMS channel: outbound transport and inbound webhook decoding.

pub mod transport;
pub mod webhook;

pub use transport::NexmoTransport;
pub use webhook::{NexmoReceiveRequest, ValidationErrors};
